//! Get-or-create for the target collection.

use std::time::Duration;

use crate::backend::{Backend, CollectionHandle};
use crate::error::{BackendError, IngestError, Result};

/// Resolve `name` to a collection handle, creating the collection if needed.
///
/// An "already exists" answer to the create call means another client won the
/// race; the collection is looked up again and returned. Other create failures
/// are retried up to `max_attempts` times with exponential backoff starting at
/// `retry_delay`. An unreachable backend fails immediately.
pub async fn resolve_collection(
    backend: &dyn Backend,
    name: &str,
    max_attempts: usize,
    retry_delay: Duration,
) -> Result<CollectionHandle> {
    let mut delay = retry_delay;
    let mut last_error: Option<BackendError> = None;

    for attempt in 1..=max_attempts.max(1) {
        match backend.find_collection(name).await {
            Ok(Some(handle)) => {
                log::info!("✓ Collection '{}' already exists ({})", name, handle.id);
                return Ok(handle);
            }
            Ok(None) => {}
            Err(e @ BackendError::Unreachable(_)) => return Err(e.into()),
            Err(e) => {
                log::warn!("Listing collections failed (attempt {}/{}): {}", attempt, max_attempts, e);
                last_error = Some(e);
                tokio::time::sleep(delay).await;
                delay *= 2;
                continue;
            }
        }

        match backend.create_collection(name).await {
            Ok(handle) => {
                log::info!("✓ Created collection '{}' ({})", name, handle.id);
                return Ok(handle);
            }
            Err(e) if e.is_already_exists() => {
                log::debug!("Collection '{}' was created concurrently, looking it up again", name);
                match backend.find_collection(name).await {
                    Ok(Some(handle)) => {
                        log::info!("✓ Collection '{}' already exists ({})", name, handle.id);
                        return Ok(handle);
                    }
                    Ok(None) => last_error = Some(e),
                    Err(lookup @ BackendError::Unreachable(_)) => return Err(lookup.into()),
                    Err(lookup) => {
                        log::warn!("Looking up collection '{}' failed (attempt {}/{}): {}", name, attempt, max_attempts, lookup);
                        last_error = Some(lookup);
                    }
                }
            }
            Err(e @ BackendError::Unreachable(_)) => return Err(e.into()),
            Err(e) => {
                log::warn!("Creating collection '{}' failed (attempt {}/{}): {}", name, attempt, max_attempts, e);
                last_error = Some(e);
            }
        }

        if attempt < max_attempts {
            tokio::time::sleep(delay).await;
            delay *= 2;
        }
    }

    Err(IngestError::Collection(format!(
        "could not create collection '{}' after {} attempts: {}",
        name,
        max_attempts.max(1),
        last_error.map(|e| e.to_string()).unwrap_or_else(|| "unknown error".to_string())
    )))
}
