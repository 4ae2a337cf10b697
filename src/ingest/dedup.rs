//! Duplicate filter: drop files the collection already holds.
//!
//! The collection listing is fetched once, before the queue is populated, and
//! compared by file name. Nothing in the collection is deleted or overwritten.

use std::collections::HashSet;

use crate::backend::{Backend, CollectionHandle, ExistingDocument};
use crate::error::Result;
use crate::ingest::FileTask;

/// Discovered files split by whether the collection already has them.
#[derive(Debug, Default)]
pub struct DuplicateSplit {
    /// Files to upload
    pub pending: Vec<FileTask>,
    /// Files whose name matches an existing document
    pub duplicates: Vec<FileTask>,
}

/// Partition `files` against the names of `existing` documents.
///
/// Discovery order is preserved in both halves.
pub fn split_duplicates(files: Vec<FileTask>, existing: &[ExistingDocument]) -> DuplicateSplit {
    let names: HashSet<&str> = existing.iter().map(|d| d.name.as_str()).collect();
    let mut split = DuplicateSplit::default();

    for file in files {
        if names.contains(file.file_name.as_str()) {
            split.duplicates.push(file);
        } else {
            split.pending.push(file);
        }
    }

    split
}

/// Fetch the collection listing and remove files it already contains.
pub async fn filter_duplicates(
    backend: &dyn Backend,
    collection: &CollectionHandle,
    files: Vec<FileTask>,
) -> Result<DuplicateSplit> {
    let existing = backend.list_documents(collection).await?;
    log::info!(
        "Collection '{}' already holds {} documents",
        collection.name,
        existing.len()
    );

    let split = split_duplicates(files, &existing);
    for dup in &split.duplicates {
        log::info!("⏭️  {} already in collection, skipping", dup.relative_path);
    }
    Ok(split)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;
    use crate::ingest::MediaKind;
    use std::path::PathBuf;
    use std::sync::atomic::Ordering;
    use uuid::Uuid;

    fn task(name: &str) -> FileTask {
        let extension = name.rsplit('.').next().unwrap_or("").to_string();
        FileTask {
            absolute_path: PathBuf::from("/data").join(name),
            relative_path: name.to_string(),
            file_name: PathBuf::from(name).file_name().unwrap().to_string_lossy().to_string(),
            media_kind: MediaKind::from_extension(&extension),
            extension,
            size: 1,
        }
    }

    fn existing(name: &str) -> ExistingDocument {
        ExistingDocument {
            name: name.to_string(),
            document_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn test_split_duplicates_by_name() {
        let files = vec![task("a.txt"), task("b.pdf"), task("c.txt")];
        let split = split_duplicates(files, &[existing("b.pdf"), existing("unrelated.md")]);

        let pending: Vec<&str> = split.pending.iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(pending, vec!["a.txt", "c.txt"]);
        assert_eq!(split.duplicates.len(), 1);
        assert_eq!(split.duplicates[0].file_name, "b.pdf");
    }

    #[test]
    fn test_split_duplicates_matches_file_name_not_path() {
        let split = split_duplicates(vec![task("nested/dir/a.txt")], &[existing("a.txt")]);
        assert!(split.pending.is_empty());
        assert_eq!(split.duplicates.len(), 1);
    }

    #[test]
    fn test_split_duplicates_empty_collection() {
        let split = split_duplicates(vec![task("a.txt")], &[]);
        assert_eq!(split.pending.len(), 1);
        assert!(split.duplicates.is_empty());
    }

    #[tokio::test]
    async fn test_filter_duplicates_lists_once() {
        let backend = MockBackend::new();
        let collection = backend.seed("papers", &["b.pdf"]);

        let split = filter_duplicates(&backend, &collection, vec![task("a.txt"), task("b.pdf")])
            .await
            .unwrap();
        assert_eq!(split.pending.len(), 1);
        assert_eq!(split.duplicates.len(), 1);
        assert_eq!(backend.list_calls.load(Ordering::SeqCst), 1);
    }
}
