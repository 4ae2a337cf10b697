//! Worker pool running the per-file pipeline: upload, extract, record.

use std::sync::Arc;

use tokio::task::JoinSet;

use crate::backend::{Backend, CollectionHandle, UploadMetadata};
use crate::ingest::aggregator::Aggregator;
use crate::ingest::cancel::CancelSignal;
use crate::ingest::queue::SharedReceiver;
use crate::ingest::{ExtractionResult, FileTask, PipelineOutcome};

/// What every worker needs to process a file
pub struct WorkerContext {
    pub backend: Arc<dyn Backend>,
    pub collection: CollectionHandle,
    /// Request extraction after each successful upload
    pub extract: bool,
}

impl WorkerContext {
    fn metadata_for(&self, task: &FileTask) -> UploadMetadata {
        UploadMetadata {
            title: task.file_name.clone(),
            collection: self.collection.name.clone(),
            collection_id: self.collection.id.to_string(),
            source_folder: task.source_folder(),
            file_size: task.size,
            file_type: format!(".{}", task.extension),
        }
    }
}

/// Run upload and (if uploaded) extraction for one file.
///
/// Never fails: every error is captured in the returned outcome.
pub async fn process_file(ctx: &WorkerContext, task: FileTask) -> PipelineOutcome {
    log::info!("📤 Uploading {}", task.relative_path);

    let bytes = match tokio::fs::read(&task.absolute_path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            log::error!("✗ Failed to upload {}: cannot read file: {}", task.relative_path, e);
            return PipelineOutcome::upload_failed(task, format!("cannot read file: {}", e));
        }
    };

    let metadata = ctx.metadata_for(&task);
    let document_id = match ctx
        .backend
        .upload_document(&ctx.collection, &task.file_name, bytes, &metadata)
        .await
    {
        Ok(id) => id,
        Err(e) if e.is_already_exists() => {
            log::info!("⏭️  Skipped {}: already exists", task.relative_path);
            return PipelineOutcome::duplicate(task);
        }
        Err(e) => {
            log::error!("✗ Failed to upload {}: {}", task.relative_path, e);
            return PipelineOutcome::upload_failed(task, e.to_string());
        }
    };
    log::info!("✓ Uploaded {} ({})", task.relative_path, document_id);

    if !ctx.extract {
        return PipelineOutcome::uploaded(task, document_id, ExtractionResult::skipped(document_id));
    }

    log::info!("🔍 Extracting entities from {}", task.relative_path);
    let extraction = match ctx.backend.extract_entities(document_id).await {
        Ok(counts) => {
            log::info!(
                "✓ Extracted {}: {} entities, {} relationships",
                task.relative_path,
                counts.entity_count,
                counts.relationship_count
            );
            ExtractionResult::extracted(document_id, counts)
        }
        Err(e) => {
            log::error!("✗ Failed to extract from {}: {}", task.relative_path, e);
            ExtractionResult::failed(document_id, e.to_string())
        }
    };

    PipelineOutcome::uploaded(task, document_id, extraction)
}

/// Spawn `count` workers draining `rx` until it is closed and empty, or the run is cancelled.
///
/// The returned set completes when every worker has exited.
pub fn spawn_workers(
    count: usize,
    rx: SharedReceiver<FileTask>,
    ctx: Arc<WorkerContext>,
    aggregator: Aggregator,
    cancel: CancelSignal,
) -> JoinSet<()> {
    let mut workers = JoinSet::new();

    for i in 0..count {
        let rx = rx.clone();
        let ctx = ctx.clone();
        let aggregator = aggregator.clone();
        let cancel = cancel.clone();

        workers.spawn(async move {
            log::debug!("Worker {} started", i);
            let mut processed = 0usize;

            loop {
                let task = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    task = rx.recv() => match task {
                        Some(task) => task,
                        None => break,
                    },
                };

                let outcome = process_file(&ctx, task).await;
                aggregator.record(outcome);
                processed += 1;
            }

            log::debug!("Worker {} stopped after {} files", i, processed);
        });
    }

    workers
}
