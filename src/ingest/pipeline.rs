//! Run orchestration.
//!
//! Three phases separated by barriers:
//! 1. sequential setup: discover files, resolve the collection, drop duplicates
//! 2. fan-out: N workers drain the bounded queue
//! 3. fan-in: after every worker has exited, build the graph and fold the summary

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::backend::Backend;
use crate::config::Config;
use crate::error::Result;
use crate::graph::{build_collection_graph, GraphBuildStatus};
use crate::ingest::aggregator::Aggregator;
use crate::ingest::cancel::CancelHandle;
use crate::ingest::collection::resolve_collection;
use crate::ingest::dedup::filter_duplicates;
use crate::ingest::queue::{feed, work_queue};
use crate::ingest::worker::{spawn_workers, WorkerContext};
use crate::ingest::{discover_files, PipelineOutcome};
use crate::summary::RunSummary;

/// Everything a run needs, resolved from [`Config`]
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub folder: PathBuf,
    pub collection: String,
    pub workers: usize,
    pub queue_capacity: usize,
    pub recursive: bool,
    pub extensions: BTreeSet<String>,
    pub extract: bool,
    pub build_graph: bool,
    pub run_deadline: Option<Duration>,
    pub max_create_attempts: usize,
    pub create_retry_delay: Duration,
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            folder: config.ingest.folder.clone(),
            collection: config.ingest.collection.clone(),
            workers: config.ingest.workers,
            queue_capacity: config.ingest.queue_capacity,
            recursive: config.ingest.recursive,
            extensions: config.extension_set(),
            extract: config.ingest.extract,
            build_graph: config.ingest.build_graph,
            run_deadline: config.run_deadline(),
            max_create_attempts: config.backend.max_create_attempts,
            create_retry_delay: Duration::from_secs(1),
        }
    }
}

/// Ingest every supported file under `options.folder` into the collection.
///
/// Returns `Err` only for setup failures (bad folder, collection cannot be
/// resolved, duplicate listing fails). Per-file failures and a failed graph
/// build are reported in the returned summary.
pub async fn run_pipeline(
    backend: Arc<dyn Backend>,
    options: &PipelineOptions,
    cancel: CancelHandle,
) -> Result<RunSummary> {
    let started_at = Utc::now();
    let start = Instant::now();

    // Phase 1: sequential setup
    log::info!("🔍 Discovering files in '{}'...", options.folder.display());
    let files = discover_files(&options.folder, &options.extensions, options.recursive)?;
    for file in &files {
        log::info!("  found {} ({} bytes, {:?})", file.relative_path, file.size, file.media_kind);
    }
    let discovered = files.len();

    if files.is_empty() {
        log::warn!("⚠️  No supported files found in '{}'", options.folder.display());
        return Ok(RunSummary::new(
            &options.collection,
            0,
            0,
            &[],
            GraphBuildStatus::skipped("no supported files found"),
            started_at,
            start.elapsed(),
        ));
    }

    let collection = resolve_collection(
        backend.as_ref(),
        &options.collection,
        options.max_create_attempts,
        options.create_retry_delay,
    )
    .await?;

    let split = filter_duplicates(backend.as_ref(), &collection, files).await?;
    let excluded = split.duplicates.len();
    let pending = split.pending;
    log::info!(
        "📤 Uploading {} files to '{}' with {} workers ({} already present)",
        pending.len(),
        collection.name,
        options.workers,
        excluded
    );

    // Phase 2: fan-out. The deadline counts from the start of the run, setup included.
    let deadline = options.run_deadline.map(|limit| {
        let at = tokio::time::Instant::from_std(start) + limit;
        if at <= tokio::time::Instant::now() {
            log::warn!("Run deadline of {:?} reached during setup", limit);
            cancel.cancel();
        }
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep_until(at).await;
            if !cancel.is_cancelled() {
                log::warn!("Run deadline of {:?} reached", limit);
            }
            cancel.cancel();
        })
    });

    let (tx, rx) = work_queue(options.queue_capacity);
    let producer = tokio::spawn(feed(tx, pending, cancel.signal()));

    let aggregator = Aggregator::new();
    let ctx = Arc::new(WorkerContext {
        backend: backend.clone(),
        collection: collection.clone(),
        extract: options.extract,
    });
    let mut workers = spawn_workers(options.workers, rx.clone(), ctx, aggregator.clone(), cancel.signal());

    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            log::error!("Worker terminated abnormally: {}", e);
        }
    }

    // Closing the queue first unblocks a producer still waiting for space
    let mut never_started = rx.drain().await;
    match producer.await {
        Ok(left) => never_started.extend(left),
        Err(e) => log::error!("Queue producer terminated abnormally: {}", e),
    }
    for task in never_started {
        log::warn!("🚫 Cancelled {} before upload", task.relative_path);
        aggregator.record(PipelineOutcome::cancelled(task));
    }

    if let Some(deadline) = deadline {
        deadline.abort();
    }

    // Phase 3: fan-in
    let outcomes = aggregator.snapshot();
    let graph = if !options.build_graph {
        GraphBuildStatus::skipped("disabled")
    } else if cancel.is_cancelled() {
        GraphBuildStatus::skipped("run cancelled")
    } else {
        build_collection_graph(backend.as_ref(), &collection).await
    };

    Ok(RunSummary::new(
        &collection.name,
        discovered,
        excluded,
        &outcomes,
        graph,
        started_at,
        start.elapsed(),
    ))
}
