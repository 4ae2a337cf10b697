pub mod walker;
pub mod dedup;
pub mod collection;
pub mod queue;
pub mod cancel;
pub mod aggregator;
pub mod outcome;
pub mod worker;
pub mod pipeline;

pub use walker::{FileTask, MediaKind, discover_files};
pub use dedup::{DuplicateSplit, filter_duplicates, split_duplicates};
pub use collection::resolve_collection;
pub use cancel::{CancelHandle, CancelSignal};
pub use aggregator::Aggregator;
pub use outcome::{ExtractionOutcome, ExtractionResult, PipelineOutcome, UploadOutcome, UploadResult};
pub use worker::{WorkerContext, process_file, spawn_workers};
pub use pipeline::{PipelineOptions, run_pipeline};
