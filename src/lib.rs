pub mod config;
pub mod error;
pub mod backend;
pub mod ingest;
pub mod graph;
pub mod summary;

pub use config::Config;
pub use error::{BackendError, IngestError, Result};
pub use backend::{Backend, R2rClient};
pub use ingest::{CancelHandle, PipelineOptions, run_pipeline};
pub use summary::RunSummary;
