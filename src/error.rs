use thiserror::Error;

/// Main error type for r2r-ingest
#[derive(Error, Debug)]
pub enum IngestError {
    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source folder could not be walked (missing root, not a directory)
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// Collection could not be found or created
    #[error("Collection error: {0}")]
    Collection(String),

    /// Errors reported by (or while talking to) the document backend
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

/// Failures of a single backend call.
///
/// Variants mirror the backend contract: callers branch on
/// [`BackendError::is_already_exists`] to tell duplicates apart from real failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Connection refused or DNS failure
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    /// The resource (document or collection) already exists
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Request rejected as invalid (4xx other than 409/429)
    #[error("invalid request: {0}")]
    Invalid(String),

    /// Rate limit or storage quota hit (429)
    #[error("quota exceeded: {0}")]
    Quota(String),

    /// Backend accepted the request but the operation failed (5xx, failed task)
    #[error("operation failed: {0}")]
    Failed(String),

    /// Operation did not complete within the allowed time
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Response body did not match any known shape for the call
    #[error("unrecognized response from {endpoint}: {body}")]
    UnrecognizedResponse { endpoint: String, body: String },
}

impl BackendError {
    pub fn is_already_exists(&self) -> bool {
        matches!(self, BackendError::AlreadyExists(_))
    }

    /// Transient failures worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BackendError::Unreachable(_) | BackendError::Quota(_) | BackendError::Failed(_)
        )
    }
}

/// Convenient Result type using IngestError
pub type Result<T> = std::result::Result<T, IngestError>;
