//! Run-wide cancellation.
//!
//! Triggered by Ctrl-C or the run deadline. Workers stop taking new files;
//! anything already in flight runs to completion or its request timeout.

use tokio_util::sync::CancellationToken;

/// Owner side: fires the signal
#[derive(Clone, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

/// Observer side, one clone per task
#[derive(Clone)]
pub struct CancelSignal {
    token: CancellationToken,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        if !self.is_cancelled() {
            log::warn!("Cancellation requested: no further files will be started");
        }
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            token: self.token.clone(),
        }
    }
}

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once cancellation is requested
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}
