use crate::capture::CaptureError;
use crate::job::CustomJsStatus;
use crate::runtime::WorkerError;

/// Why an attempt was unsuccessful
#[derive(Debug, thiserror::Error)]
pub enum AttemptError {
    /// The capture itself failed; partial fields were stored first
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// The page answered with a client or server error
    #[error("Bad status code {0}")]
    BadStatus(u16),

    /// A requested extraction script did not succeed
    #[error("Custom JS returned status {0}")]
    CustomJs(CustomJsStatus),

    /// A result field could not be stored
    #[error("Failed to store result: {0}")]
    Tracker(#[source] anyhow::Error),

    #[error("Worker lost: {0}")]
    WorkerLost(#[from] WorkerError),
}

impl AttemptError {
    /// The capture completed but its outcome was rejected
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::BadStatus(_) | Self::CustomJs(_))
    }
}
