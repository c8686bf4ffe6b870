use thiserror::Error;

use crate::error::{Classify, NetworkError, NetworkErrorKind};

/// Operation queue errors
///
/// Failures of the queued operation itself are part of its own output and
/// never show up here; these variants only describe what went wrong around
/// it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("No tokio runtime available to drain the operation queue")]
    NoRuntime,

    #[error("Queued operation panicked")]
    OperationPanicked,

    #[error("Queued operation was dropped before completing")]
    Dropped,
}

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

impl Classify for QueueError {
    fn classify(&self) -> NetworkError {
        NetworkError::new(NetworkErrorKind::Unknown, self.to_string(), false)
    }
}
