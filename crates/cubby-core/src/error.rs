use thiserror::Error;

/// Result type for storage and service operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Error taxonomy shared by every backend and the service layer.
///
/// `NotFound` is an ordinary outcome, not a fault. A duplicate save is not
/// represented here at all: it surfaces as
/// [`SaveOutcome::Duplicate`](crate::record::SaveOutcome). `Unsupported`
/// is deliberately distinct from `Unavailable` so callers can pick a
/// fallback path instead of treating a missing capability as an outage.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("short key not found: {0}")]
    NotFound(String),
    #[error("operation not supported by this backend: {0}")]
    Unsupported(&'static str),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("write failed: {0}")]
    WriteFailed(String),
    #[error("batch aborted: {0}")]
    BatchAborted(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("delete queue is closed")]
    QueueClosed,
}
