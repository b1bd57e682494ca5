//! Error types for the RPC transport

/// Failure reported by the streaming RPC client
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("call failed: {0}")]
    CallFailed(String),

    #[error("read failed: {0}")]
    ReadFailed(String),

    #[error("write failed: {0}")]
    WriteFailed(String),

    #[error("completing the request stream failed: {0}")]
    CompleteFailed(String),

    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl From<tokio::time::error::Elapsed> for TransportError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        TransportError::DeadlineExceeded
    }
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;
