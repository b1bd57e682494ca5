//! Error types and handling for event streams
//!
//! A failed stream carries exactly one `Err(StreamError)` as its last item.
//! Cancellation is never represented here: a cancelled stream simply stops.

use std::fmt;

use crate::connectors::connection_errors::TransportError;

/// Main error type for event stream operations
#[derive(Debug, Clone, PartialEq)]
pub enum StreamError {
    /// The RPC call, read or write failed
    Transport(TransportError),
    /// A user-supplied transform failed inside an operator
    Transform(String),
    /// Custom error with message
    Custom(String),
}

impl StreamError {
    /// Wrap any displayable failure raised by a transform
    pub fn transform(err: impl fmt::Display) -> Self {
        StreamError::Transform(err.to_string())
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, StreamError::Transport(_))
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::Transport(err) => write!(f, "Transport error: {}", err),
            StreamError::Transform(msg) => write!(f, "Transform error: {}", msg),
            StreamError::Custom(msg) => write!(f, "Stream error: {}", msg),
        }
    }
}

impl std::error::Error for StreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StreamError::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TransportError> for StreamError {
    fn from(err: TransportError) -> Self {
        StreamError::Transport(err)
    }
}

impl From<tokio::time::error::Elapsed> for StreamError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        StreamError::Transport(TransportError::DeadlineExceeded)
    }
}

/// Result type carried by every event stream item
pub type StreamResult<T> = Result<T, StreamError>;
