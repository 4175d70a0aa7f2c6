use thiserror::Error;

/// Unified error type for the echo service
#[derive(Error, Debug)]
pub enum EchoError {
    // Transport errors
    #[error("WebSocket transport error: {0}")]
    Transport(String),

    #[error("Connection closed")]
    ConnectionClosed,

    // Deadline errors
    #[error("No read activity within the deadline")]
    ReadTimeout,

    #[error("Write deadline exceeded")]
    WriteTimeout,

    // Protocol errors
    #[error("Message of {size} bytes exceeds the {limit} byte limit")]
    MessageTooLarge { size: usize, limit: usize },

    // I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for echo service operations
pub type Result<T> = std::result::Result<T, EchoError>;

impl EchoError {
    /// Whether this error is a deadline eviction rather than a peer fault
    pub fn is_timeout(&self) -> bool {
        matches!(self, EchoError::ReadTimeout | EchoError::WriteTimeout)
    }
}

// Convert from axum WebSocket errors
impl From<axum::Error> for EchoError {
    fn from(err: axum::Error) -> Self {
        EchoError::Transport(err.to_string())
    }
}
