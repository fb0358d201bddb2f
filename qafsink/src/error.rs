//! Error types for sink transports

/// Result type alias for sink operations
pub type Result<T> = std::result::Result<T, SinkError>;

/// Errors that can occur while driving an audio sink
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Joining the room did not succeed
    #[error("failed to join room: {0}")]
    ConnectFailed(String),

    /// The gateway refused a player operation
    #[error("gateway refused {operation}: status {status}")]
    Rejected { operation: &'static str, status: u16 },

    /// An operation required an active session
    #[error("not connected to any room")]
    NotConnected,
}
