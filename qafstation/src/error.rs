use thiserror::Error;

/// Errors raised by the station scheduler and its collaborators
#[derive(Error, Debug)]
pub enum StationError {
    /// A source change named a reciter with no catalog directory
    #[error("unknown reciter: {0}")]
    UnknownReciter(String),

    /// The scheduler has no room target to connect to
    #[error("no room target configured")]
    NoTargetConfigured,

    /// The scheduler task is gone and commands can no longer be delivered
    #[error("station scheduler is no longer running")]
    StationGone,

    /// Catalog lookup failed
    #[error("catalog error: {0}")]
    Catalog(#[from] qafcatalog::CatalogError),

    /// Sink operation failed
    #[error("sink error: {0}")]
    Sink(#[from] qafsink::SinkError),

    /// State file I/O failed
    #[error("state file error: {0}")]
    Io(#[from] std::io::Error),

    /// State serialization failed
    #[error("state serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for station operations
pub type Result<T> = std::result::Result<T, StationError>;
