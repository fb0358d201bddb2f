//! Error types for catalog lookups

/// Result type alias for catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Errors that can occur while resolving or listing recitations
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// No reciter in the catalog has the requested track
    #[error("track {track} not found in any collection (requested from '{reciter}')")]
    TrackNotFound { track: u16, reciter: String },

    /// IO error while scanning the catalog root
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
