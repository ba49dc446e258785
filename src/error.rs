//! Error handling for the detection pipeline

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad stream config or filter input, rejected before any state change
    #[error("Validation error: {0}")]
    Validation(String),

    /// Stream id already registered
    #[error("Duplicate stream: {0}")]
    DuplicateStream(String),

    /// Unknown stream or alert
    #[error("Not found: {0}")]
    NotFound(String),

    /// Illegal lifecycle transition
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Source cannot be opened or dropped mid-stream (transient, retried)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Frame acquisition or inference failure (transient, retried)
    #[error("Read error: {0}")]
    Read(String),

    /// Partition write/read failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
