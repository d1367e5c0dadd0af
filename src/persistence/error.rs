//! Error types for persistence operations.

use thiserror::Error;

/// Errors that can occur while storing, opening or removing named artifacts.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// I/O error (file operations, disk I/O)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Format error (invalid magic bytes, version mismatch, truncated file)
    #[error("format error: {0}")]
    Format(String),

    /// Serialization error (serde_json)
    #[error("serialization error: {0}")]
    Serialization(String),

    /// An artifact with this name already exists
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Artifact names are restricted to a safe file-name alphabet
    #[error("invalid artifact name: {0}")]
    InvalidName(String),

    /// No artifact with this name
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid state (e.g. saving a store that was never completed)
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl From<serde_json::Error> for PersistenceError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(format!("serde_json error: {}", e))
    }
}

/// Result type for persistence operations.
pub type PersistenceResult<T> = Result<T, PersistenceError>;
