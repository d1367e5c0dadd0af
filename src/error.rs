//! Error types for cellpairs.

use thiserror::Error;

pub use crate::persistence::error::PersistenceError;

/// Errors surfaced by similar-pair computations.
///
/// Out-of-range ids passed to the store's insertion methods are programming
/// errors and panic instead of producing one of these.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid parameter value (k = 0, bad slice lengths, bad subset, ...).
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A run needs at least two cells.
    #[error("at least 2 cells are needed to find similar pairs, got {count}")]
    TooFewCells { count: usize },

    /// Two artifacts that must share gene and cell subsets do not.
    #[error("subset mismatch: {0}")]
    SubsetMismatch(String),

    /// The run was cancelled or hit its deadline. The store it was writing
    /// into is partially populated and must not be used.
    #[error("run incomplete: {processed} of {total} cells processed before cancellation")]
    Incomplete { processed: usize, total: usize },

    /// Building the worker thread pool failed.
    #[error("thread pool: {0}")]
    ThreadPool(String),

    /// Persistence failure (I/O, format, name conflicts, missing artifacts).
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl Error {
    /// True if this is a missing-artifact error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Persistence(PersistenceError::NotFound(_)))
    }

    /// True if this is a name conflict on creation.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Error::Persistence(PersistenceError::AlreadyExists(_)))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Persistence(PersistenceError::Io(e))
    }
}

impl From<rayon::ThreadPoolBuildError> for Error {
    fn from(e: rayon::ThreadPoolBuildError) -> Self {
        Error::ThreadPool(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
