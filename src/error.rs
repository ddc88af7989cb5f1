//! Error types for the query engine and the data loader.

use thiserror::Error;

/// Errors surfaced by [`crate::engine::QueryEngine`] operations.
///
/// An empty result is never an error; these only cover bad input, lookup
/// misses and a missing snapshot.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed or out-of-range coordinate/numeric parameter.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A named region or ranked quarter does not exist in the catalog.
    #[error("Not found: {0}")]
    NotFound(String),

    /// No snapshot has been loaded yet, or a load failed closed.
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors raised while building a snapshot from a [`crate::loader::DataSource`].
#[derive(Error, Debug)]
pub enum LoadError {
    /// A whole input could not be read or parsed.
    #[error("Source error: {0:#}")]
    Source(#[from] anyhow::Error),

    /// Too many records of one kind were rejected.
    #[error(
        "Rejected {rejected} of {total} {kind} records (ratio {ratio:.3} exceeds threshold {threshold})"
    )]
    TooManyRejected {
        kind: &'static str,
        rejected: usize,
        total: usize,
        ratio: f64,
        threshold: f64,
    },
}

impl From<LoadError> for EngineError {
    fn from(err: LoadError) -> Self {
        EngineError::DataUnavailable(err.to_string())
    }
}

impl EngineError {
    /// Short machine-readable kind, for callers that map errors to status codes.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::InvalidInput(_) => "invalid_input",
            EngineError::NotFound(_) => "not_found",
            EngineError::DataUnavailable(_) => "data_unavailable",
        }
    }
}
