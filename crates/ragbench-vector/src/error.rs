//! Error types for ragbench-vector.

use thiserror::Error;

/// Result type for ragbench-vector operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in ragbench-vector operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A vector does not have the index's fixed dimension.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension fixed by the index.
        expected: usize,
        /// Dimension of the offending vector.
        actual: usize,
    },

    /// Invalid vector (empty, contains NaN or Inf).
    #[error("Invalid vector: {0}")]
    InvalidVector(String),

    /// Persisted index failed its integrity check.
    #[error("Corrupt index file: {0}")]
    CorruptIndex(String),

    /// Invalid index configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
