//! Error types for textmerge.
//!
//! A single error enum covers every failure the workspace can surface:
//! configuration, I/O, embedding providers, patch validation and conflict
//! lookups. Malformed *text* is never an error; only contract violations are.

use thiserror::Error;

/// Unified error type for textmerge.
///
/// All fallible functions return `Result<T, AppError>`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Embedding provider failures (unreachable service, bad response)
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Two vectors of different length were compared
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Patch validation errors
    #[error("Invalid patch: {0}")]
    Patch(String),

    /// Unknown conflict id passed to a resolution call
    #[error("Conflict not found: {0}")]
    ConflictNotFound(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
