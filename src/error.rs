//! Error types for the cutting optimizer.

use thiserror::Error;

/// Result type alias for optimizer operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by [`crate::solver::optimize`].
///
/// Pieces longer than every stock length are not errors; they are upsized and
/// reported as [`crate::types::Warning::UnfittablePiece`].
#[derive(Debug, Error)]
pub enum Error {
    /// A demand row is malformed or out of range.
    #[error("invalid demand row {row} (profile '{profile_code}'): {message}")]
    Validation {
        profile_code: String,
        row: usize,
        message: String,
    },

    /// The run configuration cannot be used.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The exact solver's search space is larger than the configured limits.
    #[error("exact solver capacity exceeded for profile '{profile_code}': {message}")]
    CapacityExceeded {
        profile_code: String,
        message: String,
    },
}

impl Error {
    /// Whether the caller can recover by switching to a heuristic objective.
    pub fn is_capacity_exceeded(&self) -> bool {
        matches!(self, Error::CapacityExceeded { .. })
    }
}
