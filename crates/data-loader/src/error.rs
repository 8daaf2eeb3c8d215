//! Error types for the data-loader crate.
//!
//! The taxonomy is shared by every layer of the engine:
//! - `NotFound` for unknown users, movies and embeddings
//! - `InvalidInput` for out-of-range ratings and malformed identifiers
//! - `DataInconsistency` for derived data that is missing or malformed
//!
//! Snapshot I/O and JSON failures are folded in through `#[from]`.

use thiserror::Error;

/// Errors that can occur while querying, mutating or loading the dataset
#[derive(Error, Debug)]
pub enum DataError {
    /// Referenced entity doesn't exist (unknown user, movie, embedding)
    #[error("{entity} {id} not found")]
    NotFound { entity: String, id: u32 },

    /// Caller supplied a value outside the accepted domain
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Derived or denormalized data disagrees with the source rows.
    ///
    /// Recompute and scoring paths log this and degrade to zero instead of
    /// returning it; snapshot validation surfaces it.
    #[error("Data inconsistency in {entity} {id}: {reason}")]
    DataInconsistency {
        entity: String,
        id: u32,
        reason: String,
    },

    /// I/O error occurred while reading or writing a snapshot
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot document couldn't be (de)serialized
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),
}

impl DataError {
    pub fn not_found(entity: &str, id: u32) -> Self {
        DataError::NotFound {
            entity: entity.to_string(),
            id,
        }
    }

    pub fn inconsistency(entity: &str, id: u32, reason: impl Into<String>) -> Self {
        DataError::DataInconsistency {
            entity: entity.to_string(),
            id,
            reason: reason.into(),
        }
    }

    /// True for the `NotFound` variant
    pub fn is_not_found(&self) -> bool {
        matches!(self, DataError::NotFound { .. })
    }
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, DataError>;
