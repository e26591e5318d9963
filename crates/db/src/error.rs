//! Store-level error type.
//!
//! Repositories return [`StoreError`] so callers can tell a lost
//! compare-and-set race (`Conflict`) apart from a missing row
//! (`NotFound`) or an infrastructure failure (`Database`).

use voicereel_core::error::CoreError;

use crate::models::status::JobStatus;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// The stored status did not match the expected status of a
    /// compare-and-set transition. Carries what the row held instead.
    #[error("Job {id} is in status {actual:?}, expected {expected:?}")]
    Conflict {
        id: String,
        expected: JobStatus,
        actual: Option<JobStatus>,
    },

    /// The requested edge does not exist in the state machine.
    #[error("Invalid transition {from:?} -> {to:?}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => CoreError::NotFound { entity, id },
            StoreError::Conflict { .. } => CoreError::Conflict(err.to_string()),
            StoreError::InvalidTransition { .. } => CoreError::Conflict(err.to_string()),
            StoreError::Database(e) => CoreError::Internal(e.to_string()),
        }
    }
}
