//! Database error types.
//!
//! Provides comprehensive error handling for database operations using `thiserror`.

use crate::scrape_jobs::JobState;
use thiserror::Error;

/// Database-specific errors.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to open or create database connection.
    #[error("failed to open database: {0}")]
    Open(String),

    /// Migration execution failed.
    #[error("migration failed: {0}")]
    Migration(String),

    /// Database record with provided identifier not found.
    #[error("{0}")]
    NotFoundWithMessage(String),

    /// A job state change that the lifecycle does not allow.
    #[error("invalid transition for job {job_id}: {from} -> {to}")]
    InvalidTransition {
        /// Job whose row was left untouched
        job_id: String,
        /// State the row was actually in
        from: JobState,
        /// Requested state
        to: JobState,
    },

    /// Failed to decode database value.
    #[error("decode error: {0}")]
    Decode(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Underlying `SQLx` error.
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// I/O error during database operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for DatabaseError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

/// Result type alias for database operations.
pub type Result<T> = std::result::Result<T, DatabaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_display() {
        let err = DatabaseError::InvalidTransition {
            job_id: "job-1".to_string(),
            from: JobState::Succeeded,
            to: JobState::Running,
        };
        assert_eq!(
            err.to_string(),
            "invalid transition for job job-1: SUCCEEDED -> RUNNING"
        );
    }
}
