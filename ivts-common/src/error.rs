//! Common error types for IVTS

use thiserror::Error;

/// Common result type for IVTS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across IVTS services
#[derive(Error, Debug)]
pub enum Error {
    /// Interview (or other resource) does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Write attempted on an interview that is completed or processed
    #[error("Interview {interview_id} already finalized ({status})")]
    AlreadyFinalized { interview_id: String, status: String },

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Backing store could not be reached or rejected the statement (wraps sqlx::Error)
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] sqlx::Error),

    /// Archival document could not be produced
    #[error("Render failure: {0}")]
    RenderFailure(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the caller may retry the same request unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::StorageUnavailable(_) | Error::RenderFailure(_))
    }

    /// True for SQLite lock contention (`database is locked`, `SQLITE_BUSY`)
    pub fn is_lock_contention(&self) -> bool {
        match self {
            Error::StorageUnavailable(db_err) => {
                let msg = db_err.to_string();
                msg.contains("database is locked") || msg.contains("database is busy")
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(Error::StorageUnavailable(sqlx::Error::PoolTimedOut).is_retryable());
        assert!(Error::RenderFailure("no output".into()).is_retryable());

        assert!(!Error::NotFound("42".into()).is_retryable());
        assert!(!Error::InvalidInput("bad role".into()).is_retryable());
        assert!(!Error::AlreadyFinalized {
            interview_id: "42".into(),
            status: "completed".into(),
        }
        .is_retryable());
    }

    #[test]
    fn test_pool_timeout_is_not_lock_contention() {
        assert!(!Error::StorageUnavailable(sqlx::Error::PoolTimedOut).is_lock_contention());
        assert!(!Error::Internal("database is locked".into()).is_lock_contention());
    }

    #[test]
    fn test_already_finalized_message() {
        let err = Error::AlreadyFinalized {
            interview_id: "7".into(),
            status: "processed".into(),
        };
        assert_eq!(err.to_string(), "Interview 7 already finalized (processed)");
    }
}
