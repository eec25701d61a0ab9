// ⚠️ Error types for the directory core
//
// Every failure here is fatal to exactly one unit of work (one parcel record).
// The batch driver catches them per record; nothing in this enum aborts a run.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Caller broke an input contract (blank owner name, missing parcel id)
    #[error("Validation error: {0}")]
    Validation(String),

    /// SQLite failure; any open transaction has been rolled back
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// JSON columns (boundary geometry, event payloads)
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A resident's move-out is final; a second transition is refused
    #[error("Resident already moved out: {0}")]
    AlreadyMovedOut(String),
}

impl Error {
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    /// Messages of every underlying cause, outermost first
    pub fn causes(&self) -> Vec<String> {
        let mut causes = Vec::new();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }
        causes
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_causes_follow_source_chain() {
        let err = Error::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk full",
        ));
        assert_eq!(err.causes(), vec!["disk full".to_string()]);

        let err = Error::Database(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            Some("database is locked".to_string()),
        ));
        assert!(!err.causes().is_empty());
    }

    #[test]
    fn test_own_errors_have_no_causes() {
        assert!(Error::Validation("blank owner".to_string()).causes().is_empty());
    }
}
