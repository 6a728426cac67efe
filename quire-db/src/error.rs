//! Error types for the database layer.

use thiserror::Error;

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Errors that can occur talking to SQLite.
#[derive(Debug, Error)]
pub enum DbError {
    /// Error reported by SQLite.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A table or column name that is not a plain identifier.
    #[error("invalid SQL identifier: {0:?}")]
    InvalidIdentifier(String),

    /// A previous holder of the connection panicked.
    #[error("database connection lock poisoned")]
    LockPoisoned,

    /// IO error (file system).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
