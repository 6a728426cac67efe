//! Error types for the storage layer.

use quire_db::DbError;
use quire_model::{ConfigError, SectionErrors, StoreError};
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in storage operations.
///
/// Field-level validation never surfaces here; it is reported per field as
/// [`FieldErrors`](quire_model::FieldErrors). Everything in this enum aborts
/// the operation that raised it.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A table or column name that is not a plain identifier.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// A section, field or entry that does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// Transaction or connection failure.
    #[error(transparent)]
    Database(DbError),

    /// A field could not reach its persisted data.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A persisted field definition could not be rebuilt.
    #[error("field configuration error: {0}")]
    Field(#[from] ConfigError),

    /// A section (or one of its fields) failed validation.
    #[error("section failed validation")]
    InvalidSection(SectionErrors),

    /// Engine configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),

    /// A bulk delete failed after earlier chunks were committed.
    #[error("deleted {deleted} entries before failing: {source}")]
    PartialDeletion {
        deleted: usize,
        #[source]
        source: Box<StorageError>,
    },
}

impl From<DbError> for StorageError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::InvalidIdentifier(name) => Self::InvalidIdentifier(name),
            other => Self::Database(other),
        }
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(DbError::Sqlite(err))
    }
}

impl StorageError {
    pub(crate) fn not_found(what: impl std::fmt::Display) -> Self {
        Self::NotFound(what.to_string())
    }
}
