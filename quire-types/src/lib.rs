//! Core type definitions for Quire.
//!
//! This crate defines the leaf types every other layer depends on:
//! - Section, Field, Entry and Author identifiers
//! - Local/UTC timestamp pairs carried by entries
//! - The normalized per-field data representation ([`FieldData`])
//! - Storage schema descriptors that fields declare and the database layer provisions
//!
//! Nothing here knows about a particular field variant or about SQL.

mod data;
mod dates;
mod handle;
mod ids;
mod schema;

pub use data::{DataColumn, FieldData, FieldRow, FieldValue};
pub use dates::{DatePair, DATE_FORMAT};
pub use handle::{create_handle, MAX_HANDLE_LENGTH};
pub use ids::{AuthorId, EntryId, FieldId, SectionId};
pub use schema::{ColumnSpec, ColumnType, KeySpec, StorageSchema};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}
