//! The storage seam field variants see.
//!
//! Variants never hold a connection. Everything they need from persisted
//! data (uniqueness lookups, distinct values for options, cleanup) goes
//! through [`FieldDataStore`], which the storage crate implements over the
//! live connection and [`DetachedStore`] implements as "nothing stored".

use chrono::{DateTime, Utc};
use quire_types::{AuthorId, EntryId, FieldId, FieldValue};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

/// Failure reaching persisted field data.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("field storage error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Access to persisted per-field data.
pub trait FieldDataStore {
    /// Deletes every row the field stores for the given entries.
    fn delete_entry_data(&self, field_id: FieldId, entry_ids: &[EntryId]) -> StoreResult<usize>;

    /// Counts distinct entries having a row whose `column` equals one of
    /// `values`, optionally ignoring one entry.
    fn count_entries_matching(
        &self,
        field_id: FieldId,
        column: &str,
        values: &[FieldValue],
        exclude: Option<EntryId>,
    ) -> StoreResult<usize>;

    /// Distinct non-empty values of a column, in ascending order.
    fn distinct_values(&self, field_id: FieldId, column: &str) -> StoreResult<Vec<String>>;

    /// Removes a file owned by entry data being deleted. Stores working
    /// inside a transaction hold the removal until it commits.
    fn remove_file(&self, path: &Path) -> StoreResult<()> {
        remove_file_now(path);
        Ok(())
    }
}

/// Unlinks a file. A missing file is not an error; other failures are
/// logged and ignored, since the rows referencing it are already gone.
pub fn remove_file_now(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "Removed file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove file"),
    }
}

/// A store with no data in it, for fields that are not yet saved.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedStore;

impl FieldDataStore for DetachedStore {
    fn delete_entry_data(&self, _field_id: FieldId, _entry_ids: &[EntryId]) -> StoreResult<usize> {
        Ok(0)
    }

    fn count_entries_matching(
        &self,
        _field_id: FieldId,
        _column: &str,
        _values: &[FieldValue],
        _exclude: Option<EntryId>,
    ) -> StoreResult<usize> {
        Ok(0)
    }

    fn distinct_values(&self, _field_id: FieldId, _column: &str) -> StoreResult<Vec<String>> {
        Ok(Vec::new())
    }
}

static DETACHED: DetachedStore = DetachedStore;

/// Everything a field check or transform may consult besides its own input.
#[derive(Clone, Copy)]
pub struct FieldContext<'a> {
    pub store: &'a dyn FieldDataStore,
    /// Entry being edited, if it already has an id.
    pub entry_id: Option<EntryId>,
    /// Author performing the submission.
    pub author_id: Option<AuthorId>,
    /// Reference instant for relative values such as "now".
    pub now: DateTime<Utc>,
}

impl<'a> FieldContext<'a> {
    pub fn new(store: &'a dyn FieldDataStore) -> Self {
        Self {
            store,
            entry_id: None,
            author_id: None,
            now: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_entry(mut self, entry_id: Option<EntryId>) -> Self {
        self.entry_id = entry_id;
        self
    }

    #[must_use]
    pub fn with_author(mut self, author_id: Option<AuthorId>) -> Self {
        self.author_id = author_id;
        self
    }

    #[must_use]
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }
}

impl FieldContext<'static> {
    /// Context backed by [`DetachedStore`].
    pub fn detached() -> Self {
        Self::new(&DETACHED)
    }
}

impl std::fmt::Debug for FieldContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldContext")
            .field("entry_id", &self.entry_id)
            .field("author_id", &self.author_id)
            .field("now", &self.now)
            .finish_non_exhaustive()
    }
}
