//! Entries: one record of a section, keyed by field id.
//!
//! A new entry is created in two phases. [`Entry::set_data_from_post`] first
//! inserts a shell row to obtain an id, then runs every field over the posted
//! payload. If any field rejects its input the shell row is deleted again,
//! so a rejected submission never leaves a half-created entry behind.
//!
//! ```text
//! New ──assign id──▶ Shell ──all fields ok──▶ Validated ──commit──▶ Committed
//!                      │
//!                      └──any field error──▶ Rejected (shell row deleted)
//! ```
//!
//! A new entry whose commit fails is rejected the same way.

use crate::entry_manager::{delete_core_rows, insert_core_row, EntryManager};
use crate::error::{StorageError, StorageResult};
use crate::field_store::SqlFieldStore;
use quire_model::{FieldContext, FieldErrors, Record, Section, SectionAssociation};
use quire_types::{AuthorId, DatePair, EntryId, FieldData, FieldId, SectionId};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Where an entry is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryState {
    /// Not yet persisted.
    #[default]
    New,
    /// Shell row inserted; field data not yet accepted.
    Shell,
    /// Every field accepted the posted data.
    Validated,
    /// Core row and field data are persisted.
    Committed,
    /// A field rejected the posted data and the shell row was removed.
    Rejected,
}

/// Associated entry counts, by child section then child field.
pub type AssociatedCounts = BTreeMap<SectionId, BTreeMap<FieldId, usize>>;

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub(crate) id: Option<EntryId>,
    pub(crate) section_id: SectionId,
    pub(crate) author_id: Option<AuthorId>,
    pub(crate) modification_author_id: Option<AuthorId>,
    pub(crate) creation_date: Option<DatePair>,
    pub(crate) modification_date: Option<DatePair>,
    pub(crate) data: BTreeMap<FieldId, FieldData>,
    pub(crate) state: EntryState,
}

impl Entry {
    pub fn new(section_id: SectionId) -> Self {
        Self {
            id: None,
            section_id,
            author_id: None,
            modification_author_id: None,
            creation_date: None,
            modification_date: None,
            data: BTreeMap::new(),
            state: EntryState::New,
        }
    }

    pub fn id(&self) -> Option<EntryId> {
        self.id
    }

    pub fn section_id(&self) -> SectionId {
        self.section_id
    }

    pub fn state(&self) -> EntryState {
        self.state
    }

    pub fn author_id(&self) -> Option<AuthorId> {
        self.author_id
    }

    pub fn set_author_id(&mut self, author_id: AuthorId) {
        self.author_id = Some(author_id);
    }

    pub fn modification_author_id(&self) -> Option<AuthorId> {
        self.modification_author_id
    }

    pub fn set_modification_author_id(&mut self, author_id: AuthorId) {
        self.modification_author_id = Some(author_id);
    }

    pub fn creation_date(&self) -> Option<DatePair> {
        self.creation_date
    }

    pub fn set_creation_date(&mut self, date: DatePair) {
        self.creation_date = Some(date);
    }

    pub fn modification_date(&self) -> Option<DatePair> {
        self.modification_date
    }

    pub fn set_modification_date(&mut self, date: DatePair) {
        self.modification_date = Some(date);
    }

    /// The whole data map.
    pub fn data(&self) -> &BTreeMap<FieldId, FieldData> {
        &self.data
    }

    /// Data of one field.
    pub fn get_data(&self, field_id: FieldId) -> Option<&FieldData> {
        self.data.get(&field_id)
    }

    pub fn set_data(&mut self, field_id: FieldId, data: FieldData) {
        self.data.insert(field_id, data);
    }

    /// Inserts the shell row, if the entry has none yet, and returns its id.
    pub fn assign_entry_id(&mut self, entries: &EntryManager<'_>) -> StorageResult<EntryId> {
        if let Some(id) = self.id {
            return Ok(id);
        }
        let default_author = entries.config().entries.default_author();
        let id = entries
            .store()
            .database()
            .with_conn(|conn| insert_core_row(conn, self, default_author))?;
        self.id = Some(id);
        self.state = EntryState::Shell;
        debug!(entry_id = %id, section_id = %self.section_id, "Assigned entry id");
        Ok(id)
    }

    /// Runs every field's checks over a payload without changing anything.
    ///
    /// Payload keys are field element names. Missing keys are checked
    /// against the field's default input unless `ignore_missing` is set.
    pub fn check_post_data(
        &self,
        entries: &EntryManager<'_>,
        section: &Section,
        payload: &Map<String, Value>,
        ignore_missing: bool,
    ) -> StorageResult<FieldErrors> {
        entries.store().database().with_conn(|conn| {
            let store = SqlFieldStore::new(conn);
            let ctx = self.context(entries, &store);
            let mut errors = FieldErrors::new();
            for field in section.fields() {
                let Some(field_id) = field.id() else { continue };
                let raw = match payload.get(field.element_name()) {
                    Some(raw) => raw.clone(),
                    None if ignore_missing => continue,
                    None => field.default_raw_input(&ctx),
                };
                if let Err(err) = field.check_post_field_data(&raw, &ctx) {
                    errors.insert(field_id, err);
                }
            }
            Ok::<_, StorageError>(errors)
        })
    }

    /// Normalizes a posted payload into the data map.
    ///
    /// A new entry first gets its shell row. Every field is processed and
    /// every failure collected; if any field fails on a new entry the shell
    /// row is deleted and the entry is [`EntryState::Rejected`].
    pub fn set_data_from_post(
        &mut self,
        entries: &EntryManager<'_>,
        section: &Section,
        payload: &Map<String, Value>,
        ignore_missing: bool,
    ) -> StorageResult<FieldErrors> {
        let is_new = self.id.is_none();
        if is_new {
            self.assign_entry_id(entries)?;
        }
        entries.store().database().with_conn(|conn| {
            let store = SqlFieldStore::new(conn);
            let ctx = self.context(entries, &store);
            let mut errors = FieldErrors::new();
            let mut processed = Vec::new();
            for field in section.fields() {
                let Some(field_id) = field.id() else { continue };
                let raw = match payload.get(field.element_name()) {
                    Some(raw) => raw.clone(),
                    None if ignore_missing => continue,
                    None => field.default_raw_input(&ctx),
                };
                match field.process_raw_field_data(&raw, &ctx) {
                    Ok(data) => processed.push((field_id, data)),
                    Err(err) => {
                        errors.insert(field_id, err);
                    }
                }
            }
            self.data.extend(processed);

            if errors.is_empty() {
                if self.state != EntryState::Committed {
                    self.state = EntryState::Validated;
                }
            } else if is_new {
                if let Some(id) = self.id.take() {
                    delete_core_rows(conn, &[id])?;
                    info!(entry_id = %id, errors = errors.len(), "Rejected new entry, removed shell row");
                }
                self.state = EntryState::Rejected;
            }
            Ok::<_, StorageError>(errors)
        })
    }

    /// Fills in default data for fields missing from the map and stamps
    /// authors and dates.
    pub fn find_default_data(&mut self, entries: &EntryManager<'_>, section: &Section) -> StorageResult<()> {
        let default_author = entries.config().entries.default_author();
        entries.store().database().with_conn(|conn| {
            let store = SqlFieldStore::new(conn);
            let ctx = self.context(entries, &store);
            let mut defaults = Vec::new();
            for field in section.fields() {
                let Some(field_id) = field.id() else { continue };
                if self.data.contains_key(&field_id) {
                    continue;
                }
                let raw = field.default_raw_input(&ctx);
                defaults.push((field_id, field.process_raw_field_data(&raw, &ctx).unwrap_or_default()));
            }
            self.data.extend(defaults);
            Ok::<_, StorageError>(())
        })?;

        let author = *self.author_id.get_or_insert(default_author);
        if self.modification_author_id.is_none() {
            self.modification_author_id = Some(author);
        }
        let now = DatePair::now();
        self.creation_date.get_or_insert(now);
        self.modification_date = Some(now);
        Ok(())
    }

    /// Fills defaults, then adds or edits the entry depending on whether it
    /// has an id.
    ///
    /// When a new entry fails to commit, its shell row is deleted and the
    /// entry becomes [`EntryState::Rejected`].
    pub fn commit(&mut self, entries: &EntryManager<'_>, section: &Section) -> StorageResult<EntryId> {
        let result = self.find_default_data(entries, section).and_then(|()| match self.id {
            Some(id) => entries.edit(self).map(|()| id),
            None => entries.add(self),
        });
        match result {
            Ok(id) => {
                self.state = EntryState::Committed;
                Ok(id)
            }
            Err(err) => {
                if matches!(self.state, EntryState::Shell | EntryState::Validated) {
                    self.discard_shell(entries);
                }
                Err(err)
            }
        }
    }

    fn discard_shell(&mut self, entries: &EntryManager<'_>) {
        if let Some(id) = self.id.take() {
            match entries
                .store()
                .database()
                .with_conn(|conn| delete_core_rows(conn, &[id]))
            {
                Ok(_) => info!(entry_id = %id, "Commit failed, removed shell row"),
                Err(err) => warn!(entry_id = %id, error = %err, "Commit failed, shell row left behind"),
            }
        }
        self.state = EntryState::Rejected;
    }

    /// Counts, for each association where this entry's section is the
    /// parent, how many child entries link to this entry.
    ///
    /// Uses the given associations, or every child association of the
    /// section when `None`.
    pub fn fetch_all_associated_entry_counts(
        &self,
        entries: &EntryManager<'_>,
        associations: Option<&[SectionAssociation]>,
    ) -> StorageResult<AssociatedCounts> {
        let fetched;
        let associations = match associations {
            Some(list) => list,
            None => {
                fetched = entries
                    .store()
                    .sections()
                    .fetch_child_associations(self.section_id, false)?;
                &fetched
            }
        };
        let ctx = FieldContext::new(entries).with_entry(self.id);
        let empty = FieldData::new();
        let mut counts = AssociatedCounts::new();
        for association in associations {
            let Some(field) = entries.store().fields().fetch(association.child_section_field_id)? else {
                debug!(field_id = %association.child_section_field_id, "Associated field missing");
                continue;
            };
            let parent_data = association
                .parent_section_field_id
                .and_then(|id| self.data.get(&id))
                .unwrap_or(&empty);
            let count = field.fetch_associated_entry_count(parent_data, &ctx)?;
            counts
                .entry(association.child_section_id)
                .or_default()
                .insert(association.child_section_field_id, count);
        }
        Ok(counts)
    }

    fn context<'a>(&self, entries: &EntryManager<'_>, store: &'a SqlFieldStore<'a>) -> FieldContext<'a> {
        FieldContext::new(store)
            .with_entry(self.id)
            .with_author(Some(self.author_id.unwrap_or_else(|| entries.config().entries.default_author())))
    }
}

impl Record for Entry {
    fn record_id(&self) -> Option<EntryId> {
        self.id
    }

    fn field_data(&self, field_id: FieldId) -> Option<&FieldData> {
        self.data.get(&field_id)
    }
}
