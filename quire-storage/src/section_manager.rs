//! Persistence of sections and section associations.

use crate::error::{StorageError, StorageResult};
use crate::field_manager::{insert_field, load_section_fields, remove_field, update_field};
use crate::schema::{yes_no, ASSOCIATIONS, ENTRIES, FIELDS, SECTIONS};
use crate::ContentStore;
use quire_model::{parse_bool, FieldRegistry, Section, SectionAssociation};
use quire_types::{EntryId, FieldId, SectionId};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashSet;
use tracing::info;

const SECTION_COLUMNS: &str = "id, name, handle, sortorder, hidden, filter, navigation_group";
const ASSOCIATION_COLUMNS: &str = "id, parent_section_id, parent_section_field_id, child_section_id, \
     child_section_field_id, hide_association, interface, editor";

/// Adds, edits, removes and loads sections together with their fields.
#[derive(Clone, Copy)]
pub struct SectionManager<'s> {
    store: &'s ContentStore,
}

impl<'s> SectionManager<'s> {
    pub(crate) fn new(store: &'s ContentStore) -> Self {
        Self { store }
    }

    /// Validates and saves a new section and every field it holds.
    ///
    /// Validation failures, including a handle another section already uses,
    /// come back as [`StorageError::InvalidSection`] with nothing written.
    pub fn add(&self, section: &mut Section) -> StorageResult<SectionId> {
        if !section.validate() {
            return Err(StorageError::InvalidSection(section.errors().clone()));
        }
        self.store.database().atomic(|conn| {
            ensure_unique_handle(conn, section, None)?;
            if section.sortorder == 0 {
                section.sortorder = conn.query_row(
                    &format!("SELECT COALESCE(MAX(sortorder), 0) + 1 FROM {SECTIONS}"),
                    [],
                    |row| row.get(0),
                )?;
            }
            conn.execute(
                &format!(
                    "INSERT INTO {SECTIONS} (name, handle, sortorder, hidden, filter, navigation_group)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
                ),
                params![
                    section.name,
                    section.handle,
                    section.sortorder,
                    yes_no(section.hidden),
                    yes_no(section.filter),
                    section.navigation_group,
                ],
            )?;
            let id = SectionId::new(conn.last_insert_rowid());
            section.set_id(id);
            for field in section.fields_mut() {
                insert_field(conn, field)?;
            }
            info!(section_id = %id, handle = %section.handle, "Added section");
            Ok(id)
        })
    }

    /// Validates and saves changes to a section. Fields without an id are
    /// added, saved fields are updated and fields no longer in the section
    /// are deleted along with their data.
    pub fn edit(&self, section: &mut Section) -> StorageResult<()> {
        let id = section
            .id
            .ok_or_else(|| StorageError::not_found(format!("section '{}'", section.handle)))?;
        if !section.validate() {
            return Err(StorageError::InvalidSection(section.errors().clone()));
        }
        let registry = self.store.registry();
        self.store.database().atomic(|conn| {
            ensure_unique_handle(conn, section, Some(id))?;
            let updated = conn.execute(
                &format!(
                    "UPDATE {SECTIONS} SET name = ?1, handle = ?2, sortorder = ?3, hidden = ?4,
                     filter = ?5, navigation_group = ?6 WHERE id = ?7"
                ),
                params![
                    section.name,
                    section.handle,
                    section.sortorder,
                    yes_no(section.hidden),
                    yes_no(section.filter),
                    section.navigation_group,
                    id.get(),
                ],
            )?;
            if updated == 0 {
                return Err(StorageError::not_found(format!("section {id}")));
            }

            let stored = field_ids(conn, id)?;
            section.set_id(id);
            let mut kept = HashSet::new();
            for field in section.fields_mut() {
                match field.id() {
                    Some(field_id) if stored.contains(&field_id) => {
                        update_field(conn, field)?;
                        kept.insert(field_id);
                    }
                    _ => {
                        kept.insert(insert_field(conn, field)?);
                    }
                }
            }
            for stale in stored.difference(&kept) {
                remove_field(conn, registry, *stale)?;
            }
            info!(section_id = %id, "Edited section");
            Ok(())
        })
    }

    /// Deletes a section: its entries (chunked), its fields and their
    /// tables, and every association it takes part in.
    pub fn delete(&self, id: SectionId) -> StorageResult<()> {
        let entry_ids: Vec<EntryId> = self.store.database().with_conn(|conn| {
            if load_section_row(conn, id)?.is_none() {
                return Err(StorageError::not_found(format!("section {id}")));
            }
            let mut stmt = conn.prepare(&format!("SELECT id FROM {ENTRIES} WHERE section_id = ?1"))?;
            let ids = stmt
                .query_map(params![id.get()], |row| row.get(0).map(EntryId::new))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ids)
        })?;
        self.store.entries().delete(&entry_ids, Some(id))?;

        let registry = self.store.registry();
        self.store.database().atomic(|conn| {
            for field_id in field_ids(conn, id)? {
                remove_field(conn, registry, field_id)?;
            }
            conn.execute(
                &format!("DELETE FROM {ASSOCIATIONS} WHERE parent_section_id = ?1 OR child_section_id = ?1"),
                params![id.get()],
            )?;
            conn.execute(&format!("DELETE FROM {SECTIONS} WHERE id = ?1"), params![id.get()])?;
            info!(section_id = %id, entries = entry_ids.len(), "Deleted section");
            Ok(())
        })
    }

    pub fn fetch(&self, id: SectionId) -> StorageResult<Option<Section>> {
        let registry = self.store.registry();
        self.store.database().with_conn(|conn| load_section(conn, registry, id))
    }

    pub fn fetch_by_handle(&self, handle: &str) -> StorageResult<Option<Section>> {
        let registry = self.store.registry();
        self.store.database().with_conn(|conn| {
            let id: Option<i64> = conn
                .query_row(
                    &format!("SELECT id FROM {SECTIONS} WHERE handle = ?1"),
                    params![handle],
                    |row| row.get(0),
                )
                .optional()?;
            match id {
                Some(id) => load_section(conn, registry, SectionId::new(id)),
                None => Ok(None),
            }
        })
    }

    /// Every section in sort order.
    pub fn fetch_all(&self) -> StorageResult<Vec<Section>> {
        let registry = self.store.registry();
        self.store.database().with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT id FROM {SECTIONS} ORDER BY sortorder, id"))?;
            let ids = stmt
                .query_map([], |row| row.get(0).map(SectionId::new))?
                .collect::<Result<Vec<_>, _>>()?;
            let mut sections = Vec::with_capacity(ids.len());
            for id in ids {
                sections.extend(load_section(conn, registry, id)?);
            }
            Ok(sections)
        })
    }

    /// Records an association, returning its id.
    pub fn create_association(&self, association: &SectionAssociation) -> StorageResult<i64> {
        self.store
            .database()
            .atomic(|conn| insert_association(conn, association))
    }

    /// Removes the association a child field created. Returns how many
    /// records went.
    pub fn remove_association(&self, child_field_id: FieldId) -> StorageResult<usize> {
        self.store
            .database()
            .with_conn(|conn| remove_child_association(conn, child_field_id))
    }

    /// Associations where the section is the parent.
    pub fn fetch_child_associations(
        &self,
        section_id: SectionId,
        respect_visibility: bool,
    ) -> StorageResult<Vec<SectionAssociation>> {
        self.store.database().with_conn(|conn| {
            fetch_associations(conn, "parent_section_id", section_id, respect_visibility)
        })
    }

    /// Associations where the section is the child.
    pub fn fetch_parent_associations(
        &self,
        section_id: SectionId,
        respect_visibility: bool,
    ) -> StorageResult<Vec<SectionAssociation>> {
        self.store.database().with_conn(|conn| {
            fetch_associations(conn, "child_section_id", section_id, respect_visibility)
        })
    }
}

fn ensure_unique_handle(conn: &Connection, section: &Section, own: Option<SectionId>) -> StorageResult<()> {
    let existing: Option<i64> = conn
        .query_row(
            &format!("SELECT id FROM {SECTIONS} WHERE handle = ?1"),
            params![section.handle],
            |row| row.get(0),
        )
        .optional()?;
    match existing {
        Some(other) if own.is_none_or(|id| id.get() != other) => {
            let mut errors = section.errors().clone();
            errors.section.insert(
                "handle",
                format!("A Section with the handle '{}' already exists.", section.handle),
            );
            Err(StorageError::InvalidSection(errors))
        }
        _ => Ok(()),
    }
}

fn field_ids(conn: &Connection, section_id: SectionId) -> StorageResult<HashSet<FieldId>> {
    let mut stmt = conn.prepare(&format!("SELECT id FROM {FIELDS} WHERE parent_section = ?1"))?;
    let ids = stmt
        .query_map(params![section_id.get()], |row| row.get(0).map(FieldId::new))?
        .collect::<Result<HashSet<_>, _>>()?;
    Ok(ids)
}

struct SectionRow {
    name: String,
    handle: String,
    sortorder: i64,
    hidden: String,
    filter: String,
    navigation_group: String,
}

fn load_section_row(conn: &Connection, id: SectionId) -> StorageResult<Option<SectionRow>> {
    Ok(conn
        .query_row(
            &format!("SELECT {SECTION_COLUMNS} FROM {SECTIONS} WHERE id = ?1"),
            params![id.get()],
            |row| {
                Ok(SectionRow {
                    name: row.get(1)?,
                    handle: row.get(2)?,
                    sortorder: row.get(3)?,
                    hidden: row.get(4)?,
                    filter: row.get(5)?,
                    navigation_group: row.get(6)?,
                })
            },
        )
        .optional()?)
}

/// Loads a section with its fields.
pub(crate) fn load_section(
    conn: &Connection,
    registry: &FieldRegistry,
    id: SectionId,
) -> StorageResult<Option<Section>> {
    let Some(row) = load_section_row(conn, id)? else {
        return Ok(None);
    };
    let mut section = Section::new(&row.name).with_handle(&row.handle);
    section.sortorder = row.sortorder;
    section.hidden = parse_bool(&row.hidden).unwrap_or(false);
    section.filter = parse_bool(&row.filter).unwrap_or(true);
    section.navigation_group = row.navigation_group;
    section.set_id(id);
    section.set_fields(load_section_fields(conn, registry, id)?);
    Ok(Some(section))
}

pub(crate) fn insert_association(conn: &Connection, association: &SectionAssociation) -> StorageResult<i64> {
    conn.execute(
        &format!(
            "INSERT INTO {ASSOCIATIONS} (parent_section_id, parent_section_field_id, child_section_id,
             child_section_field_id, hide_association, interface, editor)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
        ),
        params![
            association.parent_section_id.get(),
            association.parent_section_field_id.map(FieldId::get),
            association.child_section_id.get(),
            association.child_section_field_id.get(),
            yes_no(association.hide_association),
            association.interface,
            association.editor,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn remove_child_association(conn: &Connection, child_field_id: FieldId) -> StorageResult<usize> {
    Ok(conn.execute(
        &format!("DELETE FROM {ASSOCIATIONS} WHERE child_section_field_id = ?1"),
        params![child_field_id.get()],
    )?)
}

/// Removes associations the field takes part in on either side.
pub(crate) fn delete_field_associations(conn: &Connection, field_id: FieldId) -> StorageResult<usize> {
    Ok(conn.execute(
        &format!(
            "DELETE FROM {ASSOCIATIONS} WHERE child_section_field_id = ?1 OR parent_section_field_id = ?1"
        ),
        params![field_id.get()],
    )?)
}

pub(crate) fn fetch_associations(
    conn: &Connection,
    column: &str,
    section_id: SectionId,
    respect_visibility: bool,
) -> StorageResult<Vec<SectionAssociation>> {
    let mut sql = format!(
        "SELECT {ASSOCIATION_COLUMNS} FROM {ASSOCIATIONS} WHERE {} = ?1",
        quire_db::quote_ident(column)?
    );
    if respect_visibility {
        sql.push_str(" AND hide_association = 'no'");
    }
    sql.push_str(" ORDER BY id");
    let mut stmt = conn.prepare(&sql)?;
    let associations = stmt
        .query_map(params![section_id.get()], read_association)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(associations)
}

fn read_association(row: &Row<'_>) -> rusqlite::Result<SectionAssociation> {
    let hidden: String = row.get(5)?;
    Ok(SectionAssociation {
        id: Some(row.get(0)?),
        parent_section_id: SectionId::new(row.get(1)?),
        parent_section_field_id: row.get::<_, Option<i64>>(2)?.map(FieldId::new),
        child_section_id: SectionId::new(row.get(3)?),
        child_section_field_id: FieldId::new(row.get(4)?),
        hide_association: parse_bool(&hidden).unwrap_or(false),
        interface: row.get(6)?,
        editor: row.get(7)?,
    })
}
