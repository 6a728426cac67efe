//! Persistence of field definitions.
//!
//! A field lives in three places: its row in `tbl_fields` (shared
//! attributes), its settings row in `tbl_fields_<type>` (variant settings,
//! one text column per declared setting) and its data table
//! `tbl_entries_data_<id>`, provisioned from the variant's storage schema.

use crate::error::{StorageError, StorageResult};
use crate::field_store::SqlFieldStore;
use crate::schema::{ensure_settings_table, settings_table, yes_no, FIELDS, SECTIONS};
use crate::section_manager::{
    delete_field_associations, insert_association, load_section, remove_child_association,
};
use crate::ContentStore;
use quire_db::{create_table, drop_table, quote_ident, table_exists};
use quire_model::{parse_bool, Field, FieldInfo, FieldRegistry, Location, SectionAssociation, SectionErrors};
use quire_types::{FieldId, SectionId};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use tracing::{debug, info};

const FIELD_COLUMNS: &str =
    "id, label, element_name, type, parent_section, required, sortorder, location, show_column";

/// Adds, edits, removes and loads field definitions.
#[derive(Clone, Copy)]
pub struct FieldManager<'s> {
    store: &'s ContentStore,
}

impl<'s> FieldManager<'s> {
    pub(crate) fn new(store: &'s ContentStore) -> Self {
        Self { store }
    }

    /// Saves a new field of an existing section, writes its settings and
    /// provisions its data table.
    ///
    /// A field whose element name is taken in the section, or whose type
    /// allows one field per section and is already present, is rejected as
    /// [`StorageError::InvalidSection`].
    pub fn add(&self, field: &mut Field) -> StorageResult<FieldId> {
        let registry = self.store.registry();
        field.ensure_element_name();
        self.store.database().atomic(|conn| {
            check_fits_section(conn, registry, field)?;
            insert_field(conn, field)
        })
    }

    /// Saves changes to a field. A change of type recreates the data table,
    /// discarding stored data. Checked against its section like [`Self::add`].
    pub fn edit(&self, field: &Field) -> StorageResult<()> {
        let registry = self.store.registry();
        self.store.database().atomic(|conn| {
            check_fits_section(conn, registry, field)?;
            update_field(conn, field)
        })
    }

    /// Removes a field, its settings, data table and associations.
    pub fn delete(&self, id: FieldId) -> StorageResult<()> {
        let registry = self.store.registry();
        self.store.database().atomic(|conn| remove_field(conn, registry, id))
    }

    pub fn fetch(&self, id: FieldId) -> StorageResult<Option<Field>> {
        let registry = self.store.registry();
        self.store.database().with_conn(|conn| load_field(conn, registry, id))
    }

    /// Fields of a section in their sort order.
    pub fn fetch_by_section(&self, section_id: SectionId) -> StorageResult<Vec<Field>> {
        let registry = self.store.registry();
        self.store
            .database()
            .with_conn(|conn| load_section_fields(conn, registry, section_id))
    }

    /// Type handle a field was saved with.
    pub fn fetch_field_type(&self, id: FieldId) -> StorageResult<Option<String>> {
        self.store.database().with_conn(|conn| field_type(conn, id))
    }

    /// Whether any section has a field of this type.
    pub fn is_field_used(&self, type_handle: &str) -> StorageResult<bool> {
        self.store.database().with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    &format!("SELECT id FROM {FIELDS} WHERE type = ?1 LIMIT 1"),
                    params![type_handle],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }
}

pub(crate) fn insert_field(conn: &Connection, field: &mut Field) -> StorageResult<FieldId> {
    let section_id = field
        .section_id()
        .ok_or_else(|| StorageError::not_found(format!("section of field '{}'", field.label())))?;
    ensure_section(conn, section_id)?;
    field.ensure_element_name();
    let info = field.info();
    conn.execute(
        &format!(
            "INSERT INTO {FIELDS} (label, element_name, type, parent_section, required, sortorder, location, show_column)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
        ),
        params![
            info.label,
            info.element_name,
            field.type_handle(),
            section_id.get(),
            yes_no(info.required),
            info.sortorder,
            info.location.as_str(),
            yes_no(info.show_column),
        ],
    )?;
    let id = FieldId::new(conn.last_insert_rowid());
    field.set_id(id);

    write_settings(conn, field, id)?;
    provision_data_table(conn, field, id)?;
    sync_association(conn, field, id, section_id)?;
    info!(field_id = %id, section_id = %section_id, kind = field.type_handle(), "Added field");
    Ok(id)
}

pub(crate) fn update_field(conn: &Connection, field: &Field) -> StorageResult<()> {
    let id = field
        .id()
        .ok_or_else(|| StorageError::not_found(format!("field '{}'", field.label())))?;
    let section_id = field
        .section_id()
        .ok_or_else(|| StorageError::not_found(format!("section of field '{}'", field.label())))?;
    let previous = field_type(conn, id)?.ok_or_else(|| StorageError::not_found(format!("field {id}")))?;

    let info = field.info();
    conn.execute(
        &format!(
            "UPDATE {FIELDS} SET label = ?1, element_name = ?2, type = ?3, parent_section = ?4,
             required = ?5, sortorder = ?6, location = ?7, show_column = ?8 WHERE id = ?9"
        ),
        params![
            info.label,
            info.element_name,
            field.type_handle(),
            section_id.get(),
            yes_no(info.required),
            info.sortorder,
            info.location.as_str(),
            yes_no(info.show_column),
            id.get(),
        ],
    )?;

    if previous != field.type_handle() {
        info!(field_id = %id, from = %previous, to = field.type_handle(), "Field type changed, recreating data table");
        delete_settings(conn, &previous, id)?;
        drop_table(conn, &id.data_table())?;
    }
    write_settings(conn, field, id)?;
    provision_data_table(conn, field, id)?;
    sync_association(conn, field, id, section_id)?;
    Ok(())
}

pub(crate) fn remove_field(conn: &Connection, registry: &FieldRegistry, id: FieldId) -> StorageResult<()> {
    let field = load_field(conn, registry, id)?.ok_or_else(|| StorageError::not_found(format!("field {id}")))?;
    field.tear_down(&SqlFieldStore::new(conn))?;
    drop_table(conn, &id.data_table())?;
    delete_settings(conn, field.type_handle(), id)?;
    delete_field_associations(conn, id)?;
    conn.execute(&format!("DELETE FROM {FIELDS} WHERE id = ?1"), params![id.get()])?;
    info!(field_id = %id, "Deleted field");
    Ok(())
}

pub(crate) fn load_field(conn: &Connection, registry: &FieldRegistry, id: FieldId) -> StorageResult<Option<Field>> {
    let row = conn
        .query_row(
            &format!("SELECT {FIELD_COLUMNS} FROM {FIELDS} WHERE id = ?1"),
            params![id.get()],
            read_field_row,
        )
        .optional()?;
    row.map(|(info, handle)| build_field(conn, registry, info, &handle))
        .transpose()
}

pub(crate) fn load_section_fields(
    conn: &Connection,
    registry: &FieldRegistry,
    section_id: SectionId,
) -> StorageResult<Vec<Field>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {FIELD_COLUMNS} FROM {FIELDS} WHERE parent_section = ?1 ORDER BY sortorder, id"
    ))?;
    let rows = stmt
        .query_map(params![section_id.get()], read_field_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter()
        .map(|(info, handle)| build_field(conn, registry, info, &handle))
        .collect()
}

pub(crate) fn field_type(conn: &Connection, id: FieldId) -> StorageResult<Option<String>> {
    Ok(conn
        .query_row(
            &format!("SELECT type FROM {FIELDS} WHERE id = ?1"),
            params![id.get()],
            |row| row.get(0),
        )
        .optional()?)
}

/// Rejects a field that breaks the constraints between the fields of its
/// section. Errors are reported at the field's position in the section.
fn check_fits_section(conn: &Connection, registry: &FieldRegistry, field: &Field) -> StorageResult<()> {
    let Some(section) = field
        .section_id()
        .map(|id| load_section(conn, registry, id))
        .transpose()?
        .flatten()
    else {
        return Ok(());
    };
    let errors = section.check_sibling_constraints(field);
    if errors.is_empty() {
        return Ok(());
    }
    let position = field
        .id()
        .and_then(|id| section.fields().iter().position(|f| f.id() == Some(id)))
        .unwrap_or(section.fields().len());
    debug!(field = field.element_name(), position, "Field conflicts with its section");
    let mut section_errors = SectionErrors::default();
    section_errors.fields.insert(position, errors);
    Err(StorageError::InvalidSection(section_errors))
}

fn ensure_section(conn: &Connection, id: SectionId) -> StorageResult<()> {
    let found: Option<i64> = conn
        .query_row(&format!("SELECT id FROM {SECTIONS} WHERE id = ?1"), params![id.get()], |row| row.get(0))
        .optional()?;
    found
        .map(|_| ())
        .ok_or_else(|| StorageError::not_found(format!("section {id}")))
}

fn read_field_row(row: &Row<'_>) -> rusqlite::Result<(FieldInfo, String)> {
    let flag = |value: String| parse_bool(&value).unwrap_or(false);
    let location: String = row.get(7)?;
    let info = FieldInfo {
        id: Some(FieldId::new(row.get(0)?)),
        section_id: Some(SectionId::new(row.get(4)?)),
        label: row.get(1)?,
        element_name: row.get(2)?,
        location: Location::parse(&location).unwrap_or_default(),
        required: flag(row.get(5)?),
        show_column: flag(row.get(8)?),
        sortorder: row.get(6)?,
    };
    Ok((info, row.get(3)?))
}

fn build_field(conn: &Connection, registry: &FieldRegistry, info: FieldInfo, handle: &str) -> StorageResult<Field> {
    let pairs = match info.id {
        Some(id) => read_settings(conn, handle, id)?,
        None => Vec::new(),
    };
    let kind = registry.build_from_raw(handle, pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))?;
    Ok(Field::from_parts(info, kind))
}

/// Persisted settings of one field. A missing settings table or row means
/// every setting keeps its default.
fn read_settings(conn: &Connection, handle: &str, id: FieldId) -> StorageResult<Vec<(String, String)>> {
    let table = settings_table(handle);
    if !table_exists(conn, &table)? {
        debug!(field_id = %id, table, "No settings table, using defaults");
        return Ok(Vec::new());
    }
    let mut stmt = conn.prepare(&format!("SELECT * FROM {} WHERE field_id = ?1", quote_ident(&table)?))?;
    let names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
    let mut rows = stmt.query(params![id.get()])?;
    let mut pairs = Vec::new();
    if let Some(row) = rows.next()? {
        for (i, name) in names.iter().enumerate() {
            if name == "id" || name == "field_id" {
                continue;
            }
            if let Some(value) = row.get::<_, Option<String>>(i)? {
                pairs.push((name.clone(), value));
            }
        }
    }
    Ok(pairs)
}

fn write_settings(conn: &Connection, field: &Field, id: FieldId) -> StorageResult<()> {
    let table = ensure_settings_table(conn, field.type_handle(), field.kind().setting_specs())?;
    let quoted = quote_ident(&table)?;
    conn.execute(&format!("DELETE FROM {quoted} WHERE field_id = ?1"), params![id.get()])?;

    let pairs = field.kind().settings().to_raw_pairs();
    let mut columns = vec!["\"field_id\"".to_string()];
    let mut values = vec![Value::Integer(id.get())];
    for (key, raw) in pairs {
        columns.push(quote_ident(key)?);
        values.push(Value::Text(raw));
    }
    let placeholders = vec!["?"; values.len()].join(", ");
    conn.execute(
        &format!("INSERT INTO {quoted} ({}) VALUES ({placeholders})", columns.join(", ")),
        params_from_iter(values),
    )?;
    Ok(())
}

fn delete_settings(conn: &Connection, handle: &str, id: FieldId) -> StorageResult<()> {
    let table = settings_table(handle);
    if table_exists(conn, &table)? {
        conn.execute(
            &format!("DELETE FROM {} WHERE field_id = ?1", quote_ident(&table)?),
            params![id.get()],
        )?;
    }
    Ok(())
}

fn provision_data_table(conn: &Connection, field: &Field, id: FieldId) -> StorageResult<()> {
    create_table(conn, &id.data_table(), &field.storage_schema())?;
    Ok(())
}

/// Keeps the association a field creates in step with its configuration.
fn sync_association(conn: &Connection, field: &Field, id: FieldId, section_id: SectionId) -> StorageResult<()> {
    remove_child_association(conn, id)?;
    let Some(parent_field) = field.behavior().association_source() else {
        return Ok(());
    };
    let parent_section: Option<i64> = conn
        .query_row(
            &format!("SELECT parent_section FROM {FIELDS} WHERE id = ?1"),
            params![parent_field.get()],
            |row| row.get(0),
        )
        .optional()?;
    let Some(parent_section) = parent_section else {
        debug!(field_id = %id, parent_field = %parent_field, "Association source missing, skipping");
        return Ok(());
    };
    insert_association(
        conn,
        &SectionAssociation::new(SectionId::new(parent_section), Some(parent_field), section_id, id),
    )?;
    Ok(())
}
