//! Core tables and per-type settings tables.

use quire_db::{add_missing_columns, create_table, DbResult};
use quire_model::SettingSpec;
use quire_types::{ColumnSpec, KeySpec, StorageSchema};
use rusqlite::Connection;
use tracing::debug;

pub(crate) const SECTIONS: &str = "tbl_sections";
pub(crate) const FIELDS: &str = "tbl_fields";
pub(crate) const ENTRIES: &str = "tbl_entries";
pub(crate) const ASSOCIATIONS: &str = "tbl_sections_association";

const CORE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tbl_sections (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    handle TEXT NOT NULL UNIQUE,
    sortorder INTEGER NOT NULL DEFAULT 0,
    hidden TEXT NOT NULL DEFAULT 'no' CHECK (hidden IN ('yes', 'no')),
    filter TEXT NOT NULL DEFAULT 'yes' CHECK (filter IN ('yes', 'no')),
    navigation_group TEXT NOT NULL DEFAULT 'Content'
);

CREATE TABLE IF NOT EXISTS tbl_fields (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    label TEXT NOT NULL,
    element_name TEXT NOT NULL,
    type TEXT NOT NULL,
    parent_section INTEGER NOT NULL,
    required TEXT NOT NULL DEFAULT 'no' CHECK (required IN ('yes', 'no')),
    sortorder INTEGER NOT NULL DEFAULT 0,
    location TEXT NOT NULL DEFAULT 'main' CHECK (location IN ('main', 'sidebar')),
    show_column TEXT NOT NULL DEFAULT 'yes' CHECK (show_column IN ('yes', 'no'))
);
CREATE INDEX IF NOT EXISTS tbl_fields_parent_section_idx ON tbl_fields (parent_section);
CREATE INDEX IF NOT EXISTS tbl_fields_type_idx ON tbl_fields (type);

CREATE TABLE IF NOT EXISTS tbl_entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    section_id INTEGER NOT NULL,
    author_id INTEGER NOT NULL,
    modification_author_id INTEGER NOT NULL,
    creation_date TEXT NOT NULL,
    creation_date_gmt TEXT NOT NULL,
    modification_date TEXT NOT NULL,
    modification_date_gmt TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS tbl_entries_section_id_idx ON tbl_entries (section_id);
CREATE INDEX IF NOT EXISTS tbl_entries_creation_date_gmt_idx ON tbl_entries (creation_date_gmt);
CREATE INDEX IF NOT EXISTS tbl_entries_modification_date_gmt_idx ON tbl_entries (modification_date_gmt);

CREATE TABLE IF NOT EXISTS tbl_sections_association (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    parent_section_id INTEGER NOT NULL,
    parent_section_field_id INTEGER,
    child_section_id INTEGER NOT NULL,
    child_section_field_id INTEGER NOT NULL,
    hide_association TEXT NOT NULL DEFAULT 'no' CHECK (hide_association IN ('yes', 'no')),
    interface TEXT,
    editor TEXT
);
CREATE INDEX IF NOT EXISTS tbl_sections_association_parent_idx ON tbl_sections_association (parent_section_id);
CREATE INDEX IF NOT EXISTS tbl_sections_association_child_idx ON tbl_sections_association (child_section_id, child_section_field_id);
";

/// Creates the core tables if they are missing.
pub(crate) fn bootstrap(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(CORE_SCHEMA)?;
    debug!("Core tables ready");
    Ok(())
}

/// Settings table of one field type.
pub(crate) fn settings_table(type_handle: &str) -> String {
    format!("tbl_fields_{type_handle}")
}

/// Provisions the settings table of a field type, adding columns for
/// settings the type declares that the table lacks.
pub(crate) fn ensure_settings_table(
    conn: &Connection,
    type_handle: &str,
    specs: &[SettingSpec],
) -> DbResult<String> {
    let table = settings_table(type_handle);
    let schema = specs.iter().fold(
        StorageSchema::new()
            .column(ColumnSpec::integer("field_id").required())
            .key(KeySpec::unique("field_id")),
        |schema, spec| schema.column(ColumnSpec::text(spec.key)),
    );
    create_table(conn, &table, &schema)?;
    add_missing_columns(conn, &table, &schema)?;
    Ok(table)
}

pub(crate) fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
