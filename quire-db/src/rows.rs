//! Raw row access for field-data tables.
//!
//! Every field-data table has an `id` primary key and an `entry_id` column;
//! the remaining columns are whatever the field declared. Rows travel as
//! [`FieldRow`] maps without the two universal columns.

use crate::ddl::quote_ident;
use crate::error::DbResult;
use quire_types::{EntryId, FieldRow, FieldValue};
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params_from_iter, Connection};

/// Converts a field value into an owned SQLite value.
pub fn to_sql_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Int(i) => Value::Integer(*i),
        FieldValue::Real(r) => Value::Real(*r),
        FieldValue::Text(s) => Value::Text(s.clone()),
    }
}

/// Converts a borrowed SQLite value into a field value. Blobs are read as UTF-8.
pub fn from_sql_value(value: ValueRef<'_>) -> FieldValue {
    match value {
        ValueRef::Null => FieldValue::Null,
        ValueRef::Integer(i) => FieldValue::Int(i),
        ValueRef::Real(r) => FieldValue::Real(r),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            FieldValue::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

/// `?, ?, ?` with `count` placeholders.
pub fn id_placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Reads every row belonging to the given entries, ordered by entry then row id.
pub fn select_rows(
    conn: &Connection,
    table: &str,
    entry_ids: &[EntryId],
) -> DbResult<Vec<(EntryId, FieldRow)>> {
    if entry_ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT * FROM {} WHERE entry_id IN ({}) ORDER BY entry_id, id",
        quote_ident(table)?,
        id_placeholders(entry_ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
    let entry_index = names.iter().position(|n| n == "entry_id");

    let mut rows = stmt.query(params_from_iter(entry_ids.iter().map(|id| id.get())))?;
    let mut result = Vec::new();
    while let Some(row) = rows.next()? {
        let entry_id = match entry_index {
            Some(i) => EntryId::new(row.get(i)?),
            None => continue,
        };
        let mut data = FieldRow::new();
        for (i, name) in names.iter().enumerate() {
            if name == "id" || name == "entry_id" {
                continue;
            }
            data.insert(name.clone(), from_sql_value(row.get_ref(i)?));
        }
        result.push((entry_id, data));
    }
    Ok(result)
}

/// Inserts one row for an entry.
pub fn insert_row(conn: &Connection, table: &str, entry_id: EntryId, row: &FieldRow) -> DbResult<()> {
    let mut columns = vec!["\"entry_id\"".to_string()];
    let mut values = vec![Value::Integer(entry_id.get())];
    for (column, value) in row {
        if column == "id" || column == "entry_id" {
            continue;
        }
        columns.push(quote_ident(column)?);
        values.push(to_sql_value(value));
    }
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table)?,
        columns.join(", "),
        id_placeholders(values.len())
    );
    conn.execute(&sql, params_from_iter(values))?;
    Ok(())
}

/// Deletes every row belonging to the given entries. Returns the row count.
pub fn delete_rows(conn: &Connection, table: &str, entry_ids: &[EntryId]) -> DbResult<usize> {
    if entry_ids.is_empty() {
        return Ok(0);
    }
    let sql = format!(
        "DELETE FROM {} WHERE entry_id IN ({})",
        quote_ident(table)?,
        id_placeholders(entry_ids.len())
    );
    Ok(conn.execute(&sql, params_from_iter(entry_ids.iter().map(|id| id.get())))?)
}
