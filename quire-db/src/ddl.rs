//! Table provisioning and introspection.

use crate::error::{DbError, DbResult};
use quire_types::{ColumnSpec, ColumnType, KeySpec, StorageSchema};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

/// Quotes a table or column name after checking it is a plain identifier.
///
/// Only ASCII letters, digits and underscores are accepted, so a quoted name
/// can never carry SQL.
pub fn quote_ident(name: &str) -> DbResult<String> {
    let valid = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(format!("\"{name}\""))
    } else {
        Err(DbError::InvalidIdentifier(name.to_string()))
    }
}

/// Returns true if a table with this name exists.
pub fn table_exists(conn: &Connection, table: &str) -> DbResult<bool> {
    let found: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Column names of a table in declaration order. Empty if the table is missing.
pub fn table_columns(conn: &Connection, table: &str) -> DbResult<Vec<String>> {
    let sql = format!("PRAGMA table_info({})", quote_ident(table)?);
    let mut stmt = conn.prepare(&sql)?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}

/// Creates a table with an autoincrement `id` primary key plus the declared
/// columns and keys. Existing tables are left untouched.
pub fn create_table(conn: &Connection, table: &str, schema: &StorageSchema) -> DbResult<()> {
    let quoted = quote_ident(table)?;
    let mut columns = vec!["\"id\" INTEGER PRIMARY KEY AUTOINCREMENT".to_string()];
    for column in &schema.columns {
        columns.push(column_sql(column)?);
    }
    let mut sql = format!(
        "CREATE TABLE IF NOT EXISTS {quoted} (\n    {}\n);\n",
        columns.join(",\n    ")
    );
    for key in &schema.keys {
        sql.push_str(&index_sql(table, key)?);
        sql.push('\n');
    }
    conn.execute_batch(&sql)?;
    debug!(table, columns = schema.columns.len(), "Provisioned table");
    Ok(())
}

/// Adds every declared column the existing table lacks. Returns the names added.
pub fn add_missing_columns(
    conn: &Connection,
    table: &str,
    schema: &StorageSchema,
) -> DbResult<Vec<String>> {
    let existing = table_columns(conn, table)?;
    let quoted = quote_ident(table)?;
    let mut added = Vec::new();
    for column in &schema.columns {
        if existing.iter().any(|c| c == &column.name) {
            continue;
        }
        conn.execute_batch(&format!(
            "ALTER TABLE {quoted} ADD COLUMN {}",
            column_sql(column)?
        ))?;
        added.push(column.name.clone());
    }
    if !added.is_empty() {
        info!(table, ?added, "Added missing columns");
    }
    Ok(added)
}

/// Drops a table if it exists. Returns whether it existed.
pub fn drop_table(conn: &Connection, table: &str) -> DbResult<bool> {
    let existed = table_exists(conn, table)?;
    conn.execute_batch(&format!("DROP TABLE IF EXISTS {}", quote_ident(table)?))?;
    if existed {
        debug!(table, "Dropped table");
    }
    Ok(existed)
}

fn column_sql(column: &ColumnSpec) -> DbResult<String> {
    let name = quote_ident(&column.name)?;
    let mut sql = match column.column_type {
        ColumnType::Integer => format!("{name} INTEGER"),
        ColumnType::Real => format!("{name} REAL"),
        ColumnType::Text => format!("{name} TEXT"),
        ColumnType::VarChar(max) => {
            format!("{name} VARCHAR({max}) CHECK ({name} IS NULL OR length({name}) <= {max})")
        }
    };
    if !column.nullable {
        sql.push_str(" NOT NULL");
    }
    if let Some(allowed) = &column.allowed {
        let values = allowed
            .iter()
            .map(|v| format!("'{}'", v.replace('\'', "''")))
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str(&format!(" CHECK ({name} IS NULL OR {name} IN ({values}))"));
    }
    Ok(sql)
}

fn index_sql(table: &str, key: &KeySpec) -> DbResult<String> {
    let (unique, suffix) = match key {
        KeySpec::Unique(_) => ("UNIQUE ", "uniq"),
        KeySpec::Index(_) => ("", "idx"),
        // SQLite has no inline full-text index; an ordinary index keeps lookups cheap.
        KeySpec::FullText(_) => ("", "text"),
    };
    let columns = key.columns();
    let quoted_columns = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<DbResult<Vec<_>>>()?;
    let index_name = quote_ident(&format!("{table}_{}_{suffix}", columns.join("_")))?;
    Ok(format!(
        "CREATE {unique}INDEX IF NOT EXISTS {index_name} ON {} ({});",
        quote_ident(table)?,
        quoted_columns.join(", ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_ident_accepts_plain_names() {
        assert_eq!(quote_ident("tbl_entries_data_4").unwrap(), "\"tbl_entries_data_4\"");
    }

    #[test]
    fn quote_ident_rejects_injection() {
        assert!(quote_ident("x\"; DROP TABLE y; --").is_err());
        assert!(quote_ident("").is_err());
        assert!(quote_ident("9lives").is_err());
        assert!(quote_ident("with space").is_err());
    }

    #[test]
    fn enum_column_sql_escapes_values() {
        let sql = column_sql(&ColumnSpec::enumeration("value", &["yes", "it's"])).unwrap();
        assert!(sql.contains("'it''s'"));
    }
}
