//! [`FieldDataStore`] over a live connection.

use quire_db::{delete_rows, from_sql_value, id_placeholders, quote_ident, table_exists, to_sql_value, DbError};
use quire_model::{remove_file_now, FieldDataStore, StoreError, StoreResult};
use quire_types::{EntryId, FieldId, FieldValue};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::cell::RefCell;
use std::path::{Path, PathBuf};

/// Field data access bound to one connection, usually inside the
/// transaction of the operation that needs it.
///
/// A field whose data table was never provisioned reads as empty.
#[derive(Clone, Copy)]
pub struct SqlFieldStore<'c> {
    conn: &'c Connection,
    held_removals: Option<&'c RefCell<Vec<PathBuf>>>,
}

impl<'c> SqlFieldStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self {
            conn,
            held_removals: None,
        }
    }

    /// Collects file removals into `removals` instead of unlinking, for the
    /// caller to perform once the transaction commits.
    #[must_use]
    pub fn holding_removals(mut self, removals: &'c RefCell<Vec<PathBuf>>) -> Self {
        self.held_removals = Some(removals);
        self
    }

    fn table(&self, field_id: FieldId) -> StoreResult<Option<String>> {
        let table = field_id.data_table();
        if table_exists(self.conn, &table).map_err(backend)? {
            Ok(Some(table))
        } else {
            Ok(None)
        }
    }
}

fn backend(err: impl Into<DbError>) -> StoreError {
    StoreError::Backend(err.into().to_string())
}

impl FieldDataStore for SqlFieldStore<'_> {
    fn delete_entry_data(&self, field_id: FieldId, entry_ids: &[EntryId]) -> StoreResult<usize> {
        match self.table(field_id)? {
            Some(table) => delete_rows(self.conn, &table, entry_ids).map_err(backend),
            None => Ok(0),
        }
    }

    fn count_entries_matching(
        &self,
        field_id: FieldId,
        column: &str,
        values: &[FieldValue],
        exclude: Option<EntryId>,
    ) -> StoreResult<usize> {
        if values.is_empty() {
            return Ok(0);
        }
        let Some(table) = self.table(field_id)? else {
            return Ok(0);
        };
        let mut sql = format!(
            "SELECT COUNT(DISTINCT entry_id) FROM {} WHERE {} IN ({})",
            quote_ident(&table).map_err(backend)?,
            quote_ident(column).map_err(backend)?,
            id_placeholders(values.len())
        );
        let mut params: Vec<Value> = values.iter().map(to_sql_value).collect();
        if let Some(id) = exclude {
            sql.push_str(" AND entry_id != ?");
            params.push(Value::Integer(id.get()));
        }
        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(params), |row| row.get(0))
            .map_err(backend)?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn distinct_values(&self, field_id: FieldId, column: &str) -> StoreResult<Vec<String>> {
        let Some(table) = self.table(field_id)? else {
            return Ok(Vec::new());
        };
        let column = quote_ident(column).map_err(backend)?;
        let sql = format!(
            "SELECT DISTINCT {column} FROM {} WHERE {column} IS NOT NULL ORDER BY {column}",
            quote_ident(&table).map_err(backend)?
        );
        let mut stmt = self.conn.prepare(&sql).map_err(backend)?;
        let mut rows = stmt.query([]).map_err(backend)?;
        let mut values = Vec::new();
        while let Some(row) = rows.next().map_err(backend)? {
            let value = from_sql_value(row.get_ref(0).map_err(backend)?).to_string();
            if !value.trim().is_empty() {
                values.push(value);
            }
        }
        Ok(values)
    }

    fn remove_file(&self, path: &Path) -> StoreResult<()> {
        match self.held_removals {
            Some(held) => held.borrow_mut().push(path.to_path_buf()),
            None => remove_file_now(path),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_db::{create_table, insert_row, Database};
    use quire_types::{ColumnSpec, FieldRow, StorageSchema};

    fn seeded() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let schema = StorageSchema::new()
                .column(ColumnSpec::varchar("value", 255))
                .for_entry_data();
            create_table(conn, "tbl_entries_data_7", &schema)?;
            for (entry, value) in [(1, "red"), (2, "blue"), (3, "red"), (3, "")] {
                let mut row = FieldRow::new();
                row.insert("value".into(), FieldValue::from(value));
                insert_row(conn, "tbl_entries_data_7", EntryId::new(entry), &row)?;
            }
            Ok::<_, DbError>(())
        })
        .unwrap();
        db
    }

    #[test]
    fn counts_distinct_entries() {
        let db = seeded();
        db.with_conn(|conn| {
            let store = SqlFieldStore::new(conn);
            let red = [FieldValue::from("red")];
            assert_eq!(store.count_entries_matching(FieldId::new(7), "value", &red, None).unwrap(), 2);
            assert_eq!(
                store
                    .count_entries_matching(FieldId::new(7), "value", &red, Some(EntryId::new(1)))
                    .unwrap(),
                1
            );
            assert_eq!(store.count_entries_matching(FieldId::new(7), "value", &[], None).unwrap(), 0);
            Ok::<_, DbError>(())
        })
        .unwrap();
    }

    #[test]
    fn distinct_values_skip_blanks() {
        let db = seeded();
        db.with_conn(|conn| {
            let store = SqlFieldStore::new(conn);
            assert_eq!(store.distinct_values(FieldId::new(7), "value").unwrap(), vec!["blue", "red"]);
            Ok::<_, DbError>(())
        })
        .unwrap();
    }

    #[test]
    fn missing_table_reads_as_empty() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let store = SqlFieldStore::new(conn);
            assert_eq!(store.delete_entry_data(FieldId::new(99), &[EntryId::new(1)]).unwrap(), 0);
            assert!(store.distinct_values(FieldId::new(99), "value").unwrap().is_empty());
            Ok::<_, DbError>(())
        })
        .unwrap();
    }

    #[test]
    fn held_removals_leave_the_file_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kept.txt");
        std::fs::write(&path, b"x").unwrap();
        let db = Database::open_in_memory().unwrap();
        let held = RefCell::new(Vec::new());
        db.with_conn(|conn| {
            SqlFieldStore::new(conn).holding_removals(&held).remove_file(&path).unwrap();
            Ok::<_, DbError>(())
        })
        .unwrap();
        assert!(path.exists());
        assert_eq!(held.into_inner(), vec![path]);
    }

    #[test]
    fn deletes_rows_of_given_entries() {
        let db = seeded();
        db.with_conn(|conn| {
            let store = SqlFieldStore::new(conn);
            assert_eq!(store.delete_entry_data(FieldId::new(7), &[EntryId::new(3)]).unwrap(), 2);
            assert_eq!(store.distinct_values(FieldId::new(7), "value").unwrap(), vec!["blue", "red"]);
            Ok::<_, DbError>(())
        })
        .unwrap();
    }
}
