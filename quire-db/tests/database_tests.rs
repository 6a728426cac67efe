use pretty_assertions::assert_eq;
use quire_db::{
    add_missing_columns, atomic, create_table, delete_rows, drop_table, insert_row, select_rows,
    table_columns, table_exists, Database, DbError, DbOptions,
};
use quire_types::{ColumnSpec, EntryId, FieldRow, FieldValue, KeySpec, StorageSchema};

fn data_schema() -> StorageSchema {
    StorageSchema::new()
        .column(ColumnSpec::varchar("handle", 255))
        .column(ColumnSpec::varchar("value", 255))
        .key(KeySpec::unique("entry_id"))
        .key(KeySpec::index("handle"))
        .for_entry_data()
}

fn row(value: &str) -> FieldRow {
    let mut row = FieldRow::new();
    row.insert("value".into(), FieldValue::Text(value.into()));
    row.insert("handle".into(), FieldValue::Text(value.to_lowercase()));
    row
}

fn count(db: &Database, table: &str) -> i64 {
    db.with_conn(|conn| {
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
            .map_err(DbError::from)
    })
    .unwrap()
}

// ── Provisioning ────────────────────────────────────────────────

#[test]
fn create_table_and_introspect() {
    let db = Database::open_in_memory().unwrap();
    db.with_conn(|conn| {
        assert!(!table_exists(conn, "tbl_entries_data_1")?);
        create_table(conn, "tbl_entries_data_1", &data_schema())?;
        assert!(table_exists(conn, "tbl_entries_data_1")?);
        assert_eq!(
            table_columns(conn, "tbl_entries_data_1")?,
            vec!["id", "entry_id", "handle", "value"]
        );
        Ok::<_, DbError>(())
    })
    .unwrap();
}

#[test]
fn create_table_is_idempotent() {
    let db = Database::open_in_memory().unwrap();
    db.with_conn(|conn| {
        create_table(conn, "t", &data_schema())?;
        create_table(conn, "t", &data_schema())
    })
    .unwrap();
}

#[test]
fn unique_entry_key_is_enforced() {
    let db = Database::open_in_memory().unwrap();
    let result = db.with_conn(|conn| {
        create_table(conn, "t", &data_schema())?;
        insert_row(conn, "t", EntryId::new(1), &row("A"))?;
        insert_row(conn, "t", EntryId::new(1), &row("B"))
    });
    assert!(matches!(result, Err(DbError::Sqlite(_))));
}

#[test]
fn varchar_length_is_checked() {
    let db = Database::open_in_memory().unwrap();
    let result = db.with_conn(|conn| {
        create_table(conn, "t", &data_schema())?;
        insert_row(conn, "t", EntryId::new(1), &row(&"x".repeat(256)))
    });
    assert!(result.is_err());
}

#[test]
fn enum_column_rejects_other_values() {
    let db = Database::open_in_memory().unwrap();
    let schema = StorageSchema::new()
        .column(ColumnSpec::enumeration("value", &["yes", "no"]))
        .for_entry_data();
    let result = db.with_conn(|conn| {
        create_table(conn, "t", &schema)?;
        let mut r = FieldRow::new();
        r.insert("value".into(), "maybe".into());
        insert_row(conn, "t", EntryId::new(1), &r)
    });
    assert!(result.is_err());
}

#[test]
fn add_missing_columns_only_adds_new_ones() {
    let db = Database::open_in_memory().unwrap();
    let added = db
        .with_conn(|conn| {
            create_table(conn, "settings", &StorageSchema::new().column(ColumnSpec::text("a")))?;
            let wider = StorageSchema::new()
                .column(ColumnSpec::text("a"))
                .column(ColumnSpec::text("b"));
            add_missing_columns(conn, "settings", &wider)
        })
        .unwrap();
    assert_eq!(added, vec!["b".to_string()]);
}

#[test]
fn drop_table_reports_existence() {
    let db = Database::open_in_memory().unwrap();
    db.with_conn(|conn| {
        create_table(conn, "t", &data_schema())?;
        assert!(drop_table(conn, "t")?);
        assert!(!drop_table(conn, "t")?);
        assert!(table_columns(conn, "t")?.is_empty());
        Ok::<_, DbError>(())
    })
    .unwrap();
}

#[test]
fn rejects_unsafe_table_names() {
    let db = Database::open_in_memory().unwrap();
    let result = db.with_conn(|conn| create_table(conn, "bad name", &data_schema()));
    assert!(matches!(result, Err(DbError::InvalidIdentifier(_))));
}

// ── Rows ────────────────────────────────────────────────────────

#[test]
fn rows_roundtrip_by_entry() {
    let db = Database::open_in_memory().unwrap();
    let rows = db
        .with_conn(|conn| {
            create_table(conn, "t", &data_schema())?;
            insert_row(conn, "t", EntryId::new(2), &row("Two"))?;
            insert_row(conn, "t", EntryId::new(1), &row("One"))?;
            insert_row(conn, "t", EntryId::new(3), &row("Three"))?;
            select_rows(conn, "t", &[EntryId::new(1), EntryId::new(2)])
        })
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].0, EntryId::new(1));
    assert_eq!(rows[0].1, row("One"));
    assert_eq!(rows[1].1, row("Two"));
}

#[test]
fn delete_rows_by_entry() {
    let db = Database::open_in_memory().unwrap();
    let deleted = db
        .with_conn(|conn| {
            create_table(conn, "t", &data_schema())?;
            for i in 1..=5 {
                insert_row(conn, "t", EntryId::new(i), &row(&format!("v{i}")))?;
            }
            delete_rows(conn, "t", &[EntryId::new(1), EntryId::new(4), EntryId::new(99)])
        })
        .unwrap();
    assert_eq!(deleted, 2);
    assert_eq!(count(&db, "t"), 3);
}

#[test]
fn empty_id_lists_are_noops() {
    let db = Database::open_in_memory().unwrap();
    db.with_conn(|conn| {
        create_table(conn, "t", &data_schema())?;
        assert!(select_rows(conn, "t", &[])?.is_empty());
        assert_eq!(delete_rows(conn, "t", &[])?, 0);
        Ok::<_, DbError>(())
    })
    .unwrap();
}

// ── Atomic units ────────────────────────────────────────────────

#[test]
fn atomic_commits_on_success() {
    let db = Database::open_in_memory().unwrap();
    db.with_conn(|conn| create_table(conn, "t", &data_schema())).unwrap();
    db.atomic(|conn| insert_row(conn, "t", EntryId::new(1), &row("A")))
        .unwrap();
    assert_eq!(count(&db, "t"), 1);
}

#[test]
fn atomic_rolls_back_on_error() {
    let db = Database::open_in_memory().unwrap();
    db.with_conn(|conn| create_table(conn, "t", &data_schema())).unwrap();
    let result = db.atomic(|conn| {
        insert_row(conn, "t", EntryId::new(1), &row("A"))?;
        insert_row(conn, "t", EntryId::new(1), &row("duplicate entry"))
    });
    assert!(result.is_err());
    assert_eq!(count(&db, "t"), 0);
}

#[test]
fn nested_atomic_rolls_back_inner_only() {
    let db = Database::open_in_memory().unwrap();
    db.with_conn(|conn| create_table(conn, "t", &data_schema())).unwrap();
    db.atomic(|conn| {
        insert_row(conn, "t", EntryId::new(1), &row("outer"))?;
        let inner: Result<(), DbError> = atomic(conn, |conn| {
            insert_row(conn, "t", EntryId::new(2), &row("inner"))?;
            insert_row(conn, "t", EntryId::new(2), &row("clash"))
        });
        assert!(inner.is_err());
        Ok::<_, DbError>(())
    })
    .unwrap();
    assert_eq!(count(&db, "t"), 1);
}

// ── Functions / files ───────────────────────────────────────────

#[test]
fn regexp_function_is_registered() {
    let db = Database::open_in_memory().unwrap();
    let (hit, miss, null): (bool, bool, bool) = db
        .with_conn(|conn| {
            conn.query_row(
                "SELECT 'Hello World' REGEXP '^hello', 'abc' REGEXP '^z', NULL REGEXP 'x'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get::<_, Option<bool>>(2)?.unwrap_or(false))),
            )
            .map_err(DbError::from)
        })
        .unwrap();
    assert!(!hit, "REGEXP is case-sensitive without (?i)");
    assert!(!miss);
    assert!(!null);

    let insensitive: bool = db
        .with_conn(|conn| {
            conn.query_row("SELECT 'Hello' REGEXP '(?i)^hello'", [], |r| r.get(0))
                .map_err(DbError::from)
        })
        .unwrap();
    assert!(insensitive);
}

#[test]
fn file_database_persists_between_opens() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("quire.db");
    {
        let db = Database::open(&path, &DbOptions::default()).unwrap();
        assert_eq!(db.path(), Some(path.as_path()));
        db.with_conn(|conn| {
            create_table(conn, "t", &data_schema())?;
            insert_row(conn, "t", EntryId::new(1), &row("kept"))
        })
        .unwrap();
    }
    let db = Database::open(&path, &DbOptions::default()).unwrap();
    assert_eq!(count(&db, "t"), 1);
}
