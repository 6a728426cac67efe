//! SQLite connection management for Quire.
//!
//! Owns the single shared connection, the atomic-unit helper every write path
//! goes through, and the generic table routines: provisioning a table from a
//! [`StorageSchema`](quire_types::StorageSchema), introspecting tables and
//! columns, and reading/writing raw field rows.
//!
//! Nothing here knows about sections, fields or entries; callers pass table
//! names and row maps.

mod connection;
mod ddl;
mod error;
mod rows;

pub use connection::{atomic, Database, DbOptions};
pub use ddl::{
    add_missing_columns, create_table, drop_table, quote_ident, table_columns, table_exists,
};
pub use error::{DbError, DbResult};
pub use rows::{
    delete_rows, from_sql_value, id_placeholders, insert_row, select_rows, to_sql_value,
};
