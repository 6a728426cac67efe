//! Storage schema descriptors.
//!
//! A field variant never issues DDL itself. It describes the columns and keys
//! it needs and the database layer provisions a table from that description.

use serde::{Deserialize, Serialize};

/// Logical column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    Real,
    Text,
    /// Text with a maximum length in characters.
    VarChar(u16),
}

/// One declared column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    /// Closed set of permitted text values (an enum column), if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<String>>,
}

impl ColumnSpec {
    fn simple(name: &str, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            allowed: None,
        }
    }

    /// Nullable integer column.
    pub fn integer(name: &str) -> Self {
        Self::simple(name, ColumnType::Integer)
    }

    /// Nullable real column.
    pub fn real(name: &str) -> Self {
        Self::simple(name, ColumnType::Real)
    }

    /// Nullable unbounded text column.
    pub fn text(name: &str) -> Self {
        Self::simple(name, ColumnType::Text)
    }

    /// Nullable bounded text column.
    pub fn varchar(name: &str, max_len: u16) -> Self {
        Self::simple(name, ColumnType::VarChar(max_len))
    }

    /// Text column restricted to a fixed set of values.
    pub fn enumeration(name: &str, values: &[&str]) -> Self {
        Self {
            allowed: Some(values.iter().map(|v| (*v).to_string()).collect()),
            ..Self::simple(name, ColumnType::Text)
        }
    }

    /// Marks the column `NOT NULL`.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.nullable = false;
        self
    }
}

/// A key or index over declared columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySpec {
    Unique(Vec<String>),
    Index(Vec<String>),
    /// Full-text index. Engines without one fall back to an ordinary index.
    FullText(String),
}

impl KeySpec {
    pub fn unique(column: &str) -> Self {
        Self::Unique(vec![column.to_string()])
    }

    pub fn index(column: &str) -> Self {
        Self::Index(vec![column.to_string()])
    }

    /// Columns the key covers.
    #[must_use]
    pub fn columns(&self) -> Vec<&str> {
        match self {
            Self::Unique(cols) | Self::Index(cols) => cols.iter().map(String::as_str).collect(),
            Self::FullText(col) => vec![col.as_str()],
        }
    }
}

/// The physical shape of a table, excluding its `id` primary key.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StorageSchema {
    pub columns: Vec<ColumnSpec>,
    pub keys: Vec<KeySpec>,
}

impl StorageSchema {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }

    #[must_use]
    pub fn key(mut self, key: KeySpec) -> Self {
        self.keys.push(key);
        self
    }

    /// Prepends the `entry_id` column every field-data table carries.
    #[must_use]
    pub fn for_entry_data(mut self) -> Self {
        self.columns
            .insert(0, ColumnSpec::integer("entry_id").required());
        self
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }
}
