//! Normalized field data.
//!
//! Every field variant stores its data as a small column-oriented record: a
//! map from column name to either a single value or an ordered list of values.
//! A record whose columns are all single values is persisted as one row; a
//! record with list columns is persisted as one row per list index, with the
//! single-valued columns repeated on every row.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One scalar cell of field data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum FieldValue {
    #[default]
    Null,
    Int(i64),
    Real(f64),
    Text(String),
}

impl FieldValue {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the text content, if this is a text value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer content, parsing text when it holds a number.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Real(r) if r.fract() == 0.0 => Some(*r as i64),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Int(i) => write!(f, "{i}"),
            Self::Real(r) => write!(f, "{r}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// A column of field data: one value, or one value per stored row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataColumn {
    Many(Vec<FieldValue>),
    One(FieldValue),
}

impl DataColumn {
    /// Value at a row index. Single values broadcast to every index.
    #[must_use]
    pub fn at(&self, index: usize) -> FieldValue {
        match self {
            Self::One(v) => v.clone(),
            Self::Many(values) => values.get(index).cloned().unwrap_or_default(),
        }
    }

    /// All values, in row order.
    #[must_use]
    pub fn values(&self) -> Vec<&FieldValue> {
        match self {
            Self::One(v) => vec![v],
            Self::Many(values) => values.iter().collect(),
        }
    }

    /// First value, if any.
    #[must_use]
    pub fn first(&self) -> Option<&FieldValue> {
        match self {
            Self::One(v) => Some(v),
            Self::Many(values) => values.first(),
        }
    }
}

/// One physical row of a field's data table, minus the `id`/`entry_id` columns.
pub type FieldRow = BTreeMap<String, FieldValue>;

/// A field's normalized data for one entry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldData(BTreeMap<String, DataColumn>);

impl FieldData {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: sets a single-valued column.
    #[must_use]
    pub fn with(mut self, column: &str, value: impl Into<FieldValue>) -> Self {
        self.0.insert(column.to_string(), DataColumn::One(value.into()));
        self
    }

    /// Builder: sets a list-valued column.
    #[must_use]
    pub fn with_many<V: Into<FieldValue>>(mut self, column: &str, values: Vec<V>) -> Self {
        self.0.insert(
            column.to_string(),
            DataColumn::Many(values.into_iter().map(Into::into).collect()),
        );
        self
    }

    pub fn insert(&mut self, column: &str, value: DataColumn) {
        self.0.insert(column.to_string(), value);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<&DataColumn> {
        self.0.get(column)
    }

    /// First value of a column.
    #[must_use]
    pub fn first(&self, column: &str) -> Option<&FieldValue> {
        self.0.get(column).and_then(DataColumn::first)
    }

    /// First value of a column as text.
    #[must_use]
    pub fn text(&self, column: &str) -> Option<&str> {
        self.first(column).and_then(FieldValue::as_text)
    }

    /// Every value of a column, in row order. Empty when the column is absent.
    #[must_use]
    pub fn values(&self, column: &str) -> Vec<&FieldValue> {
        self.0.get(column).map(DataColumn::values).unwrap_or_default()
    }

    /// Every non-null value of a column rendered as text.
    #[must_use]
    pub fn texts(&self, column: &str) -> Vec<String> {
        self.values(column)
            .into_iter()
            .filter(|v| !v.is_null())
            .map(ToString::to_string)
            .collect()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of physical rows this data expands to.
    ///
    /// Empty data and data whose list columns are all empty yield no rows.
    #[must_use]
    pub fn row_count(&self) -> usize {
        if self.0.is_empty() {
            return 0;
        }
        self.0
            .values()
            .filter_map(|c| match c {
                DataColumn::Many(values) => Some(values.len()),
                DataColumn::One(_) => None,
            })
            .max()
            .unwrap_or(1)
    }

    /// Expands the record into physical rows, broadcasting single values
    /// across every row index.
    #[must_use]
    pub fn rows(&self) -> Vec<FieldRow> {
        (0..self.row_count())
            .map(|i| {
                self.0
                    .iter()
                    .map(|(column, data)| (column.clone(), data.at(i)))
                    .collect()
            })
            .collect()
    }

    /// Rebuilds a record from stored rows.
    ///
    /// `multi_row` selects the shape: list columns for fields that store one row
    /// per value, single values (taken from the first row) otherwise.
    #[must_use]
    pub fn from_rows(rows: Vec<FieldRow>, multi_row: bool) -> Self {
        let mut data = Self::new();
        if multi_row {
            let mut columns: BTreeMap<String, Vec<FieldValue>> = BTreeMap::new();
            for (index, row) in rows.iter().enumerate() {
                for (column, value) in row {
                    let values = columns.entry(column.clone()).or_default();
                    values.resize(index, FieldValue::Null);
                    values.push(value.clone());
                }
            }
            let count = rows.len();
            for (column, mut values) in columns {
                values.resize(count, FieldValue::Null);
                data.0.insert(column, DataColumn::Many(values));
            }
        } else if let Some(row) = rows.into_iter().next() {
            for (column, value) in row {
                data.0.insert(column, DataColumn::One(value));
            }
        }
        data
    }
}
