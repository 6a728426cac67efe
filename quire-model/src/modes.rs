//! Export and import modes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Shape requested when exporting field data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExportMode {
    Value,
    Handle,
    Formatted,
    Unformatted,
    Boolean,
    Timestamp,
    /// The raw input form; importing it reproduces the same data.
    Postdata,
    ListValue,
    ListHandle,
    ListHandleToValue,
}

/// Shape of a value handed to an import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImportMode {
    Value,
    Postdata,
    Boolean,
    Timestamp,
}

/// An exported value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportValue {
    Text(String),
    Int(i64),
    Bool(bool),
    List(Vec<String>),
    /// Ordered handle to value pairs.
    Map(Vec<(String, String)>),
}

impl ExportValue {
    /// JSON form, suitable as raw input for a matching import.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Text(s) => Value::String(s.clone()),
            Self::Int(i) => Value::from(*i),
            Self::Bool(b) => Value::Bool(*b),
            Self::List(items) => Value::Array(items.iter().cloned().map(Value::String).collect()),
            Self::Map(pairs) => Value::Object(
                pairs
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect(),
            ),
        }
    }
}

impl From<ExportValue> for Value {
    fn from(value: ExportValue) -> Self {
        value.to_json()
    }
}
