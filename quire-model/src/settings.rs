//! The settings store: a typed key/value bag with declared keys, kinds,
//! allowed values and defaults.
//!
//! The bag is the form and persistence format for section and field
//! configuration. Assignments are best-effort: a value of the wrong kind or
//! outside the allowed set is ignored and the previous value stays, so a
//! partially filled form never corrupts what was already there. Behavior
//! never runs on the bag directly; each field variant converts it into a
//! strongly typed configuration through [`FieldConfig`], and that conversion
//! is strict.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Errors building typed configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unknown field type: {0}")]
    UnknownFieldType(String),

    #[error("invalid setting '{key}': {reason}")]
    InvalidSetting { key: String, reason: String },
}

impl ConfigError {
    pub fn invalid(key: &str, reason: impl Into<String>) -> Self {
        Self::InvalidSetting {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// Kind of value a setting holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKind {
    Bool,
    Int,
    Text,
    /// Comma-separated list of strings.
    List,
    /// One of a fixed set of strings.
    Choice(&'static [&'static str]),
}

/// Declaration of one setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingSpec {
    pub key: &'static str,
    pub kind: SettingKind,
    /// Default in persisted (raw text) form.
    pub default: &'static str,
}

impl SettingSpec {
    pub const fn new(key: &'static str, kind: SettingKind, default: &'static str) -> Self {
        Self { key, kind, default }
    }

    /// Parses persisted text for this setting. `None` if it is not acceptable.
    pub fn parse(&self, raw: &str) -> Option<SettingValue> {
        match self.kind {
            SettingKind::Bool => parse_bool(raw).map(SettingValue::Bool),
            SettingKind::Int => raw.trim().parse().ok().map(SettingValue::Int),
            SettingKind::Text => Some(SettingValue::Text(raw.to_string())),
            SettingKind::List => Some(SettingValue::List(split_list(raw))),
            SettingKind::Choice(allowed) => allowed
                .contains(&raw.trim())
                .then(|| SettingValue::Text(raw.trim().to_string())),
        }
    }

    fn accepts(&self, value: &SettingValue) -> bool {
        match (self.kind, value) {
            (SettingKind::Bool, SettingValue::Bool(_))
            | (SettingKind::Int, SettingValue::Int(_))
            | (SettingKind::Text, SettingValue::Text(_))
            | (SettingKind::List, SettingValue::List(_)) => true,
            (SettingKind::Choice(allowed), SettingValue::Text(s)) => allowed.contains(&s.as_str()),
            _ => false,
        }
    }

    fn default_value(&self) -> SettingValue {
        self.parse(self.default).unwrap_or(match self.kind {
            SettingKind::Bool => SettingValue::Bool(false),
            SettingKind::Int => SettingValue::Int(0),
            SettingKind::List => SettingValue::List(Vec::new()),
            SettingKind::Text | SettingKind::Choice(_) => SettingValue::Text(String::new()),
        })
    }
}

/// A setting value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Text(String),
    List(Vec<String>),
}

impl SettingValue {
    /// Persisted text form: `yes`/`no` for booleans, comma-joined lists with
    /// `\,` and `\\` escaping commas and backslashes inside items.
    pub fn to_raw(&self) -> String {
        match self {
            Self::Bool(b) => if *b { "yes" } else { "no" }.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Text(s) => s.clone(),
            Self::List(items) => items
                .iter()
                .map(|item| item.replace('\\', "\\\\").replace(',', "\\,"))
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<String>> for SettingValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

/// A bag of declared settings, every key always holding a valid value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    specs: Vec<&'static SettingSpec>,
    values: BTreeMap<&'static str, SettingValue>,
}

impl Settings {
    /// Creates a bag holding the defaults of the given declarations.
    pub fn new(specs: impl IntoIterator<Item = &'static SettingSpec>) -> Self {
        let specs: Vec<&'static SettingSpec> = specs.into_iter().collect();
        let values = specs.iter().map(|s| (s.key, s.default_value())).collect();
        Self { specs, values }
    }

    /// Declarations, in declaration order.
    pub fn specs(&self) -> impl Iterator<Item = &'static SettingSpec> + '_ {
        self.specs.iter().copied()
    }

    fn spec(&self, key: &str) -> Option<&'static SettingSpec> {
        self.specs.iter().copied().find(|s| s.key == key)
    }

    /// Assigns a value. Returns false (keeping the prior value) when the key
    /// is undeclared or the value is not acceptable.
    pub fn set(&mut self, key: &str, value: impl Into<SettingValue>) -> bool {
        let value = value.into();
        match self.spec(key) {
            Some(spec) if spec.accepts(&value) => {
                self.values.insert(spec.key, value);
                true
            }
            _ => {
                debug!(key, ?value, "Ignoring invalid setting assignment");
                false
            }
        }
    }

    /// Assigns a value from its persisted text form, with the same
    /// best-effort semantics as [`Settings::set`].
    pub fn set_raw(&mut self, key: &str, raw: &str) -> bool {
        match self.spec(key).and_then(|spec| spec.parse(raw).map(|v| (spec, v))) {
            Some((spec, value)) => {
                self.values.insert(spec.key, value);
                true
            }
            None => {
                debug!(key, raw, "Ignoring invalid setting assignment");
                false
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        self.values.get(key)
    }

    /// Boolean setting; false when undeclared.
    pub fn bool(&self, key: &str) -> bool {
        matches!(self.values.get(key), Some(SettingValue::Bool(true)))
    }

    /// Integer setting; 0 when undeclared.
    pub fn int(&self, key: &str) -> i64 {
        match self.values.get(key) {
            Some(SettingValue::Int(i)) => *i,
            _ => 0,
        }
    }

    /// Text or choice setting; empty when undeclared.
    pub fn text(&self, key: &str) -> &str {
        match self.values.get(key) {
            Some(SettingValue::Text(s)) => s,
            _ => "",
        }
    }

    /// List setting; empty when undeclared.
    pub fn list(&self, key: &str) -> &[String] {
        match self.values.get(key) {
            Some(SettingValue::List(items)) => items,
            _ => &[],
        }
    }

    /// Every setting in persisted text form, in declaration order.
    pub fn to_raw_pairs(&self) -> Vec<(&'static str, String)> {
        self.specs
            .iter()
            .map(|s| {
                let raw = self.values.get(s.key).map(SettingValue::to_raw).unwrap_or_default();
                (s.key, raw)
            })
            .collect()
    }
}

/// Strongly typed configuration of one field variant.
pub trait FieldConfig: Sized {
    /// Type handle under which the variant is registered.
    const HANDLE: &'static str;
    /// Human-readable type name.
    const NAME: &'static str;
    /// Declared settings.
    const SETTINGS: &'static [SettingSpec];

    /// Builds the configuration. Fails when a value, though well-formed for
    /// the bag, cannot drive behavior (e.g. an uncompilable pattern).
    fn from_settings(settings: &Settings) -> Result<Self, ConfigError>;

    /// Writes the configuration back into a bag.
    fn to_settings(&self) -> Settings;

    /// The configuration built from defaults.
    fn default_settings() -> Settings {
        Settings::new(Self::SETTINGS)
    }
}

/// Parses the boolean spellings accepted in settings and posted data.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "yes" | "on" | "true" | "1" => Some(true),
        "no" | "off" | "false" | "0" => Some(false),
        _ => None,
    }
}

/// Splits a persisted list on unescaped commas. Items are trimmed and
/// blanks dropped.
fn split_list(raw: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => current.push(chars.next().unwrap_or('\\')),
            ',' => items.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    items.push(current);
    items
        .iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
