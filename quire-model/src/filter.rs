//! Filter requests and the SQL predicates fields build from them.
//!
//! A filter arrives as a list of strings. A `not:` prefix on the first value
//! negates the whole filter; a `regexp:` (or `not-regexp:`) prefix switches it
//! to pattern matching. Predicates reference the field's data table as `t`;
//! the query layer wraps them in `EXISTS` subqueries correlated on the entry.

use quire_types::FieldValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Equals,
    Regexp,
}

/// A parsed filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterRequest {
    pub negated: bool,
    pub mode: FilterMode,
    pub values: Vec<String>,
}

impl FilterRequest {
    pub fn parse<S: AsRef<str>>(raw: &[S]) -> Self {
        let mut values: Vec<String> = raw.iter().map(|s| s.as_ref().trim().to_string()).collect();
        let mut negated = false;
        let mut mode = FilterMode::Equals;
        if let Some(first) = values.first_mut() {
            let (prefix_negated, prefix_mode, rest) = if let Some(rest) = first.strip_prefix("not-regexp:") {
                (true, FilterMode::Regexp, rest)
            } else if let Some(rest) = first.strip_prefix("regexp:") {
                (false, FilterMode::Regexp, rest)
            } else if let Some(rest) = first.strip_prefix("not:") {
                (true, FilterMode::Equals, rest)
            } else {
                (false, FilterMode::Equals, first.as_str())
            };
            negated = prefix_negated;
            mode = prefix_mode;
            *first = rest.trim().to_string();
        }
        values.retain(|v| !v.is_empty());
        Self {
            negated,
            mode,
            values,
        }
    }
}

/// One SQL predicate over the field's data table (aliased `t`).
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub sql: String,
    pub params: Vec<FieldValue>,
}

impl Predicate {
    pub fn new(sql: impl Into<String>, params: Vec<FieldValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// A predicate no row satisfies.
    pub fn never() -> Self {
        Self::new("0", Vec::new())
    }

    /// `t.a <op> ? OR t.b <op> ?` with the value bound once per column.
    pub fn any_column(columns: &[&str], op: &str, value: &str) -> Self {
        let sql = columns
            .iter()
            .map(|c| format!("t.\"{c}\" {op} ?"))
            .collect::<Vec<_>>()
            .join(" OR ");
        let params = columns.iter().map(|_| FieldValue::from(value)).collect();
        Self::new(sql, params)
    }
}

/// A filter compiled by a field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub negated: bool,
    /// Each predicate must be met by some row (`+` joined values) rather than
    /// any one of them (`,` joined values).
    pub and_mode: bool,
    pub predicates: Vec<Predicate>,
}
