//! Helpers for reading raw (posted) input.
//!
//! Raw input is a JSON value as it arrives from a form or an import: usually
//! a string, sometimes a number, boolean or array of those.

use serde_json::Value;

/// True for null, blank strings and arrays holding only blanks.
pub fn is_empty(raw: &Value) -> bool {
    match raw {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.iter().all(is_empty),
        _ => false,
    }
}

/// A scalar rendered as text. Arrays yield their first scalar.
pub fn to_text(raw: &Value) -> Option<String> {
    match raw {
        Value::Null | Value::Object(_) => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(if *b { "yes" } else { "no" }.to_string()),
        Value::Array(items) => items.iter().find_map(to_text),
    }
}

/// Every non-blank scalar, in order.
pub fn to_texts(raw: &Value) -> Vec<String> {
    match raw {
        Value::Array(items) => items
            .iter()
            .filter_map(to_text)
            .filter(|s| !s.trim().is_empty())
            .collect(),
        other => to_text(other)
            .filter(|s| !s.trim().is_empty())
            .into_iter()
            .collect(),
    }
}

/// Splits comma-separated text (or every element of an array) into trimmed,
/// non-empty parts.
pub fn split_list(raw: &Value) -> Vec<String> {
    to_texts(raw)
        .iter()
        .flat_map(|s| s.split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Removes later duplicates, keeping first occurrences in order.
pub fn dedupe(values: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    values.into_iter().filter(|v| seen.insert(v.clone())).collect()
}

/// Escapes text for inclusion in HTML.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}
