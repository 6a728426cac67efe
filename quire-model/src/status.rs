//! Outcome codes of field-level checks.
//!
//! Field checks never panic and never raise storage errors; every terminal
//! state other than `Ok` is a [`FieldError`] carrying a message a person can
//! read next to the offending input.

use quire_types::FieldId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Terminal state of one field check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldStatus {
    Ok,
    MissingRequired,
    InvalidData,
    Duplicate,
    /// Variant-specific rejection.
    Custom,
    /// The check itself could not run (e.g. a lookup failed).
    Internal,
}

/// A failed field check.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct FieldError {
    pub status: FieldStatus,
    pub message: String,
}

impl FieldError {
    pub fn new(status: FieldStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn missing_required(label: &str) -> Self {
        Self::new(
            FieldStatus::MissingRequired,
            format!("'{label}' is a required field."),
        )
    }

    pub fn invalid(label: &str) -> Self {
        Self::new(
            FieldStatus::InvalidData,
            format!("'{label}' contains invalid data. Please check the contents."),
        )
    }

    pub fn invalid_with(message: impl Into<String>) -> Self {
        Self::new(FieldStatus::InvalidData, message)
    }

    pub fn duplicate(message: impl Into<String>) -> Self {
        Self::new(FieldStatus::Duplicate, message)
    }

    pub fn custom(message: impl Into<String>) -> Self {
        Self::new(FieldStatus::Custom, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(FieldStatus::Internal, message)
    }
}

/// Result of a field check or transform.
pub type FieldResult<T> = Result<T, FieldError>;

/// Errors collected across all fields of one submission, keyed by field.
pub type FieldErrors = BTreeMap<FieldId, FieldError>;

/// Status code of a check result.
pub fn status_of<T>(result: &FieldResult<T>) -> FieldStatus {
    match result {
        Ok(_) => FieldStatus::Ok,
        Err(e) => e.status,
    }
}
