//! Grouping of entry records by a field's value.
//!
//! A field that supports grouping maps each record's data to a path of group
//! keys (one level for most variants, year/month/day for dates). Records are
//! bucketed along their paths and only ever sit at the leaves, so every input
//! record lands in exactly one bucket.

use quire_types::{EntryId, FieldData, FieldId};
use std::collections::BTreeMap;
use thiserror::Error;

/// Anything carrying per-field data that can be grouped.
pub trait Record {
    fn record_id(&self) -> Option<EntryId>;
    fn field_data(&self, field_id: FieldId) -> Option<&FieldData>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GroupingError {
    #[error("field type '{0}' does not support grouping")]
    Unsupported(&'static str),

    #[error("field has not been saved")]
    Unsaved,
}

/// One level of a group path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupLevel {
    pub key: String,
    pub attributes: BTreeMap<String, String>,
}

impl GroupLevel {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            attributes: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn attribute(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }
}

/// A bucket of records, possibly with nested buckets.
#[derive(Debug)]
pub struct RecordGroup<'a, R> {
    pub key: String,
    pub attributes: BTreeMap<String, String>,
    pub records: Vec<&'a R>,
    pub groups: Vec<RecordGroup<'a, R>>,
}

impl<'a, R> RecordGroup<'a, R> {
    fn new(level: GroupLevel) -> Self {
        Self {
            key: level.key,
            attributes: level.attributes,
            records: Vec::new(),
            groups: Vec::new(),
        }
    }

    /// Every record in this bucket and below it.
    pub fn all_records(&self) -> Vec<&'a R> {
        let mut out = self.records.clone();
        for group in &self.groups {
            out.extend(group.all_records());
        }
        out
    }
}

/// Places records into buckets along their paths, preserving first-seen
/// order of keys at every level.
pub(crate) fn bucket<'a, R>(
    records: impl IntoIterator<Item = (&'a R, Vec<GroupLevel>)>,
) -> Vec<RecordGroup<'a, R>> {
    let mut roots = Vec::new();
    for (record, path) in records {
        insert(&mut roots, record, path);
    }
    roots
}

fn insert<'a, R>(groups: &mut Vec<RecordGroup<'a, R>>, record: &'a R, mut path: Vec<GroupLevel>) {
    if path.is_empty() {
        path.push(GroupLevel::new(""));
    }
    let level = path.remove(0);
    let index = match groups.iter().position(|g| g.key == level.key) {
        Some(i) => i,
        None => {
            groups.push(RecordGroup::new(level));
            groups.len() - 1
        }
    };
    let group = &mut groups[index];
    if path.is_empty() {
        group.records.push(record);
    } else {
        insert(&mut group.groups, record, path);
    }
}
