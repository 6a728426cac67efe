#![allow(dead_code)]

use quire_model::{CheckboxField, Field, InputField, Section};
use quire_storage::{ContentStore, Entry, EngineConfig};
use quire_types::{FieldId, SectionId};
use serde_json::{Map, Value};

/// Routes engine logs to the test harness; `RUST_LOG=quire_storage=debug`
/// shows them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn store() -> ContentStore {
    store_with(EngineConfig::default())
}

pub fn store_with(config: EngineConfig) -> ContentStore {
    init_tracing();
    ContentStore::open(config).unwrap()
}

/// `articles`: a required `title` input and a `published` checkbox that
/// defaults to off.
pub fn articles(store: &ContentStore) -> Section {
    let mut section = Section::new("Articles")
        .with_field(Field::new("Title", InputField::new()).required(true))
        .with_field(Field::new("Published", CheckboxField::new(false)));
    store.sections().add(&mut section).unwrap();
    section
}

pub fn field_id(section: &Section, element_name: &str) -> FieldId {
    section.field_by_element_name(element_name).and_then(Field::id).unwrap()
}

pub fn post(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("payload must be an object, got {other}"),
    }
}

/// Creates and commits an entry from a payload every field accepts.
pub fn create(store: &ContentStore, section: &Section, payload: Value) -> Entry {
    let entries = store.entries();
    let mut entry = Entry::new(section_id(section));
    let errors = entry
        .set_data_from_post(&entries, section, &post(payload), false)
        .unwrap();
    assert!(errors.is_empty(), "unexpected field errors: {errors:?}");
    entry.commit(&entries, section).unwrap();
    entry
}

pub fn section_id(section: &Section) -> SectionId {
    section.id.unwrap()
}
