use pretty_assertions::assert_eq;
use quire_model::{
    AuthorField, CheckboxField, DateField, ExportMode, ExportValue, Field, FieldContext,
    FieldDataStore, FieldKind, FieldStatus, ImportMode, InputField, Record, SelectField, StoreResult,
    TagListField, TextFormatter, TextareaField, UploadField,
};
use quire_types::{AuthorId, EntryId, FieldData, FieldId, FieldValue};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::collections::BTreeMap;

/// In-memory stand-in for persisted field data: field -> entry -> rows.
#[derive(Default)]
struct MemoryStore {
    rows: RefCell<BTreeMap<FieldId, BTreeMap<EntryId, Vec<BTreeMap<String, String>>>>>,
}

impl MemoryStore {
    fn put(&self, field: FieldId, entry: EntryId, column: &str, value: &str) {
        let mut row = BTreeMap::new();
        row.insert(column.to_string(), value.to_string());
        self.rows
            .borrow_mut()
            .entry(field)
            .or_default()
            .entry(entry)
            .or_default()
            .push(row);
    }
}

impl FieldDataStore for MemoryStore {
    fn delete_entry_data(&self, field_id: FieldId, entry_ids: &[EntryId]) -> StoreResult<usize> {
        let mut rows = self.rows.borrow_mut();
        let Some(by_entry) = rows.get_mut(&field_id) else {
            return Ok(0);
        };
        Ok(entry_ids
            .iter()
            .filter_map(|id| by_entry.remove(id))
            .map(|r| r.len())
            .sum())
    }

    fn count_entries_matching(
        &self,
        field_id: FieldId,
        column: &str,
        values: &[FieldValue],
        exclude: Option<EntryId>,
    ) -> StoreResult<usize> {
        let wanted: Vec<String> = values.iter().map(ToString::to_string).collect();
        let rows = self.rows.borrow();
        Ok(rows
            .get(&field_id)
            .map(|by_entry| {
                by_entry
                    .iter()
                    .filter(|(id, _)| Some(**id) != exclude)
                    .filter(|(_, rows)| {
                        rows.iter()
                            .any(|r| r.get(column).is_some_and(|v| wanted.contains(v)))
                    })
                    .count()
            })
            .unwrap_or(0))
    }

    fn distinct_values(&self, field_id: FieldId, column: &str) -> StoreResult<Vec<String>> {
        let rows = self.rows.borrow();
        let mut values: Vec<String> = rows
            .get(&field_id)
            .into_iter()
            .flat_map(|by_entry| by_entry.values().flatten())
            .filter_map(|r| r.get(column).cloned())
            .collect();
        values.sort();
        values.dedup();
        Ok(values)
    }
}

struct Row(FieldData);

impl Record for Row {
    fn record_id(&self) -> Option<EntryId> {
        None
    }

    fn field_data(&self, _field_id: FieldId) -> Option<&FieldData> {
        Some(&self.0)
    }
}

fn saved(mut field: Field, id: i64) -> Field {
    field.set_id(FieldId::new(id));
    field
}

fn ctx() -> FieldContext<'static> {
    FieldContext::detached()
}

// ── Input ───────────────────────────────────────────────────────

#[test]
fn input_normalizes_value_and_handle() {
    let field = Field::new("Title", InputField::new());
    let data = field.process_raw_field_data(&json!("Hello World"), &ctx()).unwrap();
    assert_eq!(
        data,
        FieldData::new().with("value", "Hello World").with("handle", "hello-world")
    );
}

#[test]
fn input_required_and_empty() {
    let field = Field::new("Title", InputField::new()).required(true);
    let err = field.process_raw_field_data(&Value::Null, &ctx()).unwrap_err();
    assert_eq!(err.status, FieldStatus::MissingRequired);
    assert_eq!(err.message, "'Title' is a required field.");

    let optional = Field::new("Title", InputField::new());
    assert!(optional.process_raw_field_data(&json!("  "), &ctx()).unwrap().is_empty());
}

#[test]
fn input_validator_rejects_mismatch() {
    let field = Field::new("Code", InputField::with_validator("/^[a-z]+$/i").unwrap());
    assert!(field.check_post_field_data(&json!("Abc"), &ctx()).is_ok());
    let err = field.check_post_field_data(&json!("abc1"), &ctx()).unwrap_err();
    assert_eq!(err.status, FieldStatus::InvalidData);
    assert_eq!(err.message, "'Code' contains invalid data. Please check the contents.");
}

#[test]
fn input_rejects_overlong_values() {
    let field = Field::new("Title", InputField::new());
    let err = field.check_post_field_data(&json!("x".repeat(256)), &ctx()).unwrap_err();
    assert_eq!(err.status, FieldStatus::InvalidData);
}

#[test]
fn input_exports() {
    let field = Field::new("Title", InputField::new());
    let data = FieldData::new().with("value", "Fish & Chips").with("handle", "fish-chips");
    assert_eq!(
        field.prepare_export_value(&data, ExportMode::Handle, None),
        Some(ExportValue::Text("fish-chips".into()))
    );
    assert_eq!(
        field.prepare_export_value(&data, ExportMode::Formatted, None),
        Some(ExportValue::Text("Fish &amp; Chips".into()))
    );
    assert_eq!(field.prepare_export_value(&data, ExportMode::Timestamp, None), None);
}

// ── Textarea ────────────────────────────────────────────────────

#[test]
fn textarea_formats_paragraphs() {
    let kind = TextareaField {
        size: 10,
        formatter: TextFormatter::Paragraphs,
    };
    let field = Field::new("Body", kind);
    let data = field.process_raw_field_data(&json!("First\n\nSecond"), &ctx()).unwrap();
    assert_eq!(data.text("value"), Some("First\n\nSecond"));
    assert_eq!(data.text("value_formatted"), Some("<p>First</p>\n<p>Second</p>"));
}

#[test]
fn textarea_does_not_group() {
    let field = saved(Field::new("Body", TextareaField::default()), 1);
    let records: Vec<Row> = vec![Row(FieldData::new().with("value", "x"))];
    assert!(field.group_records(&records).is_err());
}

// ── Checkbox ────────────────────────────────────────────────────

#[test]
fn checkbox_states() {
    let field = Field::new("Published", CheckboxField::new(false));
    for (raw, expected) in [
        (json!("yes"), "yes"),
        (json!("on"), "yes"),
        (json!(true), "yes"),
        (json!("no"), "no"),
        (Value::Null, "no"),
        (json!(false), "no"),
    ] {
        let data = field.process_raw_field_data(&raw, &ctx()).unwrap();
        assert_eq!(data.text("value"), Some(expected), "raw {raw}");
    }
    let err = field.process_raw_field_data(&json!("maybe"), &ctx()).unwrap_err();
    assert_eq!(err.status, FieldStatus::InvalidData);
}

#[test]
fn checkbox_default_state_feeds_default_input() {
    let on = Field::new("Featured", CheckboxField::new(true));
    let off = Field::new("Featured", CheckboxField::new(false));
    assert_eq!(on.default_raw_input(&ctx()), json!("yes"));
    assert_eq!(off.default_raw_input(&ctx()), json!("no"));
}

#[test]
fn required_checkbox_must_be_checked() {
    let field = Field::new("Agree", CheckboxField::new(false)).required(true);
    let err = field.check_post_field_data(&json!("no"), &ctx()).unwrap_err();
    assert_eq!(err.status, FieldStatus::MissingRequired);
    assert!(field.check_post_field_data(&json!("yes"), &ctx()).is_ok());
}

#[test]
fn checkbox_toggles() {
    let field = Field::new("Published", CheckboxField::new(false));
    assert!(field.behavior().can_toggle());
    let states = field.toggle_states(&ctx()).unwrap();
    assert_eq!(states.len(), 2);
    let data = FieldData::new().with("value", "no");
    assert_eq!(field.toggle_field_data(&data, "yes").text("value"), Some("yes"));
    assert_eq!(field.toggle_field_data(&data, "bogus"), data);
}

#[test]
fn checkbox_imports_booleans() {
    let field = Field::new("Published", CheckboxField::new(false));
    let data = field.prepare_import_value(&json!(true), ImportMode::Boolean, &ctx()).unwrap();
    assert_eq!(data.text("value"), Some("yes"));
    assert_eq!(
        field.prepare_export_value(&data, ExportMode::Boolean, None),
        Some(ExportValue::Bool(true))
    );
}

// ── Select ──────────────────────────────────────────────────────

#[test]
fn single_select_rejects_multiple_values() {
    let field = Field::new("Colour", SelectField::with_options(["Red", "Blue"]));
    let err = field.check_post_field_data(&json!(["Red", "Blue"]), &ctx()).unwrap_err();
    assert_eq!(err.status, FieldStatus::InvalidData);
    assert!(field.check_post_field_data(&json!(["Red", "Red"]), &ctx()).is_ok());
}

#[test]
fn multi_select_stores_one_row_per_value() {
    let field = Field::new("Colours", SelectField::with_options(["Red", "Sky Blue"]).multiple(true));
    let data = field
        .process_raw_field_data(&json!(["Red", "Sky Blue", "Red"]), &ctx())
        .unwrap();
    assert_eq!(data.row_count(), 2);
    assert_eq!(data.texts("handle"), vec!["red", "sky-blue"]);
    assert!(field.behavior().requires_sql_grouping());
    assert!(!field.behavior().can_toggle());
    assert_eq!(
        field.prepare_export_value(&data, ExportMode::ListHandleToValue, None),
        Some(ExportValue::Map(vec![
            ("red".into(), "Red".into()),
            ("sky-blue".into(), "Sky Blue".into())
        ]))
    );
}

#[test]
fn select_options_merge_dynamic_values() {
    let store = MemoryStore::default();
    store.put(FieldId::new(7), EntryId::new(1), "value", "Zebra");
    store.put(FieldId::new(7), EntryId::new(2), "value", "Apple");
    let mut kind = SelectField::with_options(["Mango", "Apple"]);
    kind.dynamic_options = Some(FieldId::new(7));
    kind.sort_options = true;
    let field = Field::new("Fruit", kind);
    let ctx = FieldContext::new(&store);
    assert_eq!(field.suggestions(&ctx).unwrap(), vec!["Apple", "Mango", "Zebra"]);
    assert_eq!(field.behavior().association_source(), Some(FieldId::new(7)));
}

#[test]
fn select_counts_associated_entries() {
    let store = MemoryStore::default();
    let child = saved(Field::new("Category", SelectField::from_field(FieldId::new(1))), 2);
    store.put(FieldId::new(2), EntryId::new(10), "value", "News");
    store.put(FieldId::new(2), EntryId::new(11), "value", "News");
    store.put(FieldId::new(2), EntryId::new(12), "value", "Sport");
    let parent_data = FieldData::new().with("value", "News").with("handle", "news");
    let count = child
        .fetch_associated_entry_count(&parent_data, &FieldContext::new(&store))
        .unwrap();
    assert_eq!(count, 2);
}

#[test]
fn select_value_import_splits_commas() {
    let field = Field::new("Colours", SelectField::with_options(["a", "b"]).multiple(true));
    let data = field.prepare_import_value(&json!("a, b"), ImportMode::Value, &ctx()).unwrap();
    assert_eq!(data.texts("value"), vec!["a", "b"]);
}

// ── Author ──────────────────────────────────────────────────────

#[test]
fn author_defaults_to_current_user() {
    let kind = AuthorField {
        allow_multiple_selection: false,
        default_to_current_user: true,
    };
    let field = Field::new("Author", kind);
    let ctx = ctx().with_author(Some(AuthorId::new(3)));
    let raw = field.default_raw_input(&ctx);
    let data = field.process_raw_field_data(&raw, &ctx).unwrap();
    assert_eq!(data.values("author_id"), vec![&FieldValue::Int(3)]);
}

#[test]
fn author_rejects_non_ids() {
    let field = Field::new("Author", AuthorField::default());
    let err = field.check_post_field_data(&json!("bob"), &ctx()).unwrap_err();
    assert_eq!(err.status, FieldStatus::InvalidData);
    let err = field.check_post_field_data(&json!([1, 2]), &ctx()).unwrap_err();
    assert_eq!(err.status, FieldStatus::InvalidData);
}

#[test]
fn author_sorting_depends_on_multiplicity() {
    let single = Field::new("Author", AuthorField::default());
    let multi = Field::new(
        "Authors",
        AuthorField {
            allow_multiple_selection: true,
            default_to_current_user: false,
        },
    );
    assert_eq!(single.sort_column(), Some("author_id"));
    assert_eq!(multi.sort_column(), None);
    assert!(multi.behavior().requires_sql_grouping());
}

// ── Date ────────────────────────────────────────────────────────

#[test]
fn date_stores_rfc3339_and_utc_columns() {
    let field = Field::new("Published", DateField::default());
    let data = field
        .process_raw_field_data(&json!("2024-03-01T14:30:00+02:00"), &ctx())
        .unwrap();
    assert_eq!(data.text("value"), Some("2024-03-01T12:30:00+00:00"));
    assert_eq!(data.text("date"), Some("2024-03-01 12:30:00"));
    assert_eq!(
        field.prepare_export_value(&data, ExportMode::Timestamp, None),
        Some(ExportValue::Int(1_709_296_200))
    );
}

#[test]
fn date_pre_populates_now() {
    use chrono::{TimeZone, Utc};
    let kind = DateField {
        pre_populate: true,
        time: true,
    };
    let field = Field::new("Published", kind);
    let now = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
    let ctx = ctx().at(now);
    let data = field
        .process_raw_field_data(&field.default_raw_input(&ctx), &ctx)
        .unwrap();
    assert_eq!(data.text("date"), Some("2025-01-02 03:04:05"));
}

#[test]
fn date_rejects_garbage() {
    let field = Field::new("Published", DateField::default());
    let err = field.check_post_field_data(&json!("not a date"), &ctx()).unwrap_err();
    assert_eq!(err.status, FieldStatus::InvalidData);
    assert_eq!(err.message, "The date specified in 'Published' is invalid.");
}

#[test]
fn date_rejects_years_the_column_cannot_hold() {
    let field = Field::new("Published", DateField::default());
    for raw in [json!("253402300800"), json!(253402300800_i64), json!("-62167219201")] {
        let err = field.check_post_field_data(&raw, &ctx()).unwrap_err();
        assert_eq!(err.status, FieldStatus::InvalidData);
    }
    let data = field
        .process_raw_field_data(&json!("9999-12-31 23:59:59"), &ctx())
        .unwrap();
    assert_eq!(data.text("date"), Some("9999-12-31 23:59:59"));
}

// ── Tag list ────────────────────────────────────────────────────

#[test]
fn taglist_splits_and_dedupes() {
    let field = Field::new("Tags", TagListField::default());
    let data = field
        .process_raw_field_data(&json!("Rust, Web Dev, rust, Rust"), &ctx())
        .unwrap();
    assert_eq!(data.texts("value"), vec!["Rust", "Web Dev", "rust"]);
    assert_eq!(data.texts("handle"), vec!["rust", "web-dev", "rust"]);
    assert_eq!(
        field.prepare_export_value(&data, ExportMode::Postdata, None),
        Some(ExportValue::Text("Rust, Web Dev, rust".into()))
    );
}

#[test]
fn taglist_validator_names_the_bad_tag() {
    let field = Field::new("Tags", TagListField::with_validator(r"^\w+$").unwrap());
    let err = field.check_post_field_data(&json!("ok, not ok"), &ctx()).unwrap_err();
    assert_eq!(err.message, "'Tags' contains an invalid tag: 'not ok'.");
}

#[test]
fn taglist_suggests_existing_tags() {
    let store = MemoryStore::default();
    store.put(FieldId::new(4), EntryId::new(1), "value", "beta");
    store.put(FieldId::new(4), EntryId::new(2), "value", "alpha");
    let field = saved(Field::new("Tags", TagListField::default()), 4);
    assert_eq!(
        field.suggestions(&FieldContext::new(&store)).unwrap(),
        vec!["alpha", "beta"]
    );
}

// ── Upload ──────────────────────────────────────────────────────

#[test]
fn upload_reads_file_metadata() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("photo.PNG"), b"12345").unwrap();
    let field = Field::new("Image", UploadField::new(dir.path()));
    let data = field.process_raw_field_data(&json!("photo.PNG"), &ctx()).unwrap();
    assert_eq!(data.text("file"), Some("photo.PNG"));
    assert_eq!(data.first("size"), Some(&FieldValue::Int(5)));
    assert_eq!(data.text("mimetype"), Some("image/png"));
}

#[test]
fn upload_rejects_missing_and_escaping_paths() {
    let dir = tempfile::tempdir().unwrap();
    let field = Field::new("Image", UploadField::new(dir.path()));
    let err = field.check_post_field_data(&json!("absent.png"), &ctx()).unwrap_err();
    assert_eq!(err.status, FieldStatus::InvalidData);
    let err = field.check_post_field_data(&json!("../etc/passwd"), &ctx()).unwrap_err();
    assert_eq!(err.status, FieldStatus::InvalidData);
}

#[test]
fn upload_rejects_paths_longer_than_the_column() {
    let dir = tempfile::tempdir().unwrap();
    let field = Field::new("Image", UploadField::new(dir.path()));
    let name = format!("{}.png", "a".repeat(252));
    let err = field.check_post_field_data(&json!(name), &ctx()).unwrap_err();
    assert_eq!(err.status, FieldStatus::InvalidData);
    assert_eq!(err.message, "'Image' must be no longer than 255 characters.");
}

#[test]
fn upload_detects_duplicates_in_other_entries() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), b"a").unwrap();
    let store = MemoryStore::default();
    store.put(FieldId::new(9), EntryId::new(1), "file", "a.txt");
    let field = saved(Field::new("File", UploadField::new(dir.path())), 9);

    let other = FieldContext::new(&store).with_entry(Some(EntryId::new(2)));
    let err = field.check_post_field_data(&json!("a.txt"), &other).unwrap_err();
    assert_eq!(err.status, FieldStatus::Duplicate);

    let same = FieldContext::new(&store).with_entry(Some(EntryId::new(1)));
    assert!(field.check_post_field_data(&json!("a.txt"), &same).is_ok());
}

#[test]
fn upload_cleanup_removes_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gone.txt");
    std::fs::write(&path, b"x").unwrap();
    let store = MemoryStore::default();
    store.put(FieldId::new(3), EntryId::new(1), "file", "gone.txt");
    let field = saved(Field::new("File", UploadField::new(dir.path())), 3);
    assert!(field.behavior().requires_data_for_cleanup());

    let data = FieldData::new().with("file", "gone.txt");
    field
        .entry_data_cleanup(&store, &[EntryId::new(1)], Some(&data))
        .unwrap();
    assert!(!path.exists());
    assert_eq!(store.distinct_values(FieldId::new(3), "file").unwrap(), Vec::<String>::new());
}

// ── Settings ────────────────────────────────────────────────────

#[test]
fn field_settings_roundtrip_through_the_bag() {
    let mut field = Field::new("Code", InputField::with_validator(r"^\d+$").unwrap()).required(true);
    let mut settings = field.settings();
    assert_eq!(settings.text("validator"), r"^\d+$");
    assert!(settings.bool("required"));

    assert!(settings.set("location", "sidebar"));
    assert!(!settings.set("location", "footer"));
    assert!(settings.set("validator", "/^[a-z]+$/"));
    field.apply_settings(&settings).unwrap();

    assert_eq!(field.info().location, quire_model::Location::Sidebar);
    let FieldKind::Input(input) = field.kind() else {
        panic!("kind changed");
    };
    assert_eq!(input.validator().map(|v| v.source()), Some("/^[a-z]+$/"));
}

#[test]
fn apply_settings_rejects_bad_pattern_and_keeps_field() {
    let mut field = Field::new("Code", InputField::new());
    let mut settings = field.settings();
    settings.set("validator", "(unclosed");
    settings.set("label", "Changed");
    assert!(field.apply_settings(&settings).is_err());
    assert_eq!(field.label(), "Code");
}
