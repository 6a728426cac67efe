use proptest::prelude::*;
use quire_model::{
    CheckboxField, DateField, ExportMode, Field, FieldContext, FieldKind, ImportMode, InputField,
    Record, RecordGroup, SelectField, TagListField, TextareaField,
};
use quire_types::{EntryId, FieldData, FieldId};
use serde_json::Value;

struct Row {
    id: EntryId,
    data: Option<FieldData>,
}

impl Record for Row {
    fn record_id(&self) -> Option<EntryId> {
        Some(self.id)
    }

    fn field_data(&self, _field_id: FieldId) -> Option<&FieldData> {
        self.data.as_ref()
    }
}

fn saved(kind: impl Into<FieldKind>) -> Field {
    let mut field = Field::new("Subject", kind);
    field.set_id(FieldId::new(1));
    field
}

/// Exports in postdata form and imports the result again.
fn reimport(field: &Field, data: &FieldData) -> FieldData {
    let ctx = FieldContext::detached();
    let exported = field
        .prepare_export_value(data, ExportMode::Postdata, None)
        .map(Value::from)
        .unwrap_or(Value::Null);
    field
        .prepare_import_value(&exported, ImportMode::Postdata, &ctx)
        .unwrap()
}

fn leaf_ids(groups: &[RecordGroup<'_, Row>]) -> Vec<i64> {
    groups
        .iter()
        .flat_map(|g| g.all_records())
        .map(|r| r.id.get())
        .collect()
}

mod roundtrip_properties {
    use super::*;

    proptest! {
        #[test]
        fn input_roundtrips(value in "[A-Za-z0-9 ,.!?-]{1,255}") {
            let field = saved(InputField::new());
            let data = field.process_raw_field_data(&Value::String(value), &FieldContext::detached()).unwrap();
            prop_assert_eq!(reimport(&field, &data), data);
        }

        #[test]
        fn textarea_roundtrips(value in "[a-z \n]{0,200}") {
            let field = saved(TextareaField::default());
            let data = field.process_raw_field_data(&Value::String(value), &FieldContext::detached()).unwrap();
            prop_assert_eq!(reimport(&field, &data), data);
        }

        #[test]
        fn checkbox_roundtrips(state in any::<bool>()) {
            let field = saved(CheckboxField::new(false));
            let data = field.process_raw_field_data(&Value::Bool(state), &FieldContext::detached()).unwrap();
            prop_assert_eq!(reimport(&field, &data), data);
        }

        #[test]
        fn multi_select_roundtrips(values in prop::collection::vec("[a-z]{1,10}", 0..6)) {
            let field = saved(SelectField::with_options(values.clone()).multiple(true));
            let raw = Value::Array(values.into_iter().map(Value::String).collect());
            let data = field.process_raw_field_data(&raw, &FieldContext::detached()).unwrap();
            prop_assert_eq!(reimport(&field, &data), data);
        }

        #[test]
        fn taglist_roundtrips(tags in prop::collection::vec("[a-z][a-z ]{0,10}[a-z]", 0..6)) {
            let field = saved(TagListField::default());
            let raw = Value::String(tags.join(","));
            let data = field.process_raw_field_data(&raw, &FieldContext::detached()).unwrap();
            prop_assert_eq!(reimport(&field, &data), data);
        }

        #[test]
        fn date_roundtrips(seconds in 0i64..4_102_444_800) {
            let field = saved(DateField::default());
            let data = field.process_raw_field_data(&Value::from(seconds), &FieldContext::detached()).unwrap();
            prop_assert_eq!(reimport(&field, &data), data);
        }

        #[test]
        fn processing_is_idempotent(value in "[A-Za-z ]{0,50}") {
            let field = saved(InputField::new());
            let ctx = FieldContext::detached();
            let raw = Value::String(value);
            prop_assert_eq!(
                field.process_raw_field_data(&raw, &ctx).unwrap(),
                field.process_raw_field_data(&raw, &ctx).unwrap()
            );
        }
    }
}

mod grouping_properties {
    use super::*;

    fn rows(field: &Field, raws: Vec<Option<Value>>) -> Vec<Row> {
        let ctx = FieldContext::detached();
        raws.into_iter()
            .enumerate()
            .map(|(i, raw)| Row {
                id: EntryId::new(i as i64 + 1),
                data: raw.map(|r| field.process_raw_field_data(&r, &ctx).unwrap()),
            })
            .collect()
    }

    fn assert_partition(groups: &[RecordGroup<'_, Row>], count: usize) -> Result<(), TestCaseError> {
        let mut ids = leaf_ids(groups);
        prop_assert_eq!(ids.len(), count);
        ids.sort_unstable();
        ids.dedup();
        prop_assert_eq!(ids.len(), count);
        Ok(())
    }

    proptest! {
        #[test]
        fn input_grouping_partitions(values in prop::collection::vec(prop::option::of("[ab]{0,2}"), 1..30)) {
            let field = saved(InputField::new());
            let records = rows(&field, values.into_iter().map(|v| v.map(Value::String)).collect());
            let groups = field.group_records(&records).unwrap().unwrap();
            assert_partition(&groups, records.len())?;
            for group in &groups {
                prop_assert!(group.groups.is_empty());
            }
        }

        #[test]
        fn checkbox_grouping_partitions(states in prop::collection::vec(prop::option::of(any::<bool>()), 1..30)) {
            let field = saved(CheckboxField::new(false));
            let records = rows(&field, states.into_iter().map(|s| s.map(Value::Bool)).collect());
            let groups = field.group_records(&records).unwrap().unwrap();
            prop_assert!(groups.len() <= 2);
            assert_partition(&groups, records.len())?;
        }

        #[test]
        fn date_grouping_partitions(stamps in prop::collection::vec(prop::option::of(0i64..2_000_000_000), 1..30)) {
            let field = saved(DateField::default());
            let records = rows(&field, stamps.into_iter().map(|s| s.map(Value::from)).collect());
            let groups = field.group_records(&records).unwrap().unwrap();
            assert_partition(&groups, records.len())?;
            for year in groups.iter().filter(|g| g.key != "none") {
                prop_assert!(year.records.is_empty());
                for month in &year.groups {
                    prop_assert!(month.records.is_empty());
                    for day in &month.groups {
                        prop_assert!(day.groups.is_empty());
                    }
                }
            }
        }
    }
}

#[test]
fn grouping_empty_input_is_none() {
    let field = saved(DateField::default());
    let records: Vec<Row> = Vec::new();
    assert!(field.group_records(&records).unwrap().is_none());

    let unsaved = Field::new("When", DateField::default());
    assert!(unsaved.group_records(&records).unwrap().is_none());
}

#[test]
fn date_groups_nest_year_month_day() {
    let field = saved(DateField::default());
    let ctx = FieldContext::detached();
    let make = |id: i64, raw: &str| Row {
        id: EntryId::new(id),
        data: Some(field.process_raw_field_data(&Value::String(raw.into()), &ctx).unwrap()),
    };
    let records = vec![
        make(1, "2024-01-05"),
        make(2, "2024-01-05 10:00"),
        make(3, "2024-02-01"),
        make(4, "2023-12-31"),
    ];
    let groups = field.group_records(&records).unwrap().unwrap();
    let keys: Vec<&str> = groups.iter().map(|g| g.key.as_str()).collect();
    assert_eq!(keys, vec!["2024", "2023"]);
    assert_eq!(groups[0].groups[0].key, "01");
    assert_eq!(groups[0].groups[0].groups[0].key, "05");
    assert_eq!(groups[0].groups[0].groups[0].records.len(), 2);
    assert_eq!(leaf_ids(&groups[1..]), vec![4]);
}
