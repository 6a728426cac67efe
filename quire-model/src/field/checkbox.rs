use super::{FieldBehavior, FieldInfo};
use crate::filter::{FieldFilter, FilterMode, FilterRequest, Predicate};
use crate::grouping::{GroupLevel, GroupingError};
use crate::modes::{ExportMode, ExportValue, ImportMode};
use crate::raw;
use crate::settings::{parse_bool, ConfigError, FieldConfig, SettingKind, SettingSpec, Settings};
use crate::status::{FieldError, FieldResult};
use crate::store::{FieldContext, StoreResult};
use quire_types::{ColumnSpec, EntryId, FieldData, KeySpec, StorageSchema};
use serde_json::Value;

/// A yes/no flag.
#[derive(Debug, Clone, Default)]
pub struct CheckboxField {
    /// Checked when a submission omits the field.
    pub default_state: bool,
    pub description: String,
}

impl CheckboxField {
    pub fn new(default_state: bool) -> Self {
        Self {
            default_state,
            description: String::new(),
        }
    }

    /// Reads raw input as a state. Blank input is unchecked.
    fn state(raw: &Value) -> Option<bool> {
        if raw::is_empty(raw) {
            return Some(false);
        }
        match raw {
            Value::Bool(b) => Some(*b),
            other => raw::to_text(other).and_then(|s| parse_bool(&s)),
        }
    }

    fn stored(data: &FieldData) -> bool {
        data.text("value") == Some("yes")
    }
}

fn yes_no(state: bool) -> &'static str {
    if state { "yes" } else { "no" }
}

impl FieldConfig for CheckboxField {
    const HANDLE: &'static str = "checkbox";
    const NAME: &'static str = "Checkbox";
    const SETTINGS: &'static [SettingSpec] = &[
        SettingSpec::new("default_state", SettingKind::Choice(&["on", "off"]), "off"),
        SettingSpec::new("description", SettingKind::Text, ""),
    ];

    fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self {
            default_state: settings.text("default_state") == "on",
            description: settings.text("description").to_string(),
        })
    }

    fn to_settings(&self) -> Settings {
        let mut settings = Self::default_settings();
        settings.set("default_state", if self.default_state { "on" } else { "off" });
        settings.set("description", self.description.as_str());
        settings
    }
}

impl FieldBehavior for CheckboxField {
    fn handle(&self) -> &'static str {
        Self::HANDLE
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn can_toggle(&self) -> bool {
        true
    }

    fn can_filter(&self) -> bool {
        true
    }

    fn is_sortable(&self) -> bool {
        true
    }

    fn allow_datasource_output_grouping(&self) -> bool {
        true
    }

    fn allow_datasource_param_output(&self) -> bool {
        true
    }

    fn storage_schema(&self) -> StorageSchema {
        StorageSchema::new()
            .column(ColumnSpec::enumeration("value", &["yes", "no"]).required())
            .key(KeySpec::unique("entry_id"))
            .key(KeySpec::index("value"))
    }

    fn check_post_field_data(&self, info: &FieldInfo, raw: &Value, _ctx: &FieldContext<'_>) -> FieldResult<()> {
        match Self::state(raw) {
            None => Err(FieldError::invalid(&info.label)),
            Some(false) if info.required => Err(FieldError::missing_required(&info.label)),
            Some(_) => Ok(()),
        }
    }

    fn normalize(&self, info: &FieldInfo, raw: &Value, _ctx: &FieldContext<'_>) -> FieldResult<FieldData> {
        let state = Self::state(raw).ok_or_else(|| FieldError::invalid(&info.label))?;
        Ok(FieldData::new().with("value", yes_no(state)))
    }

    fn default_raw_input(&self, _ctx: &FieldContext<'_>) -> Value {
        Value::String(yes_no(self.default_state).to_string())
    }

    fn export_modes(&self) -> &'static [ExportMode] {
        &[ExportMode::Value, ExportMode::Boolean, ExportMode::Postdata]
    }

    fn export_value(&self, data: &FieldData, mode: ExportMode, _entry_id: Option<EntryId>) -> Option<ExportValue> {
        let state = Self::stored(data);
        Some(match mode {
            ExportMode::Boolean => ExportValue::Bool(state),
            _ => ExportValue::Text(yes_no(state).to_string()),
        })
    }

    fn import_modes(&self) -> &'static [ImportMode] {
        &[ImportMode::Value, ImportMode::Postdata, ImportMode::Boolean]
    }

    fn group_path(&self, data: Option<&FieldData>) -> Result<Vec<GroupLevel>, GroupingError> {
        let value = yes_no(data.is_some_and(Self::stored));
        Ok(vec![GroupLevel::new(value).attribute("value", value)])
    }

    fn build_filter(&self, request: &FilterRequest, and_mode: bool) -> Option<FieldFilter> {
        if request.values.is_empty() {
            return None;
        }
        let predicates = request
            .values
            .iter()
            .map(|v| match request.mode {
                FilterMode::Regexp => Predicate::any_column(&["value"], "REGEXP", v),
                FilterMode::Equals => match parse_bool(v) {
                    Some(state) => Predicate::any_column(&["value"], "=", yes_no(state)),
                    None => Predicate::never(),
                },
            })
            .collect();
        Some(FieldFilter {
            negated: request.negated,
            and_mode,
            predicates,
        })
    }

    fn sort_column(&self) -> Option<&'static str> {
        Some("value")
    }

    fn toggle_states(&self, _ctx: &FieldContext<'_>) -> StoreResult<Vec<(String, String)>> {
        Ok(vec![
            ("yes".to_string(), "Yes".to_string()),
            ("no".to_string(), "No".to_string()),
        ])
    }

    fn toggle_field_data(&self, data: &FieldData, new_state: &str) -> FieldData {
        match parse_bool(new_state) {
            Some(state) => FieldData::new().with("value", yes_no(state)),
            None => data.clone(),
        }
    }
}
