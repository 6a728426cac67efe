use super::{check_length, require, FieldBehavior, FieldInfo, Validator};
use crate::grouping::{GroupLevel, GroupingError};
use crate::modes::{ExportMode, ExportValue};
use crate::raw;
use crate::settings::{ConfigError, FieldConfig, SettingKind, SettingSpec, Settings};
use crate::status::{FieldError, FieldResult};
use crate::store::FieldContext;
use quire_types::{create_handle, ColumnSpec, EntryId, FieldData, KeySpec, StorageSchema};
use serde_json::Value;

const MAX_LENGTH: usize = 255;

/// Single-line text with an optional validation pattern.
#[derive(Debug, Clone, Default)]
pub struct InputField {
    validator: Option<Validator>,
}

impl InputField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_validator(pattern: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            validator: Validator::parse("validator", pattern)?,
        })
    }

    pub fn validator(&self) -> Option<&Validator> {
        self.validator.as_ref()
    }
}

impl FieldConfig for InputField {
    const HANDLE: &'static str = "input";
    const NAME: &'static str = "Text Input";
    const SETTINGS: &'static [SettingSpec] = &[SettingSpec::new("validator", SettingKind::Text, "")];

    fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        Self::with_validator(settings.text("validator"))
    }

    fn to_settings(&self) -> Settings {
        let mut settings = Self::default_settings();
        if let Some(v) = &self.validator {
            settings.set("validator", v.source());
        }
        settings
    }
}

impl FieldBehavior for InputField {
    fn handle(&self) -> &'static str {
        Self::HANDLE
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn can_filter(&self) -> bool {
        true
    }

    fn can_pre_populate(&self) -> bool {
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
            .column(ColumnSpec::varchar("handle", 255))
            .column(ColumnSpec::varchar("value", 255))
            .key(KeySpec::unique("entry_id"))
            .key(KeySpec::index("handle"))
    }

    fn check_post_field_data(&self, info: &FieldInfo, raw: &Value, _ctx: &FieldContext<'_>) -> FieldResult<()> {
        let value = raw::to_text(raw).unwrap_or_default();
        require(info, value.trim().is_empty())?;
        if value.trim().is_empty() {
            return Ok(());
        }
        check_length(info, &value, MAX_LENGTH)?;
        match &self.validator {
            Some(v) if !v.is_match(&value) => Err(FieldError::invalid(&info.label)),
            _ => Ok(()),
        }
    }

    fn normalize(&self, _info: &FieldInfo, raw: &Value, _ctx: &FieldContext<'_>) -> FieldResult<FieldData> {
        let value = raw::to_text(raw).unwrap_or_default();
        if value.trim().is_empty() {
            return Ok(FieldData::new());
        }
        Ok(FieldData::new()
            .with("handle", create_handle(&value))
            .with("value", value))
    }

    fn export_modes(&self) -> &'static [ExportMode] {
        &[
            ExportMode::Value,
            ExportMode::Handle,
            ExportMode::Formatted,
            ExportMode::Unformatted,
            ExportMode::Postdata,
        ]
    }

    fn export_value(&self, data: &FieldData, mode: ExportMode, _entry_id: Option<EntryId>) -> Option<ExportValue> {
        let value = data.text("value").unwrap_or_default();
        let text = match mode {
            ExportMode::Handle => data.text("handle").unwrap_or_default().to_string(),
            ExportMode::Formatted => raw::escape_html(value),
            _ => value.to_string(),
        };
        Some(ExportValue::Text(text))
    }

    fn group_path(&self, data: Option<&FieldData>) -> Result<Vec<GroupLevel>, GroupingError> {
        let handle = data.and_then(|d| d.text("handle")).unwrap_or_default();
        let value = data.and_then(|d| d.text("value")).unwrap_or_default();
        Ok(vec![GroupLevel::new(handle)
            .attribute("handle", handle)
            .attribute("value", value)])
    }

    fn filter_columns(&self) -> &'static [&'static str] {
        &["value", "handle"]
    }

    fn sort_column(&self) -> Option<&'static str> {
        Some("value")
    }
}
