use super::{check_length, require, FieldBehavior, FieldInfo, Validator};
use crate::modes::{ExportMode, ExportValue};
use crate::raw;
use crate::settings::{ConfigError, FieldConfig, SettingKind, SettingSpec, Settings};
use crate::status::{FieldError, FieldResult};
use crate::store::{FieldContext, StoreResult};
use quire_types::{create_handle, ColumnSpec, EntryId, FieldData, FieldId, KeySpec, StorageSchema};
use serde_json::Value;

/// Where tag suggestions come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagSource {
    /// Tags already used in this field.
    Existing,
    Field(FieldId),
}

/// Free-form comma-separated tags.
#[derive(Debug, Clone)]
pub struct TagListField {
    validator: Option<Validator>,
    pub pre_populate_source: Vec<TagSource>,
}

impl Default for TagListField {
    fn default() -> Self {
        Self {
            validator: None,
            pre_populate_source: vec![TagSource::Existing],
        }
    }
}

impl TagListField {
    pub fn with_validator(pattern: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            validator: Validator::parse("validator", pattern)?,
            ..Self::default()
        })
    }

    fn tags(raw: &Value) -> Vec<String> {
        raw::dedupe(raw::split_list(raw))
    }
}

impl FieldConfig for TagListField {
    const HANDLE: &'static str = "taglist";
    const NAME: &'static str = "Tag List";
    const SETTINGS: &'static [SettingSpec] = &[
        SettingSpec::new("validator", SettingKind::Text, ""),
        SettingSpec::new("pre_populate_source", SettingKind::List, "existing"),
    ];

    fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let pre_populate_source = settings
            .list("pre_populate_source")
            .iter()
            .map(|s| match s.as_str() {
                "existing" => Ok(TagSource::Existing),
                other => other
                    .parse::<FieldId>()
                    .map(TagSource::Field)
                    .map_err(|e| ConfigError::invalid("pre_populate_source", e.to_string())),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            validator: Validator::parse("validator", settings.text("validator"))?,
            pre_populate_source,
        })
    }

    fn to_settings(&self) -> Settings {
        let mut settings = Self::default_settings();
        if let Some(v) = &self.validator {
            settings.set("validator", v.source());
        }
        let sources = self
            .pre_populate_source
            .iter()
            .map(|s| match s {
                TagSource::Existing => "existing".to_string(),
                TagSource::Field(id) => id.to_string(),
            })
            .collect::<Vec<_>>();
        settings.set("pre_populate_source", sources);
        settings
    }
}

impl FieldBehavior for TagListField {
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

    fn allow_datasource_param_output(&self) -> bool {
        true
    }

    fn requires_sql_grouping(&self) -> bool {
        true
    }

    fn stores_multiple_rows(&self) -> bool {
        true
    }

    fn storage_schema(&self) -> StorageSchema {
        StorageSchema::new()
            .column(ColumnSpec::varchar("handle", 255))
            .column(ColumnSpec::varchar("value", 255))
            .key(KeySpec::index("entry_id"))
            .key(KeySpec::index("handle"))
            .key(KeySpec::index("value"))
    }

    fn check_post_field_data(&self, info: &FieldInfo, raw: &Value, _ctx: &FieldContext<'_>) -> FieldResult<()> {
        let tags = Self::tags(raw);
        require(info, tags.is_empty())?;
        for tag in &tags {
            check_length(info, tag, 255)?;
            if let Some(v) = &self.validator {
                if !v.is_match(tag) {
                    return Err(FieldError::invalid_with(format!(
                        "'{}' contains an invalid tag: '{tag}'.",
                        info.label
                    )));
                }
            }
        }
        Ok(())
    }

    fn normalize(&self, _info: &FieldInfo, raw: &Value, _ctx: &FieldContext<'_>) -> FieldResult<FieldData> {
        let tags = Self::tags(raw);
        if tags.is_empty() {
            return Ok(FieldData::new());
        }
        let handles: Vec<String> = tags.iter().map(|t| create_handle(t)).collect();
        Ok(FieldData::new().with_many("handle", handles).with_many("value", tags))
    }

    fn export_modes(&self) -> &'static [ExportMode] {
        &[
            ExportMode::ListValue,
            ExportMode::ListHandle,
            ExportMode::ListHandleToValue,
            ExportMode::Postdata,
        ]
    }

    fn export_value(&self, data: &FieldData, mode: ExportMode, _entry_id: Option<EntryId>) -> Option<ExportValue> {
        let values = data.texts("value");
        Some(match mode {
            ExportMode::ListHandle => ExportValue::List(data.texts("handle")),
            ExportMode::ListHandleToValue => {
                ExportValue::Map(data.texts("handle").into_iter().zip(values).collect())
            }
            ExportMode::Postdata => ExportValue::Text(values.join(", ")),
            _ => ExportValue::List(values),
        })
    }

    fn filter_columns(&self) -> &'static [&'static str] {
        &["value", "handle"]
    }

    fn suggestions(&self, info: &FieldInfo, ctx: &FieldContext<'_>) -> StoreResult<Vec<String>> {
        let mut values = Vec::new();
        for source in &self.pre_populate_source {
            let id = match source {
                TagSource::Existing => match info.id {
                    Some(id) => id,
                    None => continue,
                },
                TagSource::Field(id) => *id,
            };
            values.extend(ctx.store.distinct_values(id, "value")?);
        }
        let mut values = raw::dedupe(values);
        values.sort();
        Ok(values)
    }
}
