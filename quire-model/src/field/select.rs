use super::{check_length, require, FieldBehavior, FieldInfo};
use crate::grouping::{GroupLevel, GroupingError};
use crate::modes::{ExportMode, ExportValue, ImportMode};
use crate::raw;
use crate::settings::{ConfigError, FieldConfig, SettingKind, SettingSpec, Settings};
use crate::status::{FieldError, FieldResult};
use crate::store::{FieldContext, StoreResult};
use quire_types::{create_handle, ColumnSpec, EntryId, FieldData, FieldId, FieldValue, KeySpec, StorageSchema};
use serde_json::Value;

/// A choice from static options and/or the values of another field.
///
/// Drawing options from another field (`dynamic_options`) creates an
/// association from that field's section to this one.
#[derive(Debug, Clone, Default)]
pub struct SelectField {
    pub static_options: Vec<String>,
    pub dynamic_options: Option<FieldId>,
    pub allow_multiple_selection: bool,
    pub sort_options: bool,
    pub show_association: bool,
}

impl SelectField {
    pub fn with_options<S: Into<String>>(options: impl IntoIterator<Item = S>) -> Self {
        Self {
            static_options: options.into_iter().map(Into::into).collect(),
            show_association: true,
            ..Self::default()
        }
    }

    pub fn from_field(source: FieldId) -> Self {
        Self {
            dynamic_options: Some(source),
            show_association: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn multiple(mut self, allow: bool) -> Self {
        self.allow_multiple_selection = allow;
        self
    }

    /// Static options followed by values of the source field, deduplicated.
    pub fn options(&self, ctx: &FieldContext<'_>) -> StoreResult<Vec<String>> {
        let mut options = self.static_options.clone();
        if let Some(source) = self.dynamic_options {
            options.extend(ctx.store.distinct_values(source, "value")?);
        }
        let mut options = raw::dedupe(options);
        if self.sort_options {
            options.sort();
        }
        Ok(options)
    }
}

impl FieldConfig for SelectField {
    const HANDLE: &'static str = "select";
    const NAME: &'static str = "Select Box";
    const SETTINGS: &'static [SettingSpec] = &[
        SettingSpec::new("static_options", SettingKind::List, ""),
        SettingSpec::new("dynamic_options", SettingKind::Text, ""),
        SettingSpec::new("allow_multiple_selection", SettingKind::Bool, "no"),
        SettingSpec::new("sort_options", SettingKind::Bool, "no"),
        SettingSpec::new("show_association", SettingKind::Bool, "yes"),
    ];

    fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let dynamic = settings.text("dynamic_options").trim();
        let dynamic_options = if dynamic.is_empty() {
            None
        } else {
            Some(
                dynamic
                    .parse::<FieldId>()
                    .map_err(|e| ConfigError::invalid("dynamic_options", e.to_string()))?,
            )
        };
        Ok(Self {
            static_options: settings.list("static_options").to_vec(),
            dynamic_options,
            allow_multiple_selection: settings.bool("allow_multiple_selection"),
            sort_options: settings.bool("sort_options"),
            show_association: settings.bool("show_association"),
        })
    }

    fn to_settings(&self) -> Settings {
        let mut settings = Self::default_settings();
        settings.set("static_options", self.static_options.clone());
        settings.set(
            "dynamic_options",
            self.dynamic_options.map(|id| id.to_string()).unwrap_or_default(),
        );
        settings.set("allow_multiple_selection", self.allow_multiple_selection);
        settings.set("sort_options", self.sort_options);
        settings.set("show_association", self.show_association);
        settings
    }
}

impl FieldBehavior for SelectField {
    fn handle(&self) -> &'static str {
        Self::HANDLE
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn can_toggle(&self) -> bool {
        !self.allow_multiple_selection
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
        !self.allow_multiple_selection
    }

    fn allow_datasource_param_output(&self) -> bool {
        true
    }

    fn requires_sql_grouping(&self) -> bool {
        self.allow_multiple_selection
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
        let values = raw::to_texts(raw);
        require(info, values.is_empty())?;
        if !self.allow_multiple_selection && raw::dedupe(values.clone()).len() > 1 {
            return Err(FieldError::invalid_with(format!(
                "'{}' allows only one selection.",
                info.label
            )));
        }
        for value in &values {
            check_length(info, value, 255)?;
        }
        Ok(())
    }

    fn normalize(&self, _info: &FieldInfo, raw: &Value, _ctx: &FieldContext<'_>) -> FieldResult<FieldData> {
        let values = raw::dedupe(raw::to_texts(raw));
        if values.is_empty() {
            return Ok(FieldData::new());
        }
        let handles: Vec<String> = values.iter().map(|v| create_handle(v)).collect();
        Ok(FieldData::new()
            .with_many("handle", handles)
            .with_many("value", values))
    }

    fn export_modes(&self) -> &'static [ExportMode] {
        &[
            ExportMode::Value,
            ExportMode::ListValue,
            ExportMode::ListHandle,
            ExportMode::ListHandleToValue,
            ExportMode::Postdata,
        ]
    }

    fn export_value(&self, data: &FieldData, mode: ExportMode, _entry_id: Option<EntryId>) -> Option<ExportValue> {
        let values = data.texts("value");
        let handles = data.texts("handle");
        Some(match mode {
            ExportMode::ListHandle => ExportValue::List(handles),
            ExportMode::ListHandleToValue => {
                ExportValue::Map(handles.into_iter().zip(values).collect())
            }
            ExportMode::Postdata if self.allow_multiple_selection => ExportValue::List(values),
            ExportMode::Value | ExportMode::Postdata => {
                ExportValue::Text(values.into_iter().next().unwrap_or_default())
            }
            _ => ExportValue::List(values),
        })
    }

    fn import_raw(&self, raw: &Value, mode: ImportMode) -> Value {
        match (mode, raw) {
            (ImportMode::Value, Value::String(s)) => {
                Value::Array(s.split(',').map(|p| Value::String(p.trim().to_string())).collect())
            }
            _ => raw.clone(),
        }
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

    fn toggle_states(&self, ctx: &FieldContext<'_>) -> StoreResult<Vec<(String, String)>> {
        Ok(self
            .options(ctx)?
            .into_iter()
            .map(|o| (o.clone(), o))
            .collect())
    }

    fn toggle_field_data(&self, _data: &FieldData, new_state: &str) -> FieldData {
        FieldData::new()
            .with_many("handle", vec![create_handle(new_state)])
            .with_many("value", vec![new_state.to_string()])
    }

    fn suggestions(&self, _info: &FieldInfo, ctx: &FieldContext<'_>) -> StoreResult<Vec<String>> {
        self.options(ctx)
    }

    fn association_source(&self) -> Option<FieldId> {
        self.dynamic_options
    }

    fn fetch_associated_entry_count(
        &self,
        info: &FieldInfo,
        parent_data: &FieldData,
        ctx: &FieldContext<'_>,
    ) -> StoreResult<usize> {
        let Some(id) = info.id else {
            return Ok(0);
        };
        let values: Vec<FieldValue> = parent_data
            .texts("value")
            .into_iter()
            .map(FieldValue::from)
            .collect();
        if values.is_empty() {
            return Ok(0);
        }
        ctx.store.count_entries_matching(id, "value", &values, None)
    }
}
