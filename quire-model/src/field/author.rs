use super::{require, FieldBehavior, FieldInfo};
use crate::grouping::{GroupLevel, GroupingError};
use crate::modes::{ExportMode, ExportValue};
use crate::raw;
use crate::settings::{ConfigError, FieldConfig, SettingKind, SettingSpec, Settings};
use crate::status::{FieldError, FieldResult};
use crate::store::FieldContext;
use quire_types::{AuthorId, ColumnSpec, EntryId, FieldData, KeySpec, StorageSchema};
use serde_json::Value;

/// One or more authors, by id.
#[derive(Debug, Clone, Default)]
pub struct AuthorField {
    pub allow_multiple_selection: bool,
    /// Pre-fill the submitting author when the field is omitted.
    pub default_to_current_user: bool,
}

impl AuthorField {
    fn ids(raw: &Value) -> Result<Vec<AuthorId>, String> {
        let ids = raw::to_texts(raw)
            .iter()
            .map(|s| s.parse::<AuthorId>().map_err(|_| s.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        let mut seen = std::collections::HashSet::new();
        Ok(ids.into_iter().filter(|id| seen.insert(*id)).collect())
    }
}

impl FieldConfig for AuthorField {
    const HANDLE: &'static str = "author";
    const NAME: &'static str = "Author";
    const SETTINGS: &'static [SettingSpec] = &[
        SettingSpec::new("allow_multiple_selection", SettingKind::Bool, "no"),
        SettingSpec::new("default_to_current_user", SettingKind::Bool, "no"),
    ];

    fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self {
            allow_multiple_selection: settings.bool("allow_multiple_selection"),
            default_to_current_user: settings.bool("default_to_current_user"),
        })
    }

    fn to_settings(&self) -> Settings {
        let mut settings = Self::default_settings();
        settings.set("allow_multiple_selection", self.allow_multiple_selection);
        settings.set("default_to_current_user", self.default_to_current_user);
        settings
    }
}

impl FieldBehavior for AuthorField {
    fn handle(&self) -> &'static str {
        Self::HANDLE
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn can_filter(&self) -> bool {
        true
    }

    fn is_sortable(&self) -> bool {
        !self.allow_multiple_selection
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
            .column(ColumnSpec::integer("author_id"))
            .key(KeySpec::index("entry_id"))
            .key(KeySpec::index("author_id"))
    }

    fn check_post_field_data(&self, info: &FieldInfo, raw: &Value, _ctx: &FieldContext<'_>) -> FieldResult<()> {
        let ids = Self::ids(raw).map_err(|_| FieldError::invalid(&info.label))?;
        require(info, ids.is_empty())?;
        if !self.allow_multiple_selection && ids.len() > 1 {
            return Err(FieldError::invalid_with(format!(
                "'{}' allows only one author.",
                info.label
            )));
        }
        Ok(())
    }

    fn normalize(&self, info: &FieldInfo, raw: &Value, _ctx: &FieldContext<'_>) -> FieldResult<FieldData> {
        let ids = Self::ids(raw).map_err(|_| FieldError::invalid(&info.label))?;
        if ids.is_empty() {
            return Ok(FieldData::new());
        }
        Ok(FieldData::new().with_many("author_id", ids.into_iter().map(i64::from).collect()))
    }

    fn default_raw_input(&self, ctx: &FieldContext<'_>) -> Value {
        match ctx.author_id {
            Some(id) if self.default_to_current_user => Value::from(id.get()),
            _ => Value::Null,
        }
    }

    fn export_modes(&self) -> &'static [ExportMode] {
        &[ExportMode::Value, ExportMode::ListValue, ExportMode::Postdata]
    }

    fn export_value(&self, data: &FieldData, mode: ExportMode, _entry_id: Option<EntryId>) -> Option<ExportValue> {
        let ids = data.texts("author_id");
        Some(match mode {
            ExportMode::ListValue => ExportValue::List(ids),
            ExportMode::Postdata if self.allow_multiple_selection => ExportValue::List(ids),
            _ => ExportValue::Text(ids.into_iter().next().unwrap_or_default()),
        })
    }

    fn group_path(&self, data: Option<&FieldData>) -> Result<Vec<GroupLevel>, GroupingError> {
        let id = data
            .and_then(|d| d.first("author_id"))
            .map(ToString::to_string)
            .unwrap_or_default();
        Ok(vec![GroupLevel::new(id.clone()).attribute("author_id", id)])
    }

    fn filter_columns(&self) -> &'static [&'static str] {
        &["author_id"]
    }

    fn sort_column(&self) -> Option<&'static str> {
        Some("author_id")
    }
}
