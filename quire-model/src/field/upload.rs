use super::{check_length, require, FieldBehavior, FieldInfo, Validator};
use crate::modes::{ExportMode, ExportValue};
use crate::raw;
use crate::settings::{ConfigError, FieldConfig, SettingKind, SettingSpec, Settings};
use crate::status::{FieldError, FieldResult};
use crate::store::{FieldContext, FieldDataStore, StoreResult};
use quire_types::{ColumnSpec, EntryId, FieldData, FieldValue, KeySpec, StorageSchema};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

const MAX_PATH_LENGTH: usize = 255;

/// A file already placed in the destination directory, referenced by its
/// path relative to that directory.
#[derive(Debug, Clone)]
pub struct UploadField {
    pub destination: PathBuf,
    validator: Option<Validator>,
}

impl UploadField {
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
            validator: None,
        }
    }

    pub fn with_validator(mut self, pattern: &str) -> Result<Self, ConfigError> {
        self.validator = Validator::parse("validator", pattern)?;
        Ok(self)
    }

    fn file_name(raw: &Value) -> Option<String> {
        let name = match raw {
            Value::Object(map) => map.get("file").and_then(raw::to_text),
            other => raw::to_text(other),
        }?;
        let name = name.trim().trim_start_matches('/').to_string();
        (!name.is_empty()).then_some(name)
    }

    /// Resolves a relative name inside the destination. `None` when the
    /// name would escape it.
    fn resolve(&self, name: &str) -> Option<PathBuf> {
        let relative = Path::new(name);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        safe.then(|| self.destination.join(relative))
    }
}

fn mimetype(name: &str) -> &'static str {
    let extension = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        "xml" => "application/xml",
        "zip" => "application/zip",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}

impl Default for UploadField {
    fn default() -> Self {
        Self::new("uploads")
    }
}

impl FieldConfig for UploadField {
    const HANDLE: &'static str = "upload";
    const NAME: &'static str = "File Upload";
    const SETTINGS: &'static [SettingSpec] = &[
        SettingSpec::new("destination", SettingKind::Text, "uploads"),
        SettingSpec::new("validator", SettingKind::Text, ""),
    ];

    fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let destination = settings.text("destination").trim();
        if destination.is_empty() {
            return Err(ConfigError::invalid("destination", "a destination directory is required"));
        }
        Self::new(destination).with_validator(settings.text("validator"))
    }

    fn to_settings(&self) -> Settings {
        let mut settings = Self::default_settings();
        settings.set("destination", self.destination.to_string_lossy().into_owned());
        if let Some(v) = &self.validator {
            settings.set("validator", v.source());
        }
        settings
    }
}

impl FieldBehavior for UploadField {
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
        true
    }

    fn allow_datasource_param_output(&self) -> bool {
        true
    }

    fn requires_data_for_cleanup(&self) -> bool {
        true
    }

    fn storage_schema(&self) -> StorageSchema {
        StorageSchema::new()
            .column(ColumnSpec::varchar("file", 255))
            .column(ColumnSpec::integer("size"))
            .column(ColumnSpec::varchar("mimetype", 100))
            .column(ColumnSpec::text("meta"))
            .key(KeySpec::unique("entry_id"))
            .key(KeySpec::index("file"))
    }

    fn check_post_field_data(&self, info: &FieldInfo, raw: &Value, ctx: &FieldContext<'_>) -> FieldResult<()> {
        let name = Self::file_name(raw);
        require(info, name.is_none())?;
        let Some(name) = name else {
            return Ok(());
        };
        check_length(info, &name, MAX_PATH_LENGTH)?;
        if let Some(v) = &self.validator {
            if !v.is_match(&name) {
                return Err(FieldError::invalid_with(format!(
                    "File chosen in '{}' does not match allowable file types.",
                    info.label
                )));
            }
        }
        let path = self.resolve(&name).ok_or_else(|| FieldError::invalid(&info.label))?;
        if !path.is_file() {
            return Err(FieldError::invalid_with(format!(
                "File chosen in '{}' does not exist.",
                info.label
            )));
        }
        if let Some(id) = info.id {
            let used = ctx
                .store
                .count_entries_matching(id, "file", &[FieldValue::from(name.as_str())], ctx.entry_id)
                .map_err(|e| FieldError::internal(e.to_string()))?;
            if used > 0 {
                return Err(FieldError::duplicate(format!(
                    "A file with the name {name} already exists in '{}'.",
                    info.label
                )));
            }
        }
        Ok(())
    }

    fn normalize(&self, info: &FieldInfo, raw: &Value, _ctx: &FieldContext<'_>) -> FieldResult<FieldData> {
        let Some(name) = Self::file_name(raw) else {
            return Ok(FieldData::new());
        };
        let path = self.resolve(&name).ok_or_else(|| FieldError::invalid(&info.label))?;
        let metadata = std::fs::metadata(&path).map_err(|e| {
            FieldError::invalid_with(format!("File chosen in '{}' could not be read: {e}", info.label))
        })?;
        let extension = Path::new(&name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_string();
        let meta = BTreeMap::from([("extension", extension)]);
        let meta = serde_json::to_string(&meta).map_err(|e| FieldError::internal(e.to_string()))?;
        Ok(FieldData::new()
            .with("mimetype", mimetype(&name))
            .with("size", i64::try_from(metadata.len()).unwrap_or(i64::MAX))
            .with("meta", meta)
            .with("file", name))
    }

    fn export_modes(&self) -> &'static [ExportMode] {
        &[ExportMode::Value, ExportMode::Postdata]
    }

    fn export_value(&self, data: &FieldData, _mode: ExportMode, _entry_id: Option<EntryId>) -> Option<ExportValue> {
        Some(ExportValue::Text(data.text("file").unwrap_or_default().to_string()))
    }

    fn filter_columns(&self) -> &'static [&'static str] {
        &["file"]
    }

    fn sort_column(&self) -> Option<&'static str> {
        Some("file")
    }

    fn entry_data_cleanup(
        &self,
        info: &FieldInfo,
        store: &dyn FieldDataStore,
        entry_ids: &[EntryId],
        data: Option<&FieldData>,
    ) -> StoreResult<()> {
        if let Some(id) = info.id {
            store.delete_entry_data(id, entry_ids)?;
        }
        let Some(path) = data.and_then(|d| d.text("file")).and_then(|f| self.resolve(f)) else {
            return Ok(());
        };
        store.remove_file(&path)
    }

    fn check_fields(&self, _info: &FieldInfo) -> BTreeMap<&'static str, String> {
        let mut errors = BTreeMap::new();
        if !self.destination.is_dir() {
            errors.insert(
                "destination",
                format!("Directory '{}' does not exist.", self.destination.display()),
            );
        }
        errors
    }
}
