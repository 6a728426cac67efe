use super::{require, FieldBehavior, FieldInfo};
use crate::modes::{ExportMode, ExportValue};
use crate::raw;
use crate::settings::{ConfigError, FieldConfig, SettingKind, SettingSpec, Settings};
use crate::status::FieldResult;
use crate::store::FieldContext;
use quire_types::{ColumnSpec, EntryId, FieldData, KeySpec, StorageSchema};
use serde_json::Value;

/// How a textarea's formatted value is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextFormatter {
    /// HTML-escaped text.
    #[default]
    None,
    /// Escaped text with blank-line separated paragraphs wrapped in `<p>`
    /// and single newlines turned into `<br />`.
    Paragraphs,
}

impl TextFormatter {
    fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Paragraphs => "paragraphs",
        }
    }

    pub fn format(self, text: &str) -> String {
        match self {
            Self::None => raw::escape_html(text),
            Self::Paragraphs => text
                .replace("\r\n", "\n")
                .split("\n\n")
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(|p| format!("<p>{}</p>", raw::escape_html(p).replace('\n', "<br />\n")))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// Multi-line text.
#[derive(Debug, Clone)]
pub struct TextareaField {
    pub size: i64,
    pub formatter: TextFormatter,
}

impl Default for TextareaField {
    fn default() -> Self {
        Self {
            size: 15,
            formatter: TextFormatter::None,
        }
    }
}

impl FieldConfig for TextareaField {
    const HANDLE: &'static str = "textarea";
    const NAME: &'static str = "Textarea";
    const SETTINGS: &'static [SettingSpec] = &[
        SettingSpec::new("size", SettingKind::Int, "15"),
        SettingSpec::new("formatter", SettingKind::Choice(&["none", "paragraphs"]), "none"),
    ];

    fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let size = settings.int("size");
        if size < 1 {
            return Err(ConfigError::invalid("size", "must be a positive number of rows"));
        }
        let formatter = match settings.text("formatter") {
            "paragraphs" => TextFormatter::Paragraphs,
            _ => TextFormatter::None,
        };
        Ok(Self { size, formatter })
    }

    fn to_settings(&self) -> Settings {
        let mut settings = Self::default_settings();
        settings.set("size", self.size);
        settings.set("formatter", self.formatter.as_str());
        settings
    }
}

impl FieldBehavior for TextareaField {
    fn handle(&self) -> &'static str {
        Self::HANDLE
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn can_filter(&self) -> bool {
        true
    }

    fn storage_schema(&self) -> StorageSchema {
        StorageSchema::new()
            .column(ColumnSpec::text("value"))
            .column(ColumnSpec::text("value_formatted"))
            .key(KeySpec::unique("entry_id"))
            .key(KeySpec::FullText("value".into()))
    }

    fn check_post_field_data(&self, info: &FieldInfo, raw: &Value, _ctx: &FieldContext<'_>) -> FieldResult<()> {
        require(info, raw::is_empty(raw))
    }

    fn normalize(&self, _info: &FieldInfo, raw: &Value, _ctx: &FieldContext<'_>) -> FieldResult<FieldData> {
        let value = raw::to_text(raw).unwrap_or_default();
        if value.trim().is_empty() {
            return Ok(FieldData::new());
        }
        Ok(FieldData::new()
            .with("value_formatted", self.formatter.format(&value))
            .with("value", value))
    }

    fn export_modes(&self) -> &'static [ExportMode] {
        &[ExportMode::Formatted, ExportMode::Unformatted, ExportMode::Postdata]
    }

    fn export_value(&self, data: &FieldData, mode: ExportMode, _entry_id: Option<EntryId>) -> Option<ExportValue> {
        let column = match mode {
            ExportMode::Formatted => "value_formatted",
            _ => "value",
        };
        Some(ExportValue::Text(data.text(column).unwrap_or_default().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraphs_formatter() {
        let html = TextFormatter::Paragraphs.format("One\nline <b>\n\nTwo");
        assert_eq!(html, "<p>One<br />\nline &lt;b&gt;</p>\n<p>Two</p>");
    }
}
