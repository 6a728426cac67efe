//! The field contract.
//!
//! A [`Field`] pairs the attributes every field shares ([`FieldInfo`]) with a
//! typed variant ([`FieldKind`]). Variant behavior lives behind the
//! [`FieldBehavior`] trait; capabilities default to "not supported" and each
//! variant opts into what it can do.
//!
//! Processing raw input is two steps: `check_post_field_data` decides whether
//! the input is acceptable, then `normalize` turns it into [`FieldData`].
//! [`Field::process_raw_field_data`] always runs both.

mod author;
mod checkbox;
mod date;
mod input;
mod kind;
mod select;
mod taglist;
mod textarea;
mod upload;
mod validator;

pub use author::AuthorField;
pub use checkbox::CheckboxField;
pub use date::{parse_date, DateField};
pub use input::InputField;
pub use kind::FieldKind;
pub use select::SelectField;
pub use taglist::{TagListField, TagSource};
pub use textarea::{TextFormatter, TextareaField};
pub use upload::UploadField;
pub use validator::Validator;

use crate::filter::{FieldFilter, FilterMode, FilterRequest, Predicate};
use crate::grouping::{bucket, GroupLevel, GroupingError, Record, RecordGroup};
use crate::modes::{ExportMode, ExportValue, ImportMode};
use crate::settings::{ConfigError, SettingKind, SettingSpec, Settings};
use crate::status::{FieldError, FieldResult};
use crate::store::{FieldContext, FieldDataStore, StoreResult};
use quire_types::{create_handle, EntryId, FieldData, FieldId, SectionId, StorageSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Where a field is laid out on the entry form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    #[default]
    Main,
    Sidebar,
}

impl Location {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Sidebar => "sidebar",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "main" => Some(Self::Main),
            "sidebar" => Some(Self::Sidebar),
            _ => None,
        }
    }
}

/// Attributes shared by every field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub id: Option<FieldId>,
    pub section_id: Option<SectionId>,
    pub label: String,
    pub element_name: String,
    pub location: Location,
    pub required: bool,
    pub show_column: bool,
    pub sortorder: i64,
}

impl FieldInfo {
    pub fn new(label: &str) -> Self {
        Self {
            id: None,
            section_id: None,
            label: label.to_string(),
            element_name: create_handle(label),
            location: Location::Main,
            required: false,
            show_column: true,
            sortorder: 0,
        }
    }
}

/// Settings every field carries alongside its variant settings.
pub const COMMON_SETTINGS: &[SettingSpec] = &[
    SettingSpec::new("label", SettingKind::Text, ""),
    SettingSpec::new("element_name", SettingKind::Text, ""),
    SettingSpec::new("required", SettingKind::Bool, "no"),
    SettingSpec::new("show_column", SettingKind::Bool, "yes"),
    SettingSpec::new("location", SettingKind::Choice(&["main", "sidebar"]), "main"),
];

/// Behavior of one field variant.
pub trait FieldBehavior: fmt::Debug + Send + Sync {
    /// Registered type handle, e.g. `input`.
    fn handle(&self) -> &'static str;
    fn name(&self) -> &'static str;

    fn can_toggle(&self) -> bool {
        false
    }
    fn can_filter(&self) -> bool {
        false
    }
    fn can_pre_populate(&self) -> bool {
        false
    }
    fn is_sortable(&self) -> bool {
        false
    }
    /// At most one field of this type per section.
    fn must_be_unique(&self) -> bool {
        false
    }
    fn allow_datasource_output_grouping(&self) -> bool {
        false
    }
    fn allow_datasource_param_output(&self) -> bool {
        false
    }
    /// Queries joining this field yield several rows per entry.
    fn requires_sql_grouping(&self) -> bool {
        false
    }
    /// Cleanup needs the entry's data, not just its id.
    fn requires_data_for_cleanup(&self) -> bool {
        false
    }
    /// One stored row per value rather than one per entry.
    fn stores_multiple_rows(&self) -> bool {
        false
    }

    /// Columns and keys of the data table, without `entry_id`.
    fn storage_schema(&self) -> StorageSchema;

    fn check_post_field_data(
        &self,
        info: &FieldInfo,
        raw: &Value,
        ctx: &FieldContext<'_>,
    ) -> FieldResult<()>;

    /// Turns accepted raw input into stored data. Empty data means "store nothing".
    fn normalize(&self, info: &FieldInfo, raw: &Value, ctx: &FieldContext<'_>) -> FieldResult<FieldData>;

    /// Raw input assumed when a submission omits the field.
    fn default_raw_input(&self, _ctx: &FieldContext<'_>) -> Value {
        Value::Null
    }

    fn export_modes(&self) -> &'static [ExportMode] {
        &[]
    }

    fn export_value(
        &self,
        _data: &FieldData,
        _mode: ExportMode,
        _entry_id: Option<EntryId>,
    ) -> Option<ExportValue> {
        None
    }

    fn import_modes(&self) -> &'static [ImportMode] {
        &[ImportMode::Value, ImportMode::Postdata]
    }

    /// Rewrites an imported value into raw input form.
    fn import_raw(&self, raw: &Value, _mode: ImportMode) -> Value {
        raw.clone()
    }

    /// Group path of one record's data.
    fn group_path(&self, _data: Option<&FieldData>) -> Result<Vec<GroupLevel>, GroupingError> {
        Err(GroupingError::Unsupported(self.handle()))
    }

    /// Columns plain filters match against.
    fn filter_columns(&self) -> &'static [&'static str] {
        &["value"]
    }

    fn build_filter(&self, request: &FilterRequest, and_mode: bool) -> Option<FieldFilter> {
        if !self.can_filter() || request.values.is_empty() {
            return None;
        }
        let op = match request.mode {
            FilterMode::Equals => "=",
            FilterMode::Regexp => "REGEXP",
        };
        let predicates = request
            .values
            .iter()
            .map(|v| Predicate::any_column(self.filter_columns(), op, v))
            .collect();
        Some(FieldFilter {
            negated: request.negated,
            and_mode,
            predicates,
        })
    }

    /// Column entries are ordered by when sorting on this field.
    fn sort_column(&self) -> Option<&'static str> {
        None
    }

    /// `(state, label)` pairs offered for bulk toggling.
    fn toggle_states(&self, _ctx: &FieldContext<'_>) -> StoreResult<Vec<(String, String)>> {
        Ok(Vec::new())
    }

    fn toggle_field_data(&self, _data: &FieldData, new_state: &str) -> FieldData {
        FieldData::new().with("value", new_state)
    }

    /// Values offered to authors while typing.
    fn suggestions(&self, _info: &FieldInfo, _ctx: &FieldContext<'_>) -> StoreResult<Vec<String>> {
        Ok(Vec::new())
    }

    /// Field whose values this one draws from, forming a section association.
    fn association_source(&self) -> Option<FieldId> {
        None
    }

    /// Entries of this field's section linked to a parent entry's data.
    fn fetch_associated_entry_count(
        &self,
        _info: &FieldInfo,
        _parent_data: &FieldData,
        _ctx: &FieldContext<'_>,
    ) -> StoreResult<usize> {
        Ok(0)
    }

    /// Removes stored data for deleted entries. `data` is present only when
    /// the variant asked for it via `requires_data_for_cleanup`.
    fn entry_data_cleanup(
        &self,
        info: &FieldInfo,
        store: &dyn FieldDataStore,
        entry_ids: &[EntryId],
        _data: Option<&FieldData>,
    ) -> StoreResult<()> {
        if let Some(id) = info.id {
            store.delete_entry_data(id, entry_ids)?;
        }
        Ok(())
    }

    /// Releases external resources before the field is deleted.
    fn tear_down(&self, _info: &FieldInfo, _store: &dyn FieldDataStore) -> StoreResult<()> {
        Ok(())
    }

    /// Variant-specific authoring errors, keyed by setting.
    fn check_fields(&self, _info: &FieldInfo) -> BTreeMap<&'static str, String> {
        BTreeMap::new()
    }
}

/// A field: shared attributes plus a typed variant.
#[derive(Debug, Clone)]
pub struct Field {
    info: FieldInfo,
    kind: FieldKind,
}

impl Field {
    pub fn new(label: &str, kind: impl Into<FieldKind>) -> Self {
        Self {
            info: FieldInfo::new(label),
            kind: kind.into(),
        }
    }

    pub fn from_parts(info: FieldInfo, kind: FieldKind) -> Self {
        Self { info, kind }
    }

    #[must_use]
    pub fn required(mut self, required: bool) -> Self {
        self.info.required = required;
        self
    }

    #[must_use]
    pub fn show_column(mut self, show: bool) -> Self {
        self.info.show_column = show;
        self
    }

    #[must_use]
    pub fn location(mut self, location: Location) -> Self {
        self.info.location = location;
        self
    }

    #[must_use]
    pub fn with_element_name(mut self, element_name: &str) -> Self {
        self.info.element_name = element_name.to_string();
        self
    }

    pub fn info(&self) -> &FieldInfo {
        &self.info
    }

    pub fn info_mut(&mut self) -> &mut FieldInfo {
        &mut self.info
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn set_kind(&mut self, kind: FieldKind) {
        self.kind = kind;
    }

    pub fn behavior(&self) -> &dyn FieldBehavior {
        self.kind.behavior()
    }

    pub fn id(&self) -> Option<FieldId> {
        self.info.id
    }

    pub fn set_id(&mut self, id: FieldId) {
        self.info.id = Some(id);
    }

    pub fn section_id(&self) -> Option<SectionId> {
        self.info.section_id
    }

    pub fn set_section_id(&mut self, id: SectionId) {
        self.info.section_id = Some(id);
    }

    pub fn label(&self) -> &str {
        &self.info.label
    }

    pub fn element_name(&self) -> &str {
        &self.info.element_name
    }

    pub fn is_required(&self) -> bool {
        self.info.required
    }

    pub fn type_handle(&self) -> &'static str {
        self.kind.handle()
    }

    /// Full storage schema of the data table, `entry_id` included.
    pub fn storage_schema(&self) -> StorageSchema {
        self.behavior().storage_schema().for_entry_data()
    }

    /// Common and variant settings as one bag.
    pub fn settings(&self) -> Settings {
        let mut settings = Settings::new(COMMON_SETTINGS.iter().chain(self.kind.setting_specs()));
        settings.set("label", self.info.label.as_str());
        settings.set("element_name", self.info.element_name.as_str());
        settings.set("required", self.info.required);
        settings.set("show_column", self.info.show_column);
        settings.set("location", self.info.location.as_str());
        for (key, raw) in self.kind.settings().to_raw_pairs() {
            settings.set_raw(key, &raw);
        }
        settings
    }

    /// Rebuilds common attributes and the variant from a bag.
    pub fn apply_settings(&mut self, settings: &Settings) -> Result<(), ConfigError> {
        let kind = FieldKind::from_settings(self.kind.handle(), settings)?;
        self.info.label = settings.text("label").to_string();
        self.info.element_name = settings.text("element_name").to_string();
        self.info.required = settings.bool("required");
        self.info.show_column = settings.bool("show_column");
        self.info.location = Location::parse(settings.text("location")).unwrap_or_default();
        self.kind = kind;
        Ok(())
    }

    /// Derives the element name from the label when it is blank.
    pub fn ensure_element_name(&mut self) {
        if self.info.element_name.trim().is_empty() {
            self.info.element_name = create_handle(&self.info.label);
        }
    }

    /// Authoring errors in this field's configuration, keyed by setting.
    pub fn check_fields(&self) -> BTreeMap<&'static str, String> {
        let mut errors = BTreeMap::new();
        if self.info.label.trim().is_empty() {
            errors.insert("label", "This is a required field.".to_string());
        }
        if self.info.element_name.is_empty() {
            errors.insert("element_name", "This is a required field.".to_string());
        } else if !self.info.element_name.starts_with(|c: char| c.is_ascii_alphabetic()) {
            errors.insert("element_name", "Invalid element name. Must start with a letter.".to_string());
        }
        for (key, message) in self.behavior().check_fields(&self.info) {
            errors.entry(key).or_insert(message);
        }
        errors
    }

    pub fn check_post_field_data(&self, raw: &Value, ctx: &FieldContext<'_>) -> FieldResult<()> {
        self.behavior().check_post_field_data(&self.info, raw, ctx)
    }

    /// Checks then normalizes raw input.
    pub fn process_raw_field_data(&self, raw: &Value, ctx: &FieldContext<'_>) -> FieldResult<FieldData> {
        let behavior = self.behavior();
        behavior.check_post_field_data(&self.info, raw, ctx)?;
        behavior.normalize(&self.info, raw, ctx)
    }

    pub fn default_raw_input(&self, ctx: &FieldContext<'_>) -> Value {
        self.behavior().default_raw_input(ctx)
    }

    /// Exports data in a mode the variant supports; `None` otherwise.
    pub fn prepare_export_value(
        &self,
        data: &FieldData,
        mode: ExportMode,
        entry_id: Option<EntryId>,
    ) -> Option<ExportValue> {
        let behavior = self.behavior();
        if !behavior.export_modes().contains(&mode) {
            return None;
        }
        behavior.export_value(data, mode, entry_id)
    }

    pub fn prepare_import_value(
        &self,
        raw: &Value,
        mode: ImportMode,
        ctx: &FieldContext<'_>,
    ) -> FieldResult<FieldData> {
        let behavior = self.behavior();
        if !behavior.import_modes().contains(&mode) {
            return Err(FieldError::custom(format!(
                "'{}' cannot import values in {mode:?} mode.",
                self.info.label
            )));
        }
        self.process_raw_field_data(&behavior.import_raw(raw, mode), ctx)
    }

    /// Compiles a filter from raw filter strings.
    pub fn build_filter<S: AsRef<str>>(&self, values: &[S], and_mode: bool) -> Option<FieldFilter> {
        self.behavior().build_filter(&FilterRequest::parse(values), and_mode)
    }

    /// Sort column, for sortable variants.
    pub fn sort_column(&self) -> Option<&'static str> {
        let behavior = self.behavior();
        if behavior.is_sortable() {
            behavior.sort_column()
        } else {
            None
        }
    }

    /// Buckets records by this field's data.
    ///
    /// `Ok(None)` for an empty input; an error when the variant does not
    /// group. Every record lands in exactly one leaf bucket.
    pub fn group_records<'a, R: Record>(
        &self,
        records: &'a [R],
    ) -> Result<Option<Vec<RecordGroup<'a, R>>>, GroupingError> {
        let behavior = self.behavior();
        if !behavior.allow_datasource_output_grouping() {
            return Err(GroupingError::Unsupported(behavior.handle()));
        }
        if records.is_empty() {
            return Ok(None);
        }
        let id = self.info.id.ok_or(GroupingError::Unsaved)?;
        let paths = records
            .iter()
            .map(|r| behavior.group_path(r.field_data(id)).map(|path| (r, path)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(bucket(paths)))
    }

    pub fn toggle_states(&self, ctx: &FieldContext<'_>) -> StoreResult<Vec<(String, String)>> {
        self.behavior().toggle_states(ctx)
    }

    pub fn toggle_field_data(&self, data: &FieldData, new_state: &str) -> FieldData {
        self.behavior().toggle_field_data(data, new_state)
    }

    pub fn suggestions(&self, ctx: &FieldContext<'_>) -> StoreResult<Vec<String>> {
        self.behavior().suggestions(&self.info, ctx)
    }

    pub fn fetch_associated_entry_count(
        &self,
        parent_data: &FieldData,
        ctx: &FieldContext<'_>,
    ) -> StoreResult<usize> {
        self.behavior().fetch_associated_entry_count(&self.info, parent_data, ctx)
    }

    pub fn entry_data_cleanup(
        &self,
        store: &dyn FieldDataStore,
        entry_ids: &[EntryId],
        data: Option<&FieldData>,
    ) -> StoreResult<()> {
        self.behavior().entry_data_cleanup(&self.info, store, entry_ids, data)
    }

    pub fn tear_down(&self, store: &dyn FieldDataStore) -> StoreResult<()> {
        self.behavior().tear_down(&self.info, store)
    }
}

/// Required-and-empty check shared by most variants.
pub(crate) fn require(info: &FieldInfo, empty: bool) -> FieldResult<()> {
    if empty && info.required {
        Err(FieldError::missing_required(&info.label))
    } else {
        Ok(())
    }
}

/// Rejects values longer than the column allows.
pub(crate) fn check_length(info: &FieldInfo, value: &str, max: usize) -> FieldResult<()> {
    if value.chars().count() > max {
        Err(FieldError::invalid_with(format!(
            "'{}' must be no longer than {max} characters.",
            info.label
        )))
    } else {
        Ok(())
    }
}
