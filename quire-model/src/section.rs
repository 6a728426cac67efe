//! Sections: named content types owning an ordered list of fields.

use crate::field::{Field, Location};
use crate::settings::{SettingKind, SettingSpec, Settings};
use quire_types::{create_handle, FieldId, SectionId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// Settings a section carries in its form.
pub const SECTION_SETTINGS: &[SettingSpec] = &[
    SettingSpec::new("name", SettingKind::Text, ""),
    SettingSpec::new("handle", SettingKind::Text, ""),
    SettingSpec::new("navigation_group", SettingKind::Text, "Content"),
    SettingSpec::new("hidden", SettingKind::Bool, "no"),
    SettingSpec::new("filter", SettingKind::Bool, "yes"),
];

fn duplicate_element_name() -> String {
    "A field with that element name already exists. Please choose another.".to_string()
}

fn duplicate_type(field: &Field) -> String {
    format!(
        "There is already a field of type '{}'. There can only be one per section.",
        field.behavior().name()
    )
}

/// What entries are ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortKey {
    Field(FieldId),
    SystemId,
    SystemCreationDate,
    SystemModificationDate,
}

impl SortKey {
    /// Parses a system sort key (`system:id`, `system:creation-date`,
    /// `system:modification-date`, or the short forms without the prefix).
    pub fn parse_system(raw: &str) -> Option<Self> {
        match raw.trim().trim_start_matches("system:") {
            "id" => Some(Self::SystemId),
            "creation-date" => Some(Self::SystemCreationDate),
            "modification-date" => Some(Self::SystemModificationDate),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
    Random,
}

impl SortOrder {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            "random" | "rand" => Some(Self::Random),
            _ => None,
        }
    }
}

/// A per-section sort override: a field element name, a field id, or a
/// system key, plus an optional order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortPreference {
    pub field: String,
    #[serde(default)]
    pub order: Option<SortOrder>,
}

/// Source of sort overrides, keyed by section handle.
pub trait SortPreferences {
    fn sort_preference(&self, section_handle: &str) -> Option<&SortPreference>;
}

/// Sort overrides held in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SortingOverrides(BTreeMap<String, SortPreference>);

impl SortingOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, section_handle: &str, preference: SortPreference) {
        self.0.insert(section_handle.to_string(), preference);
    }

    pub fn remove(&mut self, section_handle: &str) -> Option<SortPreference> {
        self.0.remove(section_handle)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl SortPreferences for SortingOverrides {
    fn sort_preference(&self, section_handle: &str) -> Option<&SortPreference> {
        self.0.get(section_handle)
    }
}

/// Validation errors of a section and its fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionErrors {
    /// Errors on section attributes, keyed by setting.
    pub section: BTreeMap<&'static str, String>,
    /// Errors on fields, keyed by position in the section.
    pub fields: BTreeMap<usize, BTreeMap<&'static str, String>>,
}

impl SectionErrors {
    pub fn is_empty(&self) -> bool {
        self.section.is_empty() && self.fields.is_empty()
    }
}

/// A content type.
#[derive(Debug, Clone)]
pub struct Section {
    pub id: Option<SectionId>,
    pub name: String,
    pub handle: String,
    pub navigation_group: String,
    pub hidden: bool,
    /// Whether the entry table offers filtering.
    pub filter: bool,
    pub sortorder: i64,
    fields: Vec<Field>,
    errors: SectionErrors,
}

impl Section {
    pub fn new(name: &str) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            handle: create_handle(name),
            navigation_group: "Content".to_string(),
            hidden: false,
            filter: true,
            sortorder: 0,
            fields: Vec::new(),
            errors: SectionErrors::default(),
        }
    }

    #[must_use]
    pub fn with_handle(mut self, handle: &str) -> Self {
        self.handle = handle.to_string();
        self
    }

    #[must_use]
    pub fn with_field(mut self, field: Field) -> Self {
        self.add_field(field);
        self
    }

    pub fn set_id(&mut self, id: SectionId) {
        self.id = Some(id);
        for field in &mut self.fields {
            field.set_section_id(id);
        }
    }

    /// Appends a field, placing it after the existing ones.
    pub fn add_field(&mut self, mut field: Field) {
        field.info_mut().sortorder = self.fields.len() as i64;
        if let Some(id) = self.id {
            field.set_section_id(id);
        }
        self.fields.push(field);
    }

    /// Removes a saved field, renumbering the rest.
    pub fn remove_field(&mut self, id: FieldId) -> Option<Field> {
        let index = self.fields.iter().position(|f| f.id() == Some(id))?;
        let removed = self.fields.remove(index);
        self.renumber();
        Some(removed)
    }

    /// Replaces the field list, e.g. when loading from storage. Fields are
    /// kept in their `sortorder`.
    pub fn set_fields(&mut self, mut fields: Vec<Field>) {
        fields.sort_by_key(|f| f.info().sortorder);
        self.fields = fields;
    }

    /// Reorders saved fields to follow `order`; unknown ids are ignored and
    /// unlisted fields keep their relative order after the listed ones.
    pub fn reorder_fields(&mut self, order: &[FieldId]) {
        let rank = |f: &Field| {
            f.id()
                .and_then(|id| order.iter().position(|o| *o == id))
                .unwrap_or(order.len())
        };
        self.fields.sort_by_key(rank);
        self.renumber();
    }

    fn renumber(&mut self) {
        for (i, field) in self.fields.iter_mut().enumerate() {
            field.info_mut().sortorder = i as i64;
        }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut [Field] {
        &mut self.fields
    }

    pub fn field(&self, id: FieldId) -> Option<&Field> {
        self.fields.iter().find(|f| f.id() == Some(id))
    }

    pub fn field_by_element_name(&self, element_name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.element_name() == element_name)
    }

    /// Fields, optionally restricted to a type and/or a location.
    pub fn fetch_fields(&self, type_handle: Option<&str>, location: Option<Location>) -> Vec<&Field> {
        self.fields
            .iter()
            .filter(|f| type_handle.is_none_or(|t| f.type_handle() == t))
            .filter(|f| location.is_none_or(|l| f.info().location == l))
            .collect()
    }

    /// Fields shown as columns in the entry table.
    pub fn fetch_visible_columns(&self) -> Vec<&Field> {
        self.fields.iter().filter(|f| f.info().show_column).collect()
    }

    pub fn fetch_filterable_fields(&self, location: Option<Location>) -> Vec<&Field> {
        self.fetch_fields(None, location)
            .into_iter()
            .filter(|f| f.behavior().can_filter())
            .collect()
    }

    pub fn fetch_toggleable_fields(&self, location: Option<Location>) -> Vec<&Field> {
        self.fetch_fields(None, location)
            .into_iter()
            .filter(|f| f.behavior().can_toggle())
            .collect()
    }

    /// Whether deleting entries must load their data for some field.
    pub fn requires_data_for_cleanup(&self) -> bool {
        self.fields.iter().any(|f| f.behavior().requires_data_for_cleanup())
    }

    /// First visible, sortable field in order; the entry id otherwise.
    pub fn get_default_sorting_field(&self) -> SortKey {
        self.fields
            .iter()
            .filter(|f| f.info().show_column && f.sort_column().is_some())
            .find_map(Field::id)
            .map_or(SortKey::SystemId, SortKey::Field)
    }

    /// The override for this section when it names something sortable,
    /// the default otherwise.
    pub fn get_sorting_field(&self, prefs: &dyn SortPreferences) -> SortKey {
        if let Some(pref) = prefs.sort_preference(&self.handle) {
            match self.resolve_sort_key(&pref.field) {
                Some(key) => return key,
                None => debug!(section = %self.handle, field = %pref.field, "Ignoring unusable sort preference"),
            }
        }
        self.get_default_sorting_field()
    }

    pub fn get_sorting_order(&self, prefs: &dyn SortPreferences) -> SortOrder {
        prefs
            .sort_preference(&self.handle)
            .and_then(|p| p.order)
            .unwrap_or_default()
    }

    fn resolve_sort_key(&self, reference: &str) -> Option<SortKey> {
        if let Some(key) = SortKey::parse_system(reference) {
            return Some(key);
        }
        let field = match reference.parse::<FieldId>() {
            Ok(id) => self.field(id),
            Err(_) => self.field_by_element_name(reference),
        }?;
        field.sort_column()?;
        field.id().map(SortKey::Field)
    }

    /// Section attributes as a settings bag.
    pub fn settings(&self) -> Settings {
        let mut settings = Settings::new(SECTION_SETTINGS);
        settings.set("name", self.name.as_str());
        settings.set("handle", self.handle.as_str());
        settings.set("navigation_group", self.navigation_group.as_str());
        settings.set("hidden", self.hidden);
        settings.set("filter", self.filter);
        settings
    }

    pub fn apply_settings(&mut self, settings: &Settings) {
        self.name = settings.text("name").to_string();
        self.handle = settings.text("handle").to_string();
        self.navigation_group = settings.text("navigation_group").to_string();
        self.hidden = settings.bool("hidden");
        self.filter = settings.bool("filter");
    }

    /// Validates the section and its fields, deriving missing handles and
    /// element names. Errors are kept for [`Section::errors`].
    pub fn validate(&mut self) -> bool {
        let mut errors = SectionErrors::default();
        if self.name.trim().is_empty() {
            errors.section.insert("name", "This is a required field.".to_string());
        }
        if self.handle.trim().is_empty() {
            self.handle = create_handle(&self.name);
        }
        if self.handle.is_empty() {
            errors.section.insert("handle", "This is a required field.".to_string());
        }

        for field in &mut self.fields {
            field.ensure_element_name();
        }
        let mut element_names: HashMap<&str, usize> = HashMap::new();
        let mut unique_types: HashSet<&str> = HashSet::new();
        for (index, field) in self.fields.iter().enumerate() {
            let mut field_errors = field.check_fields();
            if !field.element_name().is_empty()
                && element_names.insert(field.element_name(), index).is_some()
            {
                field_errors
                    .entry("element_name")
                    .or_insert_with(duplicate_element_name);
            }
            if field.behavior().must_be_unique() && !unique_types.insert(field.type_handle()) {
                field_errors.entry("type").or_insert_with(|| duplicate_type(field));
            }
            if !field_errors.is_empty() {
                errors.fields.insert(index, field_errors);
            }
        }

        self.errors = errors;
        self.errors.is_empty()
    }

    /// Checks one field against the fields already in the section, skipping
    /// the field itself when it has an id. Only the constraints between
    /// fields are checked: a unique element name, and one field per type for
    /// types that must be unique.
    pub fn check_sibling_constraints(&self, field: &Field) -> BTreeMap<&'static str, String> {
        let mut errors = BTreeMap::new();
        let siblings = self
            .fields
            .iter()
            .filter(|other| other.id().is_none() || other.id() != field.id());
        for other in siblings {
            if !field.element_name().is_empty() && other.element_name() == field.element_name() {
                errors.entry("element_name").or_insert_with(duplicate_element_name);
            }
            if field.behavior().must_be_unique() && other.type_handle() == field.type_handle() {
                errors.entry("type").or_insert_with(|| duplicate_type(field));
            }
        }
        errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &SectionErrors {
        &self.errors
    }
}
