//! Registry of field types by handle.
//!
//! Field types are resolved once, at startup, into a table of constructors.
//! Loading a stored field looks its type handle up here and builds the
//! variant from its persisted settings.

use crate::field::{
    AuthorField, CheckboxField, DateField, FieldKind, InputField, SelectField, TagListField,
    TextareaField, UploadField,
};
use crate::settings::{ConfigError, FieldConfig, SettingSpec, Settings};
use std::collections::BTreeMap;

/// Registration of one field type.
#[derive(Debug, Clone, Copy)]
pub struct FieldType {
    pub handle: &'static str,
    pub name: &'static str,
    pub settings: &'static [SettingSpec],
    build: fn(&Settings) -> Result<FieldKind, ConfigError>,
}

impl FieldType {
    pub fn of<F: FieldConfig + Into<FieldKind>>() -> Self {
        Self {
            handle: F::HANDLE,
            name: F::NAME,
            settings: F::SETTINGS,
            build: build_kind::<F>,
        }
    }

    /// Default settings bag for the type.
    pub fn default_settings(&self) -> Settings {
        Settings::new(self.settings)
    }
}

fn build_kind<F: FieldConfig + Into<FieldKind>>(settings: &Settings) -> Result<FieldKind, ConfigError> {
    F::from_settings(settings).map(Into::into)
}

#[derive(Debug, Clone, Default)]
pub struct FieldRegistry {
    types: BTreeMap<&'static str, FieldType>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in type.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(FieldType::of::<InputField>());
        registry.register(FieldType::of::<TextareaField>());
        registry.register(FieldType::of::<CheckboxField>());
        registry.register(FieldType::of::<SelectField>());
        registry.register(FieldType::of::<AuthorField>());
        registry.register(FieldType::of::<DateField>());
        registry.register(FieldType::of::<TagListField>());
        registry.register(FieldType::of::<UploadField>());
        registry
    }

    /// Adds or replaces a type.
    pub fn register(&mut self, field_type: FieldType) {
        self.types.insert(field_type.handle, field_type);
    }

    pub fn get(&self, handle: &str) -> Option<&FieldType> {
        self.types.get(handle)
    }

    pub fn handles(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.types.keys().copied()
    }

    /// Builds a variant from a settings bag.
    pub fn build(&self, handle: &str, settings: &Settings) -> Result<FieldKind, ConfigError> {
        let field_type = self
            .get(handle)
            .ok_or_else(|| ConfigError::UnknownFieldType(handle.to_string()))?;
        (field_type.build)(settings)
    }

    /// Builds a variant from persisted `(key, value)` pairs, starting from
    /// defaults. Unknown or malformed pairs are ignored.
    pub fn build_from_raw<'a>(
        &self,
        handle: &str,
        pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<FieldKind, ConfigError> {
        let field_type = self
            .get(handle)
            .ok_or_else(|| ConfigError::UnknownFieldType(handle.to_string()))?;
        let mut settings = field_type.default_settings();
        for (key, raw) in pairs {
            settings.set_raw(key, raw);
        }
        (field_type.build)(&settings)
    }
}
