use super::{
    AuthorField, CheckboxField, DateField, FieldBehavior, InputField, SelectField, TagListField,
    TextareaField, UploadField,
};
use crate::registry::FieldRegistry;
use crate::settings::{ConfigError, FieldConfig, SettingSpec, Settings};

/// The closed set of field variants.
#[derive(Debug, Clone)]
pub enum FieldKind {
    Input(InputField),
    Textarea(TextareaField),
    Checkbox(CheckboxField),
    Select(SelectField),
    Author(AuthorField),
    Date(DateField),
    TagList(TagListField),
    Upload(UploadField),
}

macro_rules! dispatch {
    ($self:expr, $inner:ident => $body:expr) => {
        match $self {
            FieldKind::Input($inner) => $body,
            FieldKind::Textarea($inner) => $body,
            FieldKind::Checkbox($inner) => $body,
            FieldKind::Select($inner) => $body,
            FieldKind::Author($inner) => $body,
            FieldKind::Date($inner) => $body,
            FieldKind::TagList($inner) => $body,
            FieldKind::Upload($inner) => $body,
        }
    };
}

macro_rules! impl_from {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(impl From<$ty> for FieldKind {
            fn from(value: $ty) -> Self {
                FieldKind::$variant(value)
            }
        })*
    };
}

impl_from!(
    Input(InputField),
    Textarea(TextareaField),
    Checkbox(CheckboxField),
    Select(SelectField),
    Author(AuthorField),
    Date(DateField),
    TagList(TagListField),
    Upload(UploadField),
);

impl FieldKind {
    pub fn behavior(&self) -> &dyn FieldBehavior {
        dispatch!(self, f => f as &dyn FieldBehavior)
    }

    pub fn handle(&self) -> &'static str {
        self.behavior().handle()
    }

    /// Typed configuration as a bag of variant settings.
    pub fn settings(&self) -> Settings {
        dispatch!(self, f => f.to_settings())
    }

    pub fn setting_specs(&self) -> &'static [SettingSpec] {
        match self {
            Self::Input(_) => InputField::SETTINGS,
            Self::Textarea(_) => TextareaField::SETTINGS,
            Self::Checkbox(_) => CheckboxField::SETTINGS,
            Self::Select(_) => SelectField::SETTINGS,
            Self::Author(_) => AuthorField::SETTINGS,
            Self::Date(_) => DateField::SETTINGS,
            Self::TagList(_) => TagListField::SETTINGS,
            Self::Upload(_) => UploadField::SETTINGS,
        }
    }

    /// Builds a variant of a built-in type from a settings bag.
    pub fn from_settings(handle: &str, settings: &Settings) -> Result<Self, ConfigError> {
        FieldRegistry::builtin().build(handle, settings)
    }
}
