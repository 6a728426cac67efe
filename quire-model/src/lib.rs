//! Section and field model for Quire.
//!
//! Defines the content-type contract the storage layer builds on:
//! - [`Settings`]: the typed key/value bag behind every configuration form
//! - [`Field`] / [`FieldBehavior`]: the field contract and its eight variants
//! - [`FieldRegistry`]: type handle to constructor, resolved once at startup
//! - [`Section`]: an ordered set of fields with validation and sort resolution
//! - [`FieldDataStore`]: the seam through which fields reach persisted data
//!
//! Nothing here opens a connection; storage hands fields a [`FieldContext`].

mod association;
pub mod field;
mod filter;
mod grouping;
mod modes;
pub mod raw;
mod registry;
mod section;
mod settings;
mod status;
mod store;

pub use association::SectionAssociation;
pub use field::{
    AuthorField, CheckboxField, DateField, Field, FieldBehavior, FieldInfo, FieldKind, InputField,
    Location, SelectField, TagListField, TagSource, TextFormatter, TextareaField, UploadField,
    Validator, COMMON_SETTINGS,
};
pub use filter::{FieldFilter, FilterMode, FilterRequest, Predicate};
pub use grouping::{GroupLevel, GroupingError, Record, RecordGroup};
pub use modes::{ExportMode, ExportValue, ImportMode};
pub use registry::{FieldRegistry, FieldType};
pub use section::{
    Section, SectionErrors, SortKey, SortOrder, SortPreference, SortPreferences, SortingOverrides,
    SECTION_SETTINGS,
};
pub use settings::{parse_bool, ConfigError, FieldConfig, SettingKind, SettingSpec, SettingValue, Settings};
pub use status::{status_of, FieldError, FieldErrors, FieldResult, FieldStatus};
pub use store::{remove_file_now, DetachedStore, FieldContext, FieldDataStore, StoreError, StoreResult};
