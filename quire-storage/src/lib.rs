//! SQLite-backed content storage for Quire.
//!
//! [`ContentStore`] owns the connection, the field registry and the engine
//! configuration. Work happens through three borrowing managers:
//!
//! - [`SectionManager`]: sections, their fields, and section associations
//! - [`FieldManager`]: single field definitions and their data tables
//! - [`EntryManager`]: entries across the core table and per-field tables
//!
//! # Tables
//!
//! - `tbl_sections`, `tbl_fields`, `tbl_entries`, `tbl_sections_association`
//!   are created on open
//! - `tbl_fields_<type>` holds the settings of every field of one type
//! - `tbl_entries_data_<field-id>` holds one field's entry data, provisioned
//!   when the field is saved
//!
//! Every write that touches more than one row runs as one atomic unit.

mod config;
mod entry;
mod entry_manager;
mod error;
mod field_manager;
mod field_store;
mod schema;
mod section_manager;

pub use config::{DatabaseConfig, EngineConfig, EntriesConfig, DEFAULT_DELETE_CHUNK_SIZE};
pub use entry::{AssociatedCounts, Entry, EntryState};
pub use entry_manager::{EntryManager, EntryPage, EntryQuery};
pub use error::{StorageError, StorageResult};
pub use field_manager::FieldManager;
pub use field_store::SqlFieldStore;
pub use section_manager::SectionManager;

use quire_db::Database;
use quire_model::FieldRegistry;
use tracing::info;

/// An open content database.
pub struct ContentStore {
    db: Database,
    registry: FieldRegistry,
    config: EngineConfig,
}

impl ContentStore {
    /// Opens the configured database file (or an in-memory database when no
    /// path is set) and creates the core tables if missing.
    pub fn open(config: EngineConfig) -> StorageResult<Self> {
        config.validate()?;
        let db = match &config.database.path {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| StorageError::Config(format!("{}: {e}", parent.display())))?;
                }
                Database::open(path, &config.database.options())?
            }
            None => Database::open_in_memory()?,
        };
        db.with_conn(schema::bootstrap)?;
        info!(
            path = %config.database.path.as_deref().map(|p| p.display().to_string()).unwrap_or_else(|| ":memory:".into()),
            "Opened content store"
        );
        Ok(Self {
            db,
            registry: FieldRegistry::builtin(),
            config,
        })
    }

    pub fn open_in_memory() -> StorageResult<Self> {
        Self::open(EngineConfig::default())
    }

    /// Replaces the built-in field registry.
    #[must_use]
    pub fn with_registry(mut self, registry: FieldRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sections(&self) -> SectionManager<'_> {
        SectionManager::new(self)
    }

    pub fn fields(&self) -> FieldManager<'_> {
        FieldManager::new(self)
    }

    pub fn entries(&self) -> EntryManager<'_> {
        EntryManager::new(self)
    }
}
