//! Engine configuration, loaded from TOML.
//!
//! ```toml
//! [database]
//! path = "data/quire.db"
//! busy_timeout_ms = 5000
//!
//! [entries]
//! delete_chunk_size = 2500
//! default_author_id = 1
//!
//! [sorting.articles]
//! field = "date"
//! order = "desc"
//! ```

use crate::error::{StorageError, StorageResult};
use quire_db::DbOptions;
use quire_model::SortingOverrides;
use quire_types::AuthorId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Upper bound on entries removed per transactional chunk.
pub const DEFAULT_DELETE_CHUNK_SIZE: usize = 2500;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub database: DatabaseConfig,
    pub entries: EntriesConfig,
    /// Sort overrides keyed by section handle.
    pub sorting: SortingOverrides,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file; in memory when absent.
    pub path: Option<PathBuf>,
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: 5_000,
        }
    }
}

impl DatabaseConfig {
    pub fn options(&self) -> DbOptions {
        DbOptions {
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntriesConfig {
    pub delete_chunk_size: usize,
    /// Author recorded on entries created without one.
    pub default_author_id: i64,
}

impl Default for EntriesConfig {
    fn default() -> Self {
        Self {
            delete_chunk_size: DEFAULT_DELETE_CHUNK_SIZE,
            default_author_id: 1,
        }
    }
}

impl EntriesConfig {
    pub fn default_author(&self) -> AuthorId {
        AuthorId::new(self.default_author_id)
    }
}

impl EngineConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str) -> StorageResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| StorageError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a TOML file.
    pub fn load(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| StorageError::Config(format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), "Loading engine configuration");
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> StorageResult<()> {
        if self.entries.delete_chunk_size == 0 {
            return Err(StorageError::Config(
                "entries.delete_chunk_size must be at least 1".into(),
            ));
        }
        if self.entries.default_author_id < 1 {
            return Err(StorageError::Config(
                "entries.default_author_id must be a positive id".into(),
            ));
        }
        Ok(())
    }

    /// In-memory configuration with a custom delete chunk size.
    #[must_use]
    pub fn with_delete_chunk_size(mut self, size: usize) -> Self {
        self.entries.delete_chunk_size = size;
        self
    }
}
