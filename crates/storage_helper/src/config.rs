//! Backend selection and configuration.
//!
//! # Responsibility
//! - Define the closed set of storage kinds a facade can be built from.
//! - Carry backend-specific configuration values.
//! - Parse host-supplied settings documents into a storage kind.
//!
//! # Invariants
//! - A storage kind is consumed once at facade construction.
//! - Unknown backend names are rejected, never defaulted.

use crate::error::{GeneralStorageError, ManagerError, StorageResult};
use crate::strategy::StorageStrategy;
use serde::Deserialize;
use std::fmt::{Debug, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const MEMORY_PATH_MARKER: &str = ":memory:";

/// Storage backend selected at facade construction.
pub enum StorageKind {
    Preferences(PreferenceConfig),
    Database(DatabaseConfig),
    Custom(Arc<dyn StorageStrategy>),
}

impl StorageKind {
    /// Stable name used in logs and settings documents.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Preferences(_) => "preferences",
            Self::Database(_) => "database",
            Self::Custom(_) => "custom",
        }
    }
}

impl Debug for StorageKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Preferences(config) => f.debug_tuple("Preferences").field(config).finish(),
            Self::Database(config) => f.debug_tuple("Database").field(config).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Where the preference store keeps its values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PreferenceConfig {
    /// Platform preference directory.
    #[default]
    Standard,
    File(PathBuf),
    InMemory,
}

/// Location of the embedded database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    InMemory,
    File(PathBuf),
}

/// Embedded database configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub location: DatabaseLocation,
    /// How long a write waits on a locked database file.
    pub busy_timeout: Duration,
    /// Opens the database without write access; pending migrations then
    /// surface as `MigrationRequired`.
    pub read_only: bool,
}

impl DatabaseConfig {
    pub fn in_memory() -> Self {
        Self {
            location: DatabaseLocation::InMemory,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            read_only: false,
        }
    }

    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            location: DatabaseLocation::File(path.as_ref().to_path_buf()),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            read_only: false,
        }
    }

    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Host-supplied storage settings document.
///
/// ```json
/// { "backend": "database", "path": "/var/lib/app/store.sqlite3", "busy_timeout_ms": 2000 }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageSettings {
    /// `preferences` (alias `user_defaults`) or `database` (alias `sqlite`).
    pub backend: String,
    /// Store location; `:memory:` selects an in-memory store. When absent the
    /// preference backend uses the platform directory and the database
    /// backend runs in memory.
    pub path: Option<PathBuf>,
    pub busy_timeout_ms: Option<u64>,
    pub read_only: bool,
    pub logging_enabled: Option<bool>,
}

impl StorageSettings {
    /// Parses a JSON settings document.
    ///
    /// # Errors
    /// - `GeneralStorageError::DecodingFailed` for malformed documents or
    ///   unknown fields.
    pub fn from_json_str(document: &str) -> StorageResult<Self> {
        serde_json::from_str(document)
            .map_err(|err| GeneralStorageError::DecodingFailed(err).into())
    }

    /// Resolves the settings into a storage kind.
    ///
    /// # Errors
    /// - `ManagerError::UnsupportedStorageKind` for unknown backend names.
    pub fn to_kind(&self) -> StorageResult<StorageKind> {
        let in_memory = self
            .path
            .as_deref()
            .is_some_and(|path| path == Path::new(MEMORY_PATH_MARKER));

        match self.backend.trim().to_ascii_lowercase().as_str() {
            "preferences" | "user_defaults" => {
                let config = match &self.path {
                    _ if in_memory => PreferenceConfig::InMemory,
                    Some(path) => PreferenceConfig::File(path.clone()),
                    None => PreferenceConfig::Standard,
                };
                Ok(StorageKind::Preferences(config))
            }
            "database" | "sqlite" => {
                let mut config = match &self.path {
                    _ if in_memory => DatabaseConfig::in_memory(),
                    Some(path) => DatabaseConfig::file(path),
                    None => DatabaseConfig::in_memory(),
                };
                if let Some(timeout_ms) = self.busy_timeout_ms {
                    config = config.with_busy_timeout(Duration::from_millis(timeout_ms));
                }
                Ok(StorageKind::Database(config.read_only(self.read_only)))
            }
            other => Err(ManagerError::UnsupportedStorageKind(other.to_string()).into()),
        }
    }
}
