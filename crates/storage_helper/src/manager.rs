//! Storage facade dispatching to one selected strategy.
//!
//! # Responsibility
//! - Build exactly one backend from a `StorageKind` at construction.
//! - Serialize access: fetches share a read lock, saves and deletes take the
//!   write lock.
//! - Forward typed operations and propagate backend errors unchanged.
//!
//! # Invariants
//! - The active backend never changes after construction.
//! - Calls on a facade without a backend fail with `BackendNotInitialized`.
//! - Construction failures are reported as `InitializationFailed` with the
//!   original error kept as source.

use crate::config::{StorageKind, StorageSettings};
use crate::db::DatabaseBackend;
use crate::error::{ManagerError, StorageResult};
use crate::logging::{display_key, StorageLogger};
use crate::preferences::PreferenceBackend;
use crate::strategy::{DatabaseCapabilities, StorageStrategy, StorageStrategyExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

const MODULE: &str = "manager";

type SharedStrategy = Arc<dyn StorageStrategy>;

/// Thread-safe entry point over one storage strategy.
pub struct StorageManager {
    backend: RwLock<Option<SharedStrategy>>,
    logger: StorageLogger,
}

impl StorageManager {
    /// Builds a facade for `kind` using the process-wide logger.
    ///
    /// # Errors
    /// - `ManagerError::InitializationFailed` when the backend cannot be
    ///   built; the backend's own error is available via `source()`.
    pub fn new(kind: StorageKind) -> StorageResult<Self> {
        Self::with_logger(kind, StorageLogger::shared())
    }

    /// Builds a facade for `kind`, sharing `logger` with built-in backends.
    pub fn with_logger(kind: StorageKind, logger: StorageLogger) -> StorageResult<Self> {
        let kind_name = kind.name();
        match build_strategy(kind, &logger) {
            Ok(strategy) => {
                logger.info(format_args!(
                    "event=manager_init module={MODULE} status=ok kind={kind_name}"
                ));
                Ok(Self::bound(strategy, logger))
            }
            Err(err) => {
                logger.error(format_args!(
                    "event=manager_init module={MODULE} status=error kind={kind_name} error={err}"
                ));
                Err(ManagerError::InitializationFailed(Box::new(err)).into())
            }
        }
    }

    /// Builds a facade for `kind`, leaving it without a backend on failure.
    ///
    /// The failure is logged; every later data call then fails with
    /// `BackendNotInitialized`.
    pub fn new_or_unbound(kind: StorageKind) -> Self {
        let logger = StorageLogger::shared();
        match Self::with_logger(kind, logger.clone()) {
            Ok(manager) => manager,
            Err(_) => Self::unbound_with_logger(logger),
        }
    }

    /// Builds a facade from a host settings document and applies its
    /// logging preference.
    pub fn from_settings(settings: &StorageSettings) -> StorageResult<Self> {
        let manager = Self::new(settings.to_kind()?)?;
        if let Some(enabled) = settings.logging_enabled {
            manager.set_logging_enabled(enabled);
        }
        Ok(manager)
    }

    /// Returns a facade with no backend.
    pub fn unbound() -> Self {
        Self::unbound_with_logger(StorageLogger::shared())
    }

    fn unbound_with_logger(logger: StorageLogger) -> Self {
        Self {
            backend: RwLock::new(None),
            logger,
        }
    }

    fn bound(strategy: SharedStrategy, logger: StorageLogger) -> Self {
        Self {
            backend: RwLock::new(Some(strategy)),
            logger,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.read_guard()
            .map(|backend| backend.is_some())
            .unwrap_or(false)
    }

    /// Saves `item` under `key` while holding the write lock.
    pub fn save<T: Serialize>(&self, item: &T, key: &str) -> StorageResult<()> {
        let guard = self.write_guard()?;
        let backend = self.require_backend(guard.as_ref(), "save", key)?;
        backend.save(item, key)
    }

    /// Fetches the value at `key` while holding a read lock.
    pub fn fetch<T: DeserializeOwned>(&self, key: &str) -> StorageResult<T> {
        let guard = self.read_guard()?;
        let backend = self.require_backend(guard.as_ref(), "fetch", key)?;
        backend.fetch(key)
    }

    /// Deletes the value at `key` while holding the write lock.
    pub fn delete(&self, key: &str) -> StorageResult<()> {
        let guard = self.write_guard()?;
        let backend = self.require_backend(guard.as_ref(), "delete", key)?;
        backend.delete(key)
    }

    /// Enables or disables diagnostic output for this facade's logger.
    pub fn set_logging_enabled(&self, enabled: bool) {
        self.logger.set_enabled(enabled);
    }

    pub fn is_logging_enabled(&self) -> bool {
        self.logger.is_enabled()
    }

    /// Returns the extended database operations when the active backend
    /// offers them.
    ///
    /// Calls made through the returned handle do not take the facade lock.
    pub fn as_database_backend(&self) -> Option<Arc<dyn DatabaseCapabilities>> {
        let guard = self.read_guard().ok()?;
        let backend = guard.as_ref()?;
        Arc::clone(backend).database_capabilities()
    }

    fn read_guard(&self) -> StorageResult<RwLockReadGuard<'_, Option<SharedStrategy>>> {
        self.backend.read().map_err(|_| {
            self.logger.error(format_args!(
                "event=manager_lock module={MODULE} status=error mode=read error_code=lock_poisoned"
            ));
            ManagerError::ConcurrencyError.into()
        })
    }

    fn write_guard(&self) -> StorageResult<RwLockWriteGuard<'_, Option<SharedStrategy>>> {
        self.backend.write().map_err(|_| {
            self.logger.error(format_args!(
                "event=manager_lock module={MODULE} status=error mode=write error_code=lock_poisoned"
            ));
            ManagerError::ConcurrencyError.into()
        })
    }

    fn require_backend<'a>(
        &self,
        backend: Option<&'a SharedStrategy>,
        operation: &str,
        key: &str,
    ) -> StorageResult<&'a SharedStrategy> {
        backend.ok_or_else(|| {
            self.logger.error(format_args!(
                "event=storage_{operation} module={MODULE} status=error error_code=backend_not_initialized key={}",
                display_key(key)
            ));
            ManagerError::BackendNotInitialized.into()
        })
    }
}

impl Default for StorageManager {
    fn default() -> Self {
        Self::unbound()
    }
}

fn build_strategy(kind: StorageKind, logger: &StorageLogger) -> StorageResult<SharedStrategy> {
    match kind {
        StorageKind::Preferences(config) => {
            Ok(Arc::new(PreferenceBackend::open(&config, logger.clone())?))
        }
        StorageKind::Database(config) => {
            Ok(Arc::new(DatabaseBackend::open(&config, logger.clone())?))
        }
        StorageKind::Custom(strategy) => Ok(strategy),
    }
}

#[cfg(test)]
mod tests {
    use super::StorageManager;
    use crate::config::{DatabaseConfig, StorageKind};
    use crate::error::{ManagerError, StorageError};

    #[test]
    fn unbound_manager_reports_backend_not_initialized() {
        let manager = StorageManager::default();
        assert!(!manager.is_initialized());

        let err = manager.delete("k").unwrap_err();
        assert!(matches!(
            err,
            StorageError::Manager(ManagerError::BackendNotInitialized)
        ));
        assert!(manager.as_database_backend().is_none());
    }

    #[test]
    fn logging_toggle_is_visible_through_the_manager() {
        let manager = StorageManager::new(StorageKind::Database(DatabaseConfig::in_memory()))
            .expect("in-memory database should open");
        assert!(manager.is_initialized());

        manager.set_logging_enabled(false);
        assert!(!manager.is_logging_enabled());
        manager.set_logging_enabled(true);
        assert!(manager.is_logging_enabled());
    }
}
