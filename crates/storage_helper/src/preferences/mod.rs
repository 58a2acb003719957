//! Preference-store backed storage strategy.
//!
//! # Responsibility
//! - Implement the storage contract atop a flat key-value preference store.
//! - Store exactly one encoded blob per key.
//!
//! # Invariants
//! - Encoding failures surface as `EncodingFailed`; every other save fault
//!   surfaces as `SaveFailed`.
//! - Deleting an absent key is success.

mod store;

pub use store::{standard_path, FilePreferenceStore, MemoryPreferenceStore, PreferenceStore};

use crate::codec::Encodable;
use crate::config::PreferenceConfig;
use crate::error::{GeneralStorageError, PreferenceError, StorageResult};
use crate::logging::{display_key, StorageLogger};
use crate::strategy::{validate_key, StorageStrategy};
use std::io::{self, ErrorKind};
use std::sync::Arc;

const MODULE: &str = "preferences";

/// Storage strategy over a [`PreferenceStore`].
pub struct PreferenceBackend {
    store: Arc<dyn PreferenceStore>,
    logger: StorageLogger,
}

impl PreferenceBackend {
    pub fn new(store: Arc<dyn PreferenceStore>, logger: StorageLogger) -> Self {
        Self { store, logger }
    }

    /// Builds the backend for `config`, opening the underlying store.
    ///
    /// # Errors
    /// - `GeneralStorageError::PermissionDenied` when the store location is
    ///   not accessible.
    /// - `GeneralStorageError::Unexpected` for any other open failure.
    pub fn open(config: &PreferenceConfig, logger: StorageLogger) -> StorageResult<Self> {
        let opened: io::Result<Arc<dyn PreferenceStore>> = match config {
            PreferenceConfig::Standard => FilePreferenceStore::standard()
                .map(|store| Arc::new(store) as Arc<dyn PreferenceStore>),
            PreferenceConfig::File(path) => FilePreferenceStore::open(path)
                .map(|store| Arc::new(store) as Arc<dyn PreferenceStore>),
            PreferenceConfig::InMemory => Ok(Arc::new(MemoryPreferenceStore::new())),
        };

        match opened {
            Ok(store) => {
                logger.info(format_args!(
                    "event=backend_open module={MODULE} status=ok config={config:?}"
                ));
                Ok(Self::new(store, logger))
            }
            Err(err) => {
                logger.error(format_args!(
                    "event=backend_open module={MODULE} status=error config={config:?} error={err}"
                ));
                Err(open_failure(err).into())
            }
        }
    }

    pub fn store(&self) -> &Arc<dyn PreferenceStore> {
        &self.store
    }
}

impl StorageStrategy for PreferenceBackend {
    fn save(&self, item: &dyn Encodable, key: &str) -> StorageResult<()> {
        validate_key(key, MODULE, &self.logger)?;

        let data = match item.encode() {
            Ok(data) => data,
            Err(err) if !err.is_io() => {
                self.logger.error(format_args!(
                    "event=storage_save module={MODULE} status=error error_code=encoding_failed key={} error={err}",
                    display_key(key)
                ));
                return Err(GeneralStorageError::EncodingFailed(err).into());
            }
            Err(err) => {
                self.logger.error(format_args!(
                    "event=storage_save module={MODULE} status=error error_code=save_failed key={} error={err}",
                    display_key(key)
                ));
                return Err(PreferenceError::SaveFailed(Box::new(err)).into());
            }
        };

        if let Err(err) = self.store.set_data(key, data) {
            self.logger.error(format_args!(
                "event=storage_save module={MODULE} status=error error_code=save_failed key={} error={err}",
                display_key(key)
            ));
            return Err(PreferenceError::SaveFailed(Box::new(err)).into());
        }

        self.logger.info(format_args!(
            "event=storage_save module={MODULE} status=ok key={}",
            display_key(key)
        ));
        Ok(())
    }

    fn fetch_payload(&self, key: &str) -> StorageResult<Vec<u8>> {
        validate_key(key, MODULE, &self.logger)?;

        match self.store.data(key) {
            Ok(Some(data)) => Ok(data),
            Ok(None) => {
                self.logger.warning(format_args!(
                    "event=storage_fetch module={MODULE} status=not_found key={}",
                    display_key(key)
                ));
                Err(PreferenceError::DataNotFound(key.to_string()).into())
            }
            Err(err) => {
                self.logger.error(format_args!(
                    "event=storage_fetch module={MODULE} status=error error_code=fetch_failed key={} error={err}",
                    display_key(key)
                ));
                Err(PreferenceError::FetchFailed(Box::new(err)).into())
            }
        }
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        if let Err(err) = self.store.remove(key) {
            self.logger.error(format_args!(
                "event=storage_delete module={MODULE} status=error error_code=delete_failed key={} error={err}",
                display_key(key)
            ));
            return Err(PreferenceError::DeleteFailed(Box::new(err)).into());
        }

        self.logger.info(format_args!(
            "event=storage_delete module={MODULE} status=ok key={}",
            display_key(key)
        ));
        Ok(())
    }

    fn logger(&self) -> StorageLogger {
        self.logger.clone()
    }
}

fn open_failure(err: io::Error) -> GeneralStorageError {
    match err.kind() {
        ErrorKind::PermissionDenied => GeneralStorageError::PermissionDenied,
        _ => GeneralStorageError::Unexpected(Box::new(err)),
    }
}
