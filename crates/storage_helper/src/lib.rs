//! Uniform save/fetch/delete storage over interchangeable backends.
//! A `StorageManager` owns one strategy chosen at construction and
//! serializes access to it.

pub mod codec;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod manager;
pub mod preferences;
pub mod strategy;

pub use codec::Encodable;
pub use config::{DatabaseConfig, DatabaseLocation, PreferenceConfig, StorageKind, StorageSettings};
pub use db::{DatabaseBackend, RecordFilter};
pub use error::{
    BoxError, DatabaseError, GeneralStorageError, ManagerError, PreferenceError, StorageError,
    StorageResult,
};
pub use logging::{
    default_log_level, init_logging, logging_status, LogLevel, LogSink, StorageLogger,
};
pub use manager::StorageManager;
pub use preferences::{
    FilePreferenceStore, MemoryPreferenceStore, PreferenceBackend, PreferenceStore,
};
pub use strategy::{DatabaseCapabilities, StorageStrategy, StorageStrategyExt};

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
