//! Typed failure reasons for every storage concern.
//!
//! # Responsibility
//! - Define closed error sets per concern (generic, facade, preference
//!   store, embedded database).
//! - Provide the umbrella `StorageError` returned by every public operation.
//!
//! # Invariants
//! - Error values carry their lower-level cause as `source()` where one
//!   exists; nothing is stringified away.
//! - This module holds no logic beyond formatting and conversions.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Boxed lower-level cause kept inside coarse error kinds.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

pub type StorageResult<T> = Result<T, StorageError>;

/// Failures shared by every storage strategy.
#[derive(Debug)]
pub enum GeneralStorageError {
    /// The value could not be represented in the storage encoding.
    EncodingFailed(serde_json::Error),
    /// Stored bytes do not match the requested shape.
    DecodingFailed(serde_json::Error),
    /// Key is empty or otherwise unusable.
    InvalidKey(String),
    InsufficientStorage,
    PermissionDenied,
    /// Anything not covered by a more specific kind.
    Unexpected(BoxError),
}

impl Display for GeneralStorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EncodingFailed(err) => write!(f, "failed to encode data: {err}"),
            Self::DecodingFailed(err) => write!(f, "failed to decode data: {err}"),
            Self::InvalidKey(key) => write!(f, "the provided key is invalid: `{key}`"),
            Self::InsufficientStorage => write!(f, "insufficient storage space available"),
            Self::PermissionDenied => write!(f, "permission denied for the requested operation"),
            Self::Unexpected(err) => write!(f, "an unexpected error occurred: {err}"),
        }
    }
}

impl Error for GeneralStorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::EncodingFailed(err) | Self::DecodingFailed(err) => Some(err),
            Self::Unexpected(err) => Some(err.as_ref()),
            Self::InvalidKey(_) | Self::InsufficientStorage | Self::PermissionDenied => None,
        }
    }
}

/// Failures raised by the storage facade itself.
#[derive(Debug)]
pub enum ManagerError {
    /// Backend construction failed; the original failure is kept as source.
    InitializationFailed(Box<StorageError>),
    BackendNotInitialized,
    UnsupportedStorageKind(String),
    /// The facade lock was poisoned by a panicking caller.
    ConcurrencyError,
}

impl Display for ManagerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InitializationFailed(_) => write!(f, "failed to initialize the storage manager"),
            Self::BackendNotInitialized => write!(f, "storage backend is not initialized"),
            Self::UnsupportedStorageKind(kind) => write!(f, "unsupported storage kind: `{kind}`"),
            Self::ConcurrencyError => write!(f, "a concurrency error occurred"),
        }
    }
}

impl Error for ManagerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InitializationFailed(err) => Some(err.as_ref()),
            Self::BackendNotInitialized | Self::UnsupportedStorageKind(_) | Self::ConcurrencyError => {
                None
            }
        }
    }
}

/// Failures specific to the preference-store backend.
#[derive(Debug)]
pub enum PreferenceError {
    SaveFailed(BoxError),
    FetchFailed(BoxError),
    DeleteFailed(BoxError),
    DataNotFound(String),
}

impl Display for PreferenceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SaveFailed(err) => write!(f, "failed to save item to preference store: {err}"),
            Self::FetchFailed(err) => {
                write!(f, "failed to fetch item from preference store: {err}")
            }
            Self::DeleteFailed(err) => {
                write!(f, "failed to delete item from preference store: {err}")
            }
            Self::DataNotFound(key) => write!(f, "data not found in preference store: `{key}`"),
        }
    }
}

impl Error for PreferenceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::SaveFailed(err) | Self::FetchFailed(err) | Self::DeleteFailed(err) => {
                Some(err.as_ref())
            }
            Self::DataNotFound(_) => None,
        }
    }
}

/// Failures specific to the embedded-database backend.
#[derive(Debug)]
pub enum DatabaseError {
    InitializationFailed(BoxError),
    TransactionFailed(BoxError),
    /// On-disk schema cannot be used by this binary as-is.
    MigrationRequired {
        db_version: u32,
        latest_supported: u32,
    },
    SchemaValidationFailed(String),
    ObjectNotFound(String),
    InvalidQuery(String),
}

impl Display for DatabaseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InitializationFailed(err) => write!(f, "failed to initialize database: {err}"),
            Self::TransactionFailed(err) => write!(f, "database transaction failed: {err}"),
            Self::MigrationRequired {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database migration is required: schema version {db_version}, supported {latest_supported}"
            ),
            Self::SchemaValidationFailed(message) => {
                write!(f, "database schema validation failed: {message}")
            }
            Self::ObjectNotFound(key) => write!(f, "database record not found: `{key}`"),
            Self::InvalidQuery(message) => write!(f, "invalid database query: {message}"),
        }
    }
}

impl Error for DatabaseError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InitializationFailed(err) | Self::TransactionFailed(err) => Some(err.as_ref()),
            Self::MigrationRequired { .. }
            | Self::SchemaValidationFailed(_)
            | Self::ObjectNotFound(_)
            | Self::InvalidQuery(_) => None,
        }
    }
}

/// Umbrella error returned by the facade and every strategy.
#[derive(Debug)]
pub enum StorageError {
    General(GeneralStorageError),
    Manager(ManagerError),
    Preferences(PreferenceError),
    Database(DatabaseError),
}

impl StorageError {
    /// Returns true for the backend-specific "no value at key" kinds.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Preferences(PreferenceError::DataNotFound(_))
                | Self::Database(DatabaseError::ObjectNotFound(_))
        )
    }
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::General(err) => write!(f, "{err}"),
            Self::Manager(err) => write!(f, "{err}"),
            Self::Preferences(err) => write!(f, "{err}"),
            Self::Database(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::General(err) => Some(err),
            Self::Manager(err) => Some(err),
            Self::Preferences(err) => Some(err),
            Self::Database(err) => Some(err),
        }
    }
}

impl From<GeneralStorageError> for StorageError {
    fn from(value: GeneralStorageError) -> Self {
        Self::General(value)
    }
}

impl From<ManagerError> for StorageError {
    fn from(value: ManagerError) -> Self {
        Self::Manager(value)
    }
}

impl From<PreferenceError> for StorageError {
    fn from(value: PreferenceError) -> Self {
        Self::Preferences(value)
    }
}

impl From<DatabaseError> for StorageError {
    fn from(value: DatabaseError) -> Self {
        Self::Database(value)
    }
}
