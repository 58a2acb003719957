//! Storage strategy contracts.
//!
//! # Responsibility
//! - Define the capability set every backend implements (save, fetch,
//!   delete).
//! - Define the extended capability set offered by database-style backends.
//!
//! # Invariants
//! - Deleting an absent key is success for every strategy.
//! - Strategies never swallow faults other than absent-key deletes.

use crate::codec::{self, Encodable};
use crate::db::RecordFilter;
use crate::error::{GeneralStorageError, StorageResult};
use crate::logging::{display_key, StorageLogger};
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Capability set every storage backend implements.
///
/// The trait is object safe so the facade can hold any backend, including
/// caller-supplied ones, behind `Arc<dyn StorageStrategy>`. Typed fetches go
/// through [`StorageStrategyExt::fetch`].
pub trait StorageStrategy: Send + Sync {
    /// Encodes `item` and stores it under `key`, replacing any prior value.
    fn save(&self, item: &dyn Encodable, key: &str) -> StorageResult<()>;

    /// Returns the encoded bytes stored under `key`.
    fn fetch_payload(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Removes the value at `key`. Absent keys are not an error.
    fn delete(&self, key: &str) -> StorageResult<()>;

    /// Logger used for diagnostics emitted on behalf of this strategy.
    fn logger(&self) -> StorageLogger {
        StorageLogger::shared()
    }

    /// Capability query for the extended database operations.
    fn database_capabilities(self: Arc<Self>) -> Option<Arc<dyn DatabaseCapabilities>> {
        None
    }
}

/// Typed operations layered over [`StorageStrategy`].
pub trait StorageStrategyExt: StorageStrategy {
    /// Fetches and decodes the value at `key`.
    ///
    /// # Errors
    /// - Propagates the strategy's not-found and read errors unchanged.
    /// - `GeneralStorageError::DecodingFailed` when the bytes do not match `T`.
    fn fetch<T: DeserializeOwned>(&self, key: &str) -> StorageResult<T> {
        let payload = self.fetch_payload(key)?;
        decode_payload(&payload, key, &self.logger())
    }
}

impl<S: StorageStrategy + ?Sized> StorageStrategyExt for S {}

/// Extended operations offered by database-style backends.
///
/// Each mutation runs in its own transaction and returns the number of
/// records removed.
pub trait DatabaseCapabilities: Send + Sync {
    /// Deletes every record whose key is listed.
    fn delete_multiple(&self, keys: &[&str]) -> StorageResult<usize>;

    /// Deletes every record matching `filter`.
    fn delete_where(&self, filter: &RecordFilter) -> StorageResult<usize>;

    /// Deletes every record.
    fn reset(&self) -> StorageResult<usize>;

    fn contains(&self, key: &str) -> StorageResult<bool>;

    fn count(&self) -> StorageResult<usize>;
}

pub(crate) fn decode_payload<T: DeserializeOwned>(
    payload: &[u8],
    key: &str,
    logger: &StorageLogger,
) -> StorageResult<T> {
    match codec::decode(payload) {
        Ok(value) => {
            logger.info(format_args!(
                "event=storage_fetch status=ok key={}",
                display_key(key)
            ));
            Ok(value)
        }
        Err(err) => {
            logger.error(format_args!(
                "event=storage_fetch status=error error_code=decoding_failed key={} error={}",
                display_key(key),
                err
            ));
            Err(GeneralStorageError::DecodingFailed(err).into())
        }
    }
}

/// Rejects the empty key. Any other string, whitespace included, is a
/// usable key.
pub(crate) fn validate_key(key: &str, module: &str, logger: &StorageLogger) -> StorageResult<()> {
    if key.is_empty() {
        logger.error(format_args!(
            "event=key_check module={module} status=error error_code=invalid_key key={}",
            display_key(key)
        ));
        return Err(GeneralStorageError::InvalidKey(key.to_string()).into());
    }
    Ok(())
}
