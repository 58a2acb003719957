//! Flat key-value preference stores.
//!
//! # Responsibility
//! - Hold one opaque blob per key with no transactions or query language.
//! - Offer an in-memory store and a file-backed store.
//!
//! # Invariants
//! - `set_data` replaces any prior blob at the key.
//! - `remove` on an absent key succeeds without touching disk.
//! - The file store never leaves a partially written document behind.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const STANDARD_DIR_NAME: &str = "storage_helper";
const STANDARD_FILE_NAME: &str = "preferences.json";

/// Platform-style key-value preference store.
pub trait PreferenceStore: Send + Sync {
    /// Returns the blob stored at `key`, if any.
    fn data(&self, key: &str) -> io::Result<Option<Vec<u8>>>;

    /// Stores `data` at `key`, replacing any prior blob.
    fn set_data(&self, key: &str, data: Vec<u8>) -> io::Result<()>;

    /// Removes any blob at `key`.
    fn remove(&self, key: &str) -> io::Result<()>;
}

/// Process-local store backed by a map.
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    values: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> io::Result<MutexGuard<'_, HashMap<String, Vec<u8>>>> {
        self.values
            .lock()
            .map_err(|_| io::Error::other("preference store lock poisoned"))
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn data(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
        Ok(self.values()?.get(key).cloned())
    }

    fn set_data(&self, key: &str, data: Vec<u8>) -> io::Result<()> {
        self.values()?.insert(key.to_string(), data);
        Ok(())
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        self.values()?.remove(key);
        Ok(())
    }
}

/// Store persisted as one JSON document mapping keys to base64 blobs.
///
/// The document is loaded once on open and rewritten on every mutation via a
/// temporary file and rename.
#[derive(Debug)]
pub struct FilePreferenceStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl FilePreferenceStore {
    /// Opens (or lazily creates) the store document at `path`.
    ///
    /// # Errors
    /// - Returns `InvalidData` when an existing document is malformed.
    /// - Returns the underlying I/O error when the document cannot be read.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = load_document(&path)?;
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    /// Opens the store in the platform preference directory.
    pub fn standard() -> io::Result<Self> {
        Self::open(standard_path()?)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn values(&self) -> io::Result<MutexGuard<'_, BTreeMap<String, Vec<u8>>>> {
        self.values
            .lock()
            .map_err(|_| io::Error::other("preference store lock poisoned"))
    }

    fn persist(&self, values: &BTreeMap<String, Vec<u8>>) -> io::Result<()> {
        let document = values
            .iter()
            .map(|(key, data)| (key.as_str(), STANDARD.encode(data)))
            .collect::<BTreeMap<_, _>>();
        let bytes = serde_json::to_vec_pretty(&document).map_err(io::Error::from)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, bytes)?;
        fs::rename(&staging, &self.path)
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn data(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
        Ok(self.values()?.get(key).cloned())
    }

    fn set_data(&self, key: &str, data: Vec<u8>) -> io::Result<()> {
        let mut values = self.values()?;
        let mut next = values.clone();
        next.insert(key.to_string(), data);
        self.persist(&next)?;
        *values = next;
        Ok(())
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        let mut values = self.values()?;
        if !values.contains_key(key) {
            return Ok(());
        }
        let mut next = values.clone();
        next.remove(key);
        self.persist(&next)?;
        *values = next;
        Ok(())
    }
}

/// Path of the standard preference document.
pub fn standard_path() -> io::Result<PathBuf> {
    let base = dirs::preference_dir().ok_or_else(|| {
        io::Error::new(
            ErrorKind::NotFound,
            "platform preference directory is unavailable",
        )
    })?;
    Ok(base.join(STANDARD_DIR_NAME).join(STANDARD_FILE_NAME))
}

fn load_document(path: &Path) -> io::Result<BTreeMap<String, Vec<u8>>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(err) => return Err(err),
    };

    let document: BTreeMap<String, String> = serde_json::from_slice(&bytes).map_err(|err| {
        io::Error::new(
            ErrorKind::InvalidData,
            format!("malformed preference document `{}`: {err}", path.display()),
        )
    })?;

    document
        .into_iter()
        .map(|(key, encoded)| -> io::Result<(String, Vec<u8>)> {
            let data = STANDARD.decode(encoded.as_bytes()).map_err(|err| {
                io::Error::new(
                    ErrorKind::InvalidData,
                    format!("invalid blob for key `{key}`: {err}"),
                )
            })?;
            Ok((key, data))
        })
        .collect()
}
