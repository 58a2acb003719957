use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use storage_helper::{
    DatabaseConfig, DatabaseError, Encodable, GeneralStorageError, LogLevel, LogSink,
    ManagerError, PreferenceConfig, PreferenceError, StorageError, StorageKind, StorageLogger,
    StorageManager, StorageResult, StorageSettings, StorageStrategy,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct User {
    id: u32,
    name: String,
}

#[derive(Default)]
struct RecordingSink {
    lines: Mutex<Vec<(LogLevel, String)>>,
}

impl RecordingSink {
    fn lines(&self) -> Vec<(LogLevel, String)> {
        self.lines.lock().unwrap().clone()
    }
}

impl LogSink for RecordingSink {
    fn write_line(&self, level: LogLevel, line: &str) {
        self.lines.lock().unwrap().push((level, line.to_string()));
    }
}

/// Caller-supplied strategy counting calls over a plain map.
#[derive(Default)]
struct CountingStrategy {
    values: Mutex<HashMap<String, Vec<u8>>>,
    calls: AtomicUsize,
}

impl StorageStrategy for CountingStrategy {
    fn save(&self, item: &dyn Encodable, key: &str) -> StorageResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let bytes = item.encode().map_err(GeneralStorageError::EncodingFailed)?;
        self.values.lock().unwrap().insert(key.to_string(), bytes);
        Ok(())
    }

    fn fetch_payload(&self, key: &str) -> StorageResult<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.values
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| PreferenceError::DataNotFound(key.to_string()).into())
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.values.lock().unwrap().remove(key);
        Ok(())
    }
}

fn unbound_manager() -> StorageManager {
    let dir = tempfile::tempdir().unwrap();
    let unreachable = dir.path().join("missing").join("store.sqlite3");
    StorageManager::new_or_unbound(StorageKind::Database(DatabaseConfig::file(unreachable)))
}

fn assert_backend_not_initialized(err: StorageError) {
    assert!(
        matches!(
            err,
            StorageError::Manager(ManagerError::BackendNotInitialized)
        ),
        "unexpected error: {err}"
    );
}

#[test]
fn concurrent_fetches_return_the_saved_value() {
    for kind in [
        StorageKind::Preferences(PreferenceConfig::InMemory),
        StorageKind::Database(DatabaseConfig::in_memory()),
    ] {
        let manager = Arc::new(StorageManager::new(kind).unwrap());
        let expected = User {
            id: 3,
            name: "Shared".to_string(),
        };
        manager.save(&expected, "shared").unwrap();

        let handles = (0..8)
            .map(|_| {
                let manager = Arc::clone(&manager);
                thread::spawn(move || manager.fetch::<User>("shared").unwrap())
            })
            .collect::<Vec<_>>();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    }
}

#[test]
fn concurrent_saves_and_fetches_do_not_interleave() {
    let manager =
        Arc::new(StorageManager::new(StorageKind::Database(DatabaseConfig::in_memory())).unwrap());

    let writers = (0..4)
        .map(|worker| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                for index in 0..25_u32 {
                    let key = format!("worker{worker}.item{index}");
                    manager.save(&index, &key).unwrap();
                    assert_eq!(manager.fetch::<u32>(&key).unwrap(), index);
                }
            })
        })
        .collect::<Vec<_>>();
    for writer in writers {
        writer.join().unwrap();
    }

    let handle = manager.as_database_backend().unwrap();
    assert_eq!(handle.count().unwrap(), 100);
}

#[test]
fn failed_construction_leaves_manager_unbound() {
    let manager = unbound_manager();

    assert!(!manager.is_initialized());
    assert_backend_not_initialized(manager.save(&1_u8, "k").unwrap_err());
    assert_backend_not_initialized(manager.fetch::<u8>("k").unwrap_err());
    assert_backend_not_initialized(manager.delete("k").unwrap_err());
    assert!(manager.as_database_backend().is_none());
}

#[test]
fn construction_failure_keeps_engine_cause() {
    let dir = tempfile::tempdir().unwrap();
    let unreachable = dir.path().join("missing").join("store.sqlite3");

    let err = match StorageManager::new(StorageKind::Database(DatabaseConfig::file(unreachable)))
    {
        Ok(_) => panic!("unreachable path must not open"),
        Err(err) => err,
    };
    match err {
        StorageError::Manager(ManagerError::InitializationFailed(cause)) => assert!(matches!(
            *cause,
            StorageError::Database(DatabaseError::InitializationFailed(_))
        )),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn custom_strategy_receives_forwarded_calls() {
    let strategy = Arc::new(CountingStrategy::default());
    let manager = StorageManager::new(StorageKind::Custom(strategy.clone())).unwrap();

    manager.save(&vec![1, 2, 3], "numbers").unwrap();
    assert_eq!(manager.fetch::<Vec<i32>>("numbers").unwrap(), vec![1, 2, 3]);
    manager.delete("numbers").unwrap();
    assert!(manager.fetch::<Vec<i32>>("numbers").unwrap_err().is_not_found());

    assert_eq!(strategy.calls.load(Ordering::SeqCst), 4);
    assert!(manager.as_database_backend().is_none());
}

#[test]
fn failures_are_logged_before_propagating() {
    let sink = Arc::new(RecordingSink::default());
    let logger = StorageLogger::new(sink.clone());
    let manager = StorageManager::with_logger(
        StorageKind::Database(DatabaseConfig::in_memory()),
        logger,
    )
    .unwrap();

    assert!(manager.fetch::<User>("absent").is_err());

    let lines = sink.lines();
    let (level, line) = lines.last().unwrap();
    assert_eq!(*level, LogLevel::Warning);
    assert!(line.contains("event=storage_fetch"));
    assert!(line.contains("status=not_found"));
    assert!(line.contains("key=absent"));
}

#[test]
fn disabling_logging_silences_every_component() {
    let sink = Arc::new(RecordingSink::default());
    let logger = StorageLogger::new(sink.clone());
    let manager = StorageManager::with_logger(
        StorageKind::Preferences(PreferenceConfig::InMemory),
        logger,
    )
    .unwrap();
    let before = sink.lines().len();
    assert!(before > 0, "construction should log");

    manager.set_logging_enabled(false);
    manager.save(&1_u8, "k").unwrap();
    assert!(manager.fetch::<String>("k").is_err());
    manager.delete("k").unwrap();

    assert_eq!(sink.lines().len(), before);
}

#[test]
fn settings_document_builds_configured_manager() {
    let settings = StorageSettings::from_json_str(
        r#"{ "backend": "database", "path": ":memory:", "logging_enabled": false }"#,
    )
    .unwrap();

    let manager = StorageManager::from_settings(&settings).unwrap();
    assert!(manager.as_database_backend().is_some());
    assert!(!manager.is_logging_enabled());
    manager.set_logging_enabled(true);
}

#[test]
fn settings_with_unknown_backend_are_unsupported() {
    let settings = StorageSettings::from_json_str(r#"{ "backend": "cloud" }"#).unwrap();

    let err = match StorageManager::from_settings(&settings) {
        Ok(_) => panic!("unknown backend must be rejected"),
        Err(err) => err,
    };
    assert!(matches!(
        err,
        StorageError::Manager(ManagerError::UnsupportedStorageKind(_))
    ));
}
