use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use storage_helper::{
    DatabaseConfig, DatabaseError, GeneralStorageError, RecordFilter, StorageError, StorageKind,
    StorageManager,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct User {
    id: u32,
    name: String,
}

fn setup() -> StorageManager {
    StorageManager::new(StorageKind::Database(DatabaseConfig::in_memory())).unwrap()
}

fn user(id: u32, name: &str) -> User {
    User {
        id,
        name: name.to_string(),
    }
}

fn assert_object_not_found(manager: &StorageManager, key: &str) {
    let err = manager.fetch::<User>(key).unwrap_err();
    assert!(
        matches!(err, StorageError::Database(DatabaseError::ObjectNotFound(ref missing)) if missing == key),
        "expected ObjectNotFound for {key}, got {err}"
    );
}

#[test]
fn save_and_fetch_roundtrip() {
    let manager = setup();
    let jane = user(1, "Jane Doe");

    manager.save(&jane, "testUser").unwrap();

    assert_eq!(manager.fetch::<User>("testUser").unwrap(), jane);
}

#[test]
fn update_existing_record_overwrites_payload() {
    let manager = setup();
    manager.save(&user(1, "Jane Doe"), "testUser").unwrap();

    let updated = user(1, "Jane Smith");
    manager.save(&updated, "testUser").unwrap();

    assert_eq!(manager.fetch::<User>("testUser").unwrap(), updated);
    let handle = manager.as_database_backend().unwrap();
    assert_eq!(handle.count().unwrap(), 1);
}

#[test]
fn delete_then_fetch_is_object_not_found() {
    let manager = setup();
    manager.save(&user(1, "Jane Doe"), "testUser").unwrap();

    manager.delete("testUser").unwrap();

    assert_object_not_found(&manager, "testUser");
}

#[test]
fn deleting_absent_key_succeeds() {
    let manager = setup();

    manager.delete("neverSaved").unwrap();
}

#[test]
fn fetching_incompatible_shape_is_decoding_failed() {
    let manager = setup();
    manager.save(&"just text", "testUser").unwrap();

    let err = manager.fetch::<User>("testUser").unwrap_err();
    assert!(matches!(
        err,
        StorageError::General(GeneralStorageError::DecodingFailed(_))
    ));
}

#[test]
fn whitespace_key_roundtrips() {
    let manager = setup();

    manager.save(&user(1, "space"), " ").unwrap();
    manager.save(&user(2, "tab"), "\t").unwrap();

    assert_eq!(manager.fetch::<User>(" ").unwrap(), user(1, "space"));
    assert_eq!(manager.fetch::<User>("\t").unwrap(), user(2, "tab"));
    manager.delete(" ").unwrap();
    assert_object_not_found(&manager, " ");
}

#[test]
fn empty_key_cannot_be_saved_but_deletes_cleanly() {
    let manager = setup();

    let err = manager.save(&user(1, "a"), "").unwrap_err();
    assert!(matches!(
        err,
        StorageError::General(GeneralStorageError::InvalidKey(_))
    ));
    manager.delete("").unwrap();
}

#[test]
fn reset_removes_every_record() {
    let manager = setup();
    let keys = ["one", "two", "three", "four"];
    for (index, key) in keys.iter().enumerate() {
        manager.save(&user(index as u32, key), key).unwrap();
    }

    let handle = manager.as_database_backend().unwrap();
    assert_eq!(handle.reset().unwrap(), keys.len());

    for key in keys {
        assert_object_not_found(&manager, key);
    }
}

#[test]
fn delete_multiple_removes_only_listed_keys() {
    let manager = setup();
    for key in ["a", "b", "c"] {
        manager.save(&user(1, key), key).unwrap();
    }

    let handle = manager.as_database_backend().unwrap();
    assert_eq!(handle.delete_multiple(&["a", "b", "missing"]).unwrap(), 2);

    assert_object_not_found(&manager, "a");
    assert_object_not_found(&manager, "b");
    assert_eq!(manager.fetch::<User>("c").unwrap(), user(1, "c"));
}

#[test]
fn delete_where_prefix_removes_matching_records() {
    let manager = setup();
    manager.save(&user(1, "a"), "session.alpha").unwrap();
    manager.save(&user(2, "b"), "session.beta").unwrap();
    manager.save(&user(3, "c"), "Session.gamma").unwrap();
    manager.save(&user(4, "d"), "profile").unwrap();

    let handle = manager.as_database_backend().unwrap();
    let removed = handle
        .delete_where(&RecordFilter::key_prefix("session."))
        .unwrap();

    assert_eq!(removed, 2);
    assert_object_not_found(&manager, "session.alpha");
    assert_object_not_found(&manager, "session.beta");
    assert!(handle.contains("Session.gamma").unwrap());
    assert!(handle.contains("profile").unwrap());
}

#[test]
fn delete_where_custom_expression_binds_parameters() {
    let manager = setup();
    manager.save(&user(1, "a"), "k1").unwrap();
    manager.save(&user(2, "b"), "k2").unwrap();

    let handle = manager.as_database_backend().unwrap();
    let filter = RecordFilter::new(
        "key IN (?1, ?2)",
        [Value::Text("k2".to_string()), Value::Text("k3".to_string())],
    );
    assert_eq!(handle.delete_where(&filter).unwrap(), 1);
    assert!(handle.contains("k1").unwrap());
    assert!(!handle.contains("k2").unwrap());
}

#[test]
fn delete_where_updated_before_future_removes_everything() {
    let manager = setup();
    manager.save(&user(1, "a"), "k1").unwrap();
    manager.save(&user(2, "b"), "k2").unwrap();

    let handle = manager.as_database_backend().unwrap();
    assert_eq!(
        handle
            .delete_where(&RecordFilter::updated_before(0))
            .unwrap(),
        0
    );
    assert_eq!(
        handle
            .delete_where(&RecordFilter::updated_before(i64::MAX))
            .unwrap(),
        2
    );
    assert_eq!(handle.count().unwrap(), 0);
}

#[test]
fn updated_before_respects_millisecond_cutoff() {
    let manager = setup();
    manager.save(&user(1, "old"), "written_before_cutoff").unwrap();
    thread::sleep(Duration::from_millis(5));
    let cutoff = now_epoch_ms();
    thread::sleep(Duration::from_millis(5));
    manager.save(&user(2, "new"), "written_after_cutoff").unwrap();

    let handle = manager.as_database_backend().unwrap();
    let removed = handle
        .delete_where(&RecordFilter::updated_before(cutoff))
        .unwrap();

    assert_eq!(removed, 1, "cutoff={cutoff}");
    assert!(!handle.contains("written_before_cutoff").unwrap());
    assert!(handle.contains("written_after_cutoff").unwrap());
}

#[test]
fn blank_filter_is_invalid_query() {
    let manager = setup();
    manager.save(&user(1, "a"), "k1").unwrap();

    let handle = manager.as_database_backend().unwrap();
    let err = handle.delete_where(&RecordFilter::new("", [])).unwrap_err();

    assert!(matches!(
        err,
        StorageError::Database(DatabaseError::InvalidQuery(_))
    ));
    assert!(handle.contains("k1").unwrap());
}

#[test]
fn file_database_persists_across_managers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.sqlite3");

    let first = StorageManager::new(StorageKind::Database(DatabaseConfig::file(&path))).unwrap();
    first.save(&user(7, "Persisted"), "testUser").unwrap();
    drop(first);

    let second = StorageManager::new(StorageKind::Database(DatabaseConfig::file(&path))).unwrap();
    assert_eq!(
        second.fetch::<User>("testUser").unwrap(),
        user(7, "Persisted")
    );
}

#[test]
fn writes_to_read_only_database_are_transaction_failed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.sqlite3");
    let writer = StorageManager::new(StorageKind::Database(DatabaseConfig::file(&path))).unwrap();
    writer.save(&user(1, "Jane Doe"), "testUser").unwrap();
    drop(writer);

    let reader = StorageManager::new(StorageKind::Database(
        DatabaseConfig::file(&path).read_only(true),
    ))
    .unwrap();

    assert_eq!(
        reader.fetch::<User>("testUser").unwrap(),
        user(1, "Jane Doe")
    );
    let err = reader.save(&user(2, "Other"), "other").unwrap_err();
    assert!(matches!(
        err,
        StorageError::Database(DatabaseError::TransactionFailed(_))
    ));
    let err = reader.delete("testUser").unwrap_err();
    assert!(matches!(
        err,
        StorageError::Database(DatabaseError::TransactionFailed(_))
    ));
}

fn now_epoch_ms() -> i64 {
    let elapsed = SystemTime::now().duration_since(UNIX_EPOCH).unwrap();
    i64::try_from(elapsed.as_millis()).unwrap()
}
