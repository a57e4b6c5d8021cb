//! Integration tests for encdict with the SQLite store.

use encdict::config::{Config, KdfParams};
use encdict::database::EncryptedDatabase;
use encdict::dict::EncryptedDict;
use encdict::error::{Error, StoreError};
use encdict::sqlite::{OpenMode, SqliteStore};
use encdict::store::{KeyValueStore, MemoryStore};
use encdict::value::Value;
use std::path::Path;
use tempfile::TempDir;

const PEPPER: &[u8] = b"\x97\xb6c\xa5t\xfe\xa6\xc1\x88~\x04\xd8\xbe\xd1\x1e\x00";
const PASSWORD: &str = "password";

fn test_config() -> Config {
    Config::new(PEPPER)
        .expect("Failed to build config")
        .with_kdf_params(KdfParams { memory_kib: 64, iterations: 1, lanes: 4 })
}

fn open_db(path: &Path, password: &str, mode: OpenMode) -> Result<EncryptedDatabase, Error> {
    EncryptedDatabase::open(path, password, &test_config(), mode)
}

#[test]
fn test_end_to_end_with_sqlite_store() {
    // Create a temporary directory for the database
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("secrets.db");

    // Create the database and write a value
    let mut db = open_db(&path, PASSWORD, OpenMode::Create)
        .expect("Failed to create database");
    db.put(&[0x02], "22").expect("Put failed");
    db.close().expect("Close failed");

    // Reopen with the same password
    let db = open_db(&path, PASSWORD, OpenMode::Write)
        .expect("Failed to reopen database");

    assert_eq!(db.get(&[0x02]).expect("Get failed"), Some(b"22".to_vec()));
    assert_eq!(db.len().expect("Len failed"), 1);
}

#[test]
fn test_rewrite_changes_ciphertext_not_plaintext() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("secrets.db");

    // First session writes the value
    let mut db = open_db(&path, PASSWORD, OpenMode::Create).unwrap();
    db.put(&[0x02], "22").unwrap();
    db.close().unwrap();
    let first = SqliteStore::open(&path, OpenMode::Read).unwrap().get(&[0x02]).unwrap().unwrap();

    // Second session rewrites the same value
    let mut db = open_db(&path, PASSWORD, OpenMode::Write).unwrap();
    let before = db.get(&[0x02]).unwrap();
    db.put(&[0x02], "22").unwrap();
    let after = db.get(&[0x02]).unwrap();
    db.close().unwrap();
    let second = SqliteStore::open(&path, OpenMode::Read).unwrap().get(&[0x02]).unwrap().unwrap();

    assert_eq!(before, after);
    assert_ne!(first, second);
    assert_eq!(first.len(), second.len());
}

#[test]
fn test_fresh_store_has_metadata_only() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("secrets.db");

    let db = open_db(&path, PASSWORD, OpenMode::New).unwrap();
    assert_eq!(db.len().unwrap(), 0);
    db.close().unwrap();

    let store = SqliteStore::open(&path, OpenMode::Read).unwrap();
    assert_eq!(store.get(b"__salt__").unwrap().map(|salt| salt.len()), Some(16));
    assert_eq!(store.get(b"__key__").unwrap().map(|key| key.len()), Some(60));
    assert_eq!(store.count().unwrap(), 2);
}

#[test]
fn test_wrong_password_never_returns_handle() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("secrets.db");

    let mut db = open_db(&path, PASSWORD, OpenMode::Create).unwrap();
    db.put(b"k", "v").unwrap();
    db.close().unwrap();

    let result = open_db(&path, "not the password", OpenMode::Write);
    assert!(matches!(result, Err(Error::AuthenticationFailed)));
}

#[test]
fn test_password_rotation_persists() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("secrets.db");

    // Fill the database
    let mut db = open_db(&path, PASSWORD, OpenMode::Create).unwrap();
    for i in 1..10u8 {
        db.put(&[i], i.to_string().repeat(usize::from(i))).unwrap();
    }
    db.change_password(PASSWORD, "correct horse").expect("Password change failed");
    db.close().unwrap();

    // The old password no longer opens the database
    let result = open_db(&path, PASSWORD, OpenMode::Write);
    assert!(matches!(result, Err(Error::AuthenticationFailed)));

    // The new one opens it and every value is intact
    let db = open_db(&path, "correct horse", OpenMode::Write).unwrap();
    assert_eq!(db.len().unwrap(), 9);
    for i in 1..10u8 {
        let expected = i.to_string().repeat(usize::from(i)).into_bytes();
        assert_eq!(db.get(&[i]).unwrap(), Some(expected));
    }
}

#[test]
fn test_keys_over_sqlite_skip_reserved_entries() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("secrets.db");

    let mut db = open_db(&path, PASSWORD, OpenMode::Create).unwrap();
    for i in 1..10u8 {
        db.put(&[i], i.to_string().repeat(usize::from(i))).unwrap();
    }

    let mut keys: Vec<Vec<u8>> = db.keys().unwrap().collect::<Result<_, _>>().unwrap();
    keys.sort();

    assert_eq!(keys, (1..10u8).map(|i| vec![i]).collect::<Vec<_>>());
    assert_eq!(db.len().unwrap(), 9);
}

#[test]
fn test_read_only_database() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("secrets.db");

    let mut db = open_db(&path, PASSWORD, OpenMode::Create).unwrap();
    db.put(b"name", "alice").unwrap();
    db.close().unwrap();

    let mut db = open_db(&path, PASSWORD, OpenMode::Read).unwrap();
    assert_eq!(db.get(b"name").unwrap(), Some(b"alice".to_vec()));
    assert!(matches!(db.put(b"name", "bob"), Err(Error::Store(StoreError::ReadOnly))));
}

#[test]
fn test_read_only_on_empty_file_cannot_initialise() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("absent.db");

    let result = open_db(&path, PASSWORD, OpenMode::Read);
    assert!(matches!(result, Err(Error::Store(StoreError::Missing(_)))));
}

#[test]
fn test_integer_value_round_trip() {
    let mut dict = EncryptedDict::open(MemoryStore::new(), PASSWORD, &test_config()).unwrap();
    dict.set(b"test", 10_i64).unwrap();

    let store = dict.into_store();
    assert_ne!(store.raw(b"test").unwrap(), b"10");

    let dict = EncryptedDict::open(store, PASSWORD, &test_config()).unwrap();
    let raw = dict.get(b"test").unwrap();

    assert_eq!(raw, Value::from(10_i64).into_bytes());
    assert_eq!(Value::decode_int(&raw).unwrap(), 10);
}

#[test]
fn test_json_values() {
    let mut dict = EncryptedDict::open(MemoryStore::new(), PASSWORD, &test_config()).unwrap();

    let value = Value::try_from(serde_json::json!("hello")).unwrap();
    dict.set(b"greeting", value).unwrap();
    assert_eq!(dict.get(b"greeting").unwrap(), b"hello");

    let rejected = Value::try_from(serde_json::json!(2.5));
    assert!(matches!(rejected, Err(Error::UnsupportedValueType(_))));
}

#[test]
fn test_filter_over_sqlite() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("secrets.db");

    let mut db = open_db(&path, PASSWORD, OpenMode::Create).unwrap();
    db.put(b"github/token", "ghp_x").unwrap();
    db.put(b"github/user", "alice").unwrap();
    db.put(b"gitlab/token", "glpat_y").unwrap();

    let mut matched: Vec<Vec<u8>> =
        db.filter("github/").unwrap().collect::<Result<_, _>>().unwrap();
    matched.sort();

    assert_eq!(matched, vec![b"github/token".to_vec(), b"github/user".to_vec()]);
}

#[test]
fn test_new_mode_starts_over_after_rotation() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("secrets.db");

    // A previous session rotated the password and left data behind
    let mut db = open_db(&path, PASSWORD, OpenMode::New).unwrap();
    db.put(b"k", "v").unwrap();
    db.change_password(PASSWORD, "new password").unwrap();
    db.close().unwrap();

    // Starting over with the original password succeeds on an empty store
    let db = open_db(&path, PASSWORD, OpenMode::New).unwrap();
    assert_eq!(db.len().unwrap(), 0);
    assert_eq!(db.get(b"k").unwrap(), None);
}
