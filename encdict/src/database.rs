//! Convenience layer over [`EncryptedDict`].
//!
//! Adds lookups that treat absence as a normal outcome, key filtering by
//! regular expression, and scoped ownership of the underlying store.

use std::path::Path;

use regex::bytes::RegexBuilder;

use crate::config::Config;
use crate::dict::EncryptedDict;
use crate::error::Error;
use crate::sqlite::{OpenMode, SqliteStore};
use crate::store::KeyValueStore;
use crate::value::Value;

/// An open encrypted database.
///
/// The handle owns its store. Calling [`close`](Self::close) or dropping the
/// handle releases the store and erases the data key, after which no further
/// operation can be issued.
///
/// # Example
///
/// ```
/// use encdict::config::{Config, KdfParams};
/// use encdict::database::EncryptedDatabase;
/// use encdict::store::MemoryStore;
///
/// # fn main() -> Result<(), encdict::error::Error> {
/// let config = Config::new(vec![0x42; 16])?
///     .with_kdf_params(KdfParams { memory_kib: 64, iterations: 1, lanes: 4 });
/// let mut db = EncryptedDatabase::with_store(MemoryStore::new(), "password", &config)?;
///
/// db.put(b"user:alice", "alice@example.com")?;
/// db.put(b"user:bob", "bob@example.com")?;
/// db.put(b"team:core", "alice,bob")?;
///
/// let users: Vec<Vec<u8>> = db.filter("user:")?.collect::<Result<_, _>>()?;
/// assert_eq!(users.len(), 2);
/// assert_eq!(db.get(b"missing")?, None);
///
/// db.close()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct EncryptedDatabase<S: KeyValueStore = SqliteStore> {
    dict: EncryptedDict<S>,
}

impl EncryptedDatabase<SqliteStore> {
    /// Opens the SQLite database at `path` and unlocks it with `password`.
    ///
    /// # Errors
    ///
    /// Returns a store error if the file cannot be opened in `mode`, and
    /// `Error::AuthenticationFailed` if the password does not match.
    pub fn open(
        path: impl AsRef<Path>,
        password: &str,
        config: &Config,
        mode: OpenMode,
    ) -> Result<Self, Error> {
        let store = SqliteStore::open(path, mode)?;
        Self::with_store(store, password, config)
    }
}

impl<S: KeyValueStore> EncryptedDatabase<S> {
    /// Unlocks an already opened store.
    ///
    /// # Errors
    ///
    /// Returns `Error::AuthenticationFailed` if the password does not match.
    pub fn with_store(store: S, password: &str, config: &Config) -> Result<Self, Error> {
        Ok(Self { dict: EncryptedDict::open(store, password, config)? })
    }

    /// Stores `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns `Error::ReservedKey` for reserved entries, or a store error.
    pub fn put(&mut self, key: &[u8], value: impl Into<Value>) -> Result<(), Error> {
        self.dict.set(key, value)
    }

    /// Returns the value under `key`, or `None` if there is none.
    ///
    /// # Errors
    ///
    /// Returns `Error::ReservedKey` for reserved entries and
    /// `Error::AuthenticationFailed` if the stored value does not verify.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        match self.dict.get(key) {
            Ok(value) => Ok(Some(value)),
            Err(Error::NotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Removes `key` if present.
    ///
    /// # Errors
    ///
    /// Returns `Error::ReservedKey` for reserved entries, or a store error.
    pub fn delete(&mut self, key: &[u8]) -> Result<(), Error> {
        match self.dict.delete(key) {
            Ok(()) | Err(Error::NotFound) => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Returns the keys whose raw bytes match `pattern` at their start.
    ///
    /// Only keys are inspected; values are never decrypted. Unicode mode is
    /// off, so `.` and classes match single bytes and `\xFF` matches the byte
    /// 0xFF.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPattern` if `pattern` is not a valid regular
    /// expression.
    pub fn filter(
        &self,
        pattern: &str,
    ) -> Result<impl Iterator<Item = Result<Vec<u8>, Error>> + '_, Error> {
        let regex = RegexBuilder::new(&format!("^(?:{pattern})")).unicode(false).build()?;
        let keys = self.dict.keys()?;
        Ok(keys.filter(move |key| key.as_ref().map_or(true, |key| regex.is_match(key))))
    }

    /// Returns a lazy iterator over all keys.
    ///
    /// # Errors
    ///
    /// Returns a store error if iteration cannot start.
    pub fn keys(&self) -> Result<impl Iterator<Item = Result<Vec<u8>, Error>> + '_, Error> {
        self.dict.keys()
    }

    /// Returns the number of stored values.
    ///
    /// # Errors
    ///
    /// Returns a store error if the count fails.
    pub fn len(&self) -> Result<usize, Error> {
        self.dict.len()
    }

    /// Checks whether the database holds no values.
    ///
    /// # Errors
    ///
    /// Returns a store error if the count fails.
    pub fn is_empty(&self) -> Result<bool, Error> {
        self.dict.is_empty()
    }

    /// Changes the password that unlocks this database.
    ///
    /// # Errors
    ///
    /// Returns `Error::AuthenticationFailed` if `old_password` is wrong.
    pub fn change_password(&mut self, old_password: &str, new_password: &str) -> Result<(), Error> {
        self.dict.change_password(old_password, new_password)
    }

    /// Closes the database, erasing the data key and releasing the store.
    ///
    /// # Errors
    ///
    /// Returns a store error if the backend fails to close cleanly.
    pub fn close(self) -> Result<(), Error> {
        self.dict.into_store().close()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KdfParams;
    use crate::store::MemoryStore;

    fn test_config() -> Config {
        Config::new(b"\x97\xb6c\xa5t\xfe\xa6\xc1\x88~\x04\xd8\xbe\xd1\x1e\x00".to_vec())
            .unwrap()
            .with_kdf_params(KdfParams { memory_kib: 64, iterations: 1, lanes: 4 })
    }

    fn test_db() -> EncryptedDatabase<MemoryStore> {
        let mut db =
            EncryptedDatabase::with_store(MemoryStore::new(), "password", &test_config()).unwrap();
        for key in ["apple", "apricot", "banana", "cherry", "xapple"] {
            db.put(key.as_bytes(), key.to_uppercase()).unwrap();
        }
        db
    }

    fn collect(iter: impl Iterator<Item = Result<Vec<u8>, Error>>) -> Vec<String> {
        iter.map(|key| String::from_utf8(key.unwrap()).unwrap()).collect()
    }

    #[test]
    fn test_put_get() {
        let db = test_db();

        assert_eq!(db.get(b"banana").unwrap(), Some(b"BANANA".to_vec()));
        assert_eq!(db.get(b"durian").unwrap(), None);
        assert_eq!(db.len().unwrap(), 5);
    }

    #[test]
    fn test_delete_is_noop_when_absent() {
        let mut db = test_db();

        db.delete(b"banana").unwrap();
        db.delete(b"banana").unwrap();
        db.delete(b"durian").unwrap();

        assert_eq!(db.get(b"banana").unwrap(), None);
        assert_eq!(db.len().unwrap(), 4);
    }

    #[test]
    fn test_reserved_keys_still_rejected() {
        let mut db = test_db();

        assert!(matches!(db.get(b"__key__"), Err(Error::ReservedKey(_))));
        assert!(matches!(db.put(b"__salt__", "x"), Err(Error::ReservedKey(_))));
        assert!(matches!(db.delete(b"__key__"), Err(Error::ReservedKey(_))));
    }

    #[test]
    fn test_filter_matches_from_start() {
        let db = test_db();

        assert_eq!(collect(db.filter("ap").unwrap()), vec!["apple", "apricot"]);
        assert_eq!(collect(db.filter("a.*e$").unwrap()), vec!["apple"]);
        assert_eq!(collect(db.filter(".*apple").unwrap()), vec!["apple", "xapple"]);
        assert_eq!(collect(db.filter("b|c").unwrap()), vec!["banana", "cherry"]);
    }

    #[test]
    fn test_filter_never_yields_reserved_entries() {
        let db = test_db();

        assert!(collect(db.filter("__").unwrap()).is_empty());
        assert_eq!(collect(db.filter("").unwrap()).len(), 5);
    }

    #[test]
    fn test_filter_ignores_values() {
        let db = test_db();
        assert!(collect(db.filter("BANANA").unwrap()).is_empty());
    }

    #[test]
    fn test_filter_matches_non_utf8_keys() {
        let mut db =
            EncryptedDatabase::with_store(MemoryStore::new(), "password", &test_config()).unwrap();
        db.put(&[0xFF], "high").unwrap();
        db.put(&[0x41], "ascii").unwrap();
        db.put(&[0x00, 0x00, 0x00, 0x80], "int key").unwrap();

        let hits = |pattern: &str| -> Vec<Vec<u8>> {
            db.filter(pattern).unwrap().collect::<Result<_, _>>().unwrap()
        };

        assert_eq!(hits("."), vec![vec![0x00, 0x00, 0x00, 0x80], vec![0x41], vec![0xFF]]);
        assert_eq!(hits(r"\xFF"), vec![vec![0xFF]]);
        assert_eq!(hits(r"\x00{3}[\x80-\xFF]"), vec![vec![0x00, 0x00, 0x00, 0x80]]);
    }

    #[test]
    fn test_filter_invalid_pattern() {
        let db = test_db();
        assert!(matches!(db.filter("(unclosed"), Err(Error::InvalidPattern(_))));
    }

    #[test]
    fn test_change_password() {
        let mut db = test_db();
        db.change_password("password", "hunter2").unwrap();

        let store = db.dict.into_store();
        let db = EncryptedDatabase::with_store(store, "hunter2", &test_config()).unwrap();
        assert_eq!(db.get(b"cherry").unwrap(), Some(b"CHERRY".to_vec()));
    }
}
