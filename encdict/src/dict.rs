//! Encrypted mapping over a [`KeyValueStore`].
//!
//! The dictionary encrypts each value with the database DEK before it reaches
//! the store and decrypts it on the way out. Keys are stored as given. The
//! envelope's reserved entries are hidden from every operation.

use crate::config::Config;
use crate::envelope::{is_reserved, Envelope, STAGING_ENTRY};
use crate::error::Error;
use crate::store::KeyValueStore;
use crate::value::Value;

/// A password-protected mapping of byte keys to encrypted values.
///
/// # Example
///
/// ```
/// use encdict::config::{Config, KdfParams};
/// use encdict::dict::EncryptedDict;
/// use encdict::store::MemoryStore;
///
/// # fn main() -> Result<(), encdict::error::Error> {
/// let config = Config::new(vec![0x42; 16])?
///     .with_kdf_params(KdfParams { memory_kib: 64, iterations: 1, lanes: 4 });
/// let mut dict = EncryptedDict::open(MemoryStore::new(), "password", &config)?;
///
/// dict.set(b"email", "alice@example.com")?;
/// assert_eq!(dict.get(b"email")?, b"alice@example.com");
/// assert_eq!(dict.len()?, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct EncryptedDict<S: KeyValueStore> {
    store: S,
    envelope: Envelope,
}

impl<S: KeyValueStore> EncryptedDict<S> {
    /// Unlocks `store` with `password`, initialising it if empty.
    ///
    /// # Errors
    ///
    /// Returns `Error::AuthenticationFailed` if the password (or pepper) does
    /// not match the store; no handle is returned in that case.
    pub fn open(mut store: S, password: &str, config: &Config) -> Result<Self, Error> {
        let envelope = Envelope::unlock(&mut store, password, config)?;
        Ok(Self { store, envelope })
    }

    /// Returns the decrypted value stored under `key`.
    ///
    /// # Errors
    ///
    /// - `Error::ReservedKey` if `key` is a reserved entry
    /// - `Error::NotFound` if `key` is absent
    /// - `Error::AuthenticationFailed` if the stored ciphertext does not verify
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>, Error> {
        guard(key)?;
        let sealed = self.store.get(key)?.ok_or(Error::NotFound)?;
        self.envelope.cipher().open(&sealed)
    }

    /// Encrypts `value` and stores it under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `Error::ReservedKey` if `key` is a reserved entry, or a store error.
    pub fn set(&mut self, key: &[u8], value: impl Into<Value>) -> Result<(), Error> {
        guard(key)?;
        let sealed = self.envelope.cipher().seal(&value.into().into_bytes())?;
        self.store.set(key, &sealed)?;
        Ok(())
    }

    /// Removes `key`.
    ///
    /// # Errors
    ///
    /// Returns `Error::ReservedKey` if `key` is a reserved entry and
    /// `Error::NotFound` if it is absent.
    pub fn delete(&mut self, key: &[u8]) -> Result<(), Error> {
        guard(key)?;
        if self.store.delete(key)? {
            Ok(())
        } else {
            Err(Error::NotFound)
        }
    }

    /// Checks whether `key` holds a value. Reserved entries are never reported.
    ///
    /// # Errors
    ///
    /// Returns a store error if the lookup fails.
    pub fn contains(&self, key: &[u8]) -> Result<bool, Error> {
        if is_reserved(key) {
            return Ok(false);
        }
        Ok(self.store.contains(key)?)
    }

    /// Returns a lazy iterator over all user keys, in store order.
    ///
    /// # Errors
    ///
    /// Returns a store error if iteration cannot start.
    pub fn keys(&self) -> Result<impl Iterator<Item = Result<Vec<u8>, Error>> + '_, Error> {
        let keys = self.store.keys()?;
        Ok(keys.filter_map(|key| match key {
            Ok(key) if is_reserved(&key) => None,
            Ok(key) => Some(Ok(key)),
            Err(err) => Some(Err(Error::from(err))),
        }))
    }

    /// Returns the number of user entries.
    ///
    /// # Errors
    ///
    /// Returns a store error if the count fails.
    pub fn len(&self) -> Result<usize, Error> {
        // __key__ and __salt__ are always present once the store is initialised
        let mut reserved = 2;
        if self.store.contains(STAGING_ENTRY)? {
            reserved += 1;
        }
        Ok(self.store.count()?.saturating_sub(reserved))
    }

    /// Checks whether the mapping holds no user entries.
    ///
    /// # Errors
    ///
    /// Returns a store error if the count fails.
    pub fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.len()? == 0)
    }

    /// Re-wraps the DEK under `new_password`. Stored values are not touched.
    ///
    /// # Errors
    ///
    /// Returns `Error::AuthenticationFailed` if `old_password` is wrong.
    pub fn change_password(&mut self, old_password: &str, new_password: &str) -> Result<(), Error> {
        self.envelope.change_password(&mut self.store, old_password, new_password)
    }

    /// Releases the handle and returns the underlying store.
    ///
    /// The DEK is erased from memory when the handle is consumed.
    #[must_use]
    pub fn into_store(self) -> S {
        self.store
    }
}

fn guard(key: &[u8]) -> Result<(), Error> {
    if is_reserved(key) {
        return Err(Error::ReservedKey(String::from_utf8_lossy(key).into_owned()));
    }
    Ok(())
}
