//! Key-value store abstraction for the encrypted mapping.

use crate::error::StoreError;
use std::collections::BTreeMap;

/// Lazy key sequence produced by [`KeyValueStore::keys`].
pub type KeyIter<'a> = Box<dyn Iterator<Item = Result<Vec<u8>, StoreError>> + 'a>;

/// A byte-keyed map with atomic single-key writes.
///
/// The encrypted layer only ever stores opaque ciphertext through this trait;
/// it relies on each `set` and `delete` being atomic on its own, and on
/// nothing more.
///
/// # Example
///
/// ```rust,ignore
/// use encdict::store::KeyValueStore;
///
/// struct MyStore;
///
/// impl KeyValueStore for MyStore {
///     fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
///         // Implementation
///     }
///     // ... other methods
/// }
/// ```
pub trait KeyValueStore {
    /// Returns the value stored under `key`, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the backend fails.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the backend fails or is read-only.
    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Removes `key`, returning whether it was present.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the backend fails or is read-only.
    fn delete(&mut self, key: &[u8]) -> Result<bool, StoreError>;

    /// Checks whether `key` is present.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the backend fails.
    fn contains(&self, key: &[u8]) -> Result<bool, StoreError> {
        Ok(self.get(key)?.is_some())
    }

    /// Returns a lazy iterator over every key, in backend order.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the backend fails; failures while iterating
    /// are yielded as items.
    fn keys(&self) -> Result<KeyIter<'_>, StoreError>;

    /// Returns the number of stored entries.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the backend fails.
    fn count(&self) -> Result<usize, StoreError>;

    /// Releases the store, flushing anything the backend buffers.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the backend fails to close cleanly.
    fn close(self) -> Result<(), StoreError>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// Volatile store backed by a `BTreeMap`, for tests and ephemeral use.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the raw stored bytes for `key`, bypassing any encryption layer.
    #[must_use]
    pub fn raw(&self, key: &[u8]) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.entries.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<bool, StoreError> {
        Ok(self.entries.remove(key).is_some())
    }

    fn contains(&self, key: &[u8]) -> Result<bool, StoreError> {
        Ok(self.entries.contains_key(key))
    }

    fn keys(&self) -> Result<KeyIter<'_>, StoreError> {
        Ok(Box::new(self.entries.keys().cloned().map(Ok)))
    }

    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_basic_operations() {
        let mut store = MemoryStore::new();
        assert_eq!(store.count().unwrap(), 0);

        store.set(b"a", b"1").unwrap();
        store.set(b"b", b"2").unwrap();
        store.set(b"a", b"3").unwrap();

        assert_eq!(store.get(b"a").unwrap(), Some(b"3".to_vec()));
        assert_eq!(store.get(b"missing").unwrap(), None);
        assert!(store.contains(b"b").unwrap());
        assert_eq!(store.count().unwrap(), 2);
        assert_eq!(store.raw(b"b"), Some(&b"2"[..]));
    }

    #[test]
    fn test_memory_store_delete() {
        let mut store = MemoryStore::new();
        store.set(b"a", b"1").unwrap();

        assert!(store.delete(b"a").unwrap());
        assert!(!store.delete(b"a").unwrap());
        assert!(!store.contains(b"a").unwrap());
    }

    #[test]
    fn test_memory_store_keys() {
        let mut store = MemoryStore::new();
        store.set(b"b", b"").unwrap();
        store.set(b"a", b"").unwrap();

        let keys: Vec<Vec<u8>> = store.keys().unwrap().collect::<Result<_, _>>().unwrap();
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec()]);
    }
}
