//! Error types for `encdict` operations.

use std::fmt;
use std::path::PathBuf;

/// Main error type for `encdict` operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A reserved metadata entry was addressed through the mapping interface
    #[error("cannot access reserved entry {0}")]
    ReservedKey(String),

    /// Authentication tag verification failed (wrong password, wrong key, or tampered data)
    #[error("authentication failed: wrong credentials or corrupted ciphertext")]
    AuthenticationFailed,

    /// Value is outside the supported coercion rules (int, text, bytes)
    #[error("unsupported value type: {0}")]
    UnsupportedValueType(String),

    /// Key is absent from the backing store
    #[error("key not found")]
    NotFound,

    /// Backing store operation failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Argon2id could not run with the configured cost parameters
    #[error("key derivation failed: {0}")]
    KdfResourceExhaustion(String),

    /// Key material has the wrong size
    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength {
        /// Expected key length in bytes
        expected: usize,
        /// Actual key length in bytes
        actual: usize,
    },

    /// Encryption operation failed
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// Reserved metadata entries are missing or malformed
    #[error("corrupt metadata: {0}")]
    CorruptMetadata(String),

    /// Key filter pattern did not compile
    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Configuration value rejected
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Errors raised by [`KeyValueStore`](crate::store::KeyValueStore) backends.
#[derive(Debug)]
pub enum StoreError {
    /// SQLite backend failure
    Sqlite(rusqlite::Error),

    /// Write attempted on a store opened read-only
    ReadOnly,

    /// Store file does not exist and the open mode does not create it
    Missing(PathBuf),

    /// I/O operation failed
    Io(std::io::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite: {err}"),
            Self::ReadOnly => write!(f, "store is opened read-only"),
            Self::Missing(path) => write!(f, "store does not exist: {}", path.display()),
            Self::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Sqlite(err)
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}
