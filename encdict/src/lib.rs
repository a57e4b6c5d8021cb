//! # `encdict`
//!
//! Password-protected envelope encryption over any key-value store. Callers
//! read and write plaintext through a mapping interface while every value is
//! stored encrypted at rest.
//!
//! ## Features
//!
//! - Argon2id key derivation from password, per-database salt, and pepper
//! - One random data key per database, wrapped under the password-derived key
//! - AES-256-GCM-SIV encryption of every value with a fresh nonce
//! - Password rotation without re-encrypting data, recoverable after a crash
//! - In-memory and SQLite stores behind a single trait
//!
//! ## Example
//!
//! ```rust,ignore
//! use encdict::prelude::*;
//!
//! let config = Config::from_hex_pepper("ebf20414c784cd8b8fc70539031d2182")?;
//! let mut db = EncryptedDatabase::open("secrets.db", "password", &config, OpenMode::Create)?;
//!
//! db.put(b"email", "alice@example.com")?;
//! assert_eq!(db.get(b"email")?, Some(b"alice@example.com".to_vec()));
//! db.close()?;
//! ```

#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cipher;
pub mod config;
pub mod database;
pub mod dict;
pub mod envelope;
pub mod error;
pub mod kdf;
pub mod sqlite;
pub mod store;
pub mod value;

pub mod prelude {
    //! Convenience re-exports for common use.
    pub use crate::config::{Config, KdfParams};
    pub use crate::database::EncryptedDatabase;
    pub use crate::dict::EncryptedDict;
    pub use crate::error::{Error, StoreError};
    pub use crate::sqlite::{OpenMode, SqliteStore};
    pub use crate::store::{KeyValueStore, MemoryStore};
    pub use crate::value::Value;
}
