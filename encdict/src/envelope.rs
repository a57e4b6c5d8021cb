//! Envelope encryption of the database key.
//!
//! Each database has exactly one random Data Encryption Key (DEK). It is
//! stored only in wrapped form, sealed under a Key Encryption Key (KEK)
//! derived from the password:
//!
//! ```text
//! __salt__   = salt (16 bytes)
//! __key__    = AEAD(KEK, DEK) = [nonce:12][wrapped DEK:32][tag:16]
//! KEK        = Argon2id(password, salt || pepper)
//! ```
//!
//! Changing the password re-wraps the same DEK under a new salt and KEK, so
//! no stored value needs to be re-encrypted.
//!
//! # Password Change Recovery
//!
//! The store only guarantees single-key atomic writes, so a password change
//! first writes `__rotate__ = "rot1" || new salt || new wrapped DEK` in one write, then
//! overwrites `__key__` and `__salt__`, then removes `__rotate__`. When a
//! store is unlocked with `__rotate__` still present, the staged pair is tried
//! first and rolled forward if the password matches it; otherwise the primary
//! pair is used and the stale record is dropped. After a crash at any step the
//! database opens with the new password, and with the old one as long as the
//! primary pair was not yet overwritten. A `__rotate__` entry that does not
//! have the staging layout is left untouched and unlocking fails with
//! `Error::CorruptMetadata`.

use secrecy::{ExposeSecret, SecretVec};
use tracing::{debug, warn};

use crate::cipher::{AeadCipher, OVERHEAD};
use crate::config::Config;
use crate::error::Error;
use crate::kdf::{derive_kek, generate_dek, generate_salt, KEY_SIZE, SALT_SIZE};
use crate::store::KeyValueStore;

/// Store entry holding the wrapped DEK.
pub const KEY_ENTRY: &[u8] = b"__key__";

/// Store entry holding the KEK salt.
pub const SALT_ENTRY: &[u8] = b"__salt__";

/// Store entry holding an in-flight password change.
pub const STAGING_ENTRY: &[u8] = b"__rotate__";

/// Prefix identifying a staged password change.
const STAGING_MAGIC: &[u8] = b"rot1";

/// Exact size of a staging record: magic, salt, then wrapped DEK.
const STAGING_SIZE: usize = STAGING_MAGIC.len() + SALT_SIZE + KEY_SIZE + OVERHEAD;

/// Entries the envelope owns; never visible through the mapping interface.
pub const RESERVED_ENTRIES: [&[u8]; 3] = [KEY_ENTRY, SALT_ENTRY, STAGING_ENTRY];

/// Returns `true` if `key` names one of the envelope's own entries.
#[must_use]
pub fn is_reserved(key: &[u8]) -> bool {
    RESERVED_ENTRIES.iter().any(|entry| *entry == key)
}

/// The unlocked DEK of one database, plus the settings needed to re-wrap it.
pub struct Envelope {
    cipher: AeadCipher,
    config: Config,
}

impl Envelope {
    /// Unlocks the DEK stored in `store`, initialising the store if it has none.
    ///
    /// # Errors
    ///
    /// Returns `Error::AuthenticationFailed` if the password does not unwrap
    /// the stored DEK, `Error::CorruptMetadata` if `__salt__` is missing, and
    /// propagates KDF and store errors.
    pub fn unlock<S: KeyValueStore>(
        store: &mut S,
        password: &str,
        config: &Config,
    ) -> Result<Self, Error> {
        if let Some(staged) = store.get(STAGING_ENTRY)? {
            return Self::unlock_during_rotation(store, &staged, password, config);
        }

        if store.contains(KEY_ENTRY)? {
            Self::open_existing(store, password, config)
        } else {
            Self::create(store, password, config)
        }
    }

    /// Returns the session cipher keyed with the DEK.
    #[must_use]
    pub const fn cipher(&self) -> &AeadCipher {
        &self.cipher
    }

    /// Re-wraps the DEK under `new_password` and a fresh salt.
    ///
    /// The DEK itself is unchanged, so existing values stay readable.
    ///
    /// # Errors
    ///
    /// Returns `Error::AuthenticationFailed` if `old_password` is wrong; the
    /// store is left untouched in that case.
    pub fn change_password<S: KeyValueStore>(
        &self,
        store: &mut S,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), Error> {
        let (salt, wrapped) = load_metadata(store)?;
        let dek = unwrap_dek(old_password, &salt, &wrapped, &self.config)?;

        let (new_salt, new_wrapped) = stage_rotation(store, &dek, new_password, &self.config)?;
        commit(store, &new_salt, &new_wrapped)?;

        debug!("password changed, data key re-wrapped");
        Ok(())
    }

    fn create<S: KeyValueStore>(
        store: &mut S,
        password: &str,
        config: &Config,
    ) -> Result<Self, Error> {
        debug!("initialising envelope for empty store");

        let salt = generate_salt();
        let dek = generate_dek();
        let wrapped = wrap_dek(password, &salt, &dek, config)?;

        // __key__ marks the store as initialised, so it is written last
        store.set(SALT_ENTRY, &salt)?;
        store.set(KEY_ENTRY, &wrapped)?;

        Self::with_dek(dek, config)
    }

    fn open_existing<S: KeyValueStore>(
        store: &S,
        password: &str,
        config: &Config,
    ) -> Result<Self, Error> {
        let (salt, wrapped) = load_metadata(store)?;
        let dek = unwrap_dek(password, &salt, &wrapped, config)?;
        debug!("data key unwrapped");

        Self::with_dek(dek, config)
    }

    fn unlock_during_rotation<S: KeyValueStore>(
        store: &mut S,
        staged: &[u8],
        password: &str,
        config: &Config,
    ) -> Result<Self, Error> {
        let (salt, wrapped) = parse_staging(staged)?;
        match unwrap_dek(password, salt, wrapped, config) {
            Ok(dek) => {
                warn!("completing interrupted password change");
                commit(store, salt, wrapped)?;
                return Self::with_dek(dek, config);
            }
            Err(Error::AuthenticationFailed) => {}
            Err(err) => return Err(err),
        }

        let envelope = Self::open_existing(store, password, config)?;
        warn!("discarding stale password change record");
        store.delete(STAGING_ENTRY)?;
        Ok(envelope)
    }

    fn with_dek(dek: SecretVec<u8>, config: &Config) -> Result<Self, Error> {
        Ok(Self { cipher: AeadCipher::from_secret(dek)?, config: config.clone() })
    }
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Envelope")
            .field("cipher", &self.cipher)
            .field("config", &self.config)
            .finish()
    }
}

fn load_metadata<S: KeyValueStore>(store: &S) -> Result<(Vec<u8>, Vec<u8>), Error> {
    let wrapped = store
        .get(KEY_ENTRY)?
        .ok_or_else(|| Error::CorruptMetadata("wrapped data key is missing".to_string()))?;
    let salt = store
        .get(SALT_ENTRY)?
        .ok_or_else(|| Error::CorruptMetadata("key salt is missing".to_string()))?;
    Ok((salt, wrapped))
}

fn wrap_dek(
    password: &str,
    salt: &[u8],
    dek: &SecretVec<u8>,
    config: &Config,
) -> Result<Vec<u8>, Error> {
    let kek = derive_kek(password, salt, config.pepper(), config.kdf_params())?;
    AeadCipher::new(&kek[..])?.seal(dek.expose_secret())
}

fn unwrap_dek(
    password: &str,
    salt: &[u8],
    wrapped: &[u8],
    config: &Config,
) -> Result<SecretVec<u8>, Error> {
    let kek = derive_kek(password, salt, config.pepper(), config.kdf_params())?;
    let dek = AeadCipher::new(&kek[..])?.open(wrapped)?;
    Ok(SecretVec::new(dek))
}

/// Writes the staging record for a password change and returns the new pair.
fn stage_rotation<S: KeyValueStore>(
    store: &mut S,
    dek: &SecretVec<u8>,
    new_password: &str,
    config: &Config,
) -> Result<([u8; SALT_SIZE], Vec<u8>), Error> {
    let new_salt = generate_salt();
    let new_wrapped = wrap_dek(new_password, &new_salt, dek, config)?;

    let mut staged = Vec::with_capacity(STAGING_SIZE);
    staged.extend_from_slice(STAGING_MAGIC);
    staged.extend_from_slice(&new_salt);
    staged.extend_from_slice(&new_wrapped);
    store.set(STAGING_ENTRY, &staged)?;

    Ok((new_salt, new_wrapped))
}

/// Splits a staging record into salt and wrapped DEK.
fn parse_staging(staged: &[u8]) -> Result<(&[u8], &[u8]), Error> {
    match staged.strip_prefix(STAGING_MAGIC) {
        Some(body) if staged.len() == STAGING_SIZE => Ok(body.split_at(SALT_SIZE)),
        _ => Err(Error::CorruptMetadata(format!(
            "unrecognised password change record ({} bytes)",
            staged.len()
        ))),
    }
}

fn commit<S: KeyValueStore>(store: &mut S, salt: &[u8], wrapped: &[u8]) -> Result<(), Error> {
    store.set(KEY_ENTRY, wrapped)?;
    store.set(SALT_ENTRY, salt)?;
    store.delete(STAGING_ENTRY)?;
    Ok(())
}
