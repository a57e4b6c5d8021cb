//! Key derivation using Argon2id.
//!
//! This module turns a password into a Key Encryption Key (KEK) and generates
//! the random Data Encryption Keys (DEKs) and salts used by the envelope.

use crate::config::KdfParams;
use crate::error::Error;
use argon2::{Algorithm, Argon2, Params, Version};
use rand::{rngs::OsRng, RngCore};
use secrecy::SecretVec;
use zeroize::Zeroizing;

/// KEK and DEK size in bytes (256 bits).
pub const KEY_SIZE: usize = 32;

/// Per-database salt size in bytes.
pub const SALT_SIZE: usize = 16;

/// Derives a 256-bit KEK from a password using Argon2id.
///
/// The Argon2 salt input is `salt || pepper`, so the same password yields
/// unrelated keys across databases and across application builds.
///
/// # Arguments
///
/// * `password` - The user's password
/// * `salt` - Per-database random salt
/// * `pepper` - Application-wide secret
/// * `params` - Argon2id cost parameters
///
/// # Errors
///
/// Returns `Error::KdfResourceExhaustion` if the cost parameters are invalid
/// or the derivation cannot run.
///
/// # Example
///
/// ```
/// use encdict::config::KdfParams;
/// use encdict::kdf::derive_kek;
///
/// let params = KdfParams { memory_kib: 64, iterations: 1, lanes: 4 };
/// let kek = derive_kek("password", &[7u8; 16], b"pepper", &params).unwrap();
/// assert_eq!(kek.len(), 32);
/// ```
pub fn derive_kek(
    password: &str,
    salt: &[u8],
    pepper: &[u8],
    params: &KdfParams,
) -> Result<Zeroizing<[u8; KEY_SIZE]>, Error> {
    let argon2_params =
        Params::new(params.memory_kib, params.iterations, params.lanes, Some(KEY_SIZE))
            .map_err(|e| {
                Error::KdfResourceExhaustion(format!("invalid Argon2id parameters: {e}"))
            })?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut salted = Zeroizing::new(Vec::with_capacity(salt.len() + pepper.len()));
    salted.extend_from_slice(salt);
    salted.extend_from_slice(pepper);

    let mut kek = Zeroizing::new([0u8; KEY_SIZE]);
    argon2
        .hash_password_into(password.as_bytes(), &salted, &mut kek[..])
        .map_err(|e| Error::KdfResourceExhaustion(e.to_string()))?;

    Ok(kek)
}

/// Generates a random DEK for envelope encryption.
///
/// This DEK must be wrapped (encrypted) with a KEK before storage.
///
/// # Example
///
/// ```
/// use encdict::kdf::generate_dek;
/// use secrecy::ExposeSecret;
///
/// let dek = generate_dek();
/// assert_eq!(dek.expose_secret().len(), 32);
/// ```
#[must_use]
pub fn generate_dek() -> SecretVec<u8> {
    let mut dek = vec![0u8; KEY_SIZE];
    OsRng.fill_bytes(&mut dek);
    SecretVec::new(dek)
}

/// Generates a fresh per-database salt.
#[must_use]
pub fn generate_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    salt
}
