//! Configuration passed into the envelope layer.
//!
//! The pepper and the Argon2id cost parameters are application-level settings:
//! they are never written to the database, so every open of the same store must
//! use identical values or key derivation yields a different KEK.

use crate::error::Error;
use secrecy::{ExposeSecret, SecretVec};

/// Argon2id cost parameters for KEK derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB (default: 1 048 576 = 1 GiB).
    pub memory_kib: u32,
    /// Time cost / iterations (default: 1).
    pub iterations: u32,
    /// Parallelism / lanes (default: 4).
    pub lanes: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self { memory_kib: 1024 * 1024, iterations: 1, lanes: 4 }
    }
}

/// Settings shared by every database opened by one application build.
///
/// # Example
///
/// ```
/// use encdict::config::{Config, KdfParams};
///
/// let config = Config::new(vec![0x42; 16])
///     .unwrap()
///     .with_kdf_params(KdfParams { memory_kib: 64, iterations: 1, lanes: 4 });
/// assert_eq!(config.kdf_params().lanes, 4);
/// ```
pub struct Config {
    pepper: SecretVec<u8>,
    kdf: KdfParams,
}

impl Config {
    /// Creates a configuration with the given pepper and default KDF costs.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the pepper is empty.
    pub fn new(pepper: impl Into<Vec<u8>>) -> Result<Self, Error> {
        let pepper = pepper.into();
        if pepper.is_empty() {
            return Err(Error::Config("pepper must not be empty".to_string()));
        }
        Ok(Self { pepper: SecretVec::new(pepper), kdf: KdfParams::default() })
    }

    /// Creates a configuration from a hex-encoded pepper.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the string is not valid hex or decodes to nothing.
    pub fn from_hex_pepper(pepper_hex: &str) -> Result<Self, Error> {
        let pepper = hex::decode(pepper_hex.trim())
            .map_err(|e| Error::Config(format!("pepper is not valid hex: {e}")))?;
        Self::new(pepper)
    }

    /// Overrides the KDF cost parameters.
    #[must_use]
    pub fn with_kdf_params(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    /// Returns the KDF cost parameters.
    #[must_use]
    pub const fn kdf_params(&self) -> &KdfParams {
        &self.kdf
    }

    pub(crate) fn pepper(&self) -> &[u8] {
        self.pepper.expose_secret()
    }
}

impl Clone for Config {
    fn clone(&self) -> Self {
        Self { pepper: SecretVec::new(self.pepper.expose_secret().clone()), kdf: self.kdf }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config").field("pepper", &"[REDACTED]").field("kdf", &self.kdf).finish()
    }
}
