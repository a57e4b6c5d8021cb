//! Authenticated encryption using AES-256-GCM-SIV.
//!
//! AES-GCM-SIV is a nonce-misuse-resistant AEAD mode: a repeated nonce only
//! reveals whether two plaintexts are equal, instead of exposing the
//! authentication key the way a repeated GCM nonce does. Every call to
//! [`AeadCipher::seal`] still draws a fresh random nonce.
//!
//! # Wire Format
//!
//! ```text
//! [nonce:12][ciphertext:N][tag:16]
//! ```
//!
//! No associated data is bound to the ciphertext.

use aes_gcm_siv::{
    aead::{Aead, KeyInit},
    Aes256GcmSiv, Nonce,
};
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretVec};

use crate::error::Error;
use crate::kdf::KEY_SIZE;

/// Nonce size for AES-GCM-SIV (96 bits).
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size (128 bits).
pub const TAG_SIZE: usize = 16;

/// Bytes added to every sealed payload.
pub const OVERHEAD: usize = NONCE_SIZE + TAG_SIZE;

/// AEAD cipher bound to one 256-bit key.
///
/// The key is kept in a `SecretVec` and zeroized when the cipher is dropped.
///
/// # Example
///
/// ```
/// use encdict::cipher::AeadCipher;
///
/// let cipher = AeadCipher::new(&[0x42; 32]).unwrap();
/// let sealed = cipher.seal(b"alice@example.com").unwrap();
/// assert_eq!(cipher.open(&sealed).unwrap(), b"alice@example.com");
/// ```
pub struct AeadCipher {
    key: SecretVec<u8>,
}

impl AeadCipher {
    /// Creates a cipher from a 32-byte key.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidKeyLength` if the key is not 32 bytes.
    pub fn new(key: &[u8]) -> Result<Self, Error> {
        Self::from_secret(SecretVec::new(key.to_vec()))
    }

    /// Creates a cipher that takes ownership of an already protected key.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidKeyLength` if the key is not 32 bytes.
    pub fn from_secret(key: SecretVec<u8>) -> Result<Self, Error> {
        let actual = key.expose_secret().len();
        if actual != KEY_SIZE {
            return Err(Error::InvalidKeyLength { expected: KEY_SIZE, actual });
        }
        Ok(Self { key })
    }

    /// Encrypts `plaintext` under a fresh random nonce.
    ///
    /// # Returns
    ///
    /// `nonce || ciphertext || tag`, which is `plaintext.len() + 28` bytes.
    ///
    /// # Errors
    ///
    /// Returns `Error::EncryptionFailed` if the AEAD rejects the input.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, Error> {
        let cipher = self.cipher()?;

        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|e| Error::EncryptionFailed(format!("AES-GCM-SIV encryption failed: {e}")))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    /// Decrypts a payload produced by [`seal`](Self::seal).
    ///
    /// # Errors
    ///
    /// Returns `Error::AuthenticationFailed` if the payload is truncated,
    /// tampered with, or was sealed under a different key.
    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>, Error> {
        if sealed.len() < OVERHEAD {
            return Err(Error::AuthenticationFailed);
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);

        self.cipher()?
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| Error::AuthenticationFailed)
    }

    fn cipher(&self) -> Result<Aes256GcmSiv, Error> {
        Aes256GcmSiv::new_from_slice(self.key.expose_secret()).map_err(|_| Error::InvalidKeyLength {
            expected: KEY_SIZE,
            actual: self.key.expose_secret().len(),
        })
    }
}

impl std::fmt::Debug for AeadCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AeadCipher").field("key", &"[REDACTED]").finish()
    }
}
