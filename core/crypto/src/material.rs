//! Key material with secure memory handling.
//!
//! Key material is generated fresh for every encryption call and zeroizes
//! its memory on drop to prevent sensitive data from persisting in memory.

use aes_gcm::{
    aead::{AeadCore, KeyInit, OsRng},
    Aes256Gcm,
};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of the symmetric key in bytes (256-bit).
pub const KEY_LENGTH: usize = 32;

/// Length of the IV/nonce in bytes (96-bit).
pub const IV_LENGTH: usize = 12;

/// A symmetric key and IV pair for one encryption call.
///
/// Minted fresh per upload; reusing a key/IV pair across two documents is a
/// correctness violation, so there is no way to regenerate only one half.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    key: [u8; KEY_LENGTH],
    iv: [u8; IV_LENGTH],
}

impl KeyMaterial {
    /// Generate fresh random key material.
    ///
    /// # Postconditions
    /// - Key and IV come from a cryptographically secure RNG
    /// - Returns a KeyMaterial that will zeroize on drop
    pub fn generate() -> Self {
        let generated_key = Aes256Gcm::generate_key(&mut OsRng);
        let generated_iv = Aes256Gcm::generate_nonce(&mut OsRng);

        let mut key = [0u8; KEY_LENGTH];
        key.copy_from_slice(&generated_key);
        let mut iv = [0u8; IV_LENGTH];
        iv.copy_from_slice(&generated_iv);

        Self { key, iv }
    }

    /// Reconstruct key material from raw parts.
    ///
    /// Used when a caller retained the exported key and IV for local
    /// round-trip verification.
    ///
    /// # Errors
    /// - Returns error if either slice has the wrong length
    pub fn from_slices(key: &[u8], iv: &[u8]) -> sealpost_common::Result<Self> {
        if key.len() != KEY_LENGTH {
            return Err(sealpost_common::Error::EncryptionFailure(format!(
                "Invalid key length: expected {}, got {}",
                KEY_LENGTH,
                key.len()
            )));
        }
        if iv.len() != IV_LENGTH {
            return Err(sealpost_common::Error::EncryptionFailure(format!(
                "Invalid IV length: expected {}, got {}",
                IV_LENGTH,
                iv.len()
            )));
        }

        let mut key_bytes = [0u8; KEY_LENGTH];
        key_bytes.copy_from_slice(key);
        let mut iv_bytes = [0u8; IV_LENGTH];
        iv_bytes.copy_from_slice(iv);

        Ok(Self {
            key: key_bytes,
            iv: iv_bytes,
        })
    }

    /// Get the key bytes.
    ///
    /// # Security
    /// The returned slice should be used immediately and not stored.
    pub fn key(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }

    /// Get the IV bytes.
    pub fn iv(&self) -> &[u8; IV_LENGTH] {
        &self.iv
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyMaterial([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_fresh() {
        let m1 = KeyMaterial::generate();
        let m2 = KeyMaterial::generate();

        // Two calls must never produce equal key material
        assert_ne!(m1.key(), m2.key());
        assert_ne!(m1.iv(), m2.iv());
    }

    #[test]
    fn test_from_slices_roundtrip() {
        let original = KeyMaterial::generate();
        let rebuilt = KeyMaterial::from_slices(original.key(), original.iv()).unwrap();

        assert_eq!(original.key(), rebuilt.key());
        assert_eq!(original.iv(), rebuilt.iv());
    }

    #[test]
    fn test_from_slices_invalid_lengths() {
        assert!(KeyMaterial::from_slices(&[0u8; 16], &[0u8; IV_LENGTH]).is_err());
        assert!(KeyMaterial::from_slices(&[0u8; KEY_LENGTH], &[0u8; 16]).is_err());
    }

    #[test]
    fn test_debug_redacted() {
        let material = KeyMaterial::generate();
        let debug = format!("{:?}", material);
        assert_eq!(debug, "KeyMaterial([REDACTED])");
    }
}
