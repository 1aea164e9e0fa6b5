//! Authenticated document encryption using AES-256-GCM.
//!
//! AES-256-GCM provides both confidentiality and authenticity. The 96-bit
//! nonce is generated fresh together with the key for every call, so random
//! generation is safe here.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};

use crate::material::KeyMaterial;
use sealpost_common::{Error, Result};

/// Authentication tag size (16 bytes).
pub const TAG_SIZE: usize = 16;

/// Encrypt document bytes, minting fresh key material for this call.
///
/// # Preconditions
/// - `plaintext` must be non-empty
///
/// # Postconditions
/// - Returns ciphertext (with integrated authentication tag) and the fresh
///   key material used to produce it
/// - No associated data is used
/// - The ciphertext length is plaintext length + TAG_SIZE
///
/// # Errors
/// - `InvalidDocument` if the plaintext is empty
/// - `EncryptionFailure` if the underlying primitive fails
///
/// # Security
/// - Key and IV are never reused across two calls
/// - The key material is returned to the caller and nowhere else
pub fn encrypt(plaintext: &[u8]) -> Result<(Vec<u8>, KeyMaterial)> {
    if plaintext.is_empty() {
        return Err(Error::InvalidDocument(
            "Refusing to encrypt an empty document".to_string(),
        ));
    }

    let material = KeyMaterial::generate();
    let ciphertext = encrypt_with(&material, plaintext)?;

    Ok((ciphertext, material))
}

/// Encrypt with caller-provided key material.
///
/// The caller is responsible for key/IV freshness; `encrypt` is the normal
/// entry point.
pub fn encrypt_with(material: &KeyMaterial, plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(material.key()));
    let nonce = Nonce::from_slice(material.iv());

    cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| Error::EncryptionFailure(format!("Encryption failed: {}", e)))
}

/// Decrypt ciphertext produced by [`encrypt`].
///
/// # Preconditions
/// - `ciphertext` must be at least TAG_SIZE bytes
///
/// # Postconditions
/// - Returns the original plaintext
/// - Verifies the authentication tag before returning
///
/// # Errors
/// - `AuthenticationFailure` if the tag does not verify (tampered
///   ciphertext, wrong key or IV); corrupted plaintext is never returned
///
/// # Security
/// - Authenticates before decrypting
pub fn decrypt(ciphertext: &[u8], material: &KeyMaterial) -> Result<Vec<u8>> {
    if ciphertext.len() < TAG_SIZE {
        return Err(Error::AuthenticationFailure(
            "Ciphertext too short".to_string(),
        ));
    }

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(material.key()));
    let nonce = Nonce::from_slice(material.iv());

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| Error::AuthenticationFailure("Authentication tag mismatch".to_string()))
}
