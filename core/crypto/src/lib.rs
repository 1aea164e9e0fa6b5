//! Cryptographic primitives for Sealpost.
//!
//! This module provides:
//! - Authenticated document encryption using AES-256-GCM
//! - Per-upload key material with automatic zeroization
//! - Base64 transcoding for placing binary data in JSON envelopes
//!
//! # Security Guarantees
//! - Key material is minted fresh for every encryption call and never reused
//! - All key material is automatically zeroized on drop
//! - No plaintext or key material is ever logged

pub mod aead;
pub mod encoding;
pub mod material;

pub use aead::{decrypt, encrypt};
pub use encoding::{decode, encode};
pub use material::{KeyMaterial, IV_LENGTH, KEY_LENGTH};
