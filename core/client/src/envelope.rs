//! JSON transport envelope construction.
//!
//! Two envelope shapes are deployed: the pre-encrypted shape carrying
//! ciphertext plus exported key material, and a simpler raw-base64 shape
//! where the backend receives the document unencrypted. The shape is chosen
//! once at session construction, not per request.

use serde::Serialize;

use sealpost_common::{Document, Result};
use sealpost_crypto::{aead, encoding, KeyMaterial};

/// Which envelope shape a deployment expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeFormat {
    /// Client-side AES-256-GCM, key material travels alongside the ciphertext.
    PreEncrypted,
    /// Raw document as base64; the backend handles protection itself.
    RawBase64,
}

/// The JSON payload of an upload request.
///
/// Wire-only; constructed once per upload and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Envelope {
    /// Pre-encrypted shape.
    PreEncrypted {
        ciphertext_b64: String,
        iv_b64: String,
        key_b64: String,
    },
    /// Raw base64 file shape.
    RawBase64 { file_data: String },
}

/// An envelope plus the key material that produced it, when any.
///
/// The key material is only present for the pre-encrypted shape; the caller
/// may retain it for local round-trip verification, otherwise it is dropped
/// (and zeroized) once the request has been sent.
pub struct SealedEnvelope {
    /// The wire payload.
    pub envelope: Envelope,
    /// Fresh key material for the pre-encrypted shape.
    pub key_material: Option<KeyMaterial>,
}

/// Build the upload envelope for a document.
///
/// For [`EnvelopeFormat::PreEncrypted`] this encrypts the document with
/// fresh key material and base64-encodes ciphertext, IV, and exported key.
/// For [`EnvelopeFormat::RawBase64`] the document bytes are base64-encoded
/// as-is.
///
/// # Errors
/// - `InvalidDocument` / `EncryptionFailure` from the encryption step
pub fn seal(document: &Document, format: EnvelopeFormat) -> Result<SealedEnvelope> {
    match format {
        EnvelopeFormat::PreEncrypted => {
            let (ciphertext, material) = aead::encrypt(document.as_bytes())?;
            let envelope = Envelope::PreEncrypted {
                ciphertext_b64: encoding::encode(&ciphertext),
                iv_b64: encoding::encode(material.iv()),
                key_b64: encoding::encode(material.key()),
            };
            Ok(SealedEnvelope {
                envelope,
                key_material: Some(material),
            })
        }
        EnvelopeFormat::RawBase64 => Ok(SealedEnvelope {
            envelope: Envelope::RawBase64 {
                file_data: encoding::encode(document.as_bytes()),
            },
            key_material: None,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealpost_common::MediaType;

    fn pdf(bytes: &[u8]) -> Document {
        Document::new(bytes.to_vec(), MediaType::pdf()).unwrap()
    }

    #[test]
    fn test_seal_pre_encrypted_roundtrip() {
        let doc = pdf(b"%PDF-1.4 test document");
        let sealed = seal(&doc, EnvelopeFormat::PreEncrypted).unwrap();

        let (ciphertext_b64, iv_b64, key_b64) = match &sealed.envelope {
            Envelope::PreEncrypted {
                ciphertext_b64,
                iv_b64,
                key_b64,
            } => (ciphertext_b64, iv_b64, key_b64),
            other => panic!("Unexpected envelope shape: {:?}", other),
        };

        // The envelope must decode back to what was encrypted
        let ciphertext = encoding::decode(ciphertext_b64).unwrap();
        let key = encoding::decode(key_b64).unwrap();
        let iv = encoding::decode(iv_b64).unwrap();
        let material = KeyMaterial::from_slices(&key, &iv).unwrap();

        let plaintext = aead::decrypt(&ciphertext, &material).unwrap();
        assert_eq!(plaintext, doc.as_bytes());

        // And match the material returned alongside
        let retained = sealed.key_material.unwrap();
        assert_eq!(retained.key().as_slice(), key.as_slice());
        assert_eq!(retained.iv().as_slice(), iv.as_slice());
    }

    #[test]
    fn test_seal_raw_base64() {
        let doc = pdf(b"%PDF-1.4 raw");
        let sealed = seal(&doc, EnvelopeFormat::RawBase64).unwrap();

        assert!(sealed.key_material.is_none());
        match sealed.envelope {
            Envelope::RawBase64 { file_data } => {
                assert_eq!(encoding::decode(&file_data).unwrap(), doc.as_bytes());
            }
            other => panic!("Unexpected envelope shape: {:?}", other),
        }
    }

    #[test]
    fn test_envelope_wire_fields() {
        let doc = pdf(b"%PDF-1.4 wire");

        let sealed = seal(&doc, EnvelopeFormat::PreEncrypted).unwrap();
        let json = serde_json::to_value(&sealed.envelope).unwrap();
        assert!(json.get("ciphertext_b64").is_some());
        assert!(json.get("iv_b64").is_some());
        assert!(json.get("key_b64").is_some());

        let sealed = seal(&doc, EnvelopeFormat::RawBase64).unwrap();
        let json = serde_json::to_value(&sealed.envelope).unwrap();
        assert!(json.get("file_data").is_some());
        assert!(json.get("key_b64").is_none());
    }

    #[test]
    fn test_seal_is_replay_safe() {
        let doc = pdf(b"%PDF-1.4 same input");

        let a = seal(&doc, EnvelopeFormat::PreEncrypted).unwrap();
        let b = seal(&doc, EnvelopeFormat::PreEncrypted).unwrap();

        // Fresh key material per call means different wire payloads
        assert_ne!(a.envelope, b.envelope);
    }
}
