//! Base64 transcoding for the JSON transport envelope.
//!
//! Standard alphabet, padded, no line wrapping. This is the only codec used
//! to place ciphertext, IV, and exported key bytes into JSON.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use sealpost_common::{Error, Result};

/// Encode bytes as base64 text.
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode base64 text back into bytes.
///
/// # Errors
/// - `MalformedInput` on invalid padding or disallowed characters
pub fn decode(text: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(text)
        .map_err(|e| Error::MalformedInput(format!("Invalid base64: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_roundtrip() {
        let data = b"binary \x00\xff\xfe payload";
        assert_eq!(decode(&encode(data)).unwrap(), data);
    }

    #[test]
    fn test_roundtrip_empty() {
        assert_eq!(encode(b""), "");
        assert_eq!(decode("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_known_vector() {
        assert_eq!(encode(b"hello"), "aGVsbG8=");
        assert_eq!(decode("aGVsbG8=").unwrap(), b"hello");
    }

    #[test]
    fn test_no_line_wrapping() {
        let data = vec![0x42u8; 4096];
        assert!(!encode(&data).contains('\n'));
    }

    #[test]
    fn test_invalid_character_rejected() {
        let result = decode("aGVs!bG8=");
        assert!(matches!(result, Err(Error::MalformedInput(_))));
    }

    #[test]
    fn test_invalid_padding_rejected() {
        let result = decode("aGVsbG8");
        assert!(matches!(result, Err(Error::MalformedInput(_))));
    }

    proptest! {
        #[test]
        fn prop_roundtrip(bytes in proptest::collection::vec(any::<u8>(), 0..1024)) {
            prop_assert_eq!(decode(&encode(&bytes)).unwrap(), bytes);
        }
    }
}
