//! Common types used throughout Sealpost.

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Declared media type of a document.
///
/// Checked at ingestion only; the document bytes are never decoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaType(String);

impl MediaType {
    /// The only media type accepted for upload.
    pub const PDF: &'static str = "application/pdf";

    /// Create a media type from a string.
    ///
    /// # Errors
    /// - Returns error if the string is empty
    pub fn new(mime: impl Into<String>) -> crate::Result<Self> {
        let mime = mime.into();
        if mime.is_empty() {
            return Err(crate::Error::InvalidDocument(
                "Media type cannot be empty".to_string(),
            ));
        }
        Ok(Self(mime))
    }

    /// Media type for PDF documents.
    pub fn pdf() -> Self {
        Self(Self::PDF.to_string())
    }

    /// Check whether this is the accepted PDF media type.
    pub fn is_pdf(&self) -> bool {
        self.0 == Self::PDF
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A document to be uploaded: an immutable byte sequence plus its declared
/// media type.
///
/// The core treats the bytes as opaque beyond their length.
#[derive(Debug, Clone)]
pub struct Document {
    bytes: Vec<u8>,
    media_type: MediaType,
}

impl Document {
    /// Create a document from raw bytes and a declared media type.
    ///
    /// # Preconditions
    /// - `bytes` must be non-empty
    ///
    /// # Errors
    /// - Returns `InvalidDocument` if the byte sequence is empty
    pub fn new(bytes: Vec<u8>, media_type: MediaType) -> crate::Result<Self> {
        if bytes.is_empty() {
            return Err(crate::Error::InvalidDocument(
                "Document is empty".to_string(),
            ));
        }
        Ok(Self { bytes, media_type })
    }

    /// Get the document bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Document length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the document is empty. Always false for validated documents.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Get the declared media type.
    pub fn media_type(&self) -> &MediaType {
        &self.media_type
    }
}

/// Bearer token for authenticating upload requests.
///
/// The token value is zeroized on drop and never appears in Debug output.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AuthToken(String);

impl AuthToken {
    /// Create a token from its string value.
    ///
    /// # Errors
    /// - Returns error if the token is empty
    pub fn new(token: impl Into<String>) -> crate::Result<Self> {
        let token = token.into();
        if token.is_empty() {
            return Err(crate::Error::Unauthenticated);
        }
        Ok(Self(token))
    }

    /// Render the `Authorization` header value for this token.
    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthToken([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_pdf() {
        let mime = MediaType::pdf();
        assert!(mime.is_pdf());
        assert_eq!(mime.as_str(), "application/pdf");

        let other = MediaType::new("text/plain").unwrap();
        assert!(!other.is_pdf());
    }

    #[test]
    fn test_media_type_empty_rejected() {
        assert!(MediaType::new("").is_err());
    }

    #[test]
    fn test_document_rejects_empty() {
        let result = Document::new(Vec::new(), MediaType::pdf());
        assert!(matches!(result, Err(crate::Error::InvalidDocument(_))));
    }

    #[test]
    fn test_document_accessors() {
        let doc = Document::new(vec![1, 2, 3], MediaType::pdf()).unwrap();
        assert_eq!(doc.len(), 3);
        assert_eq!(doc.as_bytes(), &[1, 2, 3]);
        assert!(doc.media_type().is_pdf());
    }

    #[test]
    fn test_auth_token_bearer_header() {
        let token = AuthToken::new("secret123").unwrap();
        assert_eq!(token.bearer_header(), "Bearer secret123");
    }

    #[test]
    fn test_auth_token_debug_redacted() {
        let token = AuthToken::new("secret123").unwrap();
        let debug = format!("{:?}", token);
        assert!(!debug.contains("secret123"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_auth_token_empty_rejected() {
        assert!(AuthToken::new("").is_err());
    }
}
