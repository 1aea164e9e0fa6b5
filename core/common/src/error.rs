//! Common error types for Sealpost.

use thiserror::Error;

/// Top-level error type for Sealpost operations.
///
/// Every expected failure condition of an upload attempt is a variant here;
/// none of the public APIs panic across their contract boundary.
#[derive(Debug, Error)]
pub enum Error {
    /// The document was rejected at ingestion (empty, unreadable).
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// The document's declared media type is not accepted.
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// The encryption primitive failed.
    #[error("Encryption failed: {0}")]
    EncryptionFailure(String),

    /// Authentication tag verification failed during decryption.
    ///
    /// Tampered ciphertext or a wrong key/IV pair; plaintext is never
    /// returned in this case.
    #[error("Authentication failed: {0}")]
    AuthenticationFailure(String),

    /// No auth token was available; the upload was not attempted.
    #[error("No authentication token available")]
    Unauthenticated,

    /// Network or HTTP-level failure before or during streaming.
    #[error("Transport failure: {0}")]
    TransportFailure(String),

    /// Invalid base64 or JSON at an envelope boundary.
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// The response stream ended without a terminal record.
    #[error("Stream ended without a terminal record")]
    IncompleteStream,

    /// The caller aborted the upload mid-stream.
    #[error("Upload cancelled")]
    Cancelled,

    /// An error reported by the server, surfaced verbatim.
    #[error("{0}")]
    Server(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
