//! Error types for KeyTone Sign Core.

use thiserror::Error;

/// Errors raised by the symmetric primitives and key derivations.
///
/// Messages never include key bytes or plaintext.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("malformed hex ciphertext")]
    MalformedHex,

    #[error("ciphertext truncated: {len} bytes is shorter than the nonce")]
    Truncated { len: usize },

    #[error("authentication tag mismatch")]
    AuthenticationFailed,

    #[error("encryption failed")]
    EncryptionFailed,

    #[error("decrypted data is not valid UTF-8")]
    InvalidUtf8,

    #[error("identifier too short: expected at least {min} characters, got {actual}")]
    IdentifierTooShort { min: usize, actual: usize },
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
