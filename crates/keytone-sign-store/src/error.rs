//! Error types for the store module.

use keytone_sign_core::CryptoError;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Document serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The encrypted album configuration could not be decrypted.
    #[error("failed to decrypt album config: {0}")]
    Decryption(#[source] CryptoError),

    /// Encrypting the album configuration failed.
    #[error("failed to encrypt album config: {0}")]
    Encryption(#[source] CryptoError),

    /// The stub names a schema this build does not understand.
    #[error("unsupported core schema version: {0}")]
    UnsupportedSchema(String),

    /// The stub's core file name is absolute or escapes the album.
    #[error("invalid core filename")]
    InvalidCoreFileName,

    /// Stored data has an unexpected shape.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
