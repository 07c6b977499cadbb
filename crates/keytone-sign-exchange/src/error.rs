//! Error types for the exchange formats.

use thiserror::Error;

/// Errors that can occur while encoding or decoding exchange files.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// Malformed input: bad base64, bad JSON, missing fields, bad header.
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// No candidate key reproduced the header checksum.
    #[error("checksum mismatch: file is corrupted or uses an unsupported key")]
    ChecksumMismatch,

    /// The archive has no `.keytone-album` metadata entry.
    #[error("album metadata entry missing")]
    MissingMetadata,

    /// The archive's album directory is missing or malformed.
    #[error("invalid album structure: {0}")]
    InvalidAlbum(String),

    /// Zip error.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ExchangeError {
    /// Whether the error means the input itself is malformed or tampered.
    pub fn is_invalid_format(&self) -> bool {
        matches!(
            self,
            Self::InvalidFormat(_)
                | Self::ChecksumMismatch
                | Self::MissingMetadata
                | Self::InvalidAlbum(_)
                | Self::Zip(_)
        )
    }
}

/// Result type for exchange operations.
pub type Result<T> = std::result::Result<T, ExchangeError>;
