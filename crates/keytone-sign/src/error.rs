//! Error types for the signature kernel.

use std::fmt;

use keytone_sign_core::CryptoError;
use keytone_sign_exchange::ExchangeError;
use keytone_sign_perms::{HandshakeFailure, PermsError, RecoverableError};
use keytone_sign_store::StoreError;
use thiserror::Error;

/// The step whose decryption failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecryptStep {
    /// A KeyA/KeyB-encrypted signature identifier.
    Identity,
    /// A dynamic-key-encrypted profile.
    Profile,
    /// The album's sealed signature field.
    SignatureField,
    /// The album configuration document.
    AlbumConfig,
}

impl fmt::Display for DecryptStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Identity => "decrypt identity",
            Self::Profile => "decrypt profile",
            Self::SignatureField => "decrypt album signature field",
            Self::AlbumConfig => "decrypt album config",
        })
    }
}

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur during kernel operations.
///
/// Messages name the failing step and never include plaintext identifiers
/// or key material.
#[derive(Debug, Error)]
pub enum SignError {
    /// Encryption primitive error outside a decrypt step.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Existing data could not be decrypted. The entry is unreadable, not absent.
    #[error("{step} failed: {source}")]
    Decryption {
        step: DecryptStep,
        #[source]
        source: BoxError,
    },

    /// Malformed `.ktsign`/`.ktalbum` input, including checksum mismatch.
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// The album map violates its invariants.
    #[error("inconsistent album state: {0}")]
    InconsistentState(String),

    /// Export refused by the authorization policy.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Request/grant verification failed.
    #[error("handshake failed: {0}")]
    Handshake(#[from] HandshakeFailure),

    /// The import target already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A referenced entry does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid caller input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(StoreError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SignError {
    pub(crate) fn decryption(step: DecryptStep, source: impl Into<BoxError>) -> Self {
        Self::Decryption {
            step,
            source: source.into(),
        }
    }

    /// The failing decrypt step, if this is a decryption error.
    pub fn decrypt_step(&self) -> Option<DecryptStep> {
        match self {
            Self::Decryption { step, .. } => Some(*step),
            _ => None,
        }
    }
}

impl From<StoreError> for SignError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Decryption(source) => Self::decryption(DecryptStep::AlbumConfig, source),
            StoreError::Io(io) => Self::Io(io),
            other => Self::Store(other),
        }
    }
}

impl From<PermsError> for SignError {
    fn from(e: PermsError) -> Self {
        match e {
            PermsError::PermissionDenied(msg) => Self::PermissionDenied(msg),
            PermsError::InconsistentState(msg) => Self::InconsistentState(msg),
            PermsError::NotSigned => Self::InvalidInput("album is not signed".into()),
            PermsError::Handshake(failure) => Self::Handshake(failure),
            PermsError::InvalidInput(msg) => Self::InvalidInput(msg),
            PermsError::Crypto(c) => Self::Crypto(c),
            PermsError::Serialization(s) => Self::Serialization(s),
        }
    }
}

impl From<RecoverableError> for SignError {
    fn from(e: RecoverableError) -> Self {
        Self::decryption(DecryptStep::SignatureField, e)
    }
}

impl From<ExchangeError> for SignError {
    fn from(e: ExchangeError) -> Self {
        match e {
            ExchangeError::Io(io) => Self::Io(io),
            other => Self::InvalidFormat(other.to_string()),
        }
    }
}

/// Result type for kernel operations.
pub type Result<T> = std::result::Result<T, SignError>;
