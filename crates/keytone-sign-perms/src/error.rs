//! Error types for the permissions module.

use keytone_sign_core::CryptoError;
use thiserror::Error;

/// Errors that can occur during permission operations.
#[derive(Debug, Error)]
pub enum PermsError {
    /// Export refused by the authorization policy.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The album map violates its structural invariants.
    #[error("inconsistent album state: {0}")]
    InconsistentState(String),

    /// The operation requires a signed album.
    #[error("album is not signed")]
    NotSigned,

    /// Request/grant verification failed.
    #[error("handshake failed: {0}")]
    Handshake(#[from] HandshakeFailure),

    /// Invalid caller input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Encryption primitive error.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Why a handshake step was denied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandshakeFailure {
    #[error("unsupported handshake file version {0}")]
    UnsupportedVersion(String),

    #[error("could not decrypt {0}")]
    Undecryptable(&'static str),

    #[error("malformed {0}")]
    Malformed(&'static str),

    #[error("identifier too short for handshake")]
    IdentifierTooShort,

    #[error("request is not addressed to a local identity")]
    NotOwner,

    #[error("grant does not match this session and requester")]
    GrantMismatch,

    #[error("no local identity matches the grant")]
    NoMatchingIdentity,

    #[error("grant matches {0} local identities")]
    Ambiguous(usize),
}

/// Result type for permission operations.
pub type Result<T> = std::result::Result<T, PermsError>;
