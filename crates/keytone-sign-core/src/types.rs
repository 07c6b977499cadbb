//! Identity derivations.
//!
//! A plaintext signature identifier (the "protect code") never leaves the
//! local machine. Albums index signatures by its [`QualificationCode`], and
//! anything shown to another party uses the [`QualificationFingerprint`].

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::crypto::sha256_hex;

/// Length of a generated protect code.
pub const PROTECT_CODE_LEN: usize = 21;

const PROTECT_CODE_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";

/// Codes shorter than this are returned unchanged by the fingerprint.
const FINGERPRINT_MIN_LEN: usize = 12;

/// SHA-256 (hex) of a plaintext signature identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QualificationCode(String);

impl QualificationCode {
    /// Wrap an existing code string, e.g. a key read from an album map.
    pub fn from_hex(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The display-safe fingerprint of this code.
    pub fn fingerprint(&self) -> QualificationFingerprint {
        qualification_fingerprint(&self.0)
    }

    /// First eight characters, for log fields.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(8)]
    }
}

impl fmt::Display for QualificationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for QualificationCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A second one-way derivation of a qualification code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QualificationFingerprint(String);

impl QualificationFingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for QualificationFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the qualification code of a plaintext identifier.
pub fn qualification_code(plain_id: &str) -> QualificationCode {
    QualificationCode(sha256_hex(plain_id))
}

/// Compute the fingerprint of a qualification code.
///
/// Removes the characters at index 1 and index 10, then hashes the rest.
/// Inputs shorter than 12 characters are returned unchanged.
pub fn qualification_fingerprint(code: &str) -> QualificationFingerprint {
    if code.len() < FINGERPRINT_MIN_LEN || !code.is_ascii() {
        return QualificationFingerprint(code.to_string());
    }
    let mut stripped = String::with_capacity(code.len() - 2);
    stripped.push_str(&code[..1]);
    stripped.push_str(&code[2..10]);
    stripped.push_str(&code[11..]);
    QualificationFingerprint(sha256_hex(stripped))
}

/// Generate a fresh 21-character protect code over `A-Za-z0-9_-`.
pub fn generate_protect_code() -> String {
    let mut rng = rand::thread_rng();
    (0..PROTECT_CODE_LEN)
        .map(|_| PROTECT_CODE_ALPHABET[rng.gen_range(0..PROTECT_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Whether `id` has the shape of a generated protect code.
pub fn is_protect_code(id: &str) -> bool {
    id.len() == PROTECT_CODE_LEN && id.bytes().all(|b| PROTECT_CODE_ALPHABET.contains(&b))
}
