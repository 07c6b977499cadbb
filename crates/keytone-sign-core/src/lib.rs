//! # KeyTone Sign Core
//!
//! Pure primitives for the KeyTone signature protocol: authenticated
//! encryption, the key hierarchy, build-time key obfuscation, and the
//! one-way identity derivations used as album map keys.
//!
//! This crate contains no I/O. Every function is pure computation over
//! bytes and strings, apart from the random nonce drawn by [`encrypt`].
//!
//! ## Key Types
//!
//! - [`SymmetricKey`] - A 256-bit AES-GCM key with hex blob encrypt/decrypt
//! - [`KeyRing`] - The resolved key hierarchy for one installation
//! - [`QualificationCode`] - SHA-256 of a plaintext signature identifier
//! - [`QualificationFingerprint`] - Display-safe derivative of a code
//!
//! ## Key Hierarchy
//!
//! | Key | Purpose |
//! |-----|---------|
//! | KeyA | Encrypts signature identifiers; password for dynamic keys |
//! | KeyB | Encrypts `.ktsign` export payload keys |
//! | Dynamic | PBKDF2(KeyA, last 7 chars of the identifier); encrypts one profile |
//! | Album | SHA-256(fixed secret, SHA-1 suffix of album dir name) |
//! | Signature field | Fixed key for the album signature map field |
//! | F / K | Authorization request field and envelope keys |
//! | Y / N | Authorization grant binding and token keys |
//!
//! The compiled-in values are obfuscated with a XOR mask (see
//! [`obfuscation`]). This deters casual inspection of the binary. It is not
//! a secrecy boundary.

pub mod crypto;
pub mod error;
pub mod keys;
pub mod obfuscation;
pub mod types;

pub use crypto::{decrypt, encrypt, sha1_hex, sha256_hex, SymmetricKey, KEY_LEN, NONCE_LEN};
pub use error::{CryptoError, Result};
pub use keys::{ContainerKeyCandidate, KeyRing, KeySlot, CURRENT_CONTAINER_VERSION};
pub use obfuscation::{deobfuscate_key, deobfuscate_str, obfuscate, SecretSource, XOR_MASK};
pub use types::{
    generate_protect_code, is_protect_code, qualification_code, qualification_fingerprint,
    QualificationCode, QualificationFingerprint, PROTECT_CODE_LEN,
};
