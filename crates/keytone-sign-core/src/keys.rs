//! The key hierarchy.
//!
//! A [`KeyRing`] resolves every compiled-in secret once per installation
//! and derives the per-album and per-entry keys on demand. It is passed by
//! reference to whichever component needs a key; nothing here is global.

use pbkdf2::pbkdf2_hmac;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::crypto::{sha1_hex, SymmetricKey, KEY_LEN};
use crate::error::{CryptoError, Result};
use crate::obfuscation::SecretSource;

/// Public default for KeyA (identifier encryption).
pub const DEFAULT_KEY_A: &str = "KeyTone2024Signature_KeyA_SecureEncryptionKeyForIDEncryption";
/// Public default for KeyB (export payload encryption).
pub const DEFAULT_KEY_B: &str =
    "KeyTone2024Signature_KeyB_SuperSecureEncryptionKeyForExportImportOperation";
/// Public default for request key F.
pub const DEFAULT_REQUEST_KEY_F: &str = "PLACEHOLDER_KEY_F_REPLACE_ME_32B";
/// Public default for request key K.
pub const DEFAULT_REQUEST_KEY_K: &str = "PLACEHOLDER_KEY_K_REPLACE_ME_32B";
/// Public default for grant key Y.
pub const DEFAULT_GRANT_KEY_Y: &str = "PLACEHOLDER_KEY_Y_REPLACE_ME_32B";
/// Public default for grant key N.
pub const DEFAULT_GRANT_KEY_N: &str = "PLACEHOLDER_KEY_N_REPLACE_ME_32B";
/// Public default for the album fixed secret.
pub const DEFAULT_ALBUM_FIXED_SECRET: &str = "LuSrackhall_KeyTone_2024_Signature_66688868686688";
/// Public default for the v1 container key.
pub const DEFAULT_CONTAINER_KEY_V1: &str = "KeyTone2024SecretKey";
/// Public default for the v2 container key.
pub const DEFAULT_CONTAINER_KEY_V2: &str = "KeyTone2025AlbumSecureEncryptionKeyV2";
/// Fixed key material for the album signature field. Not overridable.
pub const ALBUM_SIGNATURE_FIELD_KEY: &str = "KeyTone2024Album_Signature_Field_EncryptionKey_32Bytes";

/// Current container version written on export.
pub const CURRENT_CONTAINER_VERSION: u8 = 2;

/// PBKDF2 iteration count for dynamic keys.
pub const DYNAMIC_KEY_ITERATIONS: u32 = 10_000;

/// Identifier suffix length used as the dynamic key salt.
const DYNAMIC_SALT_LEN: usize = 7;

/// Hex suffix length of the album identifier hash.
const ALBUM_SUFFIX_LEN: usize = 6;

/// Overridable secret slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeySlot {
    KeyA,
    KeyB,
    RequestF,
    RequestK,
    GrantY,
    GrantN,
    AlbumFixedSecret,
    ContainerV1,
    ContainerV2,
}

/// A candidate XOR key for decoding a container payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerKeyCandidate {
    /// Key version this candidate belongs to.
    pub version: u8,
    /// Whether this is a build-injected key rather than the public default.
    pub injected: bool,
    /// Raw XOR key bytes.
    pub key: Vec<u8>,
}

/// Resolved key hierarchy for one installation.
#[derive(Debug, Clone)]
pub struct KeyRing {
    key_a: SecretSource,
    key_b: SecretSource,
    request_f: SecretSource,
    request_k: SecretSource,
    grant_y: SecretSource,
    grant_n: SecretSource,
    album_secret: SecretSource,
    container_v1: SecretSource,
    container_v2: SecretSource,
}

impl Default for KeyRing {
    fn default() -> Self {
        Self::from_build()
    }
}

impl KeyRing {
    /// A ring holding only the public defaults (open-source build).
    pub fn public_defaults() -> Self {
        Self {
            key_a: SecretSource::new(DEFAULT_KEY_A),
            key_b: SecretSource::new(DEFAULT_KEY_B),
            request_f: SecretSource::new(DEFAULT_REQUEST_KEY_F),
            request_k: SecretSource::new(DEFAULT_REQUEST_KEY_K),
            grant_y: SecretSource::new(DEFAULT_GRANT_KEY_Y),
            grant_n: SecretSource::new(DEFAULT_GRANT_KEY_N),
            album_secret: SecretSource::new(DEFAULT_ALBUM_FIXED_SECRET),
            container_v1: SecretSource::new(DEFAULT_CONTAINER_KEY_V1),
            container_v2: SecretSource::new(DEFAULT_CONTAINER_KEY_V2),
        }
    }

    /// A ring built from `KEYTONE_*` compile-time variables.
    ///
    /// Each variable holds obfuscated hex; unset variables keep the default.
    pub fn from_build() -> Self {
        Self {
            key_a: SecretSource::from_build(DEFAULT_KEY_A, option_env!("KEYTONE_SIGNATURE_KEY_A")),
            key_b: SecretSource::from_build(DEFAULT_KEY_B, option_env!("KEYTONE_SIGNATURE_KEY_B")),
            request_f: SecretSource::from_build(
                DEFAULT_REQUEST_KEY_F,
                option_env!("KEYTONE_AUTH_REQUEST_KEY_F"),
            ),
            request_k: SecretSource::from_build(
                DEFAULT_REQUEST_KEY_K,
                option_env!("KEYTONE_AUTH_REQUEST_KEY_K"),
            ),
            grant_y: SecretSource::from_build(
                DEFAULT_GRANT_KEY_Y,
                option_env!("KEYTONE_AUTH_GRANT_KEY_Y"),
            ),
            grant_n: SecretSource::from_build(
                DEFAULT_GRANT_KEY_N,
                option_env!("KEYTONE_AUTH_GRANT_KEY_N"),
            ),
            album_secret: SecretSource::from_build(
                DEFAULT_ALBUM_FIXED_SECRET,
                option_env!("KEYTONE_ALBUM_FIXED_SECRET"),
            ),
            container_v1: SecretSource::from_build(
                DEFAULT_CONTAINER_KEY_V1,
                option_env!("KEYTONE_ALBUM_KEY_V1"),
            ),
            container_v2: SecretSource::from_build(
                DEFAULT_CONTAINER_KEY_V2,
                option_env!("KEYTONE_ALBUM_KEY_V2"),
            ),
        }
    }

    /// Replace one slot with an obfuscated value.
    pub fn with_override(mut self, slot: KeySlot, obfuscated: impl Into<String>) -> Self {
        let source = self.source_mut(slot);
        *source = SecretSource::with_value(source.default_value(), obfuscated);
        self
    }

    fn source_mut(&mut self, slot: KeySlot) -> &mut SecretSource {
        match slot {
            KeySlot::KeyA => &mut self.key_a,
            KeySlot::KeyB => &mut self.key_b,
            KeySlot::RequestF => &mut self.request_f,
            KeySlot::RequestK => &mut self.request_k,
            KeySlot::GrantY => &mut self.grant_y,
            KeySlot::GrantN => &mut self.grant_n,
            KeySlot::AlbumFixedSecret => &mut self.album_secret,
            KeySlot::ContainerV1 => &mut self.container_v1,
            KeySlot::ContainerV2 => &mut self.container_v2,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Static keys
    // ─────────────────────────────────────────────────────────────────────────

    pub fn key_a(&self) -> SymmetricKey {
        self.key_a.resolve_key()
    }

    pub fn key_b(&self) -> SymmetricKey {
        self.key_b.resolve_key()
    }

    pub fn request_key_f(&self) -> SymmetricKey {
        self.request_f.resolve_key()
    }

    pub fn request_key_k(&self) -> SymmetricKey {
        self.request_k.resolve_key()
    }

    pub fn grant_key_y(&self) -> SymmetricKey {
        self.grant_y.resolve_key()
    }

    pub fn grant_key_n(&self) -> SymmetricKey {
        self.grant_n.resolve_key()
    }

    /// Key for the album signature map field.
    pub fn album_signature_key(&self) -> SymmetricKey {
        SymmetricKey::padded(ALBUM_SIGNATURE_FIELD_KEY.as_bytes())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Derived keys
    // ─────────────────────────────────────────────────────────────────────────

    /// Key bound to one album directory name.
    ///
    /// `SHA256(fixedSecret || last6(hex(SHA1(albumIdentifier))))`.
    pub fn album_key(&self, album_identifier: &str) -> SymmetricKey {
        let hashed = sha1_hex(album_identifier);
        let suffix = &hashed[hashed.len() - ALBUM_SUFFIX_LEN..];
        let mut hasher = Sha256::new();
        hasher.update(self.album_secret.resolve_text().as_bytes());
        hasher.update(suffix.as_bytes());
        let digest: [u8; KEY_LEN] = hasher.finalize().into();
        SymmetricKey::from_bytes(digest)
    }

    /// Encrypt a plaintext signature identifier with KeyA.
    pub fn encrypt_identifier(&self, plain_id: &str) -> Result<String> {
        self.key_a().encrypt(plain_id.as_bytes())
    }

    /// Decrypt an encrypted signature identifier with KeyA.
    pub fn decrypt_identifier(&self, encrypted_id: &str) -> Result<String> {
        self.key_a().decrypt_string(encrypted_id)
    }

    /// Per-entry profile key.
    ///
    /// PBKDF2-HMAC-SHA256 with KeyA as the password and the last seven
    /// characters of the decrypted identifier as the salt.
    pub fn dynamic_key(&self, encrypted_id: &str) -> Result<SymmetricKey> {
        let plain = self.decrypt_identifier(encrypted_id)?;
        let chars: Vec<char> = plain.chars().collect();
        if chars.len() < DYNAMIC_SALT_LEN {
            return Err(CryptoError::IdentifierTooShort {
                min: DYNAMIC_SALT_LEN,
                actual: chars.len(),
            });
        }
        let salt: String = chars[chars.len() - DYNAMIC_SALT_LEN..].iter().collect();
        let mut out = [0u8; KEY_LEN];
        pbkdf2_hmac::<Sha256>(
            self.key_a().as_bytes(),
            salt.as_bytes(),
            DYNAMIC_KEY_ITERATIONS,
            &mut out,
        );
        Ok(SymmetricKey::from_bytes(out))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Container keys
    // ─────────────────────────────────────────────────────────────────────────

    fn container_source(&self, version: u8) -> (u8, &SecretSource) {
        match version {
            1 => (1, &self.container_v1),
            2 => (2, &self.container_v2),
            other => {
                warn!(version = other, "unknown container version, using current key");
                (CURRENT_CONTAINER_VERSION, &self.container_v2)
            }
        }
    }

    /// The XOR key used when writing a container of `version`.
    pub fn container_key(&self, version: u8) -> Vec<u8> {
        self.container_source(version).1.resolve_text().into_bytes()
    }

    /// Candidate keys to try, in order, when reading a container.
    ///
    /// Injected key (if any), then the public default; for versions other
    /// than 1 the same pair for version 1 follows.
    pub fn container_key_candidates(&self, version: u8) -> Vec<ContainerKeyCandidate> {
        let mut out: Vec<ContainerKeyCandidate> = Vec::new();
        let mut push = |version: u8, source: &SecretSource| {
            let mut pair = Vec::with_capacity(2);
            if !source.is_default() {
                pair.push((true, source.resolve_text().into_bytes()));
            }
            pair.push((false, source.default_value().as_bytes().to_vec()));
            for (injected, key) in pair {
                if !out.iter().any(|c| c.key == key) {
                    out.push(ContainerKeyCandidate {
                        version,
                        injected,
                        key,
                    });
                }
            }
        };

        let (resolved, source) = self.container_source(version);
        push(resolved, source);
        if version != 1 {
            push(1, &self.container_v1);
        }
        out
    }
}
