//! Authenticated symmetric encryption and hashing helpers.
//!
//! Ciphertext blobs are AES-256-GCM with a random 12-byte nonce prepended,
//! hex-encoded as `hex(nonce || ciphertext || tag)`. The byte-level variants
//! produce the same layout without the hex step and are used for the
//! encrypted album `core` file.

use std::fmt;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::error::{CryptoError, Result};

/// Key length in bytes (AES-256).
pub const KEY_LEN: usize = 32;

/// Nonce length in bytes (GCM standard nonce).
pub const NONCE_LEN: usize = 12;

/// A 256-bit AES-GCM key.
#[derive(Clone, PartialEq, Eq)]
pub struct SymmetricKey([u8; KEY_LEN]);

impl SymmetricKey {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Create from a slice that must be exactly [`KEY_LEN`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; KEY_LEN] = bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
            expected: KEY_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// Normalize arbitrary key material to 32 bytes.
    ///
    /// Shorter input is zero-padded, longer input is truncated.
    pub fn padded(material: &[u8]) -> Self {
        let mut out = [0u8; KEY_LEN];
        let n = material.len().min(KEY_LEN);
        out[..n].copy_from_slice(&material[..n]);
        Self(out)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(self.0.as_slice().into())
    }

    /// Encrypt to `nonce || ciphertext` bytes with a fresh random nonce.
    pub fn encrypt_bytes(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);
        self.seal_with_nonce(&nonce, plaintext)
    }

    /// Decrypt `nonce || ciphertext` bytes.
    pub fn decrypt_bytes(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.len() < NONCE_LEN {
            return Err(CryptoError::Truncated { len: data.len() });
        }
        let (nonce, ciphertext) = data.split_at(NONCE_LEN);
        self.cipher()
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::AuthenticationFailed)
    }

    /// Encrypt to a hex blob with a fresh random nonce.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String> {
        Ok(hex::encode(self.encrypt_bytes(plaintext)?))
    }

    /// Decrypt a hex blob produced by [`SymmetricKey::encrypt`].
    pub fn decrypt(&self, blob: &str) -> Result<Vec<u8>> {
        let data = hex::decode(blob).map_err(|_| CryptoError::MalformedHex)?;
        self.decrypt_bytes(&data)
    }

    /// Decrypt a hex blob and interpret it as UTF-8.
    pub fn decrypt_string(&self, blob: &str) -> Result<String> {
        String::from_utf8(self.decrypt(blob)?).map_err(|_| CryptoError::InvalidUtf8)
    }

    /// Encrypt with a nonce derived from the key itself.
    ///
    /// The same plaintext under the same key always yields the same blob, so
    /// the output can be recomputed and compared by either handshake party.
    /// Only use this for values that are hashed, never stored.
    pub fn encrypt_deterministic(&self, plaintext: &[u8]) -> Result<String> {
        let digest = Sha256::digest(self.0);
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&digest[..NONCE_LEN]);
        Ok(hex::encode(self.seal_with_nonce(&nonce, plaintext)?))
    }

    fn seal_with_nonce(&self, nonce: &[u8; NONCE_LEN], plaintext: &[u8]) -> Result<Vec<u8>> {
        let ciphertext = self
            .cipher()
            .encrypt(Nonce::from_slice(nonce), plaintext)
            .map_err(|_| CryptoError::EncryptionFailed)?;
        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

/// Encrypt `plaintext` under a raw key, returning `hex(nonce || ciphertext)`.
///
/// Fails with [`CryptoError::InvalidKeyLength`] unless the key is 32 bytes.
pub fn encrypt(plaintext: &[u8], key: &[u8]) -> Result<String> {
    SymmetricKey::from_slice(key)?.encrypt(plaintext)
}

/// Decrypt a hex blob under a raw key.
pub fn decrypt(blob: &str, key: &[u8]) -> Result<Vec<u8>> {
    SymmetricKey::from_slice(key)?.decrypt(blob)
}

/// Lowercase hex SHA-256.
pub fn sha256_hex(data: impl AsRef<[u8]>) -> String {
    hex::encode(Sha256::digest(data.as_ref()))
}

/// Lowercase hex SHA-1.
pub fn sha1_hex(data: impl AsRef<[u8]>) -> String {
    hex::encode(Sha1::digest(data.as_ref()))
}
