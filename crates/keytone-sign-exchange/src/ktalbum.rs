//! `.ktalbum` binary container.
//!
//! The header is 48 packed little-endian bytes, followed by `dataSize`
//! bytes of XOR-obfuscated zip. Bytes past `dataSize` are ignored.

use sha2::{Digest, Sha256};
use tracing::debug;

use keytone_sign_core::KeyRing;

use crate::error::{ExchangeError, Result};
use crate::xor::xor_crypt;

/// Container signature bytes.
pub const MAGIC: &[u8; 7] = b"KTALBUM";

/// Packed header length.
pub const HEADER_LEN: usize = 48;

/// Parsed container header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    /// Key version used for the payload.
    pub version: u8,
    /// Payload length in bytes.
    pub data_size: u64,
    /// SHA-256 of the plaintext zip.
    pub checksum: [u8; 32],
}

impl ContainerHeader {
    /// Header describing `zip` written under key `version`.
    pub fn for_payload(version: u8, zip: &[u8]) -> Self {
        Self {
            version,
            data_size: zip.len() as u64,
            checksum: Sha256::digest(zip).into(),
        }
    }

    /// Pack to the on-disk layout.
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[..7].copy_from_slice(MAGIC);
        out[7] = self.version;
        out[8..16].copy_from_slice(&self.data_size.to_le_bytes());
        out[16..].copy_from_slice(&self.checksum);
        out
    }

    /// Parse the first [`HEADER_LEN`] bytes of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(ExchangeError::InvalidFormat(format!(
                "container too short: {} bytes",
                bytes.len()
            )));
        }
        if &bytes[..7] != MAGIC {
            return Err(ExchangeError::InvalidFormat("not a KTALBUM container".into()));
        }
        let mut size = [0u8; 8];
        size.copy_from_slice(&bytes[8..16]);
        let mut checksum = [0u8; 32];
        checksum.copy_from_slice(&bytes[16..HEADER_LEN]);
        Ok(Self {
            version: bytes[7],
            data_size: u64::from_le_bytes(size),
            checksum,
        })
    }

    /// Whether `plain` matches the recorded checksum.
    pub fn verifies(&self, plain: &[u8]) -> bool {
        let digest: [u8; 32] = Sha256::digest(plain).into();
        digest == self.checksum
    }
}

/// Result of a successful decode.
#[derive(Debug, Clone)]
pub struct DecodedContainer {
    pub header: ContainerHeader,
    /// Plaintext zip bytes.
    pub zip: Vec<u8>,
    /// Version of the key that matched (1 on legacy fallback).
    pub key_version: u8,
    /// Whether the matching key was build-injected.
    pub injected_key: bool,
}

/// Wrap `zip` in a container using the key for `version`.
pub fn encode_container(zip: &[u8], version: u8, keys: &KeyRing) -> Vec<u8> {
    let header = ContainerHeader::for_payload(version, zip);
    let key = keys.container_key(version);
    let mut out = Vec::with_capacity(HEADER_LEN + zip.len());
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(&xor_crypt(zip, &key));
    out
}

/// Unwrap a container, trying each candidate key until one verifies.
pub fn decode_container(bytes: &[u8], keys: &KeyRing) -> Result<DecodedContainer> {
    let header = ContainerHeader::parse(bytes)?;
    let available = (bytes.len() - HEADER_LEN) as u64;
    if available < header.data_size {
        return Err(ExchangeError::InvalidFormat(format!(
            "payload truncated: header declares {} bytes, {} present",
            header.data_size, available
        )));
    }
    let end = HEADER_LEN + header.data_size as usize;
    let payload = &bytes[HEADER_LEN..end];

    for candidate in keys.container_key_candidates(header.version) {
        let plain = xor_crypt(payload, &candidate.key);
        if header.verifies(&plain) {
            debug!(
                header_version = header.version,
                key_version = candidate.version,
                injected = candidate.injected,
                "container checksum verified"
            );
            return Ok(DecodedContainer {
                header,
                zip: plain,
                key_version: candidate.version,
                injected_key: candidate.injected,
            });
        }
    }
    Err(ExchangeError::ChecksumMismatch)
}
