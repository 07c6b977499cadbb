//! # KeyTone Sign Exchange
//!
//! Wire formats for moving signatures and albums between installations.
//!
//! ## Overview
//!
//! - **`.ktsign`**: a single signature. JSON envelope, XOR-obfuscated with a
//!   fixed key, base64 text. See [`ktsign`].
//! - **`.ktalbum`**: a whole album. A 48-byte little-endian header followed
//!   by a XOR-obfuscated zip archive. See [`ktalbum`] for the container and
//!   [`archive`] for the zip layout.
//!
//! ## Container Layout
//!
//! ```text
//! offset  size  field
//! 0       7     signature  "KTALBUM"
//! 7       1     version    key version (1 legacy, 2 current)
//! 8       8     dataSize   u64 LE, payload length
//! 16      32    checksum   SHA-256 of the plaintext zip
//! 48      n     payload    zip XOR key(version)
//! ```
//!
//! Decoding tries each candidate key from
//! [`KeyRing::container_key_candidates`](keytone_sign_core::KeyRing::container_key_candidates)
//! and accepts the first whose output matches the checksum.
//!
//! XOR obfuscation is not encryption. These formats rely on the checksum for
//! integrity and carry no confidentiality guarantee.

pub mod archive;
pub mod error;
pub mod ktalbum;
pub mod ktsign;
pub mod xor;

pub use archive::{
    pack_album, read_meta, unpack_album, validate_album_dir, AlbumMeta, META_ENTRY,
    META_MAGIC_NUMBER, META_VERSION,
};
pub use error::{ExchangeError, Result};
pub use ktalbum::{
    decode_container, encode_container, ContainerHeader, DecodedContainer, HEADER_LEN, MAGIC,
};
pub use ktsign::{
    decode_ktsign, encode_ktsign, KtsignAssets, KtsignEnvelope, KtsignValue, KTSIGN_XOR_KEY,
};
pub use xor::xor_crypt;
