//! # KeyTone Sign Store
//!
//! Configuration persistence for the signature protocol. Provides a small
//! key-value trait over a JSON document with in-memory, file-backed, and
//! per-album implementations.
//!
//! ## Overview
//!
//! Two stores take part in every operation:
//!
//! - The **installation store** holds the local identity map under the
//!   `signature` key. Use [`JsonFileStore`] in production and
//!   [`MemoryStore`] in tests.
//! - The **album store** ([`AlbumConfig`]) holds one album's `package.json`.
//!   The document may be plain JSON, a legacy whole-file hex ciphertext, or
//!   a [`CoreStub`] pointing at a sibling encrypted `core` file.
//!
//! Stores are instance-scoped and passed by reference. Each guards its
//! document with a read/write lock; file-backed stores persist with
//! write-temp-then-rename.
//!
//! ## Key Types
//!
//! - [`ConfigStore`] - `get`/`set`/`remove`/`modify` over JSON values
//! - [`StoreExt`] - Typed helpers on top of [`ConfigStore`]
//! - [`AlbumConfig`] - The album configuration collaborator
//! - [`CoreStub`] - Descriptor replacing an encrypted album config

pub mod album;
pub mod error;
pub mod fs;
pub mod json_file;
pub mod memory;
pub mod stub;
pub mod traits;

pub use album::{is_likely_hex_cipher, AlbumConfig, ConfigMode, EncryptOutcome, ALBUM_CONFIG_FILE};
pub use error::{Result, StoreError};
pub use fs::atomic_write;
pub use json_file::JsonFileStore;
pub use memory::MemoryStore;
pub use stub::{CoreStub, CORE_FILE_NAME, CORE_SCHEMA_VERSION};
pub use traits::{ConfigStore, StoreExt};
