//! # KeyTone Sign
//!
//! The unified API for KeyTone album signatures: local identities, album
//! signing, the offline authorization handshake and the exchange files.
//!
//! ## Overview
//!
//! - **Identities**: each local signature is an encrypted identifier plus
//!   an encrypted profile (name, intro, card image) in the installation store
//! - **Album binding**: signing an album records the signer under their
//!   qualification code; the first signer becomes the original author and
//!   decides whether re-exports need authorization
//! - **Handshake**: request and grant files let an original author
//!   authorize another signer without a network connection
//! - **Exchange**: `.ktsign` moves a signature between installations,
//!   `.ktalbum` moves a whole album
//!
//! ## Usage
//!
//! ```rust,no_run
//! use keytone_sign::{ApplyOptions, KernelConfig, SignatureKernel};
//! use keytone_sign::core::{generate_protect_code, KeyRing};
//! use keytone_sign::store::JsonFileStore;
//!
//! fn example() -> keytone_sign::Result<()> {
//!     let store = JsonFileStore::open("config/setting.json")?;
//!     let kernel = SignatureKernel::new(store, KeyRing::from_build(), KernelConfig::new("config"));
//!
//!     let id = kernel.create_signature(&generate_protect_code(), "Alice", "", None)?;
//!     let options = ApplyOptions::requiring_authorization("alice@example.com");
//!     kernel.apply_signature_to_album("albums/my-album", &id, &options)?;
//!     kernel.export_album("albums/my-album", "my-album.ktalbum")?;
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `keytone_sign::core` - keys, AEAD, qualification codes
//! - `keytone_sign::store` - configuration stores and album configs
//! - `keytone_sign::perms` - signature map, policy, handshake tokens
//! - `keytone_sign::exchange` - `.ktsign` and `.ktalbum` codecs

pub mod binding;
pub mod error;
pub mod handshake;
pub mod identity;
mod images;
pub mod kernel;
pub mod ktsign;
pub mod package;

// Re-export component crates
pub use keytone_sign_core as core;
pub use keytone_sign_exchange as exchange;
pub use keytone_sign_perms as perms;
pub use keytone_sign_store as store;

// Re-export main types for convenience
pub use binding::{
    AlbumSignatureInfo, ApplyOptions, ApplyReport, AvailableSignature, SignatureInAlbum,
};
pub use error::{DecryptStep, Result, SignError};
pub use handshake::AuthRequestView;
pub use identity::{
    CardImage, ImageUpdate, SignatureListing, SignatureProfile, SignatureStorageEntry, SortKey,
    IDENTITY_STORE_KEY,
};
pub use kernel::{KernelConfig, SignatureKernel};
pub use ktsign::ImportResult;
pub use package::{AlbumPackageInfo, ExportedAlbum, ImportMode, ImportedAlbum};

// Re-export commonly used component types
pub use keytone_sign_core::{KeyRing, QualificationCode, QualificationFingerprint};
pub use keytone_sign_perms::{
    ApplyOutcome, AuthGrantFile, AuthRequestFile, AuthorizationDecision, ExportTerms,
    HandshakeFailure,
};
