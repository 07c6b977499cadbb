//! # KeyTone Sign Testkit
//!
//! Testing utilities for the KeyTone signature kernel.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: fixed inputs with expected outputs for qualification
//!   codes, fingerprints, album keys and container headers
//! - **Generators**: Proptest strategies for identifiers and profiles
//! - **Fixtures**: a temporary installation with a kernel and album helpers
//!
//! ## Golden Vectors
//!
//! ```rust
//! use keytone_sign_testkit::vectors::verify_all_vectors;
//!
//! for (name, ok, detail) in verify_all_vectors() {
//!     assert!(ok, "{name}: {detail}");
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use keytone_sign_testkit::generators::protect_code;
//!
//! proptest! {
//!     #[test]
//!     fn code_is_stable(id in protect_code()) {
//!         prop_assert_eq!(qualification_code(&id), qualification_code(&id));
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use keytone_sign_testkit::fixtures::InstallationFixture;
//!
//! let fixture = InstallationFixture::new();
//! let album = fixture.create_album("Piano");
//! let id = fixture.create_signature("Alice");
//! fixture.kernel.apply_signature_to_album(&album, &id, &Default::default()).unwrap();
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{multi_party_fixtures, InstallationFixture};
