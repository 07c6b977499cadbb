//! # KeyTone Sign Permissions
//!
//! Album signature state and the export authorization protocol.
//!
//! ## Overview
//!
//! Every album carries an [`AlbumSignatureMap`] keyed by qualification
//! code. The first signer becomes the original author and their entry holds
//! the only [`AuthorizationMetadata`]. Later exporters are contributors.
//!
//! ```text
//! UNSIGNED ──first export──▶ SIGNED(original) ──re-export──▶ SIGNED(original + contributors)
//! ```
//!
//! When the original author requires authorization, a contributor must
//! complete an offline handshake first:
//!
//! 1. Requester builds an [`AuthRequestFile`] ([`build_request`])
//! 2. Author parses it ([`parse_request`]) and, if it names one of their
//!    own identities, answers with an [`AuthGrantFile`] ([`build_grant`])
//! 3. Requester verifies the grant ([`verify_grant`]) and the resulting
//!    qualification code is added to the album's authorized list
//!
//! ## Envelope
//!
//! The map is stored in the album config as one opaque field sealed with
//! the signature-field key (see [`envelope`]). Opening it returns a
//! [`RecoverableError`] on failure so each caller decides whether an
//! unreadable field may be treated as absent.
//!
//! This crate is pure: no filesystem access.

pub mod envelope;
pub mod error;
pub mod grant;
pub mod signature_map;

pub use envelope::{open_field, open_map, seal_map, RecoverableError, SIGNATURE_FIELD};
pub use error::{HandshakeFailure, PermsError, Result};
pub use grant::{
    build_grant, build_request, parse_request, verify_grant, AuthGrantFile, AuthRequestFile,
    AuthRequestPayload, ParsedAuthRequest, HANDSHAKE_FILE_VERSION,
};
pub use signature_map::{
    AlbumSignatureEntry, AlbumSignatureMap, ApplyOutcome, AuthorizationDecision,
    AuthorizationMetadata, EntryContent, ExportTerms,
};
