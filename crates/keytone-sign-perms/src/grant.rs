//! Authorization request and grant tokens.
//!
//! Both parties are offline. The requester sends a request file, the
//! original author answers with a grant file. Neither file reveals a
//! plaintext identifier or qualification code.
//!
//! ## Request
//!
//! K-encrypted JSON of [`AuthRequestPayload`]:
//! `SHA256(uuid)`, F-encrypted last 10 characters of the requester's id,
//! F-encrypted `SHA256(authorCode)`, the requester's name and fingerprint.
//!
//! ## Grant
//!
//! N-encrypted binding hash:
//!
//! ```text
//! SHA256( last10(uuidHash) || first11(SHA256(requesterSuffix10)) || Ydet(first15(authorCode)) )
//! ```
//!
//! The requester recomputes the binding from its own session id, its own
//! identifier, and the album's original author code.

use keytone_sign_core::{qualification_code, sha256_hex, KeyRing, QualificationCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{HandshakeFailure, PermsError, Result};

/// Version tag written into request and grant files.
pub const HANDSHAKE_FILE_VERSION: &str = "1.0";

const REQUESTER_SUFFIX_LEN: usize = 10;
const UUID_HASH_SUFFIX_LEN: usize = 10;
const REQUESTER_PREFIX_LEN: usize = 11;
const AUTHOR_CODE_PREFIX_LEN: usize = 15;

/// Request file as written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequestFile {
    pub encrypted_data: String,
    #[serde(default)]
    pub version: String,
}

/// Inner request payload (after K decryption).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRequestPayload {
    #[serde(rename = "authorizationUUIDHash")]
    pub authorization_uuid_hash: String,
    #[serde(rename = "requesterSignatureIDSuffix")]
    pub requester_signature_id_suffix: String,
    #[serde(rename = "originalAuthorQualCodeHash")]
    pub original_author_qual_code_hash: String,
    #[serde(rename = "requesterSignatureName")]
    pub requester_signature_name: String,
    #[serde(rename = "requesterQualificationFingerprint")]
    pub requester_qualification_fingerprint: String,
}

/// A request with its F-encrypted fields opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAuthRequest {
    pub authorization_uuid_hash: String,
    /// Last 10 characters of the requester's identifier.
    pub requester_suffix: String,
    /// `SHA256(originalAuthorCode)`.
    pub original_author_code_hash: String,
    pub requester_name: String,
    pub requester_fingerprint: String,
}

impl ParsedAuthRequest {
    /// Whether the request targets the author with qualification `code`.
    pub fn is_addressed_to(&self, code: &QualificationCode) -> bool {
        sha256_hex(code.as_str()) == self.original_author_code_hash
    }
}

/// Grant file as written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthGrantFile {
    pub encrypted_auth_token: String,
    #[serde(default)]
    pub version: String,
}

fn check_version(version: &str) -> Result<()> {
    if !version.is_empty() && version != HANDSHAKE_FILE_VERSION {
        return Err(HandshakeFailure::UnsupportedVersion(version.to_string()).into());
    }
    Ok(())
}

fn suffix(s: &str, n: usize) -> Result<&str> {
    if s.len() < n || !s.is_char_boundary(s.len() - n) {
        return Err(HandshakeFailure::IdentifierTooShort.into());
    }
    Ok(&s[s.len() - n..])
}

fn prefix(s: &str, n: usize) -> Result<&str> {
    if s.len() < n || !s.is_char_boundary(n) {
        return Err(HandshakeFailure::IdentifierTooShort.into());
    }
    Ok(&s[..n])
}

/// Build a request for `authorization_uuid` from the requester's plaintext id.
pub fn build_request(
    keys: &KeyRing,
    authorization_uuid: &str,
    requester_plain_id: &str,
    original_author_code: &QualificationCode,
    requester_name: &str,
) -> Result<AuthRequestFile> {
    if authorization_uuid.trim().is_empty() {
        return Err(PermsError::InvalidInput("authorization UUID is empty".into()));
    }
    let requester_suffix = suffix(requester_plain_id, REQUESTER_SUFFIX_LEN)?;
    let key_f = keys.request_key_f();
    let requester_code = qualification_code(requester_plain_id);

    let payload = AuthRequestPayload {
        authorization_uuid_hash: sha256_hex(authorization_uuid),
        requester_signature_id_suffix: key_f.encrypt(requester_suffix.as_bytes())?,
        original_author_qual_code_hash: key_f
            .encrypt(sha256_hex(original_author_code.as_str()).as_bytes())?,
        requester_signature_name: requester_name.to_string(),
        requester_qualification_fingerprint: requester_code.fingerprint().into_string(),
    };
    let json = serde_json::to_vec(&payload)?;
    debug!(fingerprint = %payload.requester_qualification_fingerprint, "built authorization request");
    Ok(AuthRequestFile {
        encrypted_data: keys.request_key_k().encrypt(&json)?,
        version: HANDSHAKE_FILE_VERSION.to_string(),
    })
}

/// Open a request file.
pub fn parse_request(keys: &KeyRing, file: &AuthRequestFile) -> Result<ParsedAuthRequest> {
    check_version(&file.version)?;
    let json = keys
        .request_key_k()
        .decrypt(&file.encrypted_data)
        .map_err(|_| HandshakeFailure::Undecryptable("request payload"))?;
    let payload: AuthRequestPayload =
        serde_json::from_slice(&json).map_err(|_| HandshakeFailure::Malformed("request payload"))?;

    let key_f = keys.request_key_f();
    let requester_suffix = key_f
        .decrypt_string(&payload.requester_signature_id_suffix)
        .map_err(|_| HandshakeFailure::Undecryptable("requester identifier suffix"))?;
    let original_author_code_hash = key_f
        .decrypt_string(&payload.original_author_qual_code_hash)
        .map_err(|_| HandshakeFailure::Undecryptable("original author code hash"))?;

    Ok(ParsedAuthRequest {
        authorization_uuid_hash: payload.authorization_uuid_hash,
        requester_suffix,
        original_author_code_hash,
        requester_name: payload.requester_signature_name,
        requester_fingerprint: payload.requester_qualification_fingerprint,
    })
}

/// The binding hash both parties compute.
fn grant_binding(
    keys: &KeyRing,
    uuid_hash: &str,
    requester_suffix: &str,
    author_code: &QualificationCode,
) -> Result<String> {
    let uuid_part = suffix(uuid_hash, UUID_HASH_SUFFIX_LEN)?;
    let requester_hash = sha256_hex(requester_suffix);
    let requester_part = &requester_hash[..REQUESTER_PREFIX_LEN];
    let author_part = keys
        .grant_key_y()
        .encrypt_deterministic(prefix(author_code.as_str(), AUTHOR_CODE_PREFIX_LEN)?.as_bytes())?;

    let mut combined =
        String::with_capacity(uuid_part.len() + requester_part.len() + author_part.len());
    combined.push_str(uuid_part);
    combined.push_str(requester_part);
    combined.push_str(&author_part);
    Ok(sha256_hex(combined))
}

/// Build a grant answering a parsed request.
pub fn build_grant(
    keys: &KeyRing,
    uuid_hash: &str,
    requester_suffix: &str,
    author_code: &QualificationCode,
) -> Result<AuthGrantFile> {
    if requester_suffix.len() < REQUESTER_SUFFIX_LEN {
        return Err(HandshakeFailure::IdentifierTooShort.into());
    }
    let binding = grant_binding(keys, uuid_hash, requester_suffix, author_code)?;
    Ok(AuthGrantFile {
        encrypted_auth_token: keys.grant_key_n().encrypt(binding.as_bytes())?,
        version: HANDSHAKE_FILE_VERSION.to_string(),
    })
}

/// Verify a grant for this session and requester.
///
/// Returns the requester's qualification code on success.
pub fn verify_grant(
    keys: &KeyRing,
    file: &AuthGrantFile,
    authorization_uuid: &str,
    requester_plain_id: &str,
    original_author_code: &QualificationCode,
) -> Result<QualificationCode> {
    check_version(&file.version)?;
    let token = keys
        .grant_key_n()
        .decrypt_string(&file.encrypted_auth_token)
        .map_err(|_| HandshakeFailure::Undecryptable("grant token"))?;

    let requester_suffix = suffix(requester_plain_id, REQUESTER_SUFFIX_LEN)?;
    let expected = grant_binding(
        keys,
        &sha256_hex(authorization_uuid),
        requester_suffix,
        original_author_code,
    )?;
    if expected != token {
        warn!("grant binding mismatch");
        return Err(HandshakeFailure::GrantMismatch.into());
    }
    Ok(qualification_code(requester_plain_id))
}
