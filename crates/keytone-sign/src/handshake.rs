//! Offline authorization handshake.
//!
//! 1. The requester calls [`generate_auth_request`] for an album that
//!    requires authorization and sends the file to the original author.
//! 2. The author calls [`parse_auth_request`] to review it, then
//!    [`generate_auth_grant`], which only succeeds if one of the author's
//!    local identities owns the album.
//! 3. The requester calls [`import_auth_grant`]; the album's authorized
//!    list changes only after the grant verifies.
//!
//! [`generate_auth_request`]: SignatureKernel::generate_auth_request
//! [`parse_auth_request`]: SignatureKernel::parse_auth_request
//! [`generate_auth_grant`]: SignatureKernel::generate_auth_grant
//! [`import_auth_grant`]: SignatureKernel::import_auth_grant

use std::path::Path;

use keytone_sign_core::{qualification_code, QualificationCode};
use keytone_sign_perms::{
    build_grant, build_request, parse_request, verify_grant, AlbumSignatureMap,
    AuthGrantFile, AuthRequestFile, HandshakeFailure,
};
use keytone_sign_store::ConfigStore;
use tracing::{debug, info};

use crate::error::{Result, SignError};
use crate::kernel::SignatureKernel;

/// What the author sees of a request.
///
/// The requester's identifier suffix stays inside the kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRequestView {
    pub requester_name: String,
    pub requester_fingerprint: String,
    pub authorization_uuid_hash: String,
    pub original_author_code_hash: String,
    /// Encrypted id of the local identity the request is addressed to.
    pub owner: Option<String>,
}

impl AuthRequestView {
    pub fn is_owned_locally(&self) -> bool {
        self.owner.is_some()
    }
}

/// The original author's code and the album's handshake session id.
fn session(map: &AlbumSignatureMap) -> Result<(QualificationCode, String)> {
    if !map.is_signed() {
        return Err(SignError::InvalidInput("album is not signed".into()));
    }
    let (code, entry) = map.original_author().ok_or_else(|| {
        SignError::InconsistentState("album is signed but has no original author entry".into())
    })?;
    let uuid = entry
        .authorization
        .as_ref()
        .map(|a| a.authorization_uuid.clone())
        .unwrap_or_default();
    if uuid.trim().is_empty() {
        return Err(SignError::InvalidInput(
            "album has no authorization session".into(),
        ));
    }
    Ok((code.clone(), uuid))
}

impl<S: ConfigStore> SignatureKernel<S> {
    /// Build a request asking the album's original author to authorize
    /// `requester_encrypted_id`.
    pub fn generate_auth_request(
        &self,
        album_dir: impl AsRef<Path>,
        requester_encrypted_id: &str,
    ) -> Result<AuthRequestFile> {
        let requester = self.unlock_id(requester_encrypted_id)?;
        let map = self.read_album_map(album_dir)?;
        let (author_code, uuid) = session(&map)?;
        if author_code == requester.code {
            return Err(SignError::InvalidInput(
                "signature is the album's original author".into(),
            ));
        }
        let file = build_request(
            self.keys(),
            &uuid,
            &requester.plain_id,
            &author_code,
            &requester.profile.name,
        )?;
        info!(code = requester.code.short(), "authorization request generated");
        Ok(file)
    }

    /// Open a request and find the local identity it is addressed to.
    pub fn parse_auth_request(&self, file: &AuthRequestFile) -> Result<AuthRequestView> {
        let parsed = parse_request(self.keys(), file)?;
        let owner = self
            .local_identifiers()?
            .into_iter()
            .find(|(_, plain)| parsed.is_addressed_to(&qualification_code(plain)))
            .map(|(encrypted_id, _)| encrypted_id);
        debug!(owned = owner.is_some(), "authorization request parsed");
        Ok(AuthRequestView {
            requester_name: parsed.requester_name,
            requester_fingerprint: parsed.requester_fingerprint,
            authorization_uuid_hash: parsed.authorization_uuid_hash,
            original_author_code_hash: parsed.original_author_code_hash,
            owner,
        })
    }

    /// Answer a request. Fails with [`HandshakeFailure::NotOwner`] unless a
    /// local identity is the addressed original author.
    pub fn generate_auth_grant(&self, file: &AuthRequestFile) -> Result<AuthGrantFile> {
        let parsed = parse_request(self.keys(), file)?;
        let author_code = self
            .local_identifiers()?
            .into_iter()
            .map(|(_, plain)| qualification_code(&plain))
            .find(|code| parsed.is_addressed_to(code))
            .ok_or(HandshakeFailure::NotOwner)?;
        let grant = build_grant(
            self.keys(),
            &parsed.authorization_uuid_hash,
            &parsed.requester_suffix,
            &author_code,
        )?;
        info!(
            requester = %parsed.requester_fingerprint,
            "authorization grant generated"
        );
        Ok(grant)
    }

    /// Verify a grant and add the requester to the album's authorized list.
    ///
    /// With `requester_encrypted_id = None` every local identity is tried;
    /// exactly one must verify. Returns the authorized code.
    pub fn import_auth_grant(
        &self,
        album_dir: impl AsRef<Path>,
        grant: &AuthGrantFile,
        requester_encrypted_id: Option<&str>,
    ) -> Result<QualificationCode> {
        let album_dir = album_dir.as_ref();
        let map = self.read_album_map(album_dir)?;
        let (author_code, uuid) = session(&map)?;

        let code = match requester_encrypted_id {
            Some(encrypted_id) => {
                let plain = self.plain_id(encrypted_id)?;
                verify_grant(self.keys(), grant, &uuid, &plain, &author_code)?
            }
            None => {
                let verified: Vec<QualificationCode> = self
                    .local_identifiers()?
                    .into_iter()
                    .filter_map(|(_, plain)| {
                        verify_grant(self.keys(), grant, &uuid, &plain, &author_code).ok()
                    })
                    .collect();
                match verified.len() {
                    0 => return Err(HandshakeFailure::NoMatchingIdentity.into()),
                    1 => verified.into_iter().next().ok_or(HandshakeFailure::NoMatchingIdentity)?,
                    n => return Err(HandshakeFailure::Ambiguous(n).into()),
                }
            }
        };

        let added = self.authorize_in_album(album_dir, &code)?;
        info!(code = code.short(), added, "authorization grant imported");
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::ApplyOptions;
    use crate::kernel::KernelConfig;
    use keytone_sign_core::{generate_protect_code, KeyRing};
    use keytone_sign_perms::AuthorizationDecision;
    use keytone_sign_store::MemoryStore;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const AUTHOR: &str = "author_id_0123456789a";
    const REQUESTER: &str = "requester_0123456789a";

    fn kernel(dir: &Path) -> SignatureKernel<MemoryStore> {
        SignatureKernel::new(
            MemoryStore::new(),
            KeyRing::public_defaults(),
            KernelConfig::new(dir),
        )
    }

    fn album(root: &Path) -> PathBuf {
        let album = root.join(generate_protect_code());
        fs::create_dir_all(&album).unwrap();
        fs::write(album.join("package.json"), br#"{"package_name":"Test"}"#).unwrap();
        album
    }

    /// Two installations sharing one album directory.
    struct Parties {
        _dir: TempDir,
        album: PathBuf,
        author: SignatureKernel<MemoryStore>,
        author_id: String,
        requester: SignatureKernel<MemoryStore>,
        requester_id: String,
    }

    fn parties() -> Parties {
        let dir = TempDir::new().unwrap();
        let author = kernel(&dir.path().join("a"));
        let requester = kernel(&dir.path().join("r"));
        let author_id = author.create_signature(AUTHOR, "Alice", "", None).unwrap();
        let requester_id = requester.create_signature(REQUESTER, "Bob", "", None).unwrap();
        let album = album(dir.path());
        author
            .apply_signature_to_album(
                &album,
                &author_id,
                &ApplyOptions::requiring_authorization("alice@example.com"),
            )
            .unwrap();
        Parties {
            _dir: dir,
            album,
            author,
            author_id,
            requester,
            requester_id,
        }
    }

    #[test]
    fn test_full_handshake() {
        let p = parties();
        let request = p
            .requester
            .generate_auth_request(&p.album, &p.requester_id)
            .unwrap();

        let view = p.author.parse_auth_request(&request).unwrap();
        assert_eq!(view.requester_name, "Bob");
        assert_eq!(
            view.requester_fingerprint,
            qualification_code(REQUESTER).fingerprint().as_str()
        );
        assert_eq!(view.owner.as_deref(), Some(p.author_id.as_str()));

        let grant = p.author.generate_auth_grant(&request).unwrap();
        let code = p
            .requester
            .import_auth_grant(&p.album, &grant, Some(&p.requester_id))
            .unwrap();
        assert_eq!(code, qualification_code(REQUESTER));
        assert_eq!(
            p.requester
                .check_signature_authorization(&p.album, &p.requester_id)
                .unwrap(),
            AuthorizationDecision::Authorized
        );
    }

    #[test]
    fn test_import_scans_local_identities() {
        let p = parties();
        let request = p
            .requester
            .generate_auth_request(&p.album, &p.requester_id)
            .unwrap();
        let grant = p.author.generate_auth_grant(&request).unwrap();
        p.requester
            .create_signature("another_0123456789abc", "Carol", "", None)
            .unwrap();
        let code = p.requester.import_auth_grant(&p.album, &grant, None).unwrap();
        assert_eq!(code, qualification_code(REQUESTER));
    }

    #[test]
    fn test_non_owner_cannot_grant() {
        let p = parties();
        let request = p
            .requester
            .generate_auth_request(&p.album, &p.requester_id)
            .unwrap();
        let view = p.requester.parse_auth_request(&request).unwrap();
        assert!(!view.is_owned_locally());
        assert!(matches!(
            p.requester.generate_auth_grant(&request),
            Err(SignError::Handshake(HandshakeFailure::NotOwner))
        ));
    }

    #[test]
    fn test_wrong_requester_leaves_album_untouched() {
        let p = parties();
        let request = p
            .requester
            .generate_auth_request(&p.album, &p.requester_id)
            .unwrap();
        let grant = p.author.generate_auth_grant(&request).unwrap();
        let stranger = p
            .requester
            .create_signature("stranger_0123456789ab", "Eve", "", None)
            .unwrap();
        let before = fs::read(p.album.join("package.json")).unwrap();

        assert!(matches!(
            p.requester.import_auth_grant(&p.album, &grant, Some(&stranger)),
            Err(SignError::Handshake(HandshakeFailure::GrantMismatch))
        ));
        assert_eq!(fs::read(p.album.join("package.json")).unwrap(), before);
    }

    #[test]
    fn test_no_matching_identity() {
        let p = parties();
        let request = p
            .requester
            .generate_auth_request(&p.album, &p.requester_id)
            .unwrap();
        let grant = p.author.generate_auth_grant(&request).unwrap();
        p.requester.delete_signature(&p.requester_id).unwrap();
        assert!(matches!(
            p.requester.import_auth_grant(&p.album, &grant, None),
            Err(SignError::Handshake(HandshakeFailure::NoMatchingIdentity))
        ));
    }

    #[test]
    fn test_request_needs_signed_album() {
        let dir = TempDir::new().unwrap();
        let k = kernel(dir.path());
        let id = k.create_signature(REQUESTER, "Bob", "", None).unwrap();
        let album = album(dir.path());
        assert!(matches!(
            k.generate_auth_request(&album, &id),
            Err(SignError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_author_cannot_request_own_album() {
        let p = parties();
        assert!(matches!(
            p.author.generate_auth_request(&p.album, &p.author_id),
            Err(SignError::InvalidInput(_))
        ));
    }
}
