//! Album signature binding.
//!
//! The album's `signature` field holds the sealed [`AlbumSignatureMap`].
//! Every write goes open → mutate → seal → persist through the album's
//! [`AlbumConfig`], so the field inherits whatever on-disk shape the album
//! config uses.
//!
//! Only [`apply_signature_to_album`](SignatureKernel::apply_signature_to_album)
//! tolerates an unreadable field: it logs the failure and starts a fresh
//! map. Every read path propagates the error.

use std::fs;
use std::path::Path;

use keytone_sign_core::{generate_protect_code, QualificationCode, QualificationFingerprint};
use keytone_sign_perms::{
    open_field, seal_map, AlbumSignatureEntry, AlbumSignatureMap, ApplyOutcome,
    AuthorizationDecision, EntryContent, ExportTerms, SIGNATURE_FIELD,
};
use keytone_sign_store::{AlbumConfig, ConfigStore};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{DecryptStep, Result, SignError};
use crate::identity::UnlockedSignature;
use crate::images;
use crate::kernel::{now_secs, SignatureKernel};

/// Options for [`SignatureKernel::apply_signature_to_album`].
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// Refresh name, intro and card image of an existing entry.
    pub update_content: bool,
    /// Terms recorded when the album is signed for the first time.
    pub terms: ExportTerms,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            update_content: true,
            terms: ExportTerms::default(),
        }
    }
}

impl ApplyOptions {
    /// First-signing terms that require authorization.
    pub fn requiring_authorization(contact_email: impl Into<String>) -> Self {
        Self {
            update_content: true,
            terms: ExportTerms {
                require_authorization: true,
                contact_email: contact_email.into(),
                ..ExportTerms::default()
            },
        }
    }
}

/// Result of a successful apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    pub code: QualificationCode,
    pub outcome: ApplyOutcome,
    /// Card image path stored in the entry, relative to the album.
    pub card_image_path: String,
    /// The previous signature field was unreadable and has been replaced.
    pub recovered_field: bool,
}

/// Summary of an album's signatures.
#[derive(Debug, Clone, Default)]
pub struct AlbumSignatureInfo {
    pub original_author: Option<(QualificationCode, AlbumSignatureEntry)>,
    pub contributors: Vec<QualificationCode>,
    pub direct_export_author: Option<QualificationCode>,
    pub map: AlbumSignatureMap,
}

impl AlbumSignatureInfo {
    pub fn is_signed(&self) -> bool {
        self.map.is_signed()
    }
}

/// Whether a local signature is in an album, and what changed since.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignatureInAlbum {
    pub in_album: bool,
    pub name_changed: bool,
    pub intro_changed: bool,
    pub image_changed: bool,
}

impl SignatureInAlbum {
    pub fn has_changes(&self) -> bool {
        self.name_changed || self.intro_changed || self.image_changed
    }
}

/// A local signature as offered for export of one album.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailableSignature {
    pub encrypted_id: String,
    pub code: QualificationCode,
    pub fingerprint: QualificationFingerprint,
    pub name: String,
    pub intro: String,
    pub is_in_album: bool,
    /// The export-permission check allows this signature.
    pub is_authorized: bool,
    pub is_original_author: bool,
}

impl<S: ConfigStore> SignatureKernel<S> {
    // ─────────────────────────────────────────────────────────────────────────
    // Map I/O
    // ─────────────────────────────────────────────────────────────────────────

    fn open_map(&self, album: &AlbumConfig) -> Result<AlbumSignatureMap> {
        let field = album.get(SIGNATURE_FIELD)?;
        let map = open_field(field.as_ref(), &self.keys().album_signature_key())?;
        Ok(map.unwrap_or_default())
    }

    fn seal_into(&self, album: &AlbumConfig, map: &AlbumSignatureMap) -> Result<()> {
        let sealed = seal_map(map, &self.keys().album_signature_key())?;
        album.set(SIGNATURE_FIELD, Value::String(sealed))?;
        Ok(())
    }

    /// Read an album's signature map. An unsigned album yields an empty map.
    pub fn read_album_map(&self, album_dir: impl AsRef<Path>) -> Result<AlbumSignatureMap> {
        let album = self.open_album(album_dir)?;
        self.open_map(&album)
    }

    /// Validate and store a signature map.
    pub fn write_album_map(
        &self,
        album_dir: impl AsRef<Path>,
        map: &AlbumSignatureMap,
    ) -> Result<()> {
        map.validate()?;
        let album = self.open_album(album_dir)?;
        self.seal_into(&album, map)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Apply
    // ─────────────────────────────────────────────────────────────────────────

    /// Copy the signer's card image into the album's assets directory.
    ///
    /// Returns the album-relative path, or empty when there is no image or
    /// the copy fails.
    fn copy_card_image(&self, album_dir: &Path, signer: &UnlockedSignature) -> String {
        let source = &signer.profile.card_image;
        if source.is_empty() {
            return String::new();
        }
        let bytes = match fs::read(source) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "card image unreadable; applying without image");
                return String::new();
            }
        };
        let original = images::base_name(source);
        let seed = format!("{}|{}|{}", signer.code.as_str(), original, now_secs());
        let file_name = images::hashed_file_name(&seed, original);
        let assets = &self.config().album_assets_dir;
        match images::write_into(&album_dir.join(assets), &file_name, &bytes) {
            Ok(_) => format!("{assets}/{file_name}"),
            Err(e) => {
                warn!(error = %e, "failed to copy card image into album");
                String::new()
            }
        }
    }

    /// Sign `album_dir` with the local signature `encrypted_id`.
    ///
    /// The export-permission check runs before anything is written. On the
    /// first signing an empty `authorization_uuid` is replaced with a fresh
    /// protect code.
    pub fn apply_signature_to_album(
        &self,
        album_dir: impl AsRef<Path>,
        encrypted_id: &str,
        options: &ApplyOptions,
    ) -> Result<ApplyReport> {
        let signer = self.unlock_id(encrypted_id)?;
        let album = self.open_album(album_dir)?;
        let field_key = self.keys().album_signature_key();

        let (mut map, recovered_field) =
            match open_field(album.get(SIGNATURE_FIELD)?.as_ref(), &field_key) {
                Ok(map) => (map.unwrap_or_default(), false),
                Err(e) => {
                    warn!(
                        step = %DecryptStep::SignatureField,
                        error = %e,
                        album = album.album_id(),
                        "existing signature field unreadable; starting a fresh map"
                    );
                    (AlbumSignatureMap::new(), true)
                }
            };

        let mut terms = options.terms.clone();
        if map.is_signed() {
            map.validate()?;
            map.check_authorization(&signer.code).into_result()?;
        } else {
            terms.validate()?;
            if terms.authorization_uuid.trim().is_empty() {
                terms.authorization_uuid = generate_protect_code();
            }
        }

        let previous = map.get(&signer.code).cloned();
        let content = (previous.is_none() || options.update_content).then(|| EntryContent {
            name: signer.profile.name.clone(),
            intro: signer.profile.intro.clone(),
            card_image_path: self.copy_card_image(album.album_dir(), &signer),
        });

        let outcome = map.record_export(&signer.code, content.clone(), &terms)?;
        self.seal_into(&album, &map)?;

        if let (Some(prev), Some(new)) = (&previous, &content) {
            let old = &prev.card_image_path;
            if !old.is_empty() && *old != new.card_image_path {
                match images::album_path(album.album_dir(), old) {
                    Some(path) => {
                        if let Err(e) = fs::remove_file(&path) {
                            debug!(error = %e, "replaced card image not removed");
                        }
                    }
                    None => warn!("replaced card image path escapes the album; left in place"),
                }
            }
        }

        let card_image_path = map
            .get(&signer.code)
            .map(|e| e.card_image_path.clone())
            .unwrap_or_default();
        info!(
            code = signer.code.short(),
            album = album.album_id(),
            ?outcome,
            "signature applied to album"
        );
        Ok(ApplyReport {
            code: signer.code,
            outcome,
            card_image_path,
            recovered_field,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Run the export-permission check for a local signature.
    ///
    /// A signed album without an original author is an error; every other
    /// outcome, including a denial, is returned as a decision.
    pub fn check_signature_authorization(
        &self,
        album_dir: impl AsRef<Path>,
        encrypted_id: &str,
    ) -> Result<AuthorizationDecision> {
        let code = self.qualification_code_of(encrypted_id)?;
        let map = self.read_album_map(album_dir)?;
        match map.check_authorization(&code) {
            AuthorizationDecision::Inconsistent => Err(SignError::InconsistentState(
                "album is signed but has no original author entry".into(),
            )),
            decision => Ok(decision),
        }
    }

    pub fn album_signature_info(&self, album_dir: impl AsRef<Path>) -> Result<AlbumSignatureInfo> {
        let map = self.read_album_map(album_dir)?;
        Ok(AlbumSignatureInfo {
            original_author: map
                .original_author()
                .map(|(code, entry)| (code.clone(), entry.clone())),
            contributors: map.contributors().into_iter().cloned().collect(),
            direct_export_author: map.direct_export_author().cloned(),
            map,
        })
    }

    /// Compare a local signature with its entry in an album.
    ///
    /// Card images are compared by SHA-256 of their contents; an image that
    /// cannot be read counts as changed.
    pub fn check_signature_in_album(
        &self,
        album_dir: impl AsRef<Path>,
        encrypted_id: &str,
    ) -> Result<SignatureInAlbum> {
        let album_dir = album_dir.as_ref();
        let local = self.unlock_id(encrypted_id)?;
        let map = self.read_album_map(album_dir)?;
        let Some(entry) = map.get(&local.code) else {
            return Ok(SignatureInAlbum::default());
        };

        let local_image = &local.profile.card_image;
        let album_image = &entry.card_image_path;
        let image_changed = match (local_image.is_empty(), album_image.is_empty()) {
            (true, true) => false,
            (true, false) | (false, true) => true,
            (false, false) => {
                let local_digest = images::file_digest(Path::new(local_image));
                let album_digest = images::album_path(album_dir, album_image)
                    .and_then(|p| images::file_digest(&p));
                match (local_digest, album_digest) {
                    (Some(a), Some(b)) => a != b,
                    _ => true,
                }
            }
        };

        Ok(SignatureInAlbum {
            in_album: true,
            name_changed: entry.name != local.profile.name,
            intro_changed: entry.intro != local.profile.intro,
            image_changed,
        })
    }

    /// Every readable local signature with its standing in `album_dir`.
    pub fn available_signatures(
        &self,
        album_dir: impl AsRef<Path>,
    ) -> Result<Vec<AvailableSignature>> {
        let map = self.read_album_map(album_dir)?;
        let original = map.original_author().map(|(code, _)| code.clone());
        let mut identities = self.readable_identities()?;
        identities.sort_by_key(|u| u.sort_time);

        Ok(identities
            .into_iter()
            .map(|u| AvailableSignature {
                is_in_album: map.contains(&u.code),
                is_authorized: map.check_authorization(&u.code).is_allowed(),
                is_original_author: original.as_ref() == Some(&u.code),
                fingerprint: u.code.fingerprint(),
                encrypted_id: u.encrypted_id,
                code: u.code,
                name: u.profile.name,
                intro: u.profile.intro,
            })
            .collect())
    }

    /// Add `code` to the album's authorized list. Returns `false` if it was
    /// already there.
    pub fn authorize_in_album(
        &self,
        album_dir: impl AsRef<Path>,
        code: &QualificationCode,
    ) -> Result<bool> {
        let album = self.open_album(album_dir)?;
        let mut map = self.open_map(&album)?;
        let added = map.add_authorized(code)?;
        if added {
            self.seal_into(&album, &map)?;
        }
        Ok(added)
    }
}
