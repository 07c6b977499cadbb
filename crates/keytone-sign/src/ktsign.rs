//! `.ktsign` export and conflict-aware import.

use std::fs;

use keytone_sign_core::qualification_code;
use keytone_sign_exchange::{decode_ktsign, encode_ktsign, KtsignEnvelope, KtsignValue};
use keytone_sign_store::ConfigStore;
use serde_json::Map;
use tracing::{info, warn};

use crate::error::{DecryptStep, Result, SignError};
use crate::identity::{CardImage, SignatureProfile};
use crate::images;
use crate::kernel::{now_secs, SignatureKernel};

/// Outcome of [`SignatureKernel::import_signature`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportResult {
    /// Stored under a new encrypted id.
    Imported { encrypted_id: String },
    /// A local signature with the same qualification code exists; nothing
    /// was written.
    Conflict {
        existing_encrypted_id: String,
        existing_name: String,
    },
}

/// A decoded `.ktsign` file with its identifier opened.
struct Incoming {
    plain_id: String,
    envelope: KtsignEnvelope,
}

impl<S: ConfigStore> SignatureKernel<S> {
    /// Encode a local signature as `.ktsign` text.
    ///
    /// An unreadable card image is left out with a warning.
    pub fn export_signature(&self, encrypted_id: &str) -> Result<String> {
        let signature = self.unlock_id(encrypted_id)?;
        let key = self.keys().key_b().encrypt(signature.plain_id.as_bytes())?;

        let card_image = &signature.profile.card_image;
        let image_bytes = if card_image.is_empty() {
            None
        } else {
            match fs::read(card_image) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    warn!(error = %e, "card image unreadable; exporting without it");
                    None
                }
            }
        };
        let value = KtsignValue {
            name: signature.profile.name.clone(),
            intro: signature.profile.intro.clone(),
            card_image_path: images::base_name(card_image).to_string(),
            created_at: Some(chrono::Utc::now().to_rfc3339()),
            extra: Map::new(),
        };
        let text = encode_ktsign(&KtsignEnvelope::new(key, value, image_bytes.as_deref()))?;
        info!(code = signature.code.short(), "signature exported");
        Ok(text)
    }

    fn open_incoming(&self, text: &str) -> Result<Incoming> {
        let envelope = decode_ktsign(text)?;
        let plain_id = self
            .keys()
            .key_b()
            .decrypt_string(&envelope.key)
            .map_err(|e| SignError::decryption(DecryptStep::Identity, e))?;
        if plain_id.chars().count() < 7 {
            return Err(SignError::InvalidFormat(
                "signature identifier is too short".into(),
            ));
        }
        Ok(Incoming { plain_id, envelope })
    }

    /// Local signature sharing `plain_id`'s qualification code.
    fn find_existing(&self, plain_id: &str) -> Result<Option<(String, SignatureProfile)>> {
        let code = qualification_code(plain_id);
        for (encrypted_id, plain) in self.local_identifiers()? {
            if qualification_code(&plain) == code {
                let profile = self.decrypt_signature(&encrypted_id)?;
                return Ok(Some((encrypted_id, profile)));
            }
        }
        Ok(None)
    }

    fn store_incoming(&self, incoming: &Incoming, existing: Option<&str>) -> Result<String> {
        let value = &incoming.envelope.value;
        let bytes = match &incoming.envelope.assets {
            Some(assets) => assets.card_image_bytes()?,
            None => None,
        };
        let file_name = match value.card_image_path.as_str() {
            "" => "card.png",
            path => images::base_name(path),
        };
        let image = bytes.as_deref().map(|bytes| CardImage { bytes, file_name });

        match existing {
            None => self.create_signature(&incoming.plain_id, &value.name, &value.intro, image),
            Some(encrypted_id) => {
                let sort_time = self
                    .load_entries()?
                    .get(encrypted_id)
                    .map(|e| e.sort_time())
                    .filter(|t| *t > 0)
                    .unwrap_or_else(now_secs);
                let card_image = match image {
                    Some(img) => self.save_local_image(&incoming.plain_id, &value.name, img)?,
                    None => String::new(),
                };
                let profile = SignatureProfile {
                    name: value.name.clone(),
                    intro: value.intro.clone(),
                    card_image,
                };
                self.write_profile(encrypted_id, &profile, sort_time)?;
                Ok(encrypted_id.to_string())
            }
        }
    }

    /// Import `.ktsign` text unless a signature with the same qualification
    /// code already exists.
    pub fn import_signature(&self, text: &str) -> Result<ImportResult> {
        let incoming = self.open_incoming(text)?;
        if let Some((existing_encrypted_id, profile)) = self.find_existing(&incoming.plain_id)? {
            info!("signature import conflicts with a local signature");
            return Ok(ImportResult::Conflict {
                existing_encrypted_id,
                existing_name: profile.name,
            });
        }
        let encrypted_id = self.store_incoming(&incoming, None)?;
        info!(code = qualification_code(&incoming.plain_id).short(), "signature imported");
        Ok(ImportResult::Imported { encrypted_id })
    }

    /// Complete an import. With `overwrite` an existing signature is
    /// replaced in place and keeps its sort position; without it a conflict
    /// is an error.
    pub fn confirm_import(&self, text: &str, overwrite: bool) -> Result<String> {
        let incoming = self.open_incoming(text)?;
        let existing = self.find_existing(&incoming.plain_id)?;
        let encrypted_id = match existing {
            Some((_, profile)) if !overwrite => {
                return Err(SignError::Conflict(format!(
                    "signature '{}' already exists",
                    profile.name
                )))
            }
            Some((encrypted_id, _)) => self.store_incoming(&incoming, Some(&encrypted_id))?,
            None => self.store_incoming(&incoming, None)?,
        };
        info!(overwrite, "signature import confirmed");
        Ok(encrypted_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::KernelConfig;
    use keytone_sign_core::KeyRing;
    use keytone_sign_store::MemoryStore;
    use std::path::Path;
    use tempfile::TempDir;

    const ID: &str = "export_me_0123456789a";

    fn kernel(dir: &Path) -> SignatureKernel<MemoryStore> {
        SignatureKernel::new(
            MemoryStore::new(),
            KeyRing::public_defaults(),
            KernelConfig::new(dir),
        )
    }

    #[test]
    fn test_export_then_import_elsewhere() {
        let dir = TempDir::new().unwrap();
        let src = kernel(&dir.path().join("src"));
        let dst = kernel(&dir.path().join("dst"));
        let img = CardImage {
            bytes: b"\x89PNG-data",
            file_name: "me.png",
        };
        let id = src.create_signature(ID, "Alice", "intro", Some(img)).unwrap();
        let text = src.export_signature(&id).unwrap();

        let envelope = decode_ktsign(&text).unwrap();
        assert_eq!(envelope.value.name, "Alice");
        assert!(envelope.value.card_image_path.ends_with(".png"));
        assert!(envelope.value.created_at.is_some());

        let ImportResult::Imported { encrypted_id } = dst.import_signature(&text).unwrap() else {
            panic!("expected a fresh import");
        };
        let profile = dst.decrypt_signature(&encrypted_id).unwrap();
        assert_eq!(profile.name, "Alice");
        assert_eq!(profile.intro, "intro");
        assert_eq!(fs::read(&profile.card_image).unwrap(), b"\x89PNG-data");
        assert_eq!(
            dst.qualification_code_of(&encrypted_id).unwrap(),
            qualification_code(ID)
        );
    }

    #[test]
    fn test_conflict_then_overwrite() {
        let dir = TempDir::new().unwrap();
        let src = kernel(&dir.path().join("src"));
        let dst = kernel(&dir.path().join("dst"));
        let exported = src.create_signature(ID, "Alice v2", "new", None).unwrap();
        let text = src.export_signature(&exported).unwrap();

        let local = dst.create_signature(ID, "Alice v1", "old", None).unwrap();
        dst.set_sort_time(&local, 99).unwrap();

        match dst.import_signature(&text).unwrap() {
            ImportResult::Conflict {
                existing_encrypted_id,
                existing_name,
            } => {
                assert_eq!(existing_encrypted_id, local);
                assert_eq!(existing_name, "Alice v1");
            }
            other => panic!("expected conflict, got {other:?}"),
        }
        assert_eq!(dst.decrypt_signature(&local).unwrap().name, "Alice v1");
        assert!(matches!(
            dst.confirm_import(&text, false),
            Err(SignError::Conflict(_))
        ));

        let id = dst.confirm_import(&text, true).unwrap();
        assert_eq!(id, local);
        let listing = dst.list_signatures().unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].sort_time, 99);
        let profile = listing[0].profile.as_ref().unwrap();
        assert_eq!(profile.name, "Alice v2");
        assert_eq!(profile.intro, "new");
    }

    #[test]
    fn test_import_rejects_foreign_key() {
        let dir = TempDir::new().unwrap();
        let k = kernel(dir.path());
        let value = KtsignValue {
            name: "Mallory".into(),
            ..KtsignValue::default()
        };
        let text = encode_ktsign(&KtsignEnvelope::new("00ff00ff", value, None)).unwrap();
        let err = k.import_signature(&text).unwrap_err();
        assert_eq!(err.decrypt_step(), Some(DecryptStep::Identity));
    }

    #[test]
    fn test_import_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let k = kernel(dir.path());
        assert!(matches!(
            k.import_signature("not base64 at all!"),
            Err(SignError::InvalidFormat(_))
        ));
    }
}
