//! Local signature identity store.
//!
//! Every local signature lives under one key of the installation store:
//!
//! ```json
//! { "signature": { "<encryptedId>": { "value": "<hex>", "sort": { "time": 1700000000 } } } }
//! ```
//!
//! `encryptedId` is the KeyA-encrypted plain identifier. `value` is the
//! profile JSON encrypted with the entry's dynamic key. Older installations
//! stored `value` as a bare string. Those entries read with sort time 0 and
//! are rewritten in the current shape on the next write.

use std::collections::{BTreeMap, HashSet};
use std::fs;

use keytone_sign_core::{qualification_code, QualificationCode};
use keytone_sign_store::ConfigStore;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::error::{DecryptStep, Result, SignError};
use crate::images;
use crate::kernel::{now_secs, SignatureKernel};

/// Installation store key holding the identity map.
pub const IDENTITY_STORE_KEY: &str = "signature";

/// The dynamic key salts with the last 7 characters of the identifier.
const MIN_PLAIN_ID_LEN: usize = 7;

/// Decrypted profile of a local signature.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureProfile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub intro: String,
    /// Absolute path of the local card image, or empty.
    #[serde(default)]
    pub card_image: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    #[serde(default)]
    pub time: i64,
}

/// One stored entry, in either shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignatureStorageEntry {
    Current {
        value: String,
        #[serde(default)]
        sort: SortKey,
    },
    Legacy(String),
}

impl SignatureStorageEntry {
    /// The encrypted profile.
    pub fn value(&self) -> &str {
        match self {
            Self::Current { value, .. } | Self::Legacy(value) => value,
        }
    }

    pub fn sort_time(&self) -> i64 {
        match self {
            Self::Current { sort, .. } => sort.time,
            Self::Legacy(_) => 0,
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, Self::Legacy(_))
    }

    /// Upgrade a legacy entry, stamping `now` as its sort time.
    pub fn normalized(self, now: i64) -> Self {
        match self {
            Self::Legacy(value) => Self::Current {
                value,
                sort: SortKey { time: now },
            },
            current => current,
        }
    }

    fn to_json(&self) -> Value {
        json!({ "value": self.value(), "sort": { "time": self.sort_time() } })
    }
}

/// A new card image supplied by the caller.
#[derive(Debug, Clone, Copy)]
pub struct CardImage<'a> {
    pub bytes: &'a [u8],
    /// Original file name; supplies the extension and seeds the stored name.
    pub file_name: &'a str,
}

/// What to do with the card image on update.
#[derive(Debug, Clone, Copy)]
pub enum ImageUpdate<'a> {
    Keep,
    Remove,
    Replace(CardImage<'a>),
}

impl<'a> ImageUpdate<'a> {
    /// Interpret the editor's flags.
    ///
    /// `changed == false` keeps the image whatever else is set. Otherwise
    /// `remove` clears it, a non-empty `image` replaces it, and anything
    /// else keeps it.
    pub fn from_flags(image: Option<CardImage<'a>>, remove: bool, changed: bool) -> Self {
        if !changed {
            return Self::Keep;
        }
        if remove {
            return Self::Remove;
        }
        match image {
            Some(img) if !img.bytes.is_empty() => Self::Replace(img),
            _ => Self::Keep,
        }
    }
}

/// A row of [`SignatureKernel::list_signatures`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureListing {
    pub encrypted_id: String,
    pub sort_time: i64,
    /// The profile, or the step that could not be decrypted.
    pub profile: std::result::Result<SignatureProfile, DecryptStep>,
}

/// A fully decrypted local signature.
#[derive(Debug, Clone)]
pub(crate) struct UnlockedSignature {
    pub encrypted_id: String,
    pub plain_id: String,
    pub code: QualificationCode,
    pub profile: SignatureProfile,
    pub sort_time: i64,
}

pub(crate) type EntryMap = BTreeMap<String, SignatureStorageEntry>;

fn parse_entries(doc: &Map<String, Value>) -> EntryMap {
    let mut out = EntryMap::new();
    for (id, raw) in doc {
        match serde_json::from_value::<SignatureStorageEntry>(raw.clone()) {
            Ok(entry) => {
                out.insert(id.clone(), entry);
            }
            Err(_) => warn!("skipping identity entry of unknown shape"),
        }
    }
    out
}

impl<S: ConfigStore> SignatureKernel<S> {
    // ─────────────────────────────────────────────────────────────────────────
    // Storage helpers
    // ─────────────────────────────────────────────────────────────────────────

    pub(crate) fn load_entries(&self) -> Result<EntryMap> {
        match self.store().get(IDENTITY_STORE_KEY)? {
            Some(Value::Object(doc)) => Ok(parse_entries(&doc)),
            None | Some(Value::Null) => Ok(EntryMap::new()),
            Some(_) => Err(SignError::InvalidInput(
                "identity store entry is not an object".into(),
            )),
        }
    }

    /// Read-modify-write the identity map under the store's write lock.
    ///
    /// Members `f` does not touch are written back unchanged; legacy entries
    /// are upgraded. Nothing is written when `f` fails.
    pub(crate) fn update_entries<T>(
        &self,
        mut f: impl FnMut(&mut EntryMap) -> Result<T>,
    ) -> Result<T> {
        let now = now_secs();
        let mut outcome: Option<Result<T>> = None;
        self.store().modify(IDENTITY_STORE_KEY, &mut |current| {
            let mut doc = match &current {
                Some(Value::Object(doc)) => doc.clone(),
                _ => Map::new(),
            };
            let mut entries: EntryMap = parse_entries(&doc)
                .into_iter()
                .map(|(id, e)| (id, e.normalized(now)))
                .collect();
            let before: Vec<String> = entries.keys().cloned().collect();
            match f(&mut entries) {
                Ok(value) => {
                    for id in before.iter().filter(|id| !entries.contains_key(*id)) {
                        doc.remove(id);
                    }
                    for (id, entry) in &entries {
                        doc.insert(id.clone(), entry.to_json());
                    }
                    outcome = Some(Ok(value));
                    Some(Value::Object(doc))
                }
                Err(e) => {
                    outcome = Some(Err(e));
                    current
                }
            }
        })?;
        outcome.unwrap_or_else(|| Err(SignError::InvalidInput("identity update did not run".into())))
    }

    /// Decrypt the identifier of `encrypted_id`.
    pub(crate) fn plain_id(&self, encrypted_id: &str) -> Result<String> {
        self.keys()
            .decrypt_identifier(encrypted_id)
            .map_err(|e| SignError::decryption(DecryptStep::Identity, e))
    }

    pub(crate) fn unlock(
        &self,
        encrypted_id: &str,
        entry: &SignatureStorageEntry,
    ) -> Result<UnlockedSignature> {
        let plain_id = self.plain_id(encrypted_id)?;
        let key = self
            .keys()
            .dynamic_key(encrypted_id)
            .map_err(|e| SignError::decryption(DecryptStep::Identity, e))?;
        let json = key
            .decrypt(entry.value())
            .map_err(|e| SignError::decryption(DecryptStep::Profile, e))?;
        let profile: SignatureProfile = serde_json::from_slice(&json)
            .map_err(|e| SignError::decryption(DecryptStep::Profile, e))?;
        Ok(UnlockedSignature {
            encrypted_id: encrypted_id.to_string(),
            code: qualification_code(&plain_id),
            plain_id,
            profile,
            sort_time: entry.sort_time(),
        })
    }

    pub(crate) fn unlock_id(&self, encrypted_id: &str) -> Result<UnlockedSignature> {
        let entries = self.load_entries()?;
        let entry = entries
            .get(encrypted_id)
            .ok_or_else(|| SignError::NotFound("signature".into()))?;
        self.unlock(encrypted_id, entry)
    }

    /// Every local signature that decrypts; unreadable ones are logged and skipped.
    pub(crate) fn readable_identities(&self) -> Result<Vec<UnlockedSignature>> {
        let mut out = Vec::new();
        for (id, entry) in self.load_entries()? {
            match self.unlock(&id, &entry) {
                Ok(unlocked) => out.push(unlocked),
                Err(e) => warn!(error = %e, "skipping unreadable local signature"),
            }
        }
        Ok(out)
    }

    /// `(encryptedId, plainId)` of every local identifier that decrypts.
    pub(crate) fn local_identifiers(&self) -> Result<Vec<(String, String)>> {
        let mut out = Vec::new();
        for id in self.load_entries()?.into_keys() {
            match self.plain_id(&id) {
                Ok(plain) => out.push((id, plain)),
                Err(e) => warn!(error = %e, "skipping unreadable local identifier"),
            }
        }
        Ok(out)
    }

    fn seal_profile(&self, encrypted_id: &str, profile: &SignatureProfile) -> Result<String> {
        let key = self
            .keys()
            .dynamic_key(encrypted_id)
            .map_err(|e| SignError::decryption(DecryptStep::Identity, e))?;
        Ok(key.encrypt(&serde_json::to_vec(profile)?)?)
    }

    /// Store a card image under `<config_dir>/signature/` and return its path.
    pub(crate) fn save_local_image(
        &self,
        plain_id: &str,
        name: &str,
        image: CardImage<'_>,
    ) -> Result<String> {
        let seed = format!("{plain_id}|{name}|{}|{}", image.file_name, now_secs());
        let file_name = images::hashed_file_name(&seed, image.file_name);
        let path = images::write_into(
            &self.config().signature_image_dir(),
            &file_name,
            image.bytes,
        )?;
        debug!(file = %file_name, "stored card image");
        Ok(path.to_string_lossy().into_owned())
    }

    /// Encrypt `profile` and store it under `encrypted_id` with `sort_time`.
    pub(crate) fn write_profile(
        &self,
        encrypted_id: &str,
        profile: &SignatureProfile,
        sort_time: i64,
    ) -> Result<()> {
        let value = self.seal_profile(encrypted_id, profile)?;
        self.update_entries(|entries| {
            entries.insert(
                encrypted_id.to_string(),
                SignatureStorageEntry::Current {
                    value: value.clone(),
                    sort: SortKey { time: sort_time },
                },
            );
            Ok(())
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a signature for `plain_id`. Returns the encrypted identifier.
    pub fn create_signature(
        &self,
        plain_id: &str,
        name: &str,
        intro: &str,
        image: Option<CardImage<'_>>,
    ) -> Result<String> {
        if plain_id.chars().count() < MIN_PLAIN_ID_LEN {
            return Err(SignError::InvalidInput(format!(
                "signature identifier must be at least {MIN_PLAIN_ID_LEN} characters"
            )));
        }
        if name.trim().is_empty() {
            return Err(SignError::InvalidInput("signature name is empty".into()));
        }

        let encrypted_id = self.keys().encrypt_identifier(plain_id)?;
        let card_image = match image {
            Some(img) if !img.bytes.is_empty() => self.save_local_image(plain_id, name, img)?,
            _ => String::new(),
        };
        let profile = SignatureProfile {
            name: name.to_string(),
            intro: intro.to_string(),
            card_image,
        };
        self.write_profile(&encrypted_id, &profile, now_secs())?;
        info!(code = qualification_code(plain_id).short(), "signature created");
        Ok(encrypted_id)
    }

    /// Re-encrypt a signature's profile, keeping its sort time.
    pub fn update_signature(
        &self,
        encrypted_id: &str,
        name: &str,
        intro: &str,
        image: ImageUpdate<'_>,
    ) -> Result<()> {
        if name.trim().is_empty() {
            return Err(SignError::InvalidInput("signature name is empty".into()));
        }
        let current = self.unlock_id(encrypted_id)?;
        let card_image = match image {
            ImageUpdate::Keep => current.profile.card_image.clone(),
            ImageUpdate::Remove => String::new(),
            ImageUpdate::Replace(img) => self.save_local_image(&current.plain_id, name, img)?,
        };
        let profile = SignatureProfile {
            name: name.to_string(),
            intro: intro.to_string(),
            card_image,
        };
        let sort_time = match current.sort_time {
            0 => now_secs(),
            t => t,
        };
        let value = self.seal_profile(encrypted_id, &profile)?;
        self.update_entries(|entries| {
            let slot = entries
                .get_mut(encrypted_id)
                .ok_or_else(|| SignError::NotFound("signature".into()))?;
            *slot = SignatureStorageEntry::Current {
                value: value.clone(),
                sort: SortKey { time: sort_time },
            };
            Ok(())
        })?;
        info!(code = current.code.short(), "signature updated");
        Ok(())
    }

    /// Remove a signature. Its card image is left for
    /// [`cleanup_orphan_card_images`](Self::cleanup_orphan_card_images).
    pub fn delete_signature(&self, encrypted_id: &str) -> Result<()> {
        self.update_entries(|entries| {
            entries
                .remove(encrypted_id)
                .map(|_| ())
                .ok_or_else(|| SignError::NotFound("signature".into()))
        })?;
        info!("signature deleted");
        Ok(())
    }

    /// All local signatures ordered by sort time.
    ///
    /// Entries that fail to decrypt are listed with the failing step.
    pub fn list_signatures(&self) -> Result<Vec<SignatureListing>> {
        let mut out: Vec<SignatureListing> = self
            .load_entries()?
            .into_iter()
            .map(|(id, entry)| {
                let profile = match self.unlock(&id, &entry) {
                    Ok(unlocked) => Ok(unlocked.profile),
                    Err(e) => {
                        warn!(error = %e, "local signature is unreadable");
                        Err(e.decrypt_step().unwrap_or(DecryptStep::Profile))
                    }
                };
                SignatureListing {
                    sort_time: entry.sort_time(),
                    encrypted_id: id,
                    profile,
                }
            })
            .collect();
        out.sort_by(|a, b| {
            a.sort_time
                .cmp(&b.sort_time)
                .then_with(|| a.encrypted_id.cmp(&b.encrypted_id))
        });
        Ok(out)
    }

    /// Decrypt one signature's profile.
    pub fn decrypt_signature(&self, encrypted_id: &str) -> Result<SignatureProfile> {
        Ok(self.unlock_id(encrypted_id)?.profile)
    }

    /// Qualification code of a local signature.
    pub fn qualification_code_of(&self, encrypted_id: &str) -> Result<QualificationCode> {
        Ok(qualification_code(&self.plain_id(encrypted_id)?))
    }

    /// Change a signature's position in the list.
    pub fn set_sort_time(&self, encrypted_id: &str, time: i64) -> Result<()> {
        self.update_entries(|entries| {
            let slot = entries
                .get_mut(encrypted_id)
                .ok_or_else(|| SignError::NotFound("signature".into()))?;
            *slot = SignatureStorageEntry::Current {
                value: slot.value().to_string(),
                sort: SortKey { time },
            };
            Ok(())
        })
    }

    /// Delete card images no local signature references. Returns the count.
    ///
    /// Does nothing if any entry is unreadable, since its image cannot be
    /// told apart from an orphan.
    pub fn cleanup_orphan_card_images(&self) -> Result<usize> {
        let dir = self.config().signature_image_dir();
        if !dir.is_dir() {
            return Ok(0);
        }

        let entries = self.load_entries()?;
        let mut referenced = HashSet::new();
        for (id, entry) in &entries {
            match self.unlock(id, entry) {
                Ok(u) if !u.profile.card_image.is_empty() => {
                    referenced.insert(images::base_name(&u.profile.card_image).to_string());
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "unreadable signature; skipping card image cleanup");
                    return Ok(0);
                }
            }
        }

        let mut deleted = 0;
        for item in fs::read_dir(&dir)? {
            let item = item?;
            if !item.file_type()?.is_file() {
                continue;
            }
            let name = item.file_name().to_string_lossy().into_owned();
            if referenced.contains(&name) {
                continue;
            }
            match fs::remove_file(item.path()) {
                Ok(()) => deleted += 1,
                Err(e) => warn!(file = %name, error = %e, "failed to delete orphan card image"),
            }
        }
        info!(deleted, kept = referenced.len(), "card image cleanup finished");
        Ok(deleted)
    }
}
