//! Album configuration store.
//!
//! An album is a directory whose name is its identifier. Its configuration
//! document (`package.json`) is stored in one of three shapes:
//!
//! | Shape | On disk |
//! |-------|---------|
//! | Plain | JSON object |
//! | Legacy hex | `hex(nonce || ciphertext)` of the JSON under the album key |
//! | Stub | [`CoreStub`] JSON, real document in the sibling core file |
//!
//! Writes keep the shape the document was loaded in. Encrypted shapes are
//! bound to the directory name: copying the files into a directory with a
//! different name makes them undecryptable.

use std::path::{Path, PathBuf};

use keytone_sign_core::{KeyRing, SymmetricKey};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::{Result, StoreError};
use crate::fs::atomic_write;
use crate::stub::CoreStub;
use crate::traits::{modify_document, ConfigStore};

/// Default album configuration file name.
pub const ALBUM_CONFIG_FILE: &str = "package.json";

/// Minimum length for a blob to be treated as a legacy hex ciphertext.
const MIN_HEX_CIPHER_LEN: usize = 32;

/// The on-disk shape of an album config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigMode {
    Plain,
    LegacyHex,
    Stub(CoreStub),
}

/// Result of [`AlbumConfig::encrypt_in_place`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptOutcome {
    /// The config was already a stub; nothing changed.
    AlreadyEncrypted,
    /// A plain config was encrypted.
    Encrypted,
    /// A legacy hex config was migrated to a stub.
    MigratedLegacy,
}

/// Whether `text` looks like a whole-file hex ciphertext.
pub fn is_likely_hex_cipher(text: &str) -> bool {
    let t = text.trim();
    !t.starts_with('{')
        && !t.starts_with('[')
        && t.len() >= MIN_HEX_CIPHER_LEN
        && t.len() % 2 == 0
        && t.bytes().all(|b| b.is_ascii_hexdigit())
}

struct AlbumState {
    doc: Map<String, Value>,
    mode: ConfigMode,
}

/// The configuration store of one album directory.
pub struct AlbumConfig {
    album_dir: PathBuf,
    album_id: String,
    file_name: String,
    key: SymmetricKey,
    inner: RwLock<AlbumState>,
}

impl AlbumConfig {
    /// Open the album at `album_dir` using `package.json`.
    pub fn open(album_dir: impl AsRef<Path>, keys: &KeyRing) -> Result<Self> {
        Self::open_with_file(album_dir, ALBUM_CONFIG_FILE, keys)
    }

    /// Open the album at `album_dir` with a custom config file name.
    pub fn open_with_file(
        album_dir: impl AsRef<Path>,
        file_name: &str,
        keys: &KeyRing,
    ) -> Result<Self> {
        let album_dir = album_dir.as_ref().to_path_buf();
        let album_id = dir_name(&album_dir)?;
        let key = keys.album_key(&album_id);
        let (doc, mode) = load(&album_dir.join(file_name), &album_dir, &key)?;
        debug!(album = %album_id, mode = mode_name(&mode), "opened album config");
        Ok(Self {
            album_dir,
            album_id,
            file_name: file_name.to_string(),
            key,
            inner: RwLock::new(AlbumState { doc, mode }),
        })
    }

    /// The album directory.
    pub fn album_dir(&self) -> &Path {
        &self.album_dir
    }

    /// The album identifier (directory name).
    pub fn album_id(&self) -> &str {
        &self.album_id
    }

    /// The current on-disk shape.
    pub fn mode(&self) -> ConfigMode {
        self.inner.read().mode.clone()
    }

    /// Clone the whole document.
    pub fn snapshot(&self) -> Map<String, Value> {
        self.inner.read().doc.clone()
    }

    fn config_path(&self) -> PathBuf {
        self.album_dir.join(&self.file_name)
    }

    fn persist(&self, state: &mut AlbumState) -> Result<()> {
        let json = serde_json::to_vec_pretty(&state.doc)?;
        match &mut state.mode {
            ConfigMode::Plain => atomic_write(&self.config_path(), &json)?,
            ConfigMode::LegacyHex => {
                let blob = self.key.encrypt(&json).map_err(StoreError::Encryption)?;
                atomic_write(&self.config_path(), blob.as_bytes())?;
            }
            ConfigMode::Stub(stub) => {
                let sealed = self.key.encrypt_bytes(&json).map_err(StoreError::Encryption)?;
                atomic_write(&self.album_dir.join(&stub.core_file_name), &sealed)?;
                atomic_write(&self.config_path(), &stub.to_bytes()?)?;
            }
        }
        Ok(())
    }

    /// Convert the config to the stub + core shape.
    ///
    /// Idempotent: an already encrypted album is left untouched.
    pub fn encrypt_in_place(&self) -> Result<EncryptOutcome> {
        let mut state = self.inner.write();
        let outcome = match state.mode {
            ConfigMode::Stub(_) => return Ok(EncryptOutcome::AlreadyEncrypted),
            ConfigMode::Plain => EncryptOutcome::Encrypted,
            ConfigMode::LegacyHex => EncryptOutcome::MigratedLegacy,
        };
        let previous = std::mem::replace(&mut state.mode, ConfigMode::Stub(CoreStub::default()));
        if let Err(e) = self.persist(&mut state) {
            state.mode = previous;
            return Err(e);
        }
        info!(album = %self.album_id, ?outcome, "album config encrypted");
        Ok(outcome)
    }

    /// Move the album to `new_dir` and rewrite its config under the key of
    /// the new directory name, keeping the on-disk shape.
    pub fn relocate(self, new_dir: impl AsRef<Path>, keys: &KeyRing) -> Result<Self> {
        let new_dir = new_dir.as_ref().to_path_buf();
        if new_dir.exists() {
            return Err(StoreError::InvalidData(format!(
                "relocation target {} already exists",
                new_dir.display()
            )));
        }
        let album_id = dir_name(&new_dir)?;
        let key = keys.album_key(&album_id);
        std::fs::rename(&self.album_dir, &new_dir)?;

        let relocated = Self {
            album_dir: new_dir,
            album_id,
            file_name: self.file_name,
            key,
            inner: RwLock::new(self.inner.into_inner()),
        };
        {
            let mut state = relocated.inner.write();
            relocated.persist(&mut state)?;
        }
        info!(from = %self.album_id, to = %relocated.album_id, "album relocated");
        Ok(relocated)
    }

    /// Re-read the document from disk.
    pub fn reload(&self) -> Result<()> {
        let (doc, mode) = load(&self.config_path(), &self.album_dir, &self.key)?;
        *self.inner.write() = AlbumState { doc, mode };
        Ok(())
    }
}

impl ConfigStore for AlbumConfig {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.inner.read().doc.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut state = self.inner.write();
        state.doc.insert(key.to_string(), value);
        self.persist(&mut state)
    }

    fn remove(&self, key: &str) -> Result<Option<Value>> {
        let mut state = self.inner.write();
        let previous = state.doc.remove(key);
        if previous.is_some() {
            self.persist(&mut state)?;
        }
        Ok(previous)
    }

    fn modify(&self, key: &str, f: &mut dyn FnMut(Option<Value>) -> Option<Value>) -> Result<()> {
        let mut state = self.inner.write();
        modify_document(&mut state.doc, key, f);
        self.persist(&mut state)
    }
}

fn dir_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .ok_or_else(|| StoreError::InvalidData("album path has no directory name".into()))
}

fn mode_name(mode: &ConfigMode) -> &'static str {
    match mode {
        ConfigMode::Plain => "plain",
        ConfigMode::LegacyHex => "legacy-hex",
        ConfigMode::Stub(_) => "stub",
    }
}

fn parse_object(bytes: &[u8]) -> Result<Map<String, Value>> {
    match serde_json::from_slice(bytes)? {
        Value::Object(map) => Ok(map),
        _ => Err(StoreError::InvalidData(
            "album config is not a JSON object".into(),
        )),
    }
}

fn load(
    path: &Path,
    album_dir: &Path,
    key: &SymmetricKey,
) -> Result<(Map<String, Value>, ConfigMode)> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok((Map::new(), ConfigMode::Plain))
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(stub) = CoreStub::parse(&bytes)? {
        let sealed = std::fs::read(album_dir.join(&stub.core_file_name))?;
        let plain = key.decrypt_bytes(&sealed).map_err(StoreError::Decryption)?;
        return Ok((parse_object(&plain)?, ConfigMode::Stub(stub)));
    }

    let text = String::from_utf8_lossy(&bytes);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok((Map::new(), ConfigMode::Plain));
    }
    if is_likely_hex_cipher(trimmed) {
        let plain = key.decrypt(trimmed).map_err(StoreError::Decryption)?;
        return Ok((parse_object(&plain)?, ConfigMode::LegacyHex));
    }
    Ok((parse_object(trimmed.as_bytes())?, ConfigMode::Plain))
}
