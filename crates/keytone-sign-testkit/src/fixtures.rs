//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::fs;
use std::path::{Path, PathBuf};

use keytone_sign::{KernelConfig, SignatureKernel};
use keytone_sign_core::{generate_protect_code, KeyRing};
use keytone_sign_store::{ConfigStore, JsonFileStore, MemoryStore};
use serde_json::json;
use tempfile::TempDir;

/// A temporary installation: a kernel rooted in its own directory.
pub struct InstallationFixture<S: ConfigStore = MemoryStore> {
    pub dir: TempDir,
    pub kernel: SignatureKernel<S>,
}

impl InstallationFixture<MemoryStore> {
    /// An in-memory installation with the public default keys.
    pub fn new() -> Self {
        Self::with_keys(KeyRing::public_defaults())
    }

    /// An in-memory installation with a custom key ring.
    pub fn with_keys(keys: KeyRing) -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let config = KernelConfig::new(dir.path().join("config"));
        Self {
            kernel: SignatureKernel::new(MemoryStore::new(), keys, config),
            dir,
        }
    }
}

impl InstallationFixture<JsonFileStore> {
    /// An installation backed by `config/setting.json`.
    pub fn persistent() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let config_dir = dir.path().join("config");
        let store = JsonFileStore::open(config_dir.join("setting.json")).expect("open store");
        Self {
            kernel: SignatureKernel::new(store, KeyRing::public_defaults(), KernelConfig::new(config_dir)),
            dir,
        }
    }

    /// A second kernel over the same files, as after a restart.
    pub fn reopen(&self) -> SignatureKernel<JsonFileStore> {
        let config_dir = self.config_dir();
        let store = JsonFileStore::open(config_dir.join("setting.json")).expect("reopen store");
        SignatureKernel::new(store, KeyRing::public_defaults(), KernelConfig::new(config_dir))
    }
}

impl<S: ConfigStore> InstallationFixture<S> {
    pub fn config_dir(&self) -> PathBuf {
        self.kernel.config().config_dir.clone()
    }

    /// Where this installation keeps its albums.
    pub fn albums_root(&self) -> PathBuf {
        self.dir.path().join("albums")
    }

    /// A scratch path inside the fixture directory.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Create an album named `name` under a fresh identifier, with one
    /// audio file.
    pub fn create_album(&self, name: &str) -> PathBuf {
        create_album_in(&self.albums_root(), name)
    }

    /// Create a signature under a fresh protect code.
    pub fn create_signature(&self, name: &str) -> String {
        self.create_signature_with_id(&generate_protect_code(), name)
    }

    pub fn create_signature_with_id(&self, plain_id: &str, name: &str) -> String {
        self.kernel
            .create_signature(plain_id, name, "", None)
            .expect("create signature")
    }
}

impl Default for InstallationFixture<MemoryStore> {
    fn default() -> Self {
        Self::new()
    }
}

/// Create an album directory under `root`.
pub fn create_album_in(root: &Path, name: &str) -> PathBuf {
    let id = generate_protect_code();
    let album = root.join(&id);
    fs::create_dir_all(album.join("audioFiles")).expect("create album dir");
    let config = json!({ "package_name": name, "audio_pkg_uuid": id });
    fs::write(
        album.join("package.json"),
        serde_json::to_vec_pretty(&config).expect("serialize config"),
    )
    .expect("write package.json");
    fs::write(album.join("audioFiles").join("click.wav"), b"RIFF....WAVE").expect("write audio");
    album
}

/// Independent installations for multi-party tests.
pub fn multi_party_fixtures(count: usize) -> Vec<InstallationFixture> {
    (0..count).map(|_| InstallationFixture::new()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use keytone_sign_core::is_protect_code;

    #[test]
    fn test_album_fixture_layout() {
        let fixture = InstallationFixture::new();
        let album = fixture.create_album("Piano");
        let id = album.file_name().unwrap().to_str().unwrap();
        assert!(is_protect_code(id));
        assert!(album.join("package.json").is_file());
        assert!(album.join("audioFiles").join("click.wav").is_file());
    }

    #[test]
    fn test_persistent_fixture_survives_reopen() {
        let fixture = InstallationFixture::persistent();
        let id = fixture.create_signature("Alice");
        let reopened = fixture.reopen();
        assert_eq!(reopened.decrypt_signature(&id).unwrap().name, "Alice");
    }

    #[test]
    fn test_multi_party() {
        let parties = multi_party_fixtures(3);
        assert_ne!(parties[0].config_dir(), parties[1].config_dir());
        assert_ne!(parties[1].config_dir(), parties[2].config_dir());
    }
}
