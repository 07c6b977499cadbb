//! The kernel: one handle over the identity store, album binding,
//! authorization handshake and exchange files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use keytone_sign_core::{KeyRing, CURRENT_CONTAINER_VERSION};
use keytone_sign_store::{AlbumConfig, ConfigStore, ALBUM_CONFIG_FILE};

use crate::error::Result;

/// Directory under `config_dir` holding local card images.
pub const SIGNATURE_IMAGE_DIR: &str = "signature";

/// Default directory inside an album for copied assets.
pub const DEFAULT_ALBUM_ASSETS_DIR: &str = "audioFiles";

/// Configuration for the kernel.
#[derive(Debug, Clone)]
pub struct KernelConfig {
    /// Installation root. Card images live in `<config_dir>/signature/`.
    pub config_dir: PathBuf,
    /// Album subdirectory receiving copied card images.
    pub album_assets_dir: String,
    /// Key version written into exported containers.
    pub container_version: u8,
    /// Album configuration file name.
    pub album_config_file: String,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from("."),
            album_assets_dir: DEFAULT_ALBUM_ASSETS_DIR.to_string(),
            container_version: CURRENT_CONTAINER_VERSION,
            album_config_file: ALBUM_CONFIG_FILE.to_string(),
        }
    }
}

impl KernelConfig {
    /// Defaults rooted at `config_dir`.
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = dir.into();
        self
    }

    pub fn with_album_assets_dir(mut self, dir: impl Into<String>) -> Self {
        self.album_assets_dir = dir.into();
        self
    }

    pub fn with_container_version(mut self, version: u8) -> Self {
        self.container_version = version;
        self
    }

    pub fn with_album_config_file(mut self, name: impl Into<String>) -> Self {
        self.album_config_file = name.into();
        self
    }

    /// Where local card images are stored.
    pub fn signature_image_dir(&self) -> PathBuf {
        self.config_dir.join(SIGNATURE_IMAGE_DIR)
    }
}

/// The signature kernel.
///
/// Generic over the installation store. Albums are opened per call from
/// their directory; nothing album-specific is cached.
pub struct SignatureKernel<S: ConfigStore> {
    /// Installation store holding the local identity map.
    store: Arc<S>,
    /// Resolved key hierarchy.
    keys: KeyRing,
    /// Configuration.
    config: KernelConfig,
}

impl<S: ConfigStore> SignatureKernel<S> {
    /// Create a kernel over `store`.
    pub fn new(store: S, keys: KeyRing, config: KernelConfig) -> Self {
        Self::with_shared_store(Arc::new(store), keys, config)
    }

    /// Create a kernel over a store shared with other components.
    pub fn with_shared_store(store: Arc<S>, keys: KeyRing, config: KernelConfig) -> Self {
        Self {
            store,
            keys,
            config,
        }
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn keys(&self) -> &KeyRing {
        &self.keys
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Open an album's configuration store.
    pub fn open_album(&self, album_dir: impl AsRef<Path>) -> Result<AlbumConfig> {
        Ok(AlbumConfig::open_with_file(
            album_dir,
            &self.config.album_config_file,
            &self.keys,
        )?)
    }
}

/// Current Unix time in seconds.
pub(crate) fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}
