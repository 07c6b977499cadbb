//! `.ktalbum` export, inspection and import.

use std::fs;
use std::path::{Path, PathBuf};

use keytone_sign_core::generate_protect_code;
use keytone_sign_exchange::{
    decode_container, encode_container, pack_album, read_meta, unpack_album, AlbumMeta,
    DecodedContainer,
};
use keytone_sign_store::{atomic_write, ConfigStore};
use serde_json::Value;
use tracing::info;

use crate::error::{Result, SignError};
use crate::kernel::SignatureKernel;

/// Album config key holding the display name.
pub const ALBUM_NAME_KEY: &str = "package_name";

/// Album config key holding the album's own identifier.
pub const ALBUM_UUID_KEY: &str = "audio_pkg_uuid";

/// Result of [`SignatureKernel::export_album`].
#[derive(Debug, Clone)]
pub struct ExportedAlbum {
    pub meta: AlbumMeta,
    /// Container size in bytes.
    pub size: u64,
}

/// What [`SignatureKernel::album_info`] reports about a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumPackageInfo {
    pub name: String,
    pub album_uuid: String,
    /// `YYYY-MM-DD HH:MM:SS` in the exporter's offset.
    pub export_time: String,
    /// Metadata format version.
    pub format_version: String,
    /// Container header version.
    pub container_version: u8,
    /// Version of the key that decoded the payload.
    pub key_version: u8,
}

/// How [`SignatureKernel::import_album`] treats an existing album.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportMode {
    /// Refuse when an album with the same identifier exists.
    #[default]
    FailIfExists,
    /// Replace the existing album.
    Overwrite,
    /// Import under a fresh identifier.
    AsNew,
}

#[derive(Debug, Clone)]
pub struct ImportedAlbum {
    pub album_dir: PathBuf,
    pub album_id: String,
    pub meta: AlbumMeta,
}

impl<S: ConfigStore> SignatureKernel<S> {
    fn read_package(&self, file: &Path) -> Result<(DecodedContainer, AlbumMeta)> {
        let bytes = fs::read(file)?;
        let decoded = decode_container(&bytes, self.keys())?;
        let meta = read_meta(&decoded.zip)?;
        Ok((decoded, meta))
    }

    /// Pack `album_dir` into a `.ktalbum` container at `dest`.
    pub fn export_album(
        &self,
        album_dir: impl AsRef<Path>,
        dest: impl AsRef<Path>,
    ) -> Result<ExportedAlbum> {
        let album = self.open_album(album_dir)?;
        let name = match album.get(ALBUM_NAME_KEY)? {
            Some(Value::String(name)) if !name.trim().is_empty() => name,
            _ => return Err(SignError::InvalidInput("album has no name".into())),
        };
        let meta = AlbumMeta::new(album.album_id(), name);
        let zip = pack_album(album.album_dir(), &meta)?;
        let bytes = encode_container(&zip, self.config().container_version, self.keys());
        atomic_write(dest.as_ref(), &bytes)?;
        info!(
            album = album.album_id(),
            size = bytes.len(),
            version = self.config().container_version,
            "album exported"
        );
        Ok(ExportedAlbum {
            meta,
            size: bytes.len() as u64,
        })
    }

    /// Verify a container and read its metadata.
    pub fn album_info(&self, file: impl AsRef<Path>) -> Result<AlbumPackageInfo> {
        let (decoded, meta) = self.read_package(file.as_ref())?;
        Ok(AlbumPackageInfo {
            export_time: meta.export_time_display(),
            name: meta.album_name,
            album_uuid: meta.album_uuid,
            format_version: meta.version,
            container_version: decoded.header.version,
            key_version: decoded.key_version,
        })
    }

    /// The verified zip payload of a container.
    pub fn extract_album_zip(&self, file: impl AsRef<Path>) -> Result<Vec<u8>> {
        let (decoded, _) = self.read_package(file.as_ref())?;
        Ok(decoded.zip)
    }

    /// Import a container into `albums_root`.
    ///
    /// The payload is unpacked into a staging directory under
    /// `albums_root` and moved into place only once it validates.
    pub fn import_album(
        &self,
        file: impl AsRef<Path>,
        albums_root: impl AsRef<Path>,
        mode: ImportMode,
    ) -> Result<ImportedAlbum> {
        let albums_root = albums_root.as_ref();
        let (decoded, meta) = self.read_package(file.as_ref())?;

        fs::create_dir_all(albums_root)?;
        let staging = tempfile::Builder::new()
            .prefix(".ktalbum-import-")
            .tempdir_in(albums_root)?;
        let extracted = unpack_album(&decoded.zip, staging.path())?;
        let original_id = extracted
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| SignError::InvalidFormat("album directory has no name".into()))?;

        let (album_dir, album_id) = match mode {
            ImportMode::FailIfExists | ImportMode::Overwrite => {
                let target = albums_root.join(&original_id);
                if target.exists() {
                    if mode == ImportMode::FailIfExists {
                        return Err(SignError::Conflict(format!(
                            "album {original_id} already exists"
                        )));
                    }
                    fs::remove_dir_all(&target)?;
                }
                fs::rename(&extracted, &target)?;
                (target, original_id)
            }
            ImportMode::AsNew => {
                let new_id = generate_protect_code();
                let target = albums_root.join(&new_id);
                let album = self.open_album(&extracted)?.relocate(&target, self.keys())?;
                album.set(ALBUM_UUID_KEY, Value::String(new_id.clone()))?;
                (target, new_id)
            }
        };

        info!(album = %album_id, ?mode, "album imported");
        Ok(ImportedAlbum {
            album_dir,
            album_id,
            meta,
        })
    }
}
