//! Album zip layout and `.keytone-album` metadata.
//!
//! ```text
//! .keytone-album            metadata JSON
//! <albumId>/                album directory, named after its identifier
//! <albumId>/package.json
//! <albumId>/audioFiles/...
//! ```
//!
//! Entries use forward slashes, directories end in `/`, files are deflated.

use std::fs::{self, File};
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use keytone_sign_core::is_protect_code;

use crate::error::{ExchangeError, Result};

/// Name of the metadata entry at the archive root.
pub const META_ENTRY: &str = ".keytone-album";

/// Expected `magicNumber`.
pub const META_MAGIC_NUMBER: &str = "KTAF";

/// Metadata format version written on export.
pub const META_VERSION: &str = "1.0.0";

/// Config files that mark a directory as an album.
const ALBUM_CONFIG_FILES: [&str; 2] = ["package.json", "config.json"];

/// Contents of the `.keytone-album` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumMeta {
    pub magic_number: String,
    #[serde(alias = "formatVersion")]
    pub version: String,
    pub export_time: DateTime<FixedOffset>,
    #[serde(rename = "albumUUID")]
    pub album_uuid: String,
    pub album_name: String,
}

impl AlbumMeta {
    /// Metadata for an export happening now.
    pub fn new(album_uuid: impl Into<String>, album_name: impl Into<String>) -> Self {
        Self {
            magic_number: META_MAGIC_NUMBER.to_string(),
            version: META_VERSION.to_string(),
            export_time: Utc::now().into(),
            album_uuid: album_uuid.into(),
            album_name: album_name.into(),
        }
    }

    /// Check the magic number and album name.
    pub fn validate(&self) -> Result<()> {
        if self.magic_number != META_MAGIC_NUMBER {
            return Err(ExchangeError::InvalidFormat(
                "not a KeyTone album: bad magic number".into(),
            ));
        }
        if self.album_name.is_empty() {
            return Err(ExchangeError::InvalidFormat("album name is empty".into()));
        }
        Ok(())
    }

    /// Export time as `YYYY-MM-DD HH:MM:SS` in the exporter's offset.
    pub fn export_time_display(&self) -> String {
        self.export_time.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Packing
// ─────────────────────────────────────────────────────────────────────────────

/// Zip `album_dir` with `meta` as the first entry.
pub fn pack_album(album_dir: &Path, meta: &AlbumMeta) -> Result<Vec<u8>> {
    if !album_dir.is_dir() {
        return Err(ExchangeError::InvalidAlbum(format!(
            "{} is not a directory",
            album_dir.display()
        )));
    }
    let base = album_dir.parent().unwrap_or_else(|| Path::new(""));
    let deflated = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer.start_file(META_ENTRY, deflated)?;
    writer.write_all(&serde_json::to_vec(meta)?)?;

    let mut files = 0usize;
    for entry in WalkDir::new(album_dir).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        let rel = entry
            .path()
            .strip_prefix(base)
            .map_err(|_| ExchangeError::InvalidAlbum("entry outside album".into()))?;
        let name = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type().is_dir() {
            writer.add_directory(format!("{name}/"), FileOptions::default())?;
        } else if entry.file_type().is_file() {
            writer.start_file(name, deflated)?;
            io::copy(&mut File::open(entry.path())?, &mut writer)?;
            files += 1;
        } else {
            warn!(path = %entry.path().display(), "skipping non-regular file");
        }
    }

    let zip = writer.finish()?.into_inner();
    debug!(files, bytes = zip.len(), "album packed");
    Ok(zip)
}

// ─────────────────────────────────────────────────────────────────────────────
// Reading
// ─────────────────────────────────────────────────────────────────────────────

/// Read and validate the metadata entry of an album zip.
pub fn read_meta(zip: &[u8]) -> Result<AlbumMeta> {
    let mut archive = ZipArchive::new(Cursor::new(zip))?;
    let mut entry = match archive.by_name(META_ENTRY) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Err(ExchangeError::MissingMetadata),
        Err(e) => return Err(e.into()),
    };
    let mut json = Vec::new();
    entry.read_to_end(&mut json)?;
    let meta: AlbumMeta = serde_json::from_slice(&json)
        .map_err(|e| ExchangeError::InvalidFormat(format!("album metadata: {e}")))?;
    meta.validate()?;
    Ok(meta)
}

/// Extract an album zip into `dest` and return the album directory.
///
/// Entries that would land outside `dest` are rejected. After extraction
/// `dest` must hold exactly one directory, which must pass
/// [`validate_album_dir`]. `dest` should be an empty staging directory.
pub fn unpack_album(zip: &[u8], dest: &Path) -> Result<PathBuf> {
    let mut archive = ZipArchive::new(Cursor::new(zip))?;
    fs::create_dir_all(dest)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let rel = match entry.enclosed_name() {
            Some(path) => path.to_path_buf(),
            None => {
                return Err(ExchangeError::InvalidAlbum(format!(
                    "unsafe entry path: {}",
                    entry.name()
                )))
            }
        };
        if rel == Path::new(META_ENTRY) {
            continue;
        }
        let target = dest.join(&rel);
        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        io::copy(&mut entry, &mut out)?;
    }

    let mut dirs = Vec::new();
    for item in fs::read_dir(dest)? {
        let item = item?;
        if item.file_type()?.is_dir() {
            dirs.push(item.path());
        }
    }
    let album = match dirs.len() {
        0 => return Err(ExchangeError::InvalidAlbum("no album directory".into())),
        1 => dirs.remove(0),
        n => {
            return Err(ExchangeError::InvalidAlbum(format!(
                "{n} top-level directories"
            )))
        }
    };
    validate_album_dir(&album)?;
    Ok(album)
}

/// An album directory is named by a protect code and holds a config file.
pub fn validate_album_dir(path: &Path) -> Result<()> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    if !is_protect_code(name) {
        return Err(ExchangeError::InvalidAlbum(
            "album directory name is not a valid identifier".into(),
        ));
    }
    if !ALBUM_CONFIG_FILES.iter().any(|f| path.join(f).is_file()) {
        return Err(ExchangeError::InvalidAlbum(
            "missing package.json or config.json".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use keytone_sign_core::generate_protect_code;
    use tempfile::TempDir;

    fn make_album(root: &Path) -> PathBuf {
        let album = root.join(generate_protect_code());
        fs::create_dir_all(album.join("audioFiles")).unwrap();
        fs::write(album.join("package.json"), br#"{"package_name":"Demo"}"#).unwrap();
        fs::write(album.join("audioFiles").join("a.wav"), vec![7u8; 4096]).unwrap();
        album
    }

    fn zip_with(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in entries {
            if name.ends_with('/') {
                writer.add_directory(*name, FileOptions::default()).unwrap();
            } else {
                writer.start_file(*name, FileOptions::default()).unwrap();
                writer.write_all(body).unwrap();
            }
        }
        writer.finish().unwrap().into_inner()
    }

    fn meta_json(name: &str) -> Vec<u8> {
        serde_json::to_vec(&AlbumMeta::new("x", name)).unwrap()
    }

    #[test]
    fn test_pack_unpack_roundtrip() {
        let src = TempDir::new().unwrap();
        let album = make_album(src.path());
        let album_id = album.file_name().unwrap().to_str().unwrap().to_string();

        let zip = pack_album(&album, &AlbumMeta::new(&album_id, "Demo")).unwrap();

        let mut archive = ZipArchive::new(Cursor::new(zip.as_slice())).unwrap();
        assert_eq!(archive.by_index(0).unwrap().name(), META_ENTRY);
        assert!(archive.by_name(&format!("{album_id}/")).is_ok());
        assert!(archive.by_name(&format!("{album_id}/audioFiles/a.wav")).is_ok());

        let meta = read_meta(&zip).unwrap();
        assert_eq!(meta.album_uuid, album_id);
        assert_eq!(meta.album_name, "Demo");

        let dest = TempDir::new().unwrap();
        let out = unpack_album(&zip, dest.path()).unwrap();
        assert_eq!(out.file_name().unwrap().to_str().unwrap(), album_id);
        assert_eq!(
            fs::read(out.join("audioFiles").join("a.wav")).unwrap(),
            vec![7u8; 4096]
        );
        assert!(!dest.path().join(META_ENTRY).exists());
    }

    #[test]
    fn test_meta_json_shape() {
        let meta = AlbumMeta::new("abc", "Demo");
        let v: serde_json::Value = serde_json::to_value(&meta).unwrap();
        assert_eq!(v["magicNumber"], "KTAF");
        assert_eq!(v["version"], "1.0.0");
        assert_eq!(v["albumUUID"], "abc");
        assert_eq!(v["albumName"], "Demo");
        assert!(v["exportTime"].is_string());
    }

    #[test]
    fn test_meta_accepts_offset_time() {
        let json = br#"{"magicNumber":"KTAF","version":"1.0.0",
            "exportTime":"2025-03-01T08:30:05.123456789+08:00",
            "albumUUID":"id","albumName":"Demo"}"#;
        let zip = zip_with(&[(META_ENTRY, json)]);
        let meta = read_meta(&zip).unwrap();
        assert_eq!(meta.export_time_display(), "2025-03-01 08:30:05");
    }

    #[test]
    fn test_missing_meta() {
        let zip = zip_with(&[("a/", b"")]);
        assert!(matches!(read_meta(&zip), Err(ExchangeError::MissingMetadata)));
    }

    #[test]
    fn test_bad_magic_and_empty_name() {
        let mut meta = AlbumMeta::new("x", "Demo");
        meta.magic_number = "NOPE".into();
        let zip = zip_with(&[(META_ENTRY, &serde_json::to_vec(&meta).unwrap())]);
        assert!(matches!(read_meta(&zip), Err(ExchangeError::InvalidFormat(_))));

        let zip = zip_with(&[(META_ENTRY, &meta_json(""))]);
        assert!(matches!(read_meta(&zip), Err(ExchangeError::InvalidFormat(_))));
    }

    #[test]
    fn test_zip_slip_rejected() {
        let zip = zip_with(&[(META_ENTRY, &meta_json("Demo")), ("../evil.txt", b"x")]);
        let dest = TempDir::new().unwrap();
        let staging = dest.path().join("staging");
        assert!(matches!(
            unpack_album(&zip, &staging),
            Err(ExchangeError::InvalidAlbum(_))
        ));
        assert!(!dest.path().join("evil.txt").exists());
    }

    #[test]
    fn test_multiple_dirs_rejected() {
        let a = format!("{}/package.json", generate_protect_code());
        let b = format!("{}/package.json", generate_protect_code());
        let zip = zip_with(&[(a.as_str(), b"{}"), (b.as_str(), b"{}")]);
        let dest = TempDir::new().unwrap();
        assert!(matches!(
            unpack_album(&zip, dest.path()),
            Err(ExchangeError::InvalidAlbum(_))
        ));
    }

    #[test]
    fn test_album_dir_validation() {
        let root = TempDir::new().unwrap();
        let bad_name = root.path().join("not-an-id");
        fs::create_dir_all(&bad_name).unwrap();
        fs::write(bad_name.join("package.json"), b"{}").unwrap();
        assert!(validate_album_dir(&bad_name).is_err());

        let no_config = root.path().join(generate_protect_code());
        fs::create_dir_all(&no_config).unwrap();
        assert!(validate_album_dir(&no_config).is_err());

        fs::write(no_config.join("config.json"), b"{}").unwrap();
        assert!(validate_album_dir(&no_config).is_ok());
    }
}
