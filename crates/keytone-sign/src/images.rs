//! Card image file naming and path checks.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use keytone_sign_core::{sha1_hex, sha256_hex};

/// `.ext` of `file_name`, or empty.
pub(crate) fn extension_of(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| format!(".{e}"))
        .unwrap_or_default()
}

/// Base name of a path string, tolerating either separator.
pub(crate) fn base_name(path: &str) -> &str {
    path.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(path)
}

/// `hex(SHA1(seed))` plus the extension of `original_name`.
pub(crate) fn hashed_file_name(seed: &str, original_name: &str) -> String {
    format!("{}{}", sha1_hex(seed), extension_of(original_name))
}

/// Whether `rel` is a relative path that stays below its base.
pub(crate) fn is_contained(rel: &Path) -> bool {
    !rel.as_os_str().is_empty()
        && rel
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Resolve an album-relative path, refusing anything that escapes the album.
pub(crate) fn album_path(album_dir: &Path, rel: &str) -> Option<PathBuf> {
    let rel = Path::new(rel);
    is_contained(rel).then(|| album_dir.join(rel))
}

/// SHA-256 of a file's contents, `None` if it cannot be read.
pub(crate) fn file_digest(path: &Path) -> Option<String> {
    fs::read(path).ok().map(|bytes| sha256_hex(bytes))
}

/// Write `bytes` into `dir/name`, creating `dir`.
pub(crate) fn write_into(dir: &Path, name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(name);
    fs::write(&path, bytes)?;
    Ok(path)
}
