//! Atomic file writes.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

/// Write `bytes` to `path` via a temp file in the same directory and rename.
///
/// The file is either fully replaced or left untouched.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
