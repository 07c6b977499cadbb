//! File-backed implementation of the ConfigStore trait.
//!
//! The whole document is rewritten after every mutation using
//! [`atomic_write`], while the write lock is held.

use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::fs::atomic_write;
use crate::traits::{modify_document, ConfigStore};

/// A JSON document on disk.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    inner: RwLock<Map<String, Value>>,
}

impl JsonFileStore {
    /// Open a document, creating an empty one in memory if the file is missing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let doc = match std::fs::read(&path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Map::new(),
            Ok(bytes) => match serde_json::from_slice(&bytes)? {
                Value::Object(map) => map,
                _ => {
                    return Err(StoreError::InvalidData(
                        "config document is not a JSON object".into(),
                    ))
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), keys = doc.len(), "opened config store");
        Ok(Self {
            path,
            inner: RwLock::new(doc),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, doc: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let bytes = serde_json::to_vec_pretty(doc)?;
        atomic_write(&self.path, &bytes)?;
        Ok(())
    }
}

impl ConfigStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.inner.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut inner = self.inner.write();
        inner.insert(key.to_string(), value);
        self.persist(&inner)
    }

    fn remove(&self, key: &str) -> Result<Option<Value>> {
        let mut inner = self.inner.write();
        let previous = inner.remove(key);
        if previous.is_some() {
            self.persist(&inner)?;
        }
        Ok(previous)
    }

    fn modify(&self, key: &str, f: &mut dyn FnMut(Option<Value>) -> Option<Value>) -> Result<()> {
        let mut inner = self.inner.write();
        modify_document(&mut inner, key, f);
        self.persist(&inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let store = JsonFileStore::open(&path).unwrap();
        store.set("signature", json!({"k": "v"})).unwrap();
        drop(store);

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.get("signature").unwrap(), Some(json!({"k": "v"})));
    }

    #[test]
    fn test_empty_file_is_empty_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "  \n").unwrap();
        let store = JsonFileStore::open(&path).unwrap();
        assert_eq!(store.get("anything").unwrap(), None);
    }

    #[test]
    fn test_non_object_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "[1,2,3]").unwrap();
        assert!(matches!(
            JsonFileStore::open(&path),
            Err(StoreError::InvalidData(_))
        ));
    }
}
