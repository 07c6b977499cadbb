//! In-memory implementation of the ConfigStore trait.
//!
//! This is primarily for testing. Same semantics as [`JsonFileStore`]
//! without persistence.
//!
//! [`JsonFileStore`]: crate::JsonFileStore

use parking_lot::RwLock;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::traits::{modify_document, ConfigStore};

/// In-memory store. All data is lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Map<String, Value>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with an existing document.
    pub fn from_document(doc: Map<String, Value>) -> Self {
        Self {
            inner: RwLock::new(doc),
        }
    }

    /// Clone the whole document.
    pub fn snapshot(&self) -> Map<String, Value> {
        self.inner.read().clone()
    }
}

impl ConfigStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.inner.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        self.inner.write().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.inner.write().remove(key))
    }

    fn modify(&self, key: &str, f: &mut dyn FnMut(Option<Value>) -> Option<Value>) -> Result<()> {
        let mut inner = self.inner.write();
        modify_document(&mut inner, key, f);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::StoreExt;
    use serde_json::json;

    #[test]
    fn test_get_set_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get("a").unwrap(), None);

        store.set("a", json!("x")).unwrap();
        assert_eq!(store.get_string("a").unwrap().as_deref(), Some("x"));

        assert_eq!(store.remove("a").unwrap(), Some(json!("x")));
        assert_eq!(store.get("a").unwrap(), None);
    }

    #[test]
    fn test_set_member_and_object() {
        let store = MemoryStore::new();
        store.set_member("signature", "k1", Some(json!({"value": "v"}))).unwrap();
        store.set_member("signature", "k2", Some(json!("legacy"))).unwrap();
        let map = store.get_object("signature").unwrap();
        assert_eq!(map.len(), 2);

        store.set_member("signature", "k1", None).unwrap();
        let map = store.get_object("signature").unwrap();
        assert!(map.contains_key("k2"));
        assert!(!map.contains_key("k1"));
    }

    #[test]
    fn test_from_document() {
        let mut doc = Map::new();
        doc.insert("theme".into(), json!("dark"));
        let store = MemoryStore::from_document(doc);
        assert_eq!(store.get("theme").unwrap(), Some(json!("dark")));
        store.set("volume", json!(3)).unwrap();
        assert_eq!(store.snapshot().len(), 2);
    }

    #[test]
    fn test_type_mismatch_is_error() {
        let store = MemoryStore::new();
        store.set("n", json!(5)).unwrap();
        assert!(store.get_string("n").is_err());
        assert!(store.get_object("n").is_err());
    }

    #[test]
    fn test_concurrent_modify_is_serialized() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(MemoryStore::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..50 {
                        store
                            .set_member("m", &format!("{t}-{i}"), Some(json!(i)))
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.get_object("m").unwrap().len(), 400);
    }
}
