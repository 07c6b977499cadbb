//! ConfigStore trait: the abstract interface for configuration documents.
//!
//! A store is one JSON object. Keys are top-level members; values are
//! arbitrary JSON. Implementations serialize access through a read/write
//! lock so a [`ConfigStore::modify`] is never interleaved with another write.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{Result, StoreError};

/// Synchronous key-value interface over a JSON document.
pub trait ConfigStore: Send + Sync {
    /// Get the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Replace the value stored under `key`.
    fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Remove `key`, returning the previous value.
    fn remove(&self, key: &str) -> Result<Option<Value>>;

    /// Read-modify-write `key` under a single write lock.
    ///
    /// The closure receives the current value and returns the new one;
    /// returning `None` removes the key.
    fn modify(&self, key: &str, f: &mut dyn FnMut(Option<Value>) -> Option<Value>) -> Result<()>;
}

impl<S: ConfigStore + ?Sized> ConfigStore for Arc<S> {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<Option<Value>> {
        (**self).remove(key)
    }

    fn modify(&self, key: &str, f: &mut dyn FnMut(Option<Value>) -> Option<Value>) -> Result<()> {
        (**self).modify(key, f)
    }
}

/// Typed helpers for [`ConfigStore`].
pub trait StoreExt: ConfigStore {
    /// Get a string value. Non-string values are an error.
    fn get_string(&self, key: &str) -> Result<Option<String>> {
        match self.get(key)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(_) => Err(StoreError::InvalidData(format!("{key} is not a string"))),
        }
    }

    /// Get an object value, or an empty map if absent.
    fn get_object(&self, key: &str) -> Result<Map<String, Value>> {
        match self.get(key)? {
            None | Some(Value::Null) => Ok(Map::new()),
            Some(Value::Object(map)) => Ok(map),
            Some(_) => Err(StoreError::InvalidData(format!("{key} is not an object"))),
        }
    }

    /// Deserialize a value into `T`.
    fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key)? {
            None => Ok(None),
            Some(v) => Ok(Some(serde_json::from_value(v)?)),
        }
    }

    /// Set or remove a single member of an object value.
    fn set_member(&self, key: &str, member: &str, value: Option<Value>) -> Result<()> {
        let mut value = value;
        self.modify(key, &mut |current| {
            let mut map = match current {
                Some(Value::Object(map)) => map,
                _ => Map::new(),
            };
            match value.take() {
                Some(v) => {
                    map.insert(member.to_string(), v);
                }
                None => {
                    map.remove(member);
                }
            }
            Some(Value::Object(map))
        })
    }
}

impl<T: ConfigStore + ?Sized> StoreExt for T {}

/// Apply a [`ConfigStore::modify`] closure to an in-memory document.
pub(crate) fn modify_document(
    doc: &mut Map<String, Value>,
    key: &str,
    f: &mut dyn FnMut(Option<Value>) -> Option<Value>,
) {
    let current = doc.remove(key);
    if let Some(next) = f(current) {
        doc.insert(key.to_string(), next);
    }
}
