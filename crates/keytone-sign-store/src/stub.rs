//! Encrypted album config descriptor.
//!
//! When an album's configuration is encrypted, `package.json` holds only a
//! [`CoreStub`] and the real document lives in a sibling file as raw
//! `nonce || ciphertext` bytes under the album key.

use std::path::{Component, Path};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Default name of the sibling ciphertext file.
pub const CORE_FILE_NAME: &str = "core";

/// Schema tag written into new stubs.
pub const CORE_SCHEMA_VERSION: &str = "kcfg-core-v1";

/// The stub JSON that replaces an encrypted album config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreStub {
    #[serde(rename = "_keytone_encrypted", default)]
    pub encrypted: bool,

    #[serde(rename = "_keytone_core", default)]
    pub core_file_name: String,

    #[serde(rename = "_keytone_schema", default, skip_serializing_if = "String::is_empty")]
    pub schema_version: String,

    #[serde(rename = "_keytone_updated_at", default, skip_serializing_if = "String::is_empty")]
    pub updated_at: String,
}

impl Default for CoreStub {
    fn default() -> Self {
        Self {
            encrypted: true,
            core_file_name: CORE_FILE_NAME.to_string(),
            schema_version: CORE_SCHEMA_VERSION.to_string(),
            updated_at: now_rfc3339(),
        }
    }
}

impl CoreStub {
    /// Parse config file bytes.
    ///
    /// Returns `Ok(None)` when the bytes are not a stub (not a JSON object,
    /// not marked encrypted, or no core file name). A stub with an unknown
    /// schema or an unsafe core file name is an error.
    pub fn parse(bytes: &[u8]) -> Result<Option<Self>> {
        let text = match std::str::from_utf8(bytes) {
            Ok(t) => t.trim(),
            Err(_) => return Ok(None),
        };
        if !text.starts_with('{') {
            return Ok(None);
        }
        let mut stub: CoreStub = match serde_json::from_str(text) {
            Ok(s) => s,
            Err(_) => return Ok(None),
        };
        if !stub.encrypted || stub.core_file_name.trim().is_empty() {
            return Ok(None);
        }
        if !stub.schema_version.is_empty() && stub.schema_version != CORE_SCHEMA_VERSION {
            return Err(StoreError::UnsupportedSchema(stub.schema_version));
        }
        validate_core_file_name(&stub.core_file_name)?;
        if stub.updated_at.is_empty() {
            stub.updated_at = now_rfc3339();
        }
        Ok(Some(stub))
    }

    /// Refresh `updated_at` and serialize as indented JSON.
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        self.updated_at = now_rfc3339();
        Ok(serde_json::to_vec_pretty(self)?)
    }
}

/// Reject absolute names and any parent-directory traversal.
pub fn validate_core_file_name(name: &str) -> Result<()> {
    let path = Path::new(name);
    let escapes = path.is_absolute()
        || name.contains("..")
        || path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(StoreError::InvalidCoreFileName);
    }
    Ok(())
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
