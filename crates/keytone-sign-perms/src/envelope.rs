//! Sealing of the album signature field.
//!
//! The map is serialized as indented JSON and encrypted with the
//! signature-field key, then stored under [`SIGNATURE_FIELD`] in the album
//! config. That config may itself be encrypted with the album key, so the
//! map sits behind two independent layers.

use keytone_sign_core::{CryptoError, SymmetricKey};
use serde_json::Value;
use thiserror::Error;

use crate::error::Result;
use crate::signature_map::AlbumSignatureMap;

/// Album config key holding the sealed map.
pub const SIGNATURE_FIELD: &str = "signature";

/// An existing signature field that could not be opened.
///
/// Call sites decide whether this may be downgraded to an empty map.
#[derive(Debug, Error)]
pub enum RecoverableError {
    #[error("signature field is not a string")]
    NotAString,

    #[error("signature field decryption failed: {0}")]
    Decrypt(#[source] CryptoError),

    #[error("signature field is not valid JSON: {0}")]
    Parse(#[source] serde_json::Error),
}

/// Seal a map for storage.
pub fn seal_map(map: &AlbumSignatureMap, key: &SymmetricKey) -> Result<String> {
    let json = serde_json::to_vec_pretty(map)?;
    Ok(key.encrypt(&json)?)
}

/// Open a sealed map.
pub fn open_map(
    blob: &str,
    key: &SymmetricKey,
) -> std::result::Result<AlbumSignatureMap, RecoverableError> {
    let json = key.decrypt(blob).map_err(RecoverableError::Decrypt)?;
    serde_json::from_slice(&json).map_err(RecoverableError::Parse)
}

/// Open the raw field value as read from the album config.
///
/// A missing field is an unsigned album (`Ok(None)`).
pub fn open_field(
    value: Option<&Value>,
    key: &SymmetricKey,
) -> std::result::Result<Option<AlbumSignatureMap>, RecoverableError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(blob)) => open_map(blob, key).map(Some),
        Some(_) => Err(RecoverableError::NotAString),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature_map::{EntryContent, ExportTerms};
    use keytone_sign_core::{qualification_code, KeyRing};

    fn sample() -> AlbumSignatureMap {
        let mut map = AlbumSignatureMap::new();
        map.record_export(
            &qualification_code("u1"),
            Some(EntryContent {
                name: "Alice".into(),
                ..Default::default()
            }),
            &ExportTerms::default(),
        )
        .unwrap();
        map
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let key = KeyRing::public_defaults().album_signature_key();
        let blob = seal_map(&sample(), &key).unwrap();
        assert_eq!(open_map(&blob, &key).unwrap(), sample());
    }

    #[test]
    fn test_open_field_shapes() {
        let key = KeyRing::public_defaults().album_signature_key();
        assert!(open_field(None, &key).unwrap().is_none());
        assert!(matches!(
            open_field(Some(&Value::Bool(true)), &key),
            Err(RecoverableError::NotAString)
        ));
        assert!(matches!(
            open_field(Some(&Value::String("deadbeef".repeat(8))), &key),
            Err(RecoverableError::Decrypt(_))
        ));

        let not_json = key.encrypt(b"not json").unwrap();
        assert!(matches!(
            open_field(Some(&Value::String(not_json)), &key),
            Err(RecoverableError::Parse(_))
        ));
    }

    #[test]
    fn test_wrong_key_is_recoverable_error() {
        let keys = KeyRing::public_defaults();
        let blob = seal_map(&sample(), &keys.album_signature_key()).unwrap();
        assert!(open_map(&blob, &keys.album_key("some-album")).is_err());
    }
}
