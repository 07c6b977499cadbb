//! `.ktsign` signature exchange files.
//!
//! A `.ktsign` file is standard base64 text. Decoded, it is a JSON envelope
//! XOR-obfuscated with [`KTSIGN_XOR_KEY`]:
//!
//! ```json
//! {
//!   "key": "<KeyB-encrypted protect code>",
//!   "value": { "name": "...", "intro": "...", "cardImagePath": "...", "createdAt": "..." },
//!   "assets": { "cardImage": "<base64 image>" }
//! }
//! ```
//!
//! `assets` is optional. Unknown members of `value` are preserved.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ExchangeError, Result};
use crate::xor::xor_crypt;

/// Fixed XOR key for `.ktsign` payloads.
pub const KTSIGN_XOR_KEY: &[u8] = b"KeyTone2024SecretKey";

/// Plain signature content carried by a `.ktsign` file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KtsignValue {
    pub name: String,
    #[serde(default)]
    pub intro: String,
    /// Original card image path. Only its file name is meaningful on import.
    #[serde(default)]
    pub card_image_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Optional binary assets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KtsignAssets {
    /// Base64 card image. A `data:<mime>;base64,` prefix is tolerated on decode.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub card_image: String,
}

impl KtsignAssets {
    /// Decode the card image bytes, if any.
    pub fn card_image_bytes(&self) -> Result<Option<Vec<u8>>> {
        if self.card_image.is_empty() {
            return Ok(None);
        }
        let data = match self.card_image.split_once(',') {
            Some((prefix, rest)) if prefix.starts_with("data:") => rest,
            _ => self.card_image.as_str(),
        };
        STANDARD
            .decode(data.trim())
            .map(Some)
            .map_err(|_| ExchangeError::InvalidFormat("card image is not valid base64".into()))
    }
}

/// The decoded `.ktsign` envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KtsignEnvelope {
    /// KeyB-encrypted protect code.
    pub key: String,
    pub value: KtsignValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets: Option<KtsignAssets>,
}

impl KtsignEnvelope {
    /// Build an envelope, embedding the card image when one is given.
    pub fn new(key: impl Into<String>, value: KtsignValue, card_image: Option<&[u8]>) -> Self {
        let assets = card_image.map(|bytes| KtsignAssets {
            card_image: STANDARD.encode(bytes),
        });
        Self {
            key: key.into(),
            value,
            assets,
        }
    }
}

/// Loose shape used to report which required field is missing.
#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    value: Option<Map<String, Value>>,
    #[serde(default)]
    assets: Option<KtsignAssets>,
}

fn invalid(what: &str) -> ExchangeError {
    ExchangeError::InvalidFormat(what.to_string())
}

/// Encode an envelope to `.ktsign` text.
pub fn encode_ktsign(envelope: &KtsignEnvelope) -> Result<String> {
    let json = serde_json::to_vec(envelope)?;
    Ok(STANDARD.encode(xor_crypt(&json, KTSIGN_XOR_KEY)))
}

/// Decode `.ktsign` text.
///
/// Fails with [`ExchangeError::InvalidFormat`] on empty input, bad base64,
/// bad JSON, an empty or missing `key`, a missing `value`, or a missing or
/// empty `value.name`.
pub fn decode_ktsign(text: &str) -> Result<KtsignEnvelope> {
    let text = text.trim();
    if text.is_empty() {
        return Err(invalid("empty input"));
    }
    let obfuscated = STANDARD
        .decode(text)
        .map_err(|_| invalid("failed to decode base64"))?;
    let json = xor_crypt(&obfuscated, KTSIGN_XOR_KEY);
    let raw: RawEnvelope =
        serde_json::from_slice(&json).map_err(|_| invalid("failed to parse JSON"))?;

    let key = raw
        .key
        .filter(|k| !k.is_empty())
        .ok_or_else(|| invalid("missing key field"))?;
    let value = raw.value.ok_or_else(|| invalid("missing value field"))?;
    match value.get("name") {
        Some(Value::String(name)) if !name.is_empty() => {}
        _ => return Err(invalid("missing or invalid name field")),
    }
    let value: KtsignValue = serde_json::from_value(Value::Object(value))
        .map_err(|_| invalid("malformed value field"))?;

    Ok(KtsignEnvelope {
        key,
        value,
        assets: raw.assets,
    })
}
