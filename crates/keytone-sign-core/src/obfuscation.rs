//! Build-time key obfuscation.
//!
//! Private builds inject keys as `hex(plaintext XOR mask)` so the plaintext
//! never appears as ASCII in the binary. Open-source builds leave the
//! public default in place, which is then used verbatim.
//!
//! ## Resolution rule
//!
//! 1. Configured value equals the public default: use the default.
//! 2. Otherwise hex-decode and XOR with [`XOR_MASK`] (cyclic).
//! 3. A value that is not valid hex is used verbatim.
//!
//! This is tamper and casual-inspection deterrence only.

use std::borrow::Cow;
use std::fmt;

use tracing::warn;

use crate::crypto::SymmetricKey;

/// The 16-byte XOR mask applied cyclically to injected secrets.
pub const XOR_MASK: [u8; 16] = [
    0x55, 0xAA, 0x33, 0xCC, 0x99, 0x66, 0x11, 0xEE, 0x77, 0xBB, 0x22, 0xDD, 0x88, 0x44, 0xFF, 0x00,
];

fn apply_mask(bytes: &mut [u8]) {
    for (i, b) in bytes.iter_mut().enumerate() {
        *b ^= XOR_MASK[i % XOR_MASK.len()];
    }
}

/// Obfuscate a plaintext key for embedding at build time.
pub fn obfuscate(plaintext: &str) -> String {
    let mut bytes = plaintext.as_bytes().to_vec();
    apply_mask(&mut bytes);
    hex::encode(bytes)
}

/// Decode an injected key value into a 32-byte key.
pub fn deobfuscate_key(value: &str) -> SymmetricKey {
    match hex::decode(value) {
        Ok(mut bytes) => {
            apply_mask(&mut bytes);
            SymmetricKey::padded(&bytes)
        }
        Err(_) => {
            warn!("injected key is not hex; using it verbatim");
            SymmetricKey::padded(value.as_bytes())
        }
    }
}

/// Decode an injected text secret.
///
/// Values that are not hex are returned unchanged.
pub fn deobfuscate_str(value: &str) -> String {
    match hex::decode(value) {
        Ok(mut bytes) => {
            apply_mask(&mut bytes);
            String::from_utf8_lossy(&bytes).into_owned()
        }
        Err(_) => value.to_string(),
    }
}

/// One compiled-in secret: its public default and the configured value.
#[derive(Clone)]
pub struct SecretSource {
    default: &'static str,
    configured: Cow<'static, str>,
}

impl SecretSource {
    /// A secret that still carries its public default.
    pub const fn new(default: &'static str) -> Self {
        Self {
            default,
            configured: Cow::Borrowed(default),
        }
    }

    /// A secret taken from a compile-time variable, falling back to the default.
    pub fn from_build(default: &'static str, compiled: Option<&'static str>) -> Self {
        match compiled {
            Some(v) if !v.is_empty() => Self {
                default,
                configured: Cow::Borrowed(v),
            },
            _ => Self::new(default),
        }
    }

    /// A secret with an explicit obfuscated override.
    pub fn with_value(default: &'static str, obfuscated: impl Into<String>) -> Self {
        Self {
            default,
            configured: Cow::Owned(obfuscated.into()),
        }
    }

    /// The public default value.
    pub fn default_value(&self) -> &'static str {
        self.default
    }

    /// Whether the configured value is still the public default.
    pub fn is_default(&self) -> bool {
        self.configured == self.default
    }

    /// Resolve to a 32-byte key.
    pub fn resolve_key(&self) -> SymmetricKey {
        if self.is_default() {
            SymmetricKey::padded(self.default.as_bytes())
        } else {
            deobfuscate_key(&self.configured)
        }
    }

    /// Resolve to its plaintext string form.
    pub fn resolve_text(&self) -> String {
        if self.is_default() {
            self.default.to_string()
        } else {
            deobfuscate_str(&self.configured)
        }
    }
}

impl fmt::Debug for SecretSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretSource")
            .field("is_default", &self.is_default())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_obfuscate_known_value() {
        // 'A' ^ 0x55 = 0x14, 'B' ^ 0xAA = 0xE8
        assert_eq!(obfuscate("AB"), "14e8");
    }

    #[test]
    fn test_mask_wraps_after_sixteen_bytes() {
        let plain = "0123456789abcdefX";
        let hexed = obfuscate(plain);
        let raw = hex::decode(hexed).unwrap();
        assert_eq!(raw[16], b'X' ^ XOR_MASK[0]);
    }

    #[test]
    fn test_default_used_verbatim() {
        let src = SecretSource::new("short-default");
        assert!(src.is_default());
        assert_eq!(&src.resolve_key().as_bytes()[..13], b"short-default");
        assert_eq!(src.resolve_text(), "short-default");
    }

    #[test]
    fn test_injected_value_is_deobfuscated() {
        let secret = "0123456789ABCDEF0123456789ABCDEF";
        let src = SecretSource::with_value("public", obfuscate(secret));
        assert!(!src.is_default());
        assert_eq!(src.resolve_key().as_bytes(), secret.as_bytes());
        assert_eq!(src.resolve_text(), secret);
    }

    #[test]
    fn test_non_hex_injection_used_verbatim() {
        let src = SecretSource::with_value("public", "not hex at all");
        assert_eq!(&src.resolve_key().as_bytes()[..14], b"not hex at all");
        assert_eq!(src.resolve_text(), "not hex at all");
    }

    #[test]
    fn test_empty_build_value_falls_back() {
        assert!(SecretSource::from_build("d", Some("")).is_default());
        assert!(SecretSource::from_build("d", None).is_default());
    }

    proptest! {
        #[test]
        fn prop_obfuscation_roundtrip(s in "[ -~]{1,64}") {
            prop_assert_eq!(deobfuscate_str(&obfuscate(&s)), s);
        }
    }
}
