//! Golden test vectors for deterministic verification.
//!
//! These values are fixed by the on-disk formats; any implementation
//! reading the same files must reproduce them.

use keytone_sign_core::{qualification_code, KeyRing};
use keytone_sign_exchange::{encode_container, ContainerHeader, HEADER_LEN};

/// Qualification code and fingerprint of a plaintext identifier.
#[derive(Debug, Clone)]
pub struct QualificationVector {
    pub plain_id: &'static str,
    pub code: &'static str,
    pub fingerprint: &'static str,
}

/// Album key for an album identifier under the public default secret.
#[derive(Debug, Clone)]
pub struct AlbumKeyVector {
    pub album_id: &'static str,
    pub key_hex: &'static str,
}

/// A container around a fixed zip payload.
#[derive(Debug, Clone)]
pub struct ContainerVector {
    pub name: &'static str,
    pub version: u8,
    pub zip: &'static [u8],
    pub header_hex: &'static str,
    pub payload_hex: &'static str,
}

/// The smallest valid zip: an end-of-central-directory record.
pub const EMPTY_ZIP: &[u8] = &[
    0x50, 0x4b, 0x05, 0x06, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
];

pub fn qualification_vectors() -> Vec<QualificationVector> {
    vec![
        QualificationVector {
            plain_id: "u1",
            code: "bb82030dbc2bcaba32a90bf2e207a84a856fc5f033b77c480836ab6f77f40f19",
            fingerprint: "02d4feabc4017691fed7368e6e9a5fecbe4dd943d832efcef9e13d212a9c5d8e",
        },
        QualificationVector {
            plain_id: "u2",
            code: "6ca202c88e549dff68c09bfafbfc60b2fac074debc1e6777e9ba4b6c703ed114",
            fingerprint: "78568fe9ca38acc789c43c260eee4cbf2dd6612181a332aad6e0605695aa6f10",
        },
        QualificationVector {
            plain_id: "AbCdEfGhIjKlMnOpQrStU",
            code: "e93e3733ab6a28873adc3d106f5ae6859b4ebddf06c809b6be987d1b60bf0018",
            fingerprint: "23b977f346ef1a5d37e7349d4794f2a7314aab98d55f8ced739614376eb3a49e",
        },
    ]
}

pub fn album_key_vectors() -> Vec<AlbumKeyVector> {
    vec![
        AlbumKeyVector {
            album_id: "album-one",
            key_hex: "1c0f64cb8fe83a27836099cbb33f2c3d78836249512253d274a85aba990b23c5",
        },
        AlbumKeyVector {
            album_id: "V1StGXR8_Z5jdHi6B-myT",
            key_hex: "3c7e06fd00c1e2417d205f4c8b7bc3bd82b03200cf994ea8787a4d4ff30f3f83",
        },
    ]
}

pub fn container_vectors() -> Vec<ContainerVector> {
    vec![
        ContainerVector {
            name: "empty zip, v2 default key",
            version: 2,
            zip: EMPTY_ZIP,
            header_hex: "4b54414c42554d0216000000000000008739c76e681f900923b900c9df0ef75cf421d39cabb54650c4b9ad19b6a76d85",
            payload_hex: "1b2e7c526f6e6532303235416c62756d536563757265",
        },
        ContainerVector {
            name: "empty zip, v1 default key",
            version: 1,
            zip: EMPTY_ZIP,
            header_hex: "4b54414c42554d0116000000000000008739c76e681f900923b900c9df0ef75cf421d39cabb54650c4b9ad19b6a76d85",
            payload_hex: "1b2e7c526f6e65323032345365637265744b65794b65",
        },
    ]
}

/// Check every vector against the implementation.
///
/// Returns `(name, passed, detail)` per vector.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    let keys = KeyRing::public_defaults();
    let mut out = Vec::new();

    for v in qualification_vectors() {
        let code = qualification_code(v.plain_id);
        let fingerprint = code.fingerprint();
        let ok = code.as_str() == v.code && fingerprint.as_str() == v.fingerprint;
        out.push((
            format!("qualification {}", v.plain_id),
            ok,
            format!("code {} fingerprint {}", code, fingerprint.as_str()),
        ));
    }

    for v in album_key_vectors() {
        let key = hex::encode(keys.album_key(v.album_id).as_bytes());
        out.push((format!("album key {}", v.album_id), key == v.key_hex, key));
    }

    for v in container_vectors() {
        let bytes = encode_container(v.zip, v.version, &keys);
        let header = hex::encode(&bytes[..HEADER_LEN]);
        let payload = hex::encode(&bytes[HEADER_LEN..]);
        let parsed = ContainerHeader::parse(&bytes).map(|h| h.verifies(v.zip));
        let ok = header == v.header_hex && payload == v.payload_hex && matches!(parsed, Ok(true));
        out.push((v.name.to_string(), ok, format!("{header} {payload}")));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_vectors_pass() {
        for (name, ok, detail) in verify_all_vectors() {
            assert!(ok, "{name} failed: {detail}");
        }
    }

    #[test]
    fn test_fingerprint_removal_rule() {
        for v in qualification_vectors() {
            let mut reduced = String::from(&v.code[..1]);
            reduced.push_str(&v.code[2..10]);
            reduced.push_str(&v.code[11..]);
            assert_eq!(reduced.len(), 62);
            assert_eq!(keytone_sign_core::sha256_hex(&reduced), v.fingerprint);
        }
    }
}
