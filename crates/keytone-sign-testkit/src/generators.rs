//! Proptest generators for property-based testing.

use proptest::prelude::*;

use keytone_sign_perms::ExportTerms;

/// A 21-character protect code over the nanoid alphabet.
pub fn protect_code() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_-]{21}".prop_map(String::from)
}

/// An identifier too short for a dynamic key.
pub fn short_identifier() -> impl Strategy<Value = String> {
    "[A-Za-z0-9]{0,6}".prop_map(String::from)
}

/// A non-empty display name.
pub fn signature_name() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9 ._-]{0,23}".prop_map(String::from)
}

/// Free text, including non-ASCII.
pub fn intro() -> impl Strategy<Value = String> {
    "\\PC{0,64}".prop_map(String::from)
}

/// Payload bytes of at most `max_len`.
pub fn payload(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// First-signing terms that pass validation.
pub fn export_terms() -> impl Strategy<Value = ExportTerms> {
    (any::<bool>(), "[a-z]{1,8}@[a-z]{1,8}\\.com", "[ -~]{0,16}").prop_map(
        |(require_authorization, contact_email, contact_additional)| ExportTerms {
            require_authorization,
            contact_email,
            contact_additional,
            authorization_uuid: String::new(),
        },
    )
}

/// Inputs for creating a signature.
#[derive(Debug, Clone)]
pub struct ProfileParams {
    pub plain_id: String,
    pub name: String,
    pub intro: String,
}

impl Arbitrary for ProfileParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (protect_code(), signature_name(), intro())
            .prop_map(|(plain_id, name, intro)| ProfileParams {
                plain_id,
                name,
                intro,
            })
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::InstallationFixture;
    use keytone_sign_core::{is_protect_code, qualification_code, qualification_fingerprint};

    proptest! {
        #[test]
        fn prop_protect_codes_are_valid(id in protect_code()) {
            prop_assert!(is_protect_code(&id));
        }

        #[test]
        fn prop_code_and_fingerprint_deterministic(id in protect_code()) {
            let code = qualification_code(&id);
            prop_assert_eq!(code.as_str().len(), 64);
            prop_assert_eq!(&code, &qualification_code(&id));
            let fp = code.fingerprint();
            let expected_fp = qualification_fingerprint(code.as_str());
            prop_assert_eq!(fp.as_str(), expected_fp.as_str());
            prop_assert_ne!(fp.as_str(), code.as_str());
        }

        #[test]
        fn prop_short_codes_fingerprint_unchanged(code in "[0-9a-f]{0,11}") {
            let short_fp = qualification_fingerprint(&code);
            prop_assert_eq!(short_fp.as_str(), code.as_str());
        }

        #[test]
        fn prop_terms_validate(terms in export_terms()) {
            prop_assert!(terms.validate().is_ok());
        }
    }

    proptest! {
        // Each case runs PBKDF2 several times.
        #![proptest_config(ProptestConfig::with_cases(8))]

        #[test]
        fn prop_profile_roundtrip(params: ProfileParams) {
            let fixture = InstallationFixture::new();
            let id = fixture
                .kernel
                .create_signature(&params.plain_id, &params.name, &params.intro, None)
                .unwrap();
            let profile = fixture.kernel.decrypt_signature(&id).unwrap();
            prop_assert_eq!(profile.name, params.name);
            prop_assert_eq!(profile.intro, params.intro);
        }

        #[test]
        fn prop_short_identifiers_rejected(id in short_identifier()) {
            let fixture = InstallationFixture::new();
            prop_assert!(fixture.kernel.create_signature(&id, "A", "", None).is_err());
        }
    }
}
