//! The album signature map and its authorization state machine.
//!
//! The map is keyed by qualification code. At most one entry (the original
//! author's) carries [`AuthorizationMetadata`].

use std::collections::BTreeMap;

use keytone_sign_core::QualificationCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{PermsError, Result};

/// Authorization settings held by the original author's entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationMetadata {
    #[serde(default)]
    pub require_authorization: bool,

    #[serde(default)]
    pub contact_email: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub contact_additional: String,

    /// Codes allowed to re-export. Append-only in normal flow.
    #[serde(default)]
    pub authorized_list: Vec<QualificationCode>,

    /// Code of the most recent exporter.
    #[serde(default)]
    pub direct_export_author: QualificationCode,

    /// Handshake session identifier chosen at first export.
    #[serde(
        rename = "authorizationUUID",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub authorization_uuid: String,
}

impl AuthorizationMetadata {
    /// Whether `code` appears in the authorized list.
    pub fn is_authorized(&self, code: &QualificationCode) -> bool {
        self.authorized_list.iter().any(|c| c == code)
    }
}

/// One signer's entry in an album.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumSignatureEntry {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub intro: String,

    /// Card image path relative to the album directory.
    #[serde(default)]
    pub card_image_path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization: Option<AuthorizationMetadata>,
}

/// Display content for a new or refreshed entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryContent {
    pub name: String,
    pub intro: String,
    pub card_image_path: String,
}

/// Terms recorded when an album is signed for the first time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportTerms {
    pub require_authorization: bool,
    pub contact_email: String,
    pub contact_additional: String,
    pub authorization_uuid: String,
}

impl ExportTerms {
    /// Authorization requires a contact e-mail.
    pub fn validate(&self) -> Result<()> {
        if self.require_authorization && self.contact_email.trim().is_empty() {
            return Err(PermsError::InvalidInput(
                "contact email is required when authorization is required".into(),
            ));
        }
        Ok(())
    }
}

/// Outcome of the export-permission check.
///
/// Evaluated in a fixed order; the first matching rule wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationDecision {
    /// Album has no signatures.
    Unsigned,
    /// Signed, but no entry carries authorization metadata.
    Inconsistent,
    /// Original author does not require authorization.
    Open,
    /// Requester is the original author.
    OriginalAuthor,
    /// Requester is in the authorized list.
    Authorized,
    /// Requester must import a grant first.
    GrantRequired,
}

impl AuthorizationDecision {
    pub fn is_allowed(self) -> bool {
        matches!(
            self,
            Self::Unsigned | Self::Open | Self::OriginalAuthor | Self::Authorized
        )
    }

    /// Whether the album's original author requires authorization.
    pub fn require_authorization(self) -> bool {
        matches!(
            self,
            Self::OriginalAuthor | Self::Authorized | Self::GrantRequired
        )
    }

    /// Turn a denial into the matching error.
    pub fn into_result(self) -> Result<Self> {
        match self {
            Self::Inconsistent => Err(PermsError::InconsistentState(
                "album is signed but has no original author entry".into(),
            )),
            Self::GrantRequired => Err(PermsError::PermissionDenied(
                "signature is not authorized by the original author; import a grant first".into(),
            )),
            allowed => Ok(allowed),
        }
    }
}

/// What [`AlbumSignatureMap::record_export`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The album was unsigned; the caller is now the original author.
    FirstSignature,
    /// The original author re-exported.
    OriginalAuthorReexport,
    /// A contributor was added (`new_entry`) or refreshed.
    Contributor { new_entry: bool },
}

/// Qualification code → entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlbumSignatureMap(BTreeMap<QualificationCode, AlbumSignatureEntry>);

impl AlbumSignatureMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether any signature has been applied.
    pub fn is_signed(&self) -> bool {
        !self.0.is_empty()
    }

    pub fn get(&self, code: &QualificationCode) -> Option<&AlbumSignatureEntry> {
        self.0.get(code)
    }

    pub fn contains(&self, code: &QualificationCode) -> bool {
        self.0.contains_key(code)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&QualificationCode, &AlbumSignatureEntry)> {
        self.0.iter()
    }

    /// Insert an entry without any policy checks.
    pub fn insert(&mut self, code: QualificationCode, entry: AlbumSignatureEntry) {
        self.0.insert(code, entry);
    }

    /// The original author's code and entry.
    pub fn original_author(&self) -> Option<(&QualificationCode, &AlbumSignatureEntry)> {
        self.0.iter().find(|(_, e)| e.authorization.is_some())
    }

    /// The original author's authorization metadata.
    pub fn authorization(&self) -> Option<&AuthorizationMetadata> {
        self.0.values().find_map(|e| e.authorization.as_ref())
    }

    fn authorization_mut(&mut self) -> Option<&mut AuthorizationMetadata> {
        self.0.values_mut().find_map(|e| e.authorization.as_mut())
    }

    /// Codes of all entries without authorization metadata.
    pub fn contributors(&self) -> Vec<&QualificationCode> {
        self.0
            .iter()
            .filter(|(_, e)| e.authorization.is_none())
            .map(|(c, _)| c)
            .collect()
    }

    /// The most recent exporter recorded by the original author's entry.
    pub fn direct_export_author(&self) -> Option<&QualificationCode> {
        self.authorization().map(|a| &a.direct_export_author)
    }

    /// Check that at most one entry carries authorization metadata.
    pub fn validate(&self) -> Result<()> {
        let holders = self
            .0
            .values()
            .filter(|e| e.authorization.is_some())
            .count();
        if holders > 1 {
            return Err(PermsError::InconsistentState(format!(
                "{holders} entries carry authorization metadata"
            )));
        }
        Ok(())
    }

    /// The export-permission check for `requester`.
    pub fn check_authorization(&self, requester: &QualificationCode) -> AuthorizationDecision {
        if !self.is_signed() {
            return AuthorizationDecision::Unsigned;
        }
        let Some((author_code, entry)) = self.original_author() else {
            return AuthorizationDecision::Inconsistent;
        };
        let Some(auth) = entry.authorization.as_ref() else {
            return AuthorizationDecision::Inconsistent;
        };
        if !auth.require_authorization {
            return AuthorizationDecision::Open;
        }
        if author_code == requester {
            return AuthorizationDecision::OriginalAuthor;
        }
        if auth.is_authorized(requester) {
            return AuthorizationDecision::Authorized;
        }
        AuthorizationDecision::GrantRequired
    }

    /// Record an export by `code`.
    ///
    /// `content` refreshes the entry's display fields; `None` keeps an
    /// existing entry unchanged. `terms` only apply when the album is
    /// unsigned. The permission check runs before anything is changed.
    pub fn record_export(
        &mut self,
        code: &QualificationCode,
        content: Option<EntryContent>,
        terms: &ExportTerms,
    ) -> Result<ApplyOutcome> {
        let first_export = !self.is_signed();
        if first_export {
            terms.validate()?;
        } else {
            self.validate()?;
            self.check_authorization(code).into_result()?;
        }

        let existing = self.0.get(code).cloned();
        let mut entry = match (content, existing.as_ref()) {
            (Some(c), prior) => AlbumSignatureEntry {
                name: c.name,
                intro: c.intro,
                card_image_path: c.card_image_path,
                authorization: prior.and_then(|p| p.authorization.clone()),
            },
            (None, Some(prior)) => prior.clone(),
            (None, None) => {
                return Err(PermsError::InvalidInput(
                    "new signature entry requires content".into(),
                ))
            }
        };

        let outcome = if first_export {
            let authorized_list = if terms.require_authorization {
                vec![code.clone()]
            } else {
                Vec::new()
            };
            entry.authorization = Some(AuthorizationMetadata {
                require_authorization: terms.require_authorization,
                contact_email: terms.contact_email.clone(),
                contact_additional: terms.contact_additional.clone(),
                authorized_list,
                direct_export_author: code.clone(),
                authorization_uuid: terms.authorization_uuid.clone(),
            });
            info!(
                code = code.short(),
                require_authorization = terms.require_authorization,
                "album signed by original author"
            );
            ApplyOutcome::FirstSignature
        } else if let Some(auth) = entry.authorization.as_mut() {
            auth.direct_export_author = code.clone();
            debug!(code = code.short(), "original author re-export");
            ApplyOutcome::OriginalAuthorReexport
        } else {
            if let Some(auth) = self.authorization_mut() {
                auth.direct_export_author = code.clone();
            }
            debug!(code = code.short(), new_entry = existing.is_none(), "contributor export");
            ApplyOutcome::Contributor {
                new_entry: existing.is_none(),
            }
        };

        self.0.insert(code.clone(), entry);
        Ok(outcome)
    }

    /// Add `code` to the original author's authorized list.
    ///
    /// Returns `false` when the code was already present.
    pub fn add_authorized(&mut self, code: &QualificationCode) -> Result<bool> {
        if !self.is_signed() {
            return Err(PermsError::NotSigned);
        }
        self.validate()?;
        let auth = self.authorization_mut().ok_or_else(|| {
            PermsError::InconsistentState("album is signed but has no original author entry".into())
        })?;
        if auth.is_authorized(code) {
            return Ok(false);
        }
        auth.authorized_list.push(code.clone());
        info!(code = code.short(), "added to authorized list");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keytone_sign_core::qualification_code;
    use proptest::prelude::*;

    fn content(name: &str) -> Option<EntryContent> {
        Some(EntryContent {
            name: name.to_string(),
            intro: format!("{name} intro"),
            card_image_path: String::new(),
        })
    }

    fn terms(require: bool) -> ExportTerms {
        ExportTerms {
            require_authorization: require,
            contact_email: if require { "a@example.com".into() } else { String::new() },
            contact_additional: String::new(),
            authorization_uuid: "session-uuid".into(),
        }
    }

    fn signed_by(author: &QualificationCode, require: bool) -> AlbumSignatureMap {
        let mut map = AlbumSignatureMap::new();
        map.record_export(author, content("Alice"), &terms(require))
            .unwrap();
        map
    }

    #[test]
    fn test_policy_unsigned_allows() {
        let map = AlbumSignatureMap::new();
        let d = map.check_authorization(&qualification_code("anyone"));
        assert_eq!(d, AuthorizationDecision::Unsigned);
        assert!(d.is_allowed());
        assert!(!d.require_authorization());
    }

    #[test]
    fn test_policy_open_album_allows_anyone() {
        let map = signed_by(&qualification_code("u1"), false);
        let d = map.check_authorization(&qualification_code("stranger"));
        assert_eq!(d, AuthorizationDecision::Open);
        assert!(d.is_allowed());
    }

    #[test]
    fn test_policy_original_author_allowed() {
        let author = qualification_code("u1");
        let map = signed_by(&author, true);
        assert_eq!(
            map.check_authorization(&author),
            AuthorizationDecision::OriginalAuthor
        );
    }

    #[test]
    fn test_policy_authorized_list() {
        let author = qualification_code("u1");
        let other = qualification_code("u2");
        let mut map = signed_by(&author, true);
        assert_eq!(
            map.check_authorization(&other),
            AuthorizationDecision::GrantRequired
        );
        assert!(!map.check_authorization(&other).is_allowed());

        assert!(map.add_authorized(&other).unwrap());
        assert!(!map.add_authorized(&other).unwrap());
        assert_eq!(
            map.check_authorization(&other),
            AuthorizationDecision::Authorized
        );
    }

    #[test]
    fn test_policy_inconsistent_when_no_original_author() {
        let mut map = AlbumSignatureMap::new();
        map.insert(qualification_code("x"), AlbumSignatureEntry::default());
        let d = map.check_authorization(&qualification_code("x"));
        assert_eq!(d, AuthorizationDecision::Inconsistent);
        assert!(matches!(
            d.into_result(),
            Err(PermsError::InconsistentState(_))
        ));
    }

    #[test]
    fn test_first_export_metadata() {
        let author = qualification_code("u1");
        let map = signed_by(&author, false);
        let auth = map.authorization().unwrap();
        assert_eq!(auth.direct_export_author, author);
        assert!(auth.authorized_list.is_empty());
        assert_eq!(auth.authorization_uuid, "session-uuid");

        let strict = signed_by(&author, true);
        assert_eq!(strict.authorization().unwrap().authorized_list, vec![author]);
    }

    #[test]
    fn test_require_authorization_needs_email() {
        let mut map = AlbumSignatureMap::new();
        let mut t = terms(true);
        t.contact_email = "  ".into();
        let err = map
            .record_export(&qualification_code("u1"), content("A"), &t)
            .unwrap_err();
        assert!(matches!(err, PermsError::InvalidInput(_)));
        assert!(map.is_empty());
    }

    #[test]
    fn test_contributor_updates_direct_export_author() {
        let author = qualification_code("u1");
        let contributor = qualification_code("u2");
        let mut map = signed_by(&author, false);

        let outcome = map
            .record_export(&contributor, content("Bob"), &ExportTerms::default())
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::Contributor { new_entry: true });
        assert_eq!(map.direct_export_author(), Some(&contributor));
        assert!(map.get(&contributor).unwrap().authorization.is_none());
        assert_eq!(map.contributors(), vec![&contributor]);

        let (orig, _) = map.original_author().unwrap();
        assert_eq!(orig, &author);
    }

    #[test]
    fn test_unauthorized_contributor_denied_without_change() {
        let author = qualification_code("u1");
        let mut map = signed_by(&author, true);
        let before = map.clone();

        let err = map
            .record_export(&qualification_code("u2"), content("Bob"), &terms(true))
            .unwrap_err();
        assert!(matches!(err, PermsError::PermissionDenied(_)));
        assert_eq!(map, before);
    }

    #[test]
    fn test_original_author_refresh_keeps_authorization() {
        let author = qualification_code("u1");
        let contributor = qualification_code("u2");
        let mut map = signed_by(&author, false);
        map.record_export(&contributor, content("Bob"), &ExportTerms::default())
            .unwrap();

        let outcome = map
            .record_export(&author, content("Alice v2"), &ExportTerms::default())
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::OriginalAuthorReexport);
        let entry = map.get(&author).unwrap();
        assert_eq!(entry.name, "Alice v2");
        assert_eq!(
            entry.authorization.as_ref().unwrap().direct_export_author,
            author
        );
    }

    #[test]
    fn test_keep_existing_content() {
        let author = qualification_code("u1");
        let mut map = signed_by(&author, false);
        map.record_export(&author, None, &ExportTerms::default())
            .unwrap();
        assert_eq!(map.get(&author).unwrap().name, "Alice");

        let err = map
            .record_export(&qualification_code("new"), None, &ExportTerms::default())
            .unwrap_err();
        assert!(matches!(err, PermsError::InvalidInput(_)));
    }

    #[test]
    fn test_json_shape() {
        let author = qualification_code("u1");
        let map = signed_by(&author, false);
        let json = serde_json::to_value(&map).unwrap();
        let entry = &json[author.as_str()];
        assert_eq!(entry["name"], "Alice");
        assert_eq!(entry["cardImagePath"], "");
        let auth = &entry["authorization"];
        assert_eq!(auth["requireAuthorization"], false);
        assert_eq!(auth["authorizedList"], serde_json::json!([]));
        assert_eq!(auth["directExportAuthor"], author.as_str());
        assert_eq!(auth["authorizationUUID"], "session-uuid");
        assert!(auth.get("contactAdditional").is_none());

        let back: AlbumSignatureMap = serde_json::from_value(json).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn test_add_authorized_requires_signed_album() {
        let mut map = AlbumSignatureMap::new();
        assert!(matches!(
            map.add_authorized(&qualification_code("u2")),
            Err(PermsError::NotSigned)
        ));
    }

    #[derive(Debug, Clone)]
    enum Step {
        Export(usize),
        Grant(usize),
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            (0usize..4).prop_map(Step::Export),
            (0usize..4).prop_map(Step::Grant),
        ]
    }

    proptest! {
        #[test]
        fn prop_export_history_keeps_invariants(
            require in any::<bool>(),
            steps in proptest::collection::vec(step(), 0..24),
        ) {
            let codes: Vec<_> = (0..4).map(|i| qualification_code(&format!("signer-{i}"))).collect();
            let mut map = signed_by(&codes[0], require);

            for step in steps {
                let before = map.clone();
                let authorized_before = before.authorization().unwrap().authorized_list.clone();
                match step {
                    Step::Export(i) => {
                        let allowed = map.check_authorization(&codes[i]).is_allowed();
                        let result = map.record_export(&codes[i], content("x"), &terms(require));
                        prop_assert_eq!(result.is_ok(), allowed);
                        if !allowed {
                            prop_assert_eq!(&map, &before);
                        }
                    }
                    Step::Grant(i) => {
                        map.add_authorized(&codes[i]).unwrap();
                    }
                }

                prop_assert!(map.validate().is_ok());
                let (author, _) = map.original_author().unwrap();
                prop_assert_eq!(author, &codes[0]);
                let authorized = &map.authorization().unwrap().authorized_list;
                prop_assert!(authorized.starts_with(&authorized_before));
            }
        }
    }
}
