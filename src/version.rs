//! Resource versions and ETags.
//!
//! A [`Version`] is an opaque revision identifier carried in
//! `meta.version` and the HTTP `ETag` header. Versions are computed
//! deterministically from resource content (SHA-256, base64) so two
//! stores holding the same bytes agree on the revision, and rendered in
//! the weak form `W/"..."`, since SCIM resources are semantically, not
//! byte-wise, equal.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::{ScimError, ScimResult};

/// Opaque resource version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version(String);

impl Version {
    /// Version of raw content bytes.
    pub fn from_content(content: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content);
        Self(BASE64.encode(hasher.finalize()))
    }

    /// Version of a document, ignoring its `meta` attribute (the version
    /// lives inside `meta`, so hashing it would be circular).
    pub fn of_document(doc: &Value) -> Self {
        let content = match doc.as_object() {
            Some(obj) => {
                let mut copy = obj.clone();
                copy.remove("meta");
                serde_json::to_vec(&Value::Object(copy)).unwrap_or_default()
            }
            None => serde_json::to_vec(doc).unwrap_or_default(),
        };
        Self::from_content(&content)
    }

    /// Adopt a provider-supplied opaque version string.
    pub fn opaque(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Parse an `ETag`/`If-Match` header value. Accepts weak and strong
    /// forms; bare strings pass through as opaque versions.
    pub fn parse_etag(header: &str) -> ScimResult<Self> {
        let trimmed = header.trim();
        let unprefixed = trimmed
            .strip_prefix("W/")
            .or_else(|| trimmed.strip_prefix("w/"))
            .unwrap_or(trimmed);
        let value = match unprefixed
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
        {
            Some(inner) => inner,
            None if unprefixed.contains('"') => {
                return Err(ScimError::InvalidVersion(format!(
                    "malformed ETag {:?}",
                    header
                )));
            }
            None => unprefixed,
        };
        if value.is_empty() {
            return Err(ScimError::InvalidVersion("empty ETag".into()));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Weak HTTP ETag form, `W/"..."`.
    pub fn to_etag(&self) -> String {
        format!("W/\"{}\"", self.0)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_etag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn content_versions_are_deterministic() {
        let a = Version::from_content(b"payload");
        let b = Version::from_content(b"payload");
        assert_eq!(a, b);
        assert_ne!(a, Version::from_content(b"other"));
    }

    #[test]
    fn document_version_ignores_meta() {
        let with_meta = json!({"id": "1", "userName": "j", "meta": {"version": "W/\"x\""}});
        let without = json!({"id": "1", "userName": "j"});
        assert_eq!(Version::of_document(&with_meta), Version::of_document(&without));
    }

    #[test]
    fn etag_round_trip() {
        let v = Version::from_content(b"x");
        let parsed = Version::parse_etag(&v.to_etag()).unwrap();
        assert_eq!(v, parsed);
    }

    #[test]
    fn parses_strong_and_bare_forms() {
        assert_eq!(Version::parse_etag("\"abc\"").unwrap().as_str(), "abc");
        assert_eq!(Version::parse_etag("abc").unwrap().as_str(), "abc");
        assert_eq!(Version::parse_etag("W/\"abc\"").unwrap().as_str(), "abc");
    }

    #[test]
    fn rejects_malformed_etags() {
        assert!(Version::parse_etag("").is_err());
        assert!(Version::parse_etag("\"unterminated").is_err());
    }
}
