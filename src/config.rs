//! Service-provider configuration and server limits.
//!
//! [`ServiceProviderConfig`] is the RFC 7643 §5 discovery document served
//! at `/ServiceProviderConfig`; [`ScimLimits`] carries the two paging
//! knobs the query parser needs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ScimError, ScimResult};

/// Paging limits applied by the query parser.
#[derive(Debug, Clone, Copy)]
pub struct ScimLimits {
    /// Largest page a client may request. Exceeding it is `tooMany`.
    pub max_results: usize,
    /// Page size when the request carries no `count`.
    pub default_page_size: usize,
}

impl Default for ScimLimits {
    fn default() -> Self {
        Self {
            max_results: 200,
            default_page_size: 50,
        }
    }
}

/// A feature toggle inside the service-provider configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FeatureSupport {
    pub supported: bool,
}

impl FeatureSupport {
    pub fn supported() -> Self {
        Self { supported: true }
    }

    pub fn unsupported() -> Self {
        Self { supported: false }
    }
}

/// Filter capability block: support flag plus the page ceiling.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FilterSupport {
    pub supported: bool,
    #[serde(rename = "maxResults")]
    pub max_results: usize,
}

/// Bulk capability block. The core does not implement bulk, so the
/// defaults advertise it as unsupported with zero limits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BulkSupport {
    pub supported: bool,
    #[serde(rename = "maxOperations")]
    pub max_operations: usize,
    #[serde(rename = "maxPayloadSize")]
    pub max_payload_size: usize,
}

/// An advertised authentication scheme.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticationScheme {
    #[serde(rename = "type")]
    pub scheme_type: String,
    pub name: String,
    pub description: String,
}

impl AuthenticationScheme {
    pub fn bearer() -> Self {
        Self {
            scheme_type: "oauthbearertoken".into(),
            name: "OAuth Bearer Token".into(),
            description: "Authentication scheme using the OAuth Bearer Token standard".into(),
        }
    }
}

/// The `/ServiceProviderConfig` discovery document (RFC 7643 §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceProviderConfig {
    pub schemas: Vec<String>,
    #[serde(rename = "documentationUri", skip_serializing_if = "Option::is_none")]
    pub documentation_uri: Option<String>,
    pub patch: FeatureSupport,
    pub bulk: BulkSupport,
    pub filter: FilterSupport,
    #[serde(rename = "changePassword")]
    pub change_password: FeatureSupport,
    pub sort: FeatureSupport,
    pub etag: FeatureSupport,
    #[serde(rename = "authenticationSchemes")]
    pub authentication_schemes: Vec<AuthenticationScheme>,
}

/// Schema URI of the ServiceProviderConfig resource.
pub const SERVICE_PROVIDER_CONFIG_URN: &str =
    "urn:ietf:params:scim:schemas:core:2.0:ServiceProviderConfig";

/// Schema URI of the ResourceType resource.
pub const RESOURCE_TYPE_URN: &str = "urn:ietf:params:scim:schemas:core:2.0:ResourceType";

/// Schema URI of the Schema resource.
pub const SCHEMA_URN: &str = "urn:ietf:params:scim:schemas:core:2.0:Schema";

impl ServiceProviderConfig {
    /// Configuration describing exactly what this core supports: patch,
    /// filter, sort, and etag, with bulk and password changes off.
    pub fn new(limits: ScimLimits) -> Self {
        Self {
            schemas: vec![SERVICE_PROVIDER_CONFIG_URN.to_string()],
            documentation_uri: None,
            patch: FeatureSupport::supported(),
            bulk: BulkSupport {
                supported: false,
                max_operations: 0,
                max_payload_size: 0,
            },
            filter: FilterSupport {
                supported: true,
                max_results: limits.max_results,
            },
            change_password: FeatureSupport::unsupported(),
            sort: FeatureSupport::supported(),
            etag: FeatureSupport::supported(),
            authentication_schemes: vec![AuthenticationScheme::bearer()],
        }
    }

    /// Render as a document, with `meta` stamped for the given base URL.
    pub fn to_document(&self, base_url: &str) -> ScimResult<Value> {
        let mut doc = serde_json::to_value(self)
            .map_err(|e| ScimError::internal(format!("config serialization failed: {}", e)))?;
        if let Some(obj) = doc.as_object_mut() {
            obj.insert(
                "meta".into(),
                serde_json::json!({
                    "resourceType": "ServiceProviderConfig",
                    "location": format!("{}/ServiceProviderConfig", base_url),
                }),
            );
        }
        Ok(doc)
    }
}

impl Default for ServiceProviderConfig {
    fn default() -> Self {
        Self::new(ScimLimits::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_advertises_core_features() {
        let doc = ServiceProviderConfig::default()
            .to_document("https://example.com/scim/v2")
            .unwrap();
        assert_eq!(doc["patch"]["supported"], true);
        assert_eq!(doc["bulk"]["supported"], false);
        assert_eq!(doc["filter"]["maxResults"], 200);
        assert_eq!(doc["changePassword"]["supported"], false);
        assert_eq!(
            doc["meta"]["location"],
            "https://example.com/scim/v2/ServiceProviderConfig"
        );
    }
}
