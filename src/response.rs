//! Wire envelopes and the response builder.
//!
//! The dispatcher is the only layer that turns typed errors into the
//! SCIM error envelope; everything below it propagates `ScimError`
//! untouched. Success bodies are documents or [`ListResponse`]s,
//! serialized as `application/scim+json` with `Location` and `ETag`
//! headers where applicable.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::document::get_attr_ci;
use crate::error::{ScimError, ScimResult};

/// Content type of every SCIM body (identical to `application/json` on
/// the wire).
pub const SCIM_CONTENT_TYPE: &str = "application/scim+json";

/// Schema URI of the list response message.
pub const LIST_RESPONSE_URN: &str = "urn:ietf:params:scim:api:messages:2.0:ListResponse";

/// Schema URI of the error message.
pub const ERROR_URN: &str = "urn:ietf:params:scim:api:messages:2.0:Error";

/// Schema URI of the search request message.
pub const SEARCH_REQUEST_URN: &str = "urn:ietf:params:scim:api:messages:2.0:SearchRequest";

/// The RFC 7644 list response envelope. Note the capitalized
/// `Resources` member is mandated by SCIM, not a stylistic choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse {
    pub schemas: Vec<String>,
    #[serde(rename = "totalResults")]
    pub total_results: usize,
    #[serde(rename = "startIndex")]
    pub start_index: usize,
    #[serde(rename = "itemsPerPage")]
    pub items_per_page: usize,
    #[serde(rename = "Resources", default)]
    pub resources: Vec<Value>,
}

impl ListResponse {
    pub fn new(total_results: usize, start_index: usize, resources: Vec<Value>) -> Self {
        Self {
            schemas: vec![LIST_RESPONSE_URN.to_string()],
            total_results,
            start_index,
            items_per_page: resources.len(),
            resources,
        }
    }
}

/// A transport-agnostic response: status, headers, optional body.
#[derive(Debug, Clone)]
pub struct ScimResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl ScimResponse {
    /// A resource body. Pulls `ETag` from `meta.version` and `Location`
    /// from `meta.location`, falling back to the given location.
    pub fn resource(status: u16, doc: &Value, fallback_location: Option<String>) -> ScimResult<Self> {
        let mut headers = vec![content_type_header()];
        if let Some(meta) = doc.as_object().and_then(|obj| get_attr_ci(obj, "meta")) {
            if let Some(version) = meta.get("version").and_then(Value::as_str) {
                headers.push(("ETag".into(), version.to_string()));
            }
        }
        let location = doc
            .as_object()
            .and_then(|obj| get_attr_ci(obj, "meta"))
            .and_then(|meta| meta.get("location"))
            .and_then(Value::as_str)
            .map(String::from)
            .or(fallback_location);
        if let Some(location) = location {
            headers.push(("Location".into(), location));
        }
        Ok(Self {
            status,
            headers,
            body: Some(serde_json::to_vec(doc).map_err(|e| {
                ScimError::internal(format!("response serialization failed: {}", e))
            })?),
        })
    }

    /// A `200` list response.
    pub fn list(list: &ListResponse) -> ScimResult<Self> {
        Ok(Self {
            status: 200,
            headers: vec![content_type_header()],
            body: Some(serde_json::to_vec(list).map_err(|e| {
                ScimError::internal(format!("response serialization failed: {}", e))
            })?),
        })
    }

    /// A bare JSON body at the given status.
    pub fn json(status: u16, body: &Value) -> ScimResult<Self> {
        Ok(Self {
            status,
            headers: vec![content_type_header()],
            body: Some(serde_json::to_vec(body).map_err(|e| {
                ScimError::internal(format!("response serialization failed: {}", e))
            })?),
        })
    }

    /// The empty `204` used by DELETE.
    pub fn no_content() -> Self {
        Self {
            status: 204,
            headers: Vec::new(),
            body: None,
        }
    }

    /// The SCIM error envelope for a typed error, at its mapped status.
    /// Headers never carry diagnostic content; the body is the only
    /// place detail appears.
    pub fn error(err: &ScimError) -> Self {
        let status = err.status();
        let mut envelope = json!({
            "schemas": [ERROR_URN],
            "status": status.to_string(),
            "detail": err.detail(),
        });
        if let (Some(scim_type), Some(obj)) = (err.scim_type(), envelope.as_object_mut()) {
            obj.insert("scimType".into(), json!(scim_type));
        }
        Self {
            status,
            headers: vec![content_type_header()],
            body: Some(serde_json::to_vec(&envelope).unwrap_or_else(|_| b"{}".to_vec())),
        }
    }

    /// First header with the given name, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Decode the body as JSON, mostly for tests and clients.
    pub fn body_json(&self) -> Option<Value> {
        self.body
            .as_deref()
            .and_then(|bytes| serde_json::from_slice(bytes).ok())
    }
}

fn content_type_header() -> (String, String) {
    ("Content-Type".into(), SCIM_CONTENT_TYPE.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_response_carries_etag_and_location() {
        let doc = json!({
            "id": "abc",
            "meta": {
                "version": "W/\"v1\"",
                "location": "https://example.com/v2/Users/abc",
            },
        });
        let response = ScimResponse::resource(200, &doc, None).unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.header("ETag"), Some("W/\"v1\""));
        assert_eq!(
            response.header("Location"),
            Some("https://example.com/v2/Users/abc")
        );
        assert_eq!(response.header("Content-Type"), Some(SCIM_CONTENT_TYPE));
    }

    #[test]
    fn fallback_location_applies_without_meta() {
        let doc = json!({"id": "abc"});
        let response =
            ScimResponse::resource(201, &doc, Some("https://x/Users/abc".into())).unwrap();
        assert_eq!(response.header("Location"), Some("https://x/Users/abc"));
        assert_eq!(response.header("ETag"), None);
    }

    #[test]
    fn list_envelope_shape() {
        let list = ListResponse::new(12, 3, vec![json!({"id": "1"}), json!({"id": "2"})]);
        let body = ScimResponse::list(&list).unwrap().body_json().unwrap();
        assert_eq!(body["schemas"][0], LIST_RESPONSE_URN);
        assert_eq!(body["totalResults"], 12);
        assert_eq!(body["startIndex"], 3);
        assert_eq!(body["itemsPerPage"], 2);
        assert_eq!(body["Resources"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn error_envelope_shape() {
        let response = ScimResponse::error(&ScimError::InvalidFilter("bad".into()));
        assert_eq!(response.status, 400);
        let body = response.body_json().unwrap();
        assert_eq!(body["schemas"][0], ERROR_URN);
        assert_eq!(body["status"], "400");
        assert_eq!(body["scimType"], "invalidFilter");
        assert!(body["detail"].as_str().unwrap().contains("bad"));
    }

    #[test]
    fn not_found_has_no_scim_type() {
        let response = ScimResponse::error(&ScimError::NotFound("nope".into()));
        assert_eq!(response.status, 404);
        let body = response.body_json().unwrap();
        assert!(body.get("scimType").is_none());
    }

    #[test]
    fn no_content_is_bodiless() {
        let response = ScimResponse::no_content();
        assert_eq!(response.status, 204);
        assert!(response.body.is_none());
        assert!(response.headers.is_empty());
    }
}
