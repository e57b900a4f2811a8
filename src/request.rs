//! Transport-facing request types.
//!
//! The core never sees an HTTP framework; any transport that can present
//! a request as method + path + query pairs + headers + body bytes can
//! drive the dispatcher. [`RequestContext`] is the immutable per-request
//! state threaded through handlers.

use std::collections::HashMap;

use uuid::Uuid;

use crate::auth::AuthContext;

/// HTTP methods the router understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "GET" => Some(Self::Get),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "PATCH" => Some(Self::Patch),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

/// A transport-agnostic SCIM request.
#[derive(Debug, Clone)]
pub struct ScimRequest {
    pub method: HttpMethod,
    /// Path below the SCIM base URL, e.g. `/Users/2819c223`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl ScimRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_json_body(self, body: &serde_json::Value) -> Self {
        let bytes = serde_json::to_vec(body).unwrap_or_default();
        self.with_body(bytes)
    }

    /// First header with the given name, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Query parameters as a map. Later duplicates win.
    pub fn query_map(&self) -> HashMap<String, String> {
        self.query
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Immutable per-request state: who is calling, where the service lives,
/// and a correlation id for logging.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub auth: AuthContext,
    base_url: String,
}

impl RequestContext {
    /// Context with a generated request id.
    pub fn new(auth: AuthContext, base_url: impl Into<String>) -> Self {
        Self::with_request_id(Uuid::new_v4().to_string(), auth, base_url)
    }

    /// Context with a caller-supplied request id (e.g. from a tracing
    /// header).
    pub fn with_request_id(
        request_id: impl Into<String>,
        auth: AuthContext,
        base_url: impl Into<String>,
    ) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            request_id: request_id.into(),
            auth,
            base_url,
        }
    }

    /// The tenant tag, when the authenticator produced one.
    pub fn tenant_id(&self) -> Option<&str> {
        self.auth.tenant_id.as_deref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL of a resource under this service.
    pub fn location_for(&self, endpoint: &str, id: &str) -> String {
        format!("{}/{}/{}", self.base_url, endpoint, id)
    }

    /// Absolute URL of a collection endpoint.
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_is_case_insensitive() {
        let request = ScimRequest::new(HttpMethod::Get, "/Users")
            .with_header("Authorization", "Bearer t");
        assert_eq!(request.header("authorization"), Some("Bearer t"));
        assert_eq!(request.header("x-missing"), None);
    }

    #[test]
    fn context_normalizes_base_url() {
        let ctx = RequestContext::new(AuthContext::anonymous(), "https://example.com/scim/v2/");
        assert_eq!(ctx.base_url(), "https://example.com/scim/v2");
        assert_eq!(
            ctx.location_for("Users", "abc"),
            "https://example.com/scim/v2/Users/abc"
        );
    }

    #[test]
    fn method_names_round_trip() {
        for name in ["GET", "POST", "PUT", "PATCH", "DELETE"] {
            let method = HttpMethod::from_name(name).unwrap();
            assert_eq!(method.name(), name);
        }
        assert_eq!(HttpMethod::from_name("patch"), Some(HttpMethod::Patch));
        assert_eq!(HttpMethod::from_name("TRACE"), None);
    }
}
