//! Authentication boundary.
//!
//! Token acquisition and scheme negotiation live outside the core; the
//! dispatcher only needs something that turns an inbound request into an
//! opaque [`AuthContext`] or an `Unauthorized` error. Validation may
//! suspend (e.g. remote token introspection), so the trait is async.

use std::collections::HashMap;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use crate::error::{ScimError, ScimResult};
use crate::request::ScimRequest;

/// The opaque identity the core threads through a request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Stable identifier of the authenticated caller.
    pub subject: String,
    /// Tenant tag, passed through to handlers untouched.
    pub tenant_id: Option<String>,
}

impl AuthContext {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            tenant_id: None,
        }
    }

    pub fn with_tenant(subject: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            tenant_id: Some(tenant_id.into()),
        }
    }

    /// The context produced by [`AllowAll`].
    pub fn anonymous() -> Self {
        Self::new("anonymous")
    }
}

/// Validates inbound requests. Implementations may suspend.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, request: &ScimRequest) -> ScimResult<AuthContext>;
}

/// Accepts every request as an anonymous caller. For tests and for
/// deployments that terminate authentication upstream.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl Authenticator for AllowAll {
    async fn authenticate(&self, _request: &ScimRequest) -> ScimResult<AuthContext> {
        Ok(AuthContext::anonymous())
    }
}

/// Bearer-token validation against a registered token table.
///
/// Tokens are stored as SHA-256 digests, never raw; the table is behind
/// an async lock so registration can happen while requests are in
/// flight.
#[derive(Debug, Default)]
pub struct BearerTokenAuthenticator {
    tokens: RwLock<HashMap<String, AuthContext>>,
}

impl BearerTokenAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token for the given identity.
    pub async fn register_token(&self, token: &str, context: AuthContext) {
        let mut tokens = self.tokens.write().await;
        tokens.insert(digest(token), context);
    }

    /// Drop a token. Requests carrying it fail from now on.
    pub async fn revoke_token(&self, token: &str) {
        let mut tokens = self.tokens.write().await;
        tokens.remove(&digest(token));
    }
}

fn digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[async_trait]
impl Authenticator for BearerTokenAuthenticator {
    async fn authenticate(&self, request: &ScimRequest) -> ScimResult<AuthContext> {
        let header = request
            .header("Authorization")
            .ok_or_else(|| ScimError::Unauthorized("missing Authorization header".into()))?;
        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .ok_or_else(|| ScimError::Unauthorized("expected a Bearer token".into()))?;

        let tokens = self.tokens.read().await;
        tokens
            .get(&digest(token.trim()))
            .cloned()
            .ok_or_else(|| ScimError::Unauthorized("unknown token".into()))
    }
}
