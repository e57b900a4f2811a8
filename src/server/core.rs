//! Server structure and handler registration.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use log::info;

use crate::auth::Authenticator;
use crate::config::{ScimLimits, ServiceProviderConfig};
use crate::error::{ScimError, ScimResult};
use crate::handler::ResourceHandler;
use crate::request::ScimRequest;
use crate::response::ScimResponse;

/// The SCIM server core: a registry of resource handlers plus the
/// dispatch pipeline binding the parsers and engines together.
///
/// The registry is a read-mostly table; registration after startup is
/// permitted and serialized by the lock. Each request owns its context
/// and document and shares nothing mutable with other requests, so one
/// server value can be driven from any number of transport workers.
pub struct ScimServer {
    base_url: String,
    authenticator: Arc<dyn Authenticator>,
    limits: ScimLimits,
    service_config: ServiceProviderConfig,
    handlers: RwLock<HashMap<String, Arc<dyn ResourceHandler>>>,
}

impl ScimServer {
    /// A server rooted at `base_url` (the absolute URL resource
    /// locations are built from).
    pub fn new(base_url: impl Into<String>, authenticator: Arc<dyn Authenticator>) -> Self {
        Self::with_limits(base_url, authenticator, ScimLimits::default())
    }

    pub fn with_limits(
        base_url: impl Into<String>,
        authenticator: Arc<dyn Authenticator>,
        limits: ScimLimits,
    ) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            authenticator,
            limits,
            service_config: ServiceProviderConfig::new(limits),
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a handler under its endpoint name. Registering the same
    /// endpoint twice is a programming error.
    pub fn register_handler(&self, handler: Arc<dyn ResourceHandler>) -> ScimResult<()> {
        let endpoint = handler.endpoint().to_string();
        let key = endpoint.to_ascii_lowercase();
        let mut handlers = self
            .handlers
            .write()
            .map_err(|_| ScimError::internal("handler registry lock poisoned"))?;
        if handlers.contains_key(&key) {
            return Err(ScimError::internal(format!(
                "endpoint {:?} is already registered",
                endpoint
            )));
        }
        info!(
            "registered resource type {} at /{}",
            handler.resource_type(),
            endpoint
        );
        handlers.insert(key, handler);
        Ok(())
    }

    /// Look up a handler by endpoint name, case-insensitively.
    pub fn handler_for(&self, endpoint: &str) -> Option<Arc<dyn ResourceHandler>> {
        self.handlers
            .read()
            .ok()?
            .get(&endpoint.to_ascii_lowercase())
            .cloned()
    }

    /// Snapshot of all registered handlers, for the metadata endpoints.
    pub(crate) fn handlers_snapshot(&self) -> Vec<Arc<dyn ResourceHandler>> {
        match self.handlers.read() {
            Ok(handlers) => {
                let mut all: Vec<_> = handlers.values().cloned().collect();
                all.sort_by(|a, b| a.endpoint().cmp(b.endpoint()));
                all
            }
            Err(_) => Vec::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn limits(&self) -> &ScimLimits {
        &self.limits
    }

    pub fn service_config(&self) -> &ServiceProviderConfig {
        &self.service_config
    }

    pub(crate) fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    /// Handle one inbound request. Never panics and never returns a
    /// non-SCIM error shape: every failure becomes the error envelope at
    /// its mapped status.
    pub async fn handle(&self, request: ScimRequest) -> ScimResponse {
        super::dispatch::dispatch(self, request).await
    }
}
