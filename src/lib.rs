//! SCIM 2.0 protocol core for Rust.
//!
//! Implements the subsystems that give SCIM (RFC 7643/7644) its identity
//! as a protocol: the filter language, the PATCH-path language, PATCH
//! operation semantics, attribute projection, and the transport-agnostic
//! request dispatcher that binds them together on the server side.
//!
//! # Core Components
//!
//! - [`ScimServer`] - Handler registry plus the dispatch state machine
//! - [`ResourceHandler`] - Trait storage backends implement
//! - [`filter`] - Filter parsing and evaluation
//! - [`patch`] - PATCH path parsing and operation application
//! - [`projection`] - `attributes` / `excludedAttributes` shaping
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use scim_protocol::{ScimServer, auth::AllowAll, providers::InMemoryHandler};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let server = ScimServer::new("https://example.com/scim/v2", Arc::new(AllowAll));
//! server.register_handler(Arc::new(InMemoryHandler::users()))?;
//! # Ok(())
//! # }
//! ```
//!
//! The engines all operate on one canonical shape: the
//! [`serde_json::Value`] tree (see [`document`]). SCIM is open-ended:
//! clients may send schema extensions the server has never seen, so the
//! tree, not a typed struct, is the representation of record.

pub mod auth;
pub mod config;
pub mod document;
pub mod error;
pub mod filter;
pub mod handler;
pub mod patch;
pub mod projection;
pub mod providers;
pub mod query;
pub mod request;
pub mod response;
pub mod server;
pub mod version;

// Re-export commonly used types for convenience
pub use auth::{AuthContext, Authenticator};
pub use error::{ScimError, ScimResult};
pub use filter::{evaluate, parse_filter, Filter};
pub use handler::ResourceHandler;
pub use patch::{parse_path, PatchApplicator, PatchOperation, PatchRequest};
pub use query::{Query, SortOrder};
pub use request::{HttpMethod, RequestContext, ScimRequest};
pub use response::{ListResponse, ScimResponse};
pub use server::{RequestTarget, ScimServer};
pub use version::Version;
