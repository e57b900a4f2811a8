//! Error types for the SCIM protocol core.
//!
//! One enum covers the full RFC 7644 error taxonomy. Parsers, evaluators,
//! the PATCH applicator, and resource handlers all fail fast with a typed
//! variant carrying a human-readable detail string; only the dispatcher
//! converts errors into the wire envelope (see [`crate::response`]).

/// Error type for every fallible operation in the protocol core.
///
/// Variants map one-to-one onto the SCIM error taxonomy: input errors
/// (400 class), identity errors (401/403), state errors (404/409), and
/// internal errors (500).
#[derive(Debug, thiserror::Error)]
pub enum ScimError {
    /// A filter string violated the RFC 7644 §3.4.2.2 grammar.
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// An attribute path violated the RFC 7644 §3.5.2 grammar.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// A PATCH operation had no resolvable target.
    #[error("No target: {0}")]
    NoTarget(String),

    /// A PATCH operation carried a missing or malformed value.
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// The request body or structure could not be parsed.
    #[error("Invalid syntax: {0}")]
    InvalidSyntax(String),

    /// An attempt to modify an immutable or readOnly attribute.
    #[error("Mutability violation: {0}")]
    Mutability(String),

    /// The requested page size exceeds the server's maximum.
    #[error("Too many results requested: {0}")]
    TooMany(String),

    /// Malformed request outside the more specific 400 variants.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Authentication failed or was not supplied.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The authenticated identity may not perform this operation.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The resource (or endpoint) does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint was violated.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The supplied version (ETag) does not match the stored resource.
    #[error("Version mismatch: {0}")]
    InvalidVersion(String),

    /// Any unexpected failure. The detail must not leak internals.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScimError {
    /// HTTP status code for this error per the spec mapping.
    pub fn status(&self) -> u16 {
        match self {
            Self::InvalidFilter(_)
            | Self::InvalidPath(_)
            | Self::NoTarget(_)
            | Self::InvalidValue(_)
            | Self::InvalidSyntax(_)
            | Self::Mutability(_)
            | Self::TooMany(_)
            | Self::InvalidVersion(_)
            | Self::BadRequest(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::Internal(_) => 500,
        }
    }

    /// The `scimType` keyword for the error envelope, where RFC 7644
    /// defines one. `NotFound`, identity errors, and internal errors
    /// carry no `scimType`.
    pub fn scim_type(&self) -> Option<&'static str> {
        match self {
            Self::InvalidFilter(_) => Some("invalidFilter"),
            Self::InvalidPath(_) => Some("invalidPath"),
            Self::NoTarget(_) => Some("noTarget"),
            Self::InvalidValue(_) => Some("invalidValue"),
            Self::InvalidSyntax(_) | Self::BadRequest(_) => Some("invalidSyntax"),
            Self::Mutability(_) => Some("mutability"),
            Self::TooMany(_) => Some("tooMany"),
            Self::Conflict(_) => Some("uniqueness"),
            Self::InvalidVersion(_) => Some("invalidVers"),
            Self::Unauthorized(_)
            | Self::Forbidden(_)
            | Self::NotFound(_)
            | Self::Internal(_) => None,
        }
    }

    /// Human-readable detail for the error envelope.
    pub fn detail(&self) -> String {
        self.to_string()
    }

    /// Create an internal error, hiding the source from the wire detail.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a not-found error for a resource id within an endpoint.
    pub fn resource_not_found(endpoint: &str, id: &str) -> Self {
        Self::NotFound(format!("Resource {}/{} does not exist", endpoint, id))
    }
}

impl From<serde_json::Error> for ScimError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidSyntax(format!("malformed JSON body: {}", err))
    }
}

/// Result alias used throughout the crate.
pub type ScimResult<T> = Result<T, ScimError>;
