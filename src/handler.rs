//! The contract between the dispatcher and storage.
//!
//! A [`ResourceHandler`] owns one resource type: it assigns ids, stamps
//! `meta`, enforces uniqueness (raising `Conflict`), applies mutability
//! rules, and paginates search results. The dispatcher holds handlers
//! type-erased (`Arc<dyn ResourceHandler>`) and speaks to them purely in
//! documents; whatever typed model a handler uses internally is its own
//! business.
//!
//! `patch` has a provided default (get, apply, replace). Handlers backed
//! by stores with native conditional updates should override it for
//! atomicity; the default is last-writer-wins between the get and the
//! replace.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ScimResult;
use crate::patch::{PatchApplicator, PatchOperation};
use crate::query::Query;
use crate::request::RequestContext;
use crate::response::ListResponse;

#[async_trait]
pub trait ResourceHandler: Send + Sync {
    /// Resource type name, e.g. `User`.
    fn resource_type(&self) -> &str;

    /// URL collection segment, e.g. `Users`.
    fn endpoint(&self) -> &str;

    /// Primary schema URI of resources served by this handler.
    fn schema_uri(&self) -> &str;

    /// Create a resource from a request body. The handler assigns the
    /// id and stamps `meta`; a client-supplied id is ignored.
    async fn create(&self, data: Value, context: &RequestContext) -> ScimResult<Value>;

    /// Fetch a resource by id, or `NotFound`.
    async fn get(&self, id: &str, context: &RequestContext) -> ScimResult<Value>;

    /// Replace a resource wholesale, preserving id and creation time.
    async fn replace(&self, id: &str, data: Value, context: &RequestContext) -> ScimResult<Value>;

    /// Delete a resource by id, or `NotFound`.
    async fn delete(&self, id: &str, context: &RequestContext) -> ScimResult<()>;

    /// Evaluate a query into one page of results.
    async fn search(&self, query: &Query, context: &RequestContext) -> ScimResult<ListResponse>;

    /// Apply PATCH operations to a resource and return the result.
    async fn patch(
        &self,
        id: &str,
        operations: &[PatchOperation],
        context: &RequestContext,
    ) -> ScimResult<Value> {
        let mut current = self.get(id, context).await?;
        PatchApplicator::new().apply(&mut current, operations)?;
        self.replace(id, current, context).await
    }
}
