//! Thread-safe in-memory resource handler.
//!
//! Demonstrates every handler duty: id assignment, `meta` stamping with
//! content-addressed versions, uniqueness enforcement, the single-primary
//! invariant on multi-valued attributes, and filter/sort/paginate for
//! search. Resources live in a `HashMap` behind an async lock; nothing
//! is persisted.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use log::debug;
use serde_json::{json, Map, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::document::{descend, get_attr_ci};
use crate::error::{ScimError, ScimResult};
use crate::filter::evaluate;
use crate::handler::ResourceHandler;
use crate::patch::parse_path;
use crate::query::{Query, SortOrder};
use crate::request::RequestContext;
use crate::response::ListResponse;
use crate::version::Version;

/// In-memory [`ResourceHandler`] for one resource type.
pub struct InMemoryHandler {
    resource_type: String,
    endpoint: String,
    schema_uri: String,
    /// Attribute whose value must be unique across the collection,
    /// compared case-insensitively (e.g. `userName`).
    unique_attribute: Option<String>,
    resources: RwLock<HashMap<String, Value>>,
}

impl InMemoryHandler {
    pub fn new(
        resource_type: impl Into<String>,
        endpoint: impl Into<String>,
        schema_uri: impl Into<String>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            endpoint: endpoint.into(),
            schema_uri: schema_uri.into(),
            unique_attribute: None,
            resources: RwLock::new(HashMap::new()),
        }
    }

    /// A handler for the core `User` schema with unique `userName`s.
    pub fn users() -> Self {
        Self::new("User", "Users", "urn:ietf:params:scim:schemas:core:2.0:User")
            .with_unique_attribute("userName")
    }

    /// A handler for the core `Group` schema.
    pub fn groups() -> Self {
        Self::new(
            "Group",
            "Groups",
            "urn:ietf:params:scim:schemas:core:2.0:Group",
        )
    }

    pub fn with_unique_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.unique_attribute = Some(attribute.into());
        self
    }

    /// Number of stored resources, mostly for tests.
    pub async fn len(&self) -> usize {
        self.resources.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.resources.read().await.is_empty()
    }

    fn prepare(
        &self,
        mut data: Value,
        id: &str,
        created: Option<Value>,
        context: &RequestContext,
    ) -> ScimResult<Value> {
        let obj = data
            .as_object_mut()
            .ok_or_else(|| ScimError::InvalidValue("resource must be a JSON object".into()))?;

        // Server-controlled members: whatever the client sent is dropped.
        obj.remove("meta");
        obj.insert("id".into(), json!(id));
        if !obj
            .get("schemas")
            .and_then(Value::as_array)
            .map(|s| !s.is_empty())
            .unwrap_or(false)
        {
            obj.insert("schemas".into(), json!([self.schema_uri]));
        }

        normalize_primaries(obj);

        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let created = created.unwrap_or_else(|| json!(now));
        let version = Version::of_document(&data);
        let obj = data
            .as_object_mut()
            .ok_or_else(|| ScimError::internal("resource lost its shape"))?;
        obj.insert(
            "meta".into(),
            json!({
                "resourceType": self.resource_type,
                "created": created,
                "lastModified": now,
                "location": context.location_for(&self.endpoint, id),
                "version": version.to_etag(),
            }),
        );
        Ok(data)
    }

    /// Uniqueness check against every resource except `exclude_id`.
    fn check_unique(
        &self,
        resources: &HashMap<String, Value>,
        candidate: &Value,
        exclude_id: &str,
    ) -> ScimResult<()> {
        let Some(attribute) = &self.unique_attribute else {
            return Ok(());
        };
        let Some(value) = candidate
            .as_object()
            .and_then(|obj| get_attr_ci(obj, attribute))
            .and_then(Value::as_str)
        else {
            return Ok(());
        };
        for (id, existing) in resources {
            if id == exclude_id {
                continue;
            }
            let taken = existing
                .as_object()
                .and_then(|obj| get_attr_ci(obj, attribute))
                .and_then(Value::as_str)
                .map(|other| other.eq_ignore_ascii_case(value))
                .unwrap_or(false);
            if taken {
                return Err(ScimError::Conflict(format!(
                    "{} {:?} is already taken",
                    attribute, value
                )));
            }
        }
        Ok(())
    }
}

/// Enforce the single-primary invariant: within each multi-valued
/// attribute, at most one element keeps `primary == true`; the first
/// wins and later ones are demoted.
fn normalize_primaries(obj: &mut Map<String, Value>) {
    for value in obj.values_mut() {
        let Some(items) = value.as_array_mut() else {
            continue;
        };
        let mut seen_primary = false;
        for item in items {
            let Some(element) = item.as_object_mut() else {
                continue;
            };
            let is_primary = get_attr_ci(element, "primary")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if is_primary {
                if seen_primary {
                    element.insert("primary".into(), json!(false));
                } else {
                    seen_primary = true;
                }
            }
        }
    }
}

/// Resolve a dotted sort path against a document. Arrays sort by their
/// first element.
fn sort_key<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let parsed = parse_path(path).ok()?;
    let obj = doc.as_object()?;
    let mut current = get_attr_ci(obj, &parsed.attribute)?;
    if let Value::Array(items) = current {
        current = items.first()?;
    }
    let resolved = descend(current, &parsed.sub_attributes)?;
    match resolved {
        Value::Array(items) => items.first(),
        other => Some(other),
    }
}

fn compare_sort_values(a: Option<&Value>, b: Option<&Value>) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (None, None) => Ordering::Equal,
        // Missing values sort last in ascending order.
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => match (a, b) {
            (Value::Number(x), Value::Number(y)) => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .unwrap_or(Ordering::Equal),
            (Value::String(x), Value::String(y)) => {
                x.to_lowercase().cmp(&y.to_lowercase())
            }
            (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
            _ => Ordering::Equal,
        },
    }
}

#[async_trait]
impl ResourceHandler for InMemoryHandler {
    fn resource_type(&self) -> &str {
        &self.resource_type
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn schema_uri(&self) -> &str {
        &self.schema_uri
    }

    async fn create(&self, data: Value, context: &RequestContext) -> ScimResult<Value> {
        let id = Uuid::new_v4().to_string();
        let resource = self.prepare(data, &id, None, context)?;

        let mut resources = self.resources.write().await;
        self.check_unique(&resources, &resource, &id)?;
        resources.insert(id.clone(), resource.clone());
        debug!(
            "created {} {} (request: {})",
            self.resource_type, id, context.request_id
        );
        Ok(resource)
    }

    async fn get(&self, id: &str, _context: &RequestContext) -> ScimResult<Value> {
        self.resources
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| ScimError::resource_not_found(&self.endpoint, id))
    }

    async fn replace(&self, id: &str, data: Value, context: &RequestContext) -> ScimResult<Value> {
        let mut resources = self.resources.write().await;
        let created = resources
            .get(id)
            .ok_or_else(|| ScimError::resource_not_found(&self.endpoint, id))?
            .as_object()
            .and_then(|obj| get_attr_ci(obj, "meta"))
            .and_then(|meta| meta.get("created"))
            .cloned();

        let resource = self.prepare(data, id, created, context)?;
        self.check_unique(&resources, &resource, id)?;
        resources.insert(id.to_string(), resource.clone());
        debug!(
            "replaced {} {} (request: {})",
            self.resource_type, id, context.request_id
        );
        Ok(resource)
    }

    async fn delete(&self, id: &str, context: &RequestContext) -> ScimResult<()> {
        let removed = self.resources.write().await.remove(id);
        if removed.is_none() {
            return Err(ScimError::resource_not_found(&self.endpoint, id));
        }
        debug!(
            "deleted {} {} (request: {})",
            self.resource_type, id, context.request_id
        );
        Ok(())
    }

    async fn search(&self, query: &Query, _context: &RequestContext) -> ScimResult<ListResponse> {
        let resources = self.resources.read().await;
        let mut matched: Vec<Value> = resources
            .values()
            .filter(|doc| match &query.filter {
                Some(filter) => evaluate(filter, doc),
                None => true,
            })
            .cloned()
            .collect();

        match &query.sort_by {
            Some(path) => {
                matched.sort_by(|a, b| {
                    let ordering = compare_sort_values(sort_key(a, path), sort_key(b, path));
                    match query.sort_order {
                        SortOrder::Ascending => ordering,
                        SortOrder::Descending => ordering.reverse(),
                    }
                });
            }
            // Deterministic pagination without a sort key.
            None => matched.sort_by(|a, b| {
                let id_of = |doc: &Value| {
                    doc.get("id")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string()
                };
                id_of(a).cmp(&id_of(b))
            }),
        }

        let total = matched.len();
        let page: Vec<Value> = matched
            .into_iter()
            .skip(query.offset())
            .take(query.count)
            .collect();
        Ok(ListResponse::new(total, query.start_index, page))
    }
}
