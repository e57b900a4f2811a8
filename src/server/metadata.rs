//! Discovery endpoints served from static configuration:
//! `/ServiceProviderConfig`, `/ResourceTypes`, `/Schemas`.

use serde_json::{json, Value};

use super::core::ScimServer;
use crate::error::{ScimError, ScimResult};
use crate::config::{RESOURCE_TYPE_URN, SCHEMA_URN};
use crate::response::{ListResponse, ScimResponse};

pub(super) fn service_provider_config(server: &ScimServer) -> ScimResult<ScimResponse> {
    let doc = server.service_config().to_document(server.base_url())?;
    ScimResponse::json(200, &doc)
}

pub(super) fn resource_types(server: &ScimServer, id: Option<&str>) -> ScimResult<ScimResponse> {
    let descriptors: Vec<Value> = server
        .handlers_snapshot()
        .iter()
        .map(|handler| resource_type_document(server, handler.as_ref()))
        .collect();

    match id {
        None => {
            let total = descriptors.len();
            ScimResponse::list(&ListResponse::new(total, 1, descriptors))
        }
        Some(id) => {
            let found = descriptors
                .into_iter()
                .find(|doc| doc.get("id").and_then(Value::as_str) == Some(id))
                .ok_or_else(|| {
                    ScimError::NotFound(format!("ResourceType {:?} is not registered", id))
                })?;
            ScimResponse::json(200, &found)
        }
    }
}

pub(super) fn schemas(server: &ScimServer, id: Option<&str>) -> ScimResult<ScimResponse> {
    let documents: Vec<Value> = server
        .handlers_snapshot()
        .iter()
        .map(|handler| schema_document(handler.as_ref()))
        .collect();

    match id {
        None => {
            let total = documents.len();
            ScimResponse::list(&ListResponse::new(total, 1, documents))
        }
        Some(id) => {
            let found = documents
                .into_iter()
                .find(|doc| doc.get("id").and_then(Value::as_str) == Some(id))
                .ok_or_else(|| ScimError::NotFound(format!("Schema {:?} is not known", id)))?;
            ScimResponse::json(200, &found)
        }
    }
}

fn resource_type_document(server: &ScimServer, handler: &dyn crate::handler::ResourceHandler) -> Value {
    json!({
        "schemas": [RESOURCE_TYPE_URN],
        "id": handler.resource_type(),
        "name": handler.resource_type(),
        "endpoint": format!("/{}", handler.endpoint()),
        "schema": handler.schema_uri(),
        "meta": {
            "resourceType": "ResourceType",
            "location": format!("{}/ResourceTypes/{}", server.base_url(), handler.resource_type()),
        },
    })
}

/// A minimal schema document. The core carries no attribute-level schema
/// model, so this names the schema without enumerating attributes.
fn schema_document(handler: &dyn crate::handler::ResourceHandler) -> Value {
    json!({
        "schemas": [SCHEMA_URN],
        "id": handler.schema_uri(),
        "name": handler.resource_type(),
        "attributes": [],
    })
}
