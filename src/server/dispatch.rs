//! The request dispatch state machine.
//!
//! For each inbound request: authenticate, parse the target path, serve
//! metadata endpoints from static configuration, look up the resource
//! handler, decode query and body, invoke the handler method, and wrap
//! the result in a [`ScimResponse`] with `Location` and `ETag` headers.
//! This is the only layer that converts typed errors into the wire
//! envelope.

use log::{debug, info, warn};
use serde_json::Value;

use super::core::ScimServer;
use super::metadata;
use crate::error::{ScimError, ScimResult};
use crate::handler::ResourceHandler;
use crate::patch::PatchRequest;
use crate::projection::project;
use crate::query::Query;
use crate::request::{HttpMethod, RequestContext, ScimRequest};
use crate::response::{ListResponse, ScimResponse};

/// The decoded shape of a request path:
/// `/{endpoint}[/{id}[/.search]]` or `/.search`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTarget {
    pub endpoint: Option<String>,
    pub id: Option<String>,
    pub search: bool,
}

impl RequestTarget {
    pub fn parse(path: &str) -> ScimResult<Self> {
        let raw = path.split('?').next().unwrap_or(path);
        let segments: Vec<&str> = raw.split('/').filter(|s| !s.is_empty()).collect();

        let mut target = Self {
            endpoint: None,
            id: None,
            search: false,
        };
        for segment in segments {
            if segment == ".search" {
                if target.search {
                    return Err(ScimError::BadRequest(format!(
                        "malformed request path {:?}",
                        path
                    )));
                }
                target.search = true;
            } else if target.search {
                // nothing may follow a .search segment
                return Err(ScimError::BadRequest(format!(
                    "malformed request path {:?}",
                    path
                )));
            } else if target.endpoint.is_none() {
                target.endpoint = Some(segment.to_string());
            } else if target.id.is_none() {
                target.id = Some(segment.to_string());
            } else {
                return Err(ScimError::BadRequest(format!(
                    "malformed request path {:?}",
                    path
                )));
            }
        }
        Ok(target)
    }
}

pub(super) async fn dispatch(server: &ScimServer, request: ScimRequest) -> ScimResponse {
    match run(server, &request).await {
        Ok(response) => response,
        Err(err) => {
            warn!(
                "{} {} failed: {} (status {})",
                request.method.name(),
                request.path,
                err,
                err.status()
            );
            ScimResponse::error(&err)
        }
    }
}

async fn run(server: &ScimServer, request: &ScimRequest) -> ScimResult<ScimResponse> {
    let auth = server.authenticator().authenticate(request).await?;
    let target = RequestTarget::parse(&request.path)?;
    let context = RequestContext::new(auth, server.base_url());

    info!(
        "{} {} (request: {})",
        request.method.name(),
        request.path,
        context.request_id
    );

    let Some(endpoint) = target.endpoint.as_deref() else {
        // `/.search` (root-level cross-type search) is recognized but
        // out of scope; everything else at the root is malformed.
        return Err(if target.search {
            ScimError::BadRequest("root-level search is not supported".into())
        } else {
            ScimError::BadRequest("request path names no endpoint".into())
        });
    };

    if let Some(response) = serve_metadata(server, request, endpoint, &target)? {
        return Ok(response);
    }

    if endpoint.eq_ignore_ascii_case("Bulk") {
        return Err(ScimError::BadRequest("bulk operations are not supported".into()));
    }

    let handler = server
        .handler_for(endpoint)
        .ok_or_else(|| ScimError::NotFound(format!("no such endpoint: /{}", endpoint)))?;

    let params = request.query_map();

    match (request.method, target.id.as_deref(), target.search) {
        (HttpMethod::Get, None, false) => {
            let query = Query::from_params(&params, server.limits())?;
            let list = handler.search(&query, &context).await?;
            respond_list(list, &query)
        }
        (HttpMethod::Post, None, true) => {
            let body = decode_json_body(request)?;
            let query = Query::from_search_body(&body, server.limits())?;
            let list = handler.search(&query, &context).await?;
            respond_list(list, &query)
        }
        (HttpMethod::Get, Some(id), false) => {
            let resource = handler.get(id, &context).await?;
            respond_resource(200, &resource, handler.as_ref(), Some(id), &context, &params)
        }
        (HttpMethod::Post, None, false) => {
            let body = decode_json_body(request)?;
            let resource = handler.create(body, &context).await?;
            let id = resource.get("id").and_then(Value::as_str);
            respond_resource(201, &resource, handler.as_ref(), id, &context, &params)
        }
        (HttpMethod::Put, Some(id), false) => {
            let body = decode_json_body(request)?;
            let resource = handler.replace(id, body, &context).await?;
            respond_resource(200, &resource, handler.as_ref(), Some(id), &context, &params)
        }
        (HttpMethod::Patch, Some(id), false) => {
            let body = request
                .body
                .as_deref()
                .ok_or_else(|| ScimError::InvalidSyntax("request body is required".into()))?;
            let patch = PatchRequest::from_body(body)?;
            let resource = handler.patch(id, &patch.operations, &context).await?;
            respond_resource(200, &resource, handler.as_ref(), Some(id), &context, &params)
        }
        (HttpMethod::Delete, Some(id), false) => {
            handler.delete(id, &context).await?;
            debug!("deleted {}/{} (request: {})", endpoint, id, context.request_id);
            Ok(ScimResponse::no_content())
        }
        (method, id, search) => Err(ScimError::BadRequest(format!(
            "{} is not supported at this path (id: {}, search: {})",
            method.name(),
            id.is_some(),
            search
        ))),
    }
}

/// Serve the discovery endpoints. `Ok(None)` means the endpoint is a
/// regular resource collection.
fn serve_metadata(
    server: &ScimServer,
    request: &ScimRequest,
    endpoint: &str,
    target: &RequestTarget,
) -> ScimResult<Option<ScimResponse>> {
    let is_metadata = endpoint.eq_ignore_ascii_case("ServiceProviderConfig")
        || endpoint.eq_ignore_ascii_case("ResourceTypes")
        || endpoint.eq_ignore_ascii_case("Schemas");
    if !is_metadata {
        return Ok(None);
    }
    if request.method != HttpMethod::Get || target.search {
        return Err(ScimError::BadRequest(format!(
            "{} only supports GET",
            endpoint
        )));
    }

    let id = target.id.as_deref();
    let response = if endpoint.eq_ignore_ascii_case("ServiceProviderConfig") {
        if id.is_some() {
            return Err(ScimError::BadRequest(
                "ServiceProviderConfig takes no resource id".into(),
            ));
        }
        metadata::service_provider_config(server)?
    } else if endpoint.eq_ignore_ascii_case("ResourceTypes") {
        metadata::resource_types(server, id)?
    } else {
        metadata::schemas(server, id)?
    };
    Ok(Some(response))
}

fn decode_json_body(request: &ScimRequest) -> ScimResult<Value> {
    let body = request
        .body
        .as_deref()
        .ok_or_else(|| ScimError::InvalidSyntax("request body is required".into()))?;
    Ok(serde_json::from_slice(body)?)
}

/// Wrap a single resource, applying the request's projection and
/// attaching `Location` and `ETag` headers.
fn respond_resource(
    status: u16,
    resource: &Value,
    handler: &dyn ResourceHandler,
    id: Option<&str>,
    context: &RequestContext,
    params: &std::collections::HashMap<String, String>,
) -> ScimResult<ScimResponse> {
    let (attributes, excluded) = projection_lists(params);
    let body = project(resource, &attributes, &excluded);
    let fallback = id.map(|id| context.location_for(handler.endpoint(), id));
    // Projection may strip meta from the body; headers still come from
    // the unprojected resource.
    let mut response = ScimResponse::resource(status, &body, fallback.clone())?;
    if response.header("ETag").is_none() {
        if let Some(version) = resource
            .get("meta")
            .and_then(|meta| meta.get("version"))
            .and_then(Value::as_str)
        {
            response.headers.push(("ETag".into(), version.to_string()));
        }
    }
    if response.header("Location").is_none() {
        if let Some(location) = resource
            .get("meta")
            .and_then(|meta| meta.get("location"))
            .and_then(Value::as_str)
            .map(String::from)
            .or(fallback)
        {
            response.headers.push(("Location".into(), location));
        }
    }
    Ok(response)
}

/// Project every entry of a list response.
fn respond_list(list: ListResponse, query: &Query) -> ScimResult<ScimResponse> {
    let resources = list
        .resources
        .iter()
        .map(|doc| project(doc, &query.attributes, &query.excluded_attributes))
        .collect();
    let projected = ListResponse { resources, ..list };
    ScimResponse::list(&projected)
}

fn projection_lists(
    params: &std::collections::HashMap<String, String>,
) -> (Vec<String>, Vec<String>) {
    let split = |raw: &String| {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect::<Vec<_>>()
    };
    (
        params.get("attributes").map(&split).unwrap_or_default(),
        params.get("excludedAttributes").map(&split).unwrap_or_default(),
    )
}
