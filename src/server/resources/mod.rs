mod access;
mod store;

use std::collections::BTreeMap;
use std::sync::Arc;

use actix_web::http::Method;
use actix_web::web::{Bytes, Payload};
use futures_util::StreamExt;
use log::{error, info};
use serde_json::{json, Map, Value};

use crate::types::response::{Collection, Pagination};

use super::operation::Operation;
use super::response::{self, Response};
use super::schema::{
    Schema, API_ROOT_TYPE, VERB_CREATE, VERB_DELETE, VERB_GET, VERB_LIST, VERB_PATCH,
    VERB_UPDATE,
};

pub use access::AccessControl;
pub use store::{merge_patch, MemoryStore, ResourceStore, StoreError};

/// Fields the server renders into every object, never stored.
const RENDERED_FIELDS: [&str; 3] = ["id", "type", "links"];

/// The generic typed resource API over the schemas resolved for the caller.
pub struct ResourceServer {
    store: Arc<dyn ResourceStore>,
    access: AccessControl,
    payload_limit: usize,
}

impl ResourceServer {
    pub fn new(store: Arc<dyn ResourceStore>, payload_limit: usize) -> Self {
        Self {
            store,
            access: AccessControl,
            payload_limit,
        }
    }

    pub fn store(&self) -> &Arc<dyn ResourceStore> {
        &self.store
    }

    /// Reads the whole request body, refusing bodies above the payload
    /// limit.
    pub async fn read_body(&self, mut payload: Payload) -> Result<Bytes, Response> {
        let mut body = Vec::new();
        while let Some(chunk) = payload.next().await {
            let chunk = chunk.map_err(|e| Response::bad_request(format!("read body: {e}")))?;
            if body.len() + chunk.len() > self.payload_limit {
                return Err(Response::payload_too_large());
            }
            body.extend_from_slice(&chunk);
        }
        Ok(Bytes::from(body))
    }

    pub fn handle(&self, op: &Operation, body: Bytes) -> Response {
        let result = if op.type_ == API_ROOT_TYPE {
            self.api_root(op)
        } else {
            self.resource(op, body)
        };
        result.unwrap_or_else(|resp| resp)
    }

    fn api_root(&self, op: &Operation) -> Result<Response, Response> {
        if op.method != Method::GET {
            return Err(Response::method_not_allowed());
        }

        let builder = &op.url_builder;
        let data = op
            .schemas
            .iter()
            .map(|schema| {
                json!({
                    "id": schema.id,
                    "type": "schema",
                    "pluralName": schema.plural_name,
                    "namespaced": schema.namespaced,
                    "attributes": schema.attributes,
                    "resourceMethods": schema.resource_methods(),
                    "collectionMethods": schema.collection_methods(),
                    "links": {
                        "collection": builder.collection(schema),
                    },
                })
            })
            .collect();

        Ok(Response::json(Collection {
            type_: String::from("collection"),
            resource_type: String::from("schema"),
            links: BTreeMap::from([
                (String::from("self"), builder.current().to_string()),
                (String::from("root"), builder.api_root()),
            ]),
            pagination: None,
            data,
        }))
    }

    fn resource(&self, op: &Operation, body: Bytes) -> Result<Response, Response> {
        let schema = match op.schemas.lookup(&op.type_) {
            Some(schema) => schema,
            None => return Err(Response::not_found()),
        };
        if !op.link.is_empty() || !op.action.is_empty() {
            return Err(Response::not_found());
        }

        let id = op.id();
        let verb = match (&op.method, id.is_some()) {
            (&Method::GET, false) => VERB_LIST,
            (&Method::GET, true) => VERB_GET,
            (&Method::POST, false) => VERB_CREATE,
            (&Method::PUT, true) => VERB_UPDATE,
            (&Method::PATCH, true) => VERB_PATCH,
            (&Method::DELETE, true) => VERB_DELETE,
            _ => return Err(Response::method_not_allowed()),
        };
        self.access.can(op, schema, verb)?;

        let id = id.unwrap_or_default();
        let store = &self.store;
        match verb {
            VERB_LIST => self.list(op, schema),
            VERB_GET => {
                let obj = store.get(&schema.id, &id).map_err(store_error)?;
                Ok(Response::json(render(op, schema, &id, obj)))
            }
            VERB_CREATE => {
                let mut obj = parse_object(&body)?;
                let id = object_id(op, schema, &mut obj)?;
                let obj = store.create(&schema.id, &id, obj).map_err(store_error)?;
                info!("User '{}' created {} '{id}'", op.user.name, schema.id);
                Ok(Response::created(render(op, schema, &id, obj)))
            }
            VERB_UPDATE => {
                let mut obj = parse_object(&body)?;
                object_id(op, schema, &mut obj)?;
                let obj = store.update(&schema.id, &id, obj).map_err(store_error)?;
                info!("User '{}' updated {} '{id}'", op.user.name, schema.id);
                Ok(Response::json(render(op, schema, &id, obj)))
            }
            VERB_PATCH => {
                let mut patch = parse_object(&body)?;
                if let Some(metadata) = patch.get_mut("metadata").and_then(Value::as_object_mut) {
                    metadata.remove("name");
                    metadata.remove("namespace");
                }
                let obj = store.patch(&schema.id, &id, patch).map_err(store_error)?;
                info!("User '{}' patched {} '{id}'", op.user.name, schema.id);
                Ok(Response::json(render(op, schema, &id, obj)))
            }
            _ => {
                let obj = store.delete(&schema.id, &id).map_err(store_error)?;
                info!("User '{}' deleted {} '{id}'", op.user.name, schema.id);
                Ok(Response::json(render(op, schema, &id, obj)))
            }
        }
    }

    fn list(&self, op: &Operation, schema: &Schema) -> Result<Response, Response> {
        let limit = match op.query("limit") {
            Some(limit) => match limit.parse::<usize>() {
                Ok(0) => None,
                Ok(limit) => Some(limit),
                Err(_) => return Err(Response::bad_request(format!("invalid limit '{limit}'"))),
            },
            None => None,
        };
        let namespace = (!op.namespace.is_empty()).then_some(op.namespace.as_str());

        let items = self
            .store
            .list(&schema.id, namespace)
            .map_err(store_error)?;
        let total = items.len();

        let start = match op.query("continue") {
            Some(token) => items
                .iter()
                .position(|(id, _)| id.as_str() > token.as_str())
                .unwrap_or(total),
            None => 0,
        };
        let end = match limit {
            Some(limit) => (start + limit).min(total),
            None => total,
        };

        let builder = &op.url_builder;
        let current = builder.current();
        let mut links = BTreeMap::from([(String::from("self"), current.to_string())]);
        let mut pagination = None;
        if let Some(limit) = limit {
            let next = (end < total).then(|| items[end - 1].0.clone());
            if let Some(token) = next.as_deref() {
                links.insert(String::from("next"), marker(op, current, Some(token), limit)?);
            }
            if start > 0 {
                let prev_start = start.saturating_sub(limit);
                let token = (prev_start > 0).then(|| items[prev_start - 1].0.as_str());
                links.insert(String::from("prev"), marker(op, current, token, limit)?);
            }
            pagination = Some(Pagination {
                limit,
                continue_token: next,
                total,
            });
        }

        let data = items
            .into_iter()
            .skip(start)
            .take(end - start)
            .map(|(id, obj)| render(op, schema, &id, obj))
            .collect();

        Ok(Response::json(Collection {
            type_: String::from("collection"),
            resource_type: schema.id.clone(),
            links,
            pagination,
            data,
        }))
    }
}

fn marker(op: &Operation, url: &str, token: Option<&str>, limit: usize) -> Result<String, Response> {
    op.url_builder.marker(url, token, limit).map_err(|e| {
        error!("Build pagination link failed: {e:#}");
        Response::error_text(format!("{e:#}"))
    })
}

fn store_error(e: StoreError) -> Response {
    match e {
        StoreError::NotFound { .. } => Response::not_found(),
        StoreError::AlreadyExists { .. } => Response::conflict(e.to_string()),
        StoreError::Invalid(_) => Response::bad_request(e.to_string()),
        StoreError::Unavailable(_) => {
            error!("Resource store failed: {e}");
            Response::error(response::STORE_ERROR)
        }
    }
}

fn parse_object(body: &[u8]) -> Result<Value, Response> {
    let mut obj: Value = serde_json::from_slice(body)
        .map_err(|e| Response::bad_request(format!("invalid json body: {e}")))?;
    match obj.as_object_mut() {
        Some(map) => {
            for field in RENDERED_FIELDS {
                map.remove(field);
            }
        }
        None => return Err(Response::bad_request("body must be a json object")),
    }
    Ok(obj)
}

/// Reconciles `metadata.name` and `metadata.namespace` of a written object
/// with the request path, filling them in and returning the object id.
fn object_id(op: &Operation, schema: &Schema, obj: &mut Value) -> Result<String, Response> {
    let metadata = match obj.as_object_mut() {
        Some(map) => map
            .entry("metadata")
            .or_insert_with(|| Value::Object(Map::new())),
        None => return Err(Response::bad_request("body must be a json object")),
    };
    let metadata = match metadata.as_object_mut() {
        Some(metadata) => metadata,
        None => return Err(Response::bad_request("metadata must be a json object")),
    };

    let name = reconcile(metadata, "name", &op.name)?;
    if name.is_empty() {
        return Err(Response::bad_request("metadata.name is required"));
    }
    let namespace = reconcile(metadata, "namespace", &op.namespace)?;

    if !schema.namespaced {
        if !namespace.is_empty() {
            return Err(Response::bad_request(format!(
                "'{}' is not namespaced",
                schema.id
            )));
        }
        return Ok(name);
    }
    if namespace.is_empty() {
        return Err(Response::bad_request("metadata.namespace is required"));
    }
    Ok(format!("{namespace}/{name}"))
}

fn reconcile(metadata: &mut Map<String, Value>, key: &str, path: &str) -> Result<String, Response> {
    let value = match metadata.get(key) {
        Some(Value::String(value)) => value.clone(),
        Some(Value::Null) | None => String::new(),
        Some(_) => return Err(Response::bad_request(format!("metadata.{key} must be a string"))),
    };
    if value.contains('/') {
        return Err(Response::bad_request(format!("metadata.{key} cannot contain '/'")));
    }
    if !path.is_empty() && !value.is_empty() && value != path {
        return Err(Response::bad_request(format!(
            "metadata.{key} '{value}' does not match '{path}'"
        )));
    }

    let value = if value.is_empty() { path.to_string() } else { value };
    if value.is_empty() {
        metadata.remove(key);
    } else {
        metadata.insert(key.to_string(), Value::String(value.clone()));
    }
    Ok(value)
}

fn render(op: &Operation, schema: &Schema, id: &str, mut obj: Value) -> Value {
    if let Some(map) = obj.as_object_mut() {
        map.insert(String::from("id"), Value::String(id.to_string()));
        map.insert(String::from("type"), Value::String(schema.id.clone()));
        map.insert(
            String::from("links"),
            json!({ "self": op.url_builder.resource(schema, id) }),
        );
    }
    obj
}
