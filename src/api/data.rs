//! CRUD handlers for `/api/data/{collection}[/{id}]`.
//!
//! Item payloads come from the request's form fields when there are any,
//! otherwise from a JSON object body. JSON values are flattened to strings:
//! strings verbatim, `null` as the empty string, everything else as its
//! compact JSON text.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::debug;

use super::AppState;
use crate::context::Context;
use crate::fields::FieldMap;
use crate::store::StoreError;
use crate::{Response, StatusCode};

/// `POST /api/data/{collection}` → `201 {"id": "<id>", "status": "created"}`.
pub async fn create(state: Arc<AppState>, ctx: Context) -> Response {
    let collection = match required_param(&ctx, "collection", "Invalid collection path") {
        Ok(collection) => collection,
        Err(response) => return response,
    };
    let fields = match item_fields(&ctx) {
        Ok(fields) => fields,
        Err(response) => return response,
    };

    let id = state.store.create(collection, &fields);
    debug!(collection, id = %id, fields = fields.len(), "item created");
    Response::json(StatusCode::Created, &json!({ "id": id, "status": "created" }))
}

/// `GET /api/data/{collection}/{id}` → the item, or `404`.
pub async fn read(state: Arc<AppState>, ctx: Context) -> Response {
    let (collection, id) = match item_path(&ctx) {
        Ok(path) => path,
        Err(response) => return response,
    };

    match state.store.read(collection, id) {
        Some(item) => Response::json(StatusCode::Ok, &item),
        None => item_not_found(),
    }
}

/// `GET /api/data/{collection}` → every item, ascending by id.
pub async fn read_all(state: Arc<AppState>, ctx: Context) -> Response {
    let collection = match required_param(&ctx, "collection", "Invalid collection path") {
        Ok(collection) => collection,
        Err(response) => return response,
    };

    let items = state.store.read_all(collection);
    Response::json(StatusCode::Ok, &items)
}

/// `PUT /api/data/{collection}/{id}` → `200 {"id", "status": "updated"}`, or `404`.
pub async fn update(state: Arc<AppState>, ctx: Context) -> Response {
    let (collection, id) = match item_path(&ctx) {
        Ok(path) => path,
        Err(response) => return response,
    };
    let fields = match item_fields(&ctx) {
        Ok(fields) => fields,
        Err(response) => return response,
    };

    store_result(state.store.update(collection, id, &fields), id, "updated")
}

/// `DELETE /api/data/{collection}/{id}` → `200 {"id", "status": "deleted"}`, or `404`.
pub async fn delete(state: Arc<AppState>, ctx: Context) -> Response {
    let (collection, id) = match item_path(&ctx) {
        Ok(path) => path,
        Err(response) => return response,
    };

    store_result(state.store.remove(collection, id), id, "deleted")
}

fn store_result(result: Result<(), StoreError>, id: &str, status: &str) -> Response {
    match result {
        Ok(()) => Response::json(StatusCode::Ok, &json!({ "id": id, "status": status })),
        Err(e) => {
            debug!(error = %e, "store lookup failed");
            item_not_found()
        }
    }
}

fn item_not_found() -> Response {
    Response::error(StatusCode::NotFound, "Item not found")
}

fn required_param<'a>(
    ctx: &'a Context,
    name: &str,
    message: &str,
) -> Result<&'a str, Response> {
    match ctx.param(name) {
        "" => Err(Response::error(StatusCode::BadRequest, message)),
        value => Ok(value),
    }
}

fn item_path(ctx: &Context) -> Result<(&str, &str), Response> {
    let collection = required_param(ctx, "collection", "Invalid item path")?;
    let id = required_param(ctx, "id", "Invalid item path")?;
    Ok((collection, id))
}

/// Extracts the item payload from form fields or a JSON object body.
fn item_fields(ctx: &Context) -> Result<FieldMap, Response> {
    let request = ctx.request();
    if !request.form_fields().is_empty() {
        return Ok(request.form_fields().clone());
    }
    if is_multipart(request.content_type()) {
        // Form bodies without text parts carry nothing to store.
        return Err(Response::error(StatusCode::BadRequest, "No item fields"));
    }
    if request.body().iter().all(u8::is_ascii_whitespace) {
        return Ok(FieldMap::new());
    }

    match ctx.json::<Value>() {
        Ok(Value::Object(object)) => Ok(object
            .into_iter()
            .map(|(key, value)| (key, flatten(value)))
            .collect()),
        Ok(other) => {
            debug!(kind = json_kind(&other), "JSON body is not an object");
            Err(invalid_json())
        }
        Err(e) => {
            debug!(error = %e, "failed to parse JSON body");
            Err(invalid_json())
        }
    }
}

fn is_multipart(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("multipart/form-data"))
}

fn invalid_json() -> Response {
    Response::error(StatusCode::BadRequest, "Invalid JSON body")
}

fn flatten(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
