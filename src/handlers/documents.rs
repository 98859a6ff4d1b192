//! Document handlers: find, get, insert, replace, delete and collection drop.

use crate::authz::ResourceAddress;
use crate::document::{Document, ObjectId, Value, ID_FIELD};
use crate::error::{AppError, ParseError};
use crate::extractors::CallerIdentity;
use crate::handlers::{parse_document, parse_failure, store_failure};
use crate::query::translate;
use crate::response::{status_ok, JsonText, StatusBody};
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::{Extension, Query, State};
use std::collections::HashMap;

fn path_id(address: &ResourceAddress) -> Value {
    Value::id_from_path(address.id())
}

/// GET /:db/:coll : query parameters become a filter (see [`translate`]).
pub async fn find_documents(
    State(state): State<AppState>,
    Extension(address): Extension<ResourceAddress>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<JsonText<Vec<Document>>, AppError> {
    let filter = translate(&params).map_err(|e| parse_failure("find", &address, e))?;
    let docs = state
        .documents
        .find(&address.database, address.collection(), &filter)
        .await
        .map_err(|e| store_failure("find", &address, e))?;
    Ok(JsonText(docs))
}

/// GET /:db/:coll/:id : the document, or `null`.
pub async fn get_document(
    State(state): State<AppState>,
    Extension(address): Extension<ResourceAddress>,
) -> Result<JsonText<Option<Document>>, AppError> {
    let doc = state
        .documents
        .find_one(&address.database, address.collection(), &path_id(&address))
        .await
        .map_err(|e| store_failure("find_one", &address, e))?;
    Ok(JsonText(doc))
}

/// POST /:db/:coll : insert, assigning an object id when `_id` is absent.
pub async fn insert_document(
    State(state): State<AppState>,
    Extension(address): Extension<ResourceAddress>,
    body: Bytes,
) -> Result<JsonText<StatusBody<Value>>, AppError> {
    let mut doc = parse_document(&body).map_err(|e| parse_failure("insert", &address, e))?;
    if !doc.contains_key(ID_FIELD) {
        doc.shift_insert(0, ID_FIELD.to_string(), Value::ObjectId(ObjectId::new()));
    }
    let id = state
        .documents
        .insert_one(&address.database, address.collection(), doc)
        .await
        .map_err(|e| store_failure("insert", &address, e))?;
    Ok(status_ok(id))
}

/// A payload `_id` agrees with the path id when both name the same value.
fn ids_agree(path: &Value, payload: &Value) -> bool {
    if path.canonical_string() == payload.canonical_string() {
        return true;
    }
    matches!((path.as_object_id(), payload.as_object_id()), (Some(a), Some(b)) if a == b)
}

/// PUT|POST /:db/:coll/:id : upsert under the path id.
pub async fn replace_document(
    State(state): State<AppState>,
    Extension(address): Extension<ResourceAddress>,
    body: Bytes,
) -> Result<JsonText<StatusBody<Value>>, AppError> {
    let id = path_id(&address);
    let mut doc = parse_document(&body).map_err(|e| parse_failure("replace", &address, e))?;
    if let Some(payload_id) = doc.get(ID_FIELD) {
        if !ids_agree(&id, payload_id) {
            let err = ParseError::IdentifierMismatch {
                path: address.id().to_string(),
                payload: payload_id.canonical_string(),
            };
            return Err(parse_failure("replace", &address, err));
        }
    }
    // An agreeing payload id keeps its own type for upserts; the store keeps an
    // existing document's id.
    if !doc.contains_key(ID_FIELD) {
        doc.shift_insert(0, ID_FIELD.to_string(), id.clone());
    }
    let outcome = state
        .documents
        .replace_one(&address.database, address.collection(), &id, doc, true)
        .await
        .map_err(|e| store_failure("replace", &address, e))?;
    tracing::debug!(
        database = %address.database,
        collection = address.collection(),
        id = address.id(),
        upserted = outcome.upserted,
        "replaced document"
    );
    Ok(status_ok(id))
}

/// DELETE /:db/:coll/:id : number of documents removed.
pub async fn delete_document(
    State(state): State<AppState>,
    Extension(address): Extension<ResourceAddress>,
) -> Result<JsonText<StatusBody<u64>>, AppError> {
    let deleted = state
        .documents
        .delete_one(&address.database, address.collection(), &path_id(&address))
        .await
        .map_err(|e| store_failure("delete", &address, e))?;
    Ok(status_ok(deleted))
}

/// DELETE /:db/:coll
pub async fn drop_collection(
    State(state): State<AppState>,
    Extension(address): Extension<ResourceAddress>,
    caller: CallerIdentity,
) -> Result<JsonText<StatusBody<()>>, AppError> {
    state
        .documents
        .drop_collection(&address.database, address.collection())
        .await
        .map_err(|e| store_failure("drop_collection", &address, e))?;
    tracing::info!(
        database = %address.database,
        collection = address.collection(),
        user = caller.name(),
        "dropped collection"
    );
    Ok(status_ok(()))
}
