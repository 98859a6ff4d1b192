//! Large-object handlers: download, linked download, upload and delete.

use crate::authz::ResourceAddress;
use crate::document::{ObjectId, ObjectIdError, Value};
use crate::error::{AppError, ParseError};
use crate::handlers::{parse_failure, store_failure};
use crate::response::{status_ok, JsonText, StatusBody};
use crate::state::AppState;
use crate::store::{LargeObject, Upload};
use axum::body::{Body, Bytes};
use axum::extract::{Extension, FromRequest, Multipart, Request, State};
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use futures_util::TryStreamExt;

fn file_id(address: &ResourceAddress) -> Result<ObjectId, AppError> {
    ObjectId::parse_str(address.id()).map_err(|e| parse_failure("gridfs", address, ParseError::from(e)))
}

async fn stream_object(state: &AppState, address: &ResourceAddress, id: &ObjectId) -> Result<Response, AppError> {
    let object = state
        .files
        .open(&address.database, id)
        .await
        .map_err(|e| store_failure("gridfs_open", address, e))?
        .ok_or_else(|| AppError::NotFound(format!("large object {} in {}", id, address.database)))?;
    Ok(octet_stream(object, address))
}

fn octet_stream(object: LargeObject, address: &ResourceAddress) -> Response {
    let database = address.database.clone();
    let id = object.info.id;
    let content = object.content.inspect_err(move |e| {
        tracing::error!(database = %database, id = %id, error = %e, "large object stream failed");
    });
    let mut response = Body::from_stream(content).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(object.info.length));
    response
}

/// GET /:db/gridfs/:id
pub async fn get_file(
    State(state): State<AppState>,
    Extension(address): Extension<ResourceAddress>,
) -> Result<Response, AppError> {
    let id = file_id(&address)?;
    stream_object(&state, &address, &id).await
}

/// GET /:db/:coll/gridfs/:id : stream the large object a document links to
/// through its link field.
pub async fn get_linked_file(
    State(state): State<AppState>,
    Extension(address): Extension<ResourceAddress>,
) -> Result<Response, AppError> {
    let doc = state
        .documents
        .find_one(&address.database, address.collection(), &Value::id_from_path(address.id()))
        .await
        .map_err(|e| store_failure("gridfs_link", &address, e))?
        .ok_or_else(|| {
            AppError::NotFound(format!("document {} in {}.{}", address.id(), address.database, address.collection()))
        })?;
    let field = &state.http.link_field;
    let link = doc
        .get(field.as_str())
        .ok_or_else(|| AppError::NotFound(format!("document {} has no {} field", address.id(), field)))?;
    let id = link.as_object_id().ok_or_else(|| {
        let err = ParseError::from(ObjectIdError(link.canonical_string()));
        parse_failure("gridfs_link", &address, err)
    })?;
    stream_object(&state, &address, &id).await
}

/// PUT|POST /:db/gridfs/ : store the request body (or the first multipart field).
pub async fn put_file(
    State(state): State<AppState>,
    Extension(address): Extension<ResourceAddress>,
    request: Request,
) -> Result<JsonText<StatusBody<Value>>, AppError> {
    let cap = state.http.max_upload_bytes;
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let upload = match content_type.as_deref() {
        Some(ct) if ct.starts_with("multipart/form-data") => {
            let multipart = Multipart::from_request(request, &state)
                .await
                .map_err(|e| AppError::Payload(e.body_text()))?;
            first_field(multipart, cap).await?
        }
        _ => {
            let data = axum::body::to_bytes(request.into_body(), cap)
                .await
                .map_err(|_| AppError::Payload(format!("upload exceeds {} bytes", cap)))?;
            Upload { filename: None, content_type, data }
        }
    };
    if upload.data.is_empty() {
        return Err(AppError::Payload("empty upload".into()));
    }

    let size = upload.data.len();
    let id = state
        .files
        .put(&address.database, upload)
        .await
        .map_err(|e| store_failure("gridfs_put", &address, e))?;
    tracing::info!(database = %address.database, id = %id, size, "stored large object");
    Ok(status_ok(Value::ObjectId(id)))
}

/// Only the first field of a multipart body is stored.
async fn first_field(mut multipart: Multipart, cap: usize) -> Result<Upload, AppError> {
    let field = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Payload(e.body_text()))?
        .ok_or_else(|| AppError::Payload("multipart body has no fields".into()))?;
    let filename = field.file_name().map(str::to_string);
    let content_type = field.content_type().map(str::to_string);
    let data: Bytes = field.bytes().await.map_err(|e| AppError::Payload(e.body_text()))?;
    if data.len() > cap {
        return Err(AppError::Payload(format!("upload exceeds {} bytes", cap)));
    }
    Ok(Upload { filename, content_type, data })
}

/// DELETE /:db/gridfs/:id
pub async fn delete_file(
    State(state): State<AppState>,
    Extension(address): Extension<ResourceAddress>,
) -> Result<JsonText<StatusBody<bool>>, AppError> {
    let id = file_id(&address)?;
    let removed = state
        .files
        .delete(&address.database, &id)
        .await
        .map_err(|e| store_failure("gridfs_delete", &address, e))?;
    if !removed {
        return Err(AppError::NotFound(format!("large object {} in {}", id, address.database)));
    }
    Ok(status_ok(removed))
}
