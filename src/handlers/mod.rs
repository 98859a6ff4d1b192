//! HTTP handlers for databases, documents and large objects.

pub mod databases;
pub mod documents;
pub mod gridfs;

pub use databases::*;
pub use documents::*;
pub use gridfs::*;

use crate::authz::ResourceAddress;
use crate::document::{document_from_json, Document};
use crate::error::{AppError, ParseError, StoreError};

/// Ceiling for JSON document bodies.
pub const MAX_DOCUMENT_BYTES: usize = 16 * 1024 * 1024;

/// Log a store failure with its request context and wrap it for the response.
pub(crate) fn store_failure(op: &'static str, address: &ResourceAddress, err: StoreError) -> AppError {
    tracing::error!(
        op,
        database = %address.database,
        collection = address.collection(),
        id = address.id(),
        error = %err,
        "store operation failed"
    );
    AppError::Store(err)
}

pub(crate) fn parse_failure(op: &'static str, address: &ResourceAddress, err: ParseError) -> AppError {
    tracing::error!(
        op,
        database = %address.database,
        collection = address.collection(),
        id = address.id(),
        error = %err,
        "request could not be parsed"
    );
    AppError::Parse(err)
}

/// Parse a request body as a JSON object.
pub(crate) fn parse_document(body: &[u8]) -> Result<Document, ParseError> {
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(map)) => Ok(document_from_json(map)),
        Ok(_) => Err(ParseError::NotAnObject("document body")),
        Err(e) => Err(ParseError::json("document body", e)),
    }
}
