//! Store seams: document operations and large-object (GridFS-style) files.
//! `MemoryStore` backs tests and local runs; `PgStore` keeps documents in PostgreSQL.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::document::{Document, ObjectId, Value};
use crate::error::StoreError;
use crate::query::QueryFilter;
use async_trait::async_trait;
use axum::body::Bytes;
use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;

/// Large objects are split into chunks of this size.
pub const CHUNK_SIZE: usize = 255 * 1024;

/// Collection-style names the large-object store occupies inside a database.
pub const FILES_COLLECTION: &str = "fs.files";
pub const CHUNKS_COLLECTION: &str = "fs.chunks";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReplaceOutcome {
    pub matched: u64,
    pub upserted: bool,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn list_databases(&self) -> Result<Vec<String>, StoreError>;

    async fn list_collections(&self, database: &str) -> Result<Vec<String>, StoreError>;

    async fn find_one(&self, database: &str, collection: &str, id: &Value) -> Result<Option<Document>, StoreError>;

    /// Documents matching `filter`, in store iteration (insertion) order.
    async fn find(&self, database: &str, collection: &str, filter: &QueryFilter) -> Result<Vec<Document>, StoreError>;

    /// Insert one document; `_id` must already be set. Returns the stored id.
    async fn insert_one(&self, database: &str, collection: &str, doc: Document) -> Result<Value, StoreError>;

    async fn replace_one(
        &self,
        database: &str,
        collection: &str,
        id: &Value,
        doc: Document,
        upsert: bool,
    ) -> Result<ReplaceOutcome, StoreError>;

    /// Returns the number of deleted documents (0 or 1).
    async fn delete_one(&self, database: &str, collection: &str, id: &Value) -> Result<u64, StoreError>;

    async fn drop_collection(&self, database: &str, collection: &str) -> Result<(), StoreError>;

    async fn drop_database(&self, database: &str) -> Result<(), StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Stream of large-object content chunks.
pub type ByteStream = BoxStream<'static, Result<Bytes, StoreError>>;

#[derive(Clone, Debug, PartialEq)]
pub struct FileInfo {
    pub id: ObjectId,
    pub length: u64,
    pub chunk_size: usize,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub upload_date: DateTime<Utc>,
}

pub struct LargeObject {
    pub info: FileInfo,
    pub content: ByteStream,
}

/// A large object to be written. Content is already bounded by the caller.
#[derive(Clone, Debug)]
pub struct Upload {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

#[async_trait]
pub trait LargeObjectStore: Send + Sync {
    async fn open(&self, database: &str, id: &ObjectId) -> Result<Option<LargeObject>, StoreError>;

    async fn put(&self, database: &str, upload: Upload) -> Result<ObjectId, StoreError>;

    /// Returns false when no such object existed.
    async fn delete(&self, database: &str, id: &ObjectId) -> Result<bool, StoreError>;
}

fn chunk_count(length: usize, chunk_size: usize) -> usize {
    if length == 0 {
        0
    } else {
        (length + chunk_size - 1) / chunk_size
    }
}
