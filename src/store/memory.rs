//! In-process store. A database exists while it holds at least one collection or file.

use super::{
    chunk_count, ByteStream, DocumentStore, FileInfo, LargeObject, LargeObjectStore, ReplaceOutcome, Upload,
    CHUNK_SIZE,
};
use crate::document::{Document, ObjectId, Value, ID_FIELD};
use crate::error::StoreError;
use crate::query::{matcher::values_equal, matches, QueryFilter};
use async_trait::async_trait;
use axum::body::Bytes;
use futures_util::StreamExt;
use indexmap::IndexMap;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct MemDatabase {
    collections: IndexMap<String, Vec<Document>>,
    files: IndexMap<ObjectId, (FileInfo, Bytes)>,
}

impl MemDatabase {
    fn is_empty(&self) -> bool {
        self.collections.is_empty() && self.files.is_empty()
    }
}

#[derive(Default)]
pub struct MemoryStore {
    databases: RwLock<BTreeMap<String, MemDatabase>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

fn same_id(doc: &Document, id: &Value) -> bool {
    doc.get(ID_FIELD).map(|v| values_equal(v, id)).unwrap_or(false)
}

/// Lookup by identifier matches any stored `_id` the identifier can denote.
fn matches_id(doc: &Document, aliases: &[Value]) -> bool {
    aliases.iter().any(|alias| same_id(doc, alias))
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list_databases(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.databases.read().await.keys().cloned().collect())
    }

    async fn list_collections(&self, database: &str) -> Result<Vec<String>, StoreError> {
        let guard = self.databases.read().await;
        Ok(guard
            .get(database)
            .map(|db| db.collections.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn find_one(&self, database: &str, collection: &str, id: &Value) -> Result<Option<Document>, StoreError> {
        let guard = self.databases.read().await;
        Ok(guard
            .get(database)
            .and_then(|db| db.collections.get(collection))
            .and_then(|docs| docs.iter().find(|d| matches_id(d, &id.id_aliases())).cloned()))
    }

    async fn find(&self, database: &str, collection: &str, filter: &QueryFilter) -> Result<Vec<Document>, StoreError> {
        let guard = self.databases.read().await;
        let docs = match guard.get(database).and_then(|db| db.collections.get(collection)) {
            Some(docs) => docs,
            None => return Ok(Vec::new()),
        };
        let mut out = Vec::new();
        for doc in docs {
            if matches(doc, filter.as_document())? {
                out.push(doc.clone());
            }
        }
        Ok(out)
    }

    async fn insert_one(&self, database: &str, collection: &str, doc: Document) -> Result<Value, StoreError> {
        let id = doc
            .get(ID_FIELD)
            .cloned()
            .ok_or_else(|| StoreError::InvalidQuery("document has no _id".into()))?;
        let mut guard = self.databases.write().await;
        let docs = guard
            .entry(database.to_string())
            .or_default()
            .collections
            .entry(collection.to_string())
            .or_default();
        if docs.iter().any(|d| same_id(d, &id)) {
            return Err(StoreError::DuplicateKey(id.canonical_string()));
        }
        docs.push(doc);
        Ok(id)
    }

    async fn replace_one(
        &self,
        database: &str,
        collection: &str,
        id: &Value,
        mut doc: Document,
        upsert: bool,
    ) -> Result<ReplaceOutcome, StoreError> {
        let aliases = id.id_aliases();
        let mut guard = self.databases.write().await;
        if let Some(existing) = guard
            .get_mut(database)
            .and_then(|db| db.collections.get_mut(collection))
            .and_then(|docs| docs.iter_mut().find(|d| matches_id(d, &aliases)))
        {
            // The stored id keeps its type.
            let stored_id = existing.get(ID_FIELD).cloned().unwrap_or_else(|| id.clone());
            doc.insert(ID_FIELD.to_string(), stored_id);
            *existing = doc;
            return Ok(ReplaceOutcome { matched: 1, upserted: false });
        }
        if !upsert {
            return Ok(ReplaceOutcome { matched: 0, upserted: false });
        }
        doc.entry(ID_FIELD.to_string()).or_insert_with(|| id.clone());
        guard
            .entry(database.to_string())
            .or_default()
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(doc);
        Ok(ReplaceOutcome { matched: 0, upserted: true })
    }

    async fn delete_one(&self, database: &str, collection: &str, id: &Value) -> Result<u64, StoreError> {
        let mut guard = self.databases.write().await;
        let docs = match guard.get_mut(database).and_then(|db| db.collections.get_mut(collection)) {
            Some(docs) => docs,
            None => return Ok(0),
        };
        let aliases = id.id_aliases();
        match docs.iter().position(|d| matches_id(d, &aliases)) {
            Some(pos) => {
                docs.remove(pos);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn drop_collection(&self, database: &str, collection: &str) -> Result<(), StoreError> {
        let mut guard = self.databases.write().await;
        let now_empty = match guard.get_mut(database) {
            Some(db) => {
                db.collections.shift_remove(collection);
                db.is_empty()
            }
            None => false,
        };
        if now_empty {
            guard.remove(database);
        }
        Ok(())
    }

    async fn drop_database(&self, database: &str) -> Result<(), StoreError> {
        self.databases.write().await.remove(database);
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

fn chunked(data: Bytes, chunk_size: usize) -> ByteStream {
    let n = chunk_count(data.len(), chunk_size);
    futures_util::stream::iter((0..n).map(move |i| {
        let start = i * chunk_size;
        let end = (start + chunk_size).min(data.len());
        Ok(data.slice(start..end))
    }))
    .boxed()
}

#[async_trait]
impl LargeObjectStore for MemoryStore {
    async fn open(&self, database: &str, id: &ObjectId) -> Result<Option<LargeObject>, StoreError> {
        let guard = self.databases.read().await;
        Ok(guard.get(database).and_then(|db| db.files.get(id)).map(|(info, data)| LargeObject {
            info: info.clone(),
            content: chunked(data.clone(), info.chunk_size),
        }))
    }

    async fn put(&self, database: &str, upload: Upload) -> Result<ObjectId, StoreError> {
        let id = ObjectId::new();
        let info = FileInfo {
            id,
            length: upload.data.len() as u64,
            chunk_size: CHUNK_SIZE,
            filename: upload.filename,
            content_type: upload.content_type,
            upload_date: chrono::Utc::now(),
        };
        self.databases
            .write()
            .await
            .entry(database.to_string())
            .or_default()
            .files
            .insert(id, (info, upload.data));
        Ok(id)
    }

    async fn delete(&self, database: &str, id: &ObjectId) -> Result<bool, StoreError> {
        let mut guard = self.databases.write().await;
        let (removed, now_empty) = match guard.get_mut(database) {
            Some(db) => (db.files.shift_remove(id).is_some(), db.is_empty()),
            None => (false, false),
        };
        if now_empty {
            guard.remove(database);
        }
        Ok(removed)
    }
}
