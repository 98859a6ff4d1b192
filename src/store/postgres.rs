//! PostgreSQL-backed store. Documents are kept as extended JSON in JSONB so typed
//! values (object ids, dates, non-finite doubles) round-trip. Tables are created on
//! first write; reads against a missing schema or table behave as empty.

use super::{
    chunk_count, DocumentStore, FileInfo, LargeObject, LargeObjectStore, ReplaceOutcome, Upload, CHUNK_SIZE,
};
use crate::document::extended::{document_from_extended, document_to_extended, from_extended, to_extended};
use crate::document::{Document, ObjectId, Value, ID_FIELD};
use crate::error::StoreError;
use crate::query::{matches, QueryFilter};
use crate::sql;
use async_trait::async_trait;
use axum::body::Bytes;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use serde_json::Value as JsonValue;
use sqlx::PgPool;

const UNDEFINED_TABLE: &str = "42P01";
const INVALID_SCHEMA_NAME: &str = "3F000";
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn ensure_collection(&self, database: &str, collection: &str) -> Result<(), StoreError> {
        sqlx::query(&sql::create_schema(database)).execute(&self.pool).await?;
        sqlx::query(&sql::create_collection(database, collection))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn ensure_files(&self, database: &str) -> Result<(), StoreError> {
        sqlx::query(&sql::create_schema(database)).execute(&self.pool).await?;
        for ddl in sql::create_files_tables(database) {
            sqlx::query(&ddl).execute(&self.pool).await?;
        }
        Ok(())
    }
}

fn db_code(e: &sqlx::Error) -> Option<String> {
    match e {
        sqlx::Error::Database(db) => db.code().map(|c| c.into_owned()),
        _ => None,
    }
}

fn is_missing_relation(e: &sqlx::Error) -> bool {
    matches!(db_code(e).as_deref(), Some(UNDEFINED_TABLE) | Some(INVALID_SCHEMA_NAME))
}

/// Storage key: the extended JSON text of the id, so `"7"` and `7` stay distinct.
fn id_key(id: &Value) -> String {
    to_extended(id).to_string()
}

/// Keys of every stored `_id` a lookup identifier can denote.
fn alias_keys(id: &Value) -> Vec<String> {
    id.id_aliases().iter().map(id_key).collect()
}

fn decode_doc(raw: JsonValue) -> Result<Document, StoreError> {
    match raw {
        JsonValue::Object(map) => Ok(document_from_extended(map)),
        other => Err(StoreError::Corrupt(format!("stored document is not an object: {}", other))),
    }
}

fn encode_doc(doc: &Document) -> JsonValue {
    JsonValue::Object(document_to_extended(doc))
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn list_databases(&self) -> Result<Vec<String>, StoreError> {
        Ok(sqlx::query_scalar::<_, String>(sql::LIST_SCHEMAS)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn list_collections(&self, database: &str) -> Result<Vec<String>, StoreError> {
        Ok(sqlx::query_scalar::<_, String>(sql::LIST_COLLECTIONS)
            .bind(database)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn find_one(&self, database: &str, collection: &str, id: &Value) -> Result<Option<Document>, StoreError> {
        let q = sql::select_doc_by_id(database, collection);
        tracing::debug!(sql = %q, "query");
        match sqlx::query_scalar::<_, JsonValue>(&q)
            .bind(alias_keys(id))
            .fetch_optional(&self.pool)
            .await
        {
            Ok(row) => row.map(decode_doc).transpose(),
            Err(e) if is_missing_relation(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn find(&self, database: &str, collection: &str, filter: &QueryFilter) -> Result<Vec<Document>, StoreError> {
        let q = sql::select_docs(database, collection);
        tracing::debug!(sql = %q, "query");
        let rows = match sqlx::query_scalar::<_, JsonValue>(&q).fetch_all(&self.pool).await {
            Ok(rows) => rows,
            Err(e) if is_missing_relation(&e) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut out = Vec::new();
        for raw in rows {
            let doc = decode_doc(raw)?;
            if matches(&doc, filter.as_document())? {
                out.push(doc);
            }
        }
        Ok(out)
    }

    async fn insert_one(&self, database: &str, collection: &str, doc: Document) -> Result<Value, StoreError> {
        let id = doc
            .get(ID_FIELD)
            .cloned()
            .ok_or_else(|| StoreError::InvalidQuery("document has no _id".into()))?;
        self.ensure_collection(database, collection).await?;
        let result = sqlx::query(&sql::insert_doc(database, collection))
            .bind(id_key(&id))
            .bind(encode_doc(&doc))
            .execute(&self.pool)
            .await;
        match result {
            Ok(_) => Ok(id),
            Err(e) if db_code(&e).as_deref() == Some(UNIQUE_VIOLATION) => {
                Err(StoreError::DuplicateKey(id.canonical_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn replace_one(
        &self,
        database: &str,
        collection: &str,
        id: &Value,
        mut doc: Document,
        upsert: bool,
    ) -> Result<ReplaceOutcome, StoreError> {
        let existing = match sqlx::query_as::<_, (String, Option<JsonValue>)>(&sql::select_key_by_id(database, collection))
            .bind(alias_keys(id))
            .fetch_optional(&self.pool)
            .await
        {
            Ok(row) => row,
            Err(e) if is_missing_relation(&e) => None,
            Err(e) => return Err(e.into()),
        };
        if let Some((key, stored_id)) = existing {
            // The stored id keeps its type.
            doc.insert(ID_FIELD.to_string(), stored_id.map(from_extended).unwrap_or_else(|| id.clone()));
            let r = sqlx::query(&sql::update_doc(database, collection))
                .bind(key)
                .bind(encode_doc(&doc))
                .execute(&self.pool)
                .await?;
            return Ok(ReplaceOutcome { matched: r.rows_affected(), upserted: false });
        }
        if !upsert {
            return Ok(ReplaceOutcome { matched: 0, upserted: false });
        }
        let new_id = doc.entry(ID_FIELD.to_string()).or_insert_with(|| id.clone()).clone();
        self.ensure_collection(database, collection).await?;
        let inserted: bool = sqlx::query_scalar(&sql::upsert_doc(database, collection))
            .bind(id_key(&new_id))
            .bind(encode_doc(&doc))
            .fetch_one(&self.pool)
            .await?;
        Ok(if inserted {
            ReplaceOutcome { matched: 0, upserted: true }
        } else {
            ReplaceOutcome { matched: 1, upserted: false }
        })
    }

    async fn delete_one(&self, database: &str, collection: &str, id: &Value) -> Result<u64, StoreError> {
        match sqlx::query(&sql::delete_doc(database, collection))
            .bind(alias_keys(id))
            .execute(&self.pool)
            .await
        {
            Ok(r) => Ok(r.rows_affected()),
            Err(e) if is_missing_relation(&e) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    async fn drop_collection(&self, database: &str, collection: &str) -> Result<(), StoreError> {
        sqlx::query(&sql::drop_table(database, collection))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn drop_database(&self, database: &str) -> Result<(), StoreError> {
        sqlx::query(&sql::drop_schema(database)).execute(&self.pool).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").fetch_optional(&self.pool).await?;
        Ok(())
    }
}

type FileRow = (String, i64, i32, Option<String>, Option<String>, DateTime<Utc>);

fn file_info(row: FileRow) -> Result<FileInfo, StoreError> {
    let (id, length, chunk_size, filename, content_type, upload_date) = row;
    Ok(FileInfo {
        id: ObjectId::parse_str(&id).map_err(|e| StoreError::Corrupt(e.to_string()))?,
        length: u64::try_from(length).map_err(|_| StoreError::Corrupt(format!("negative length for {}", id)))?,
        chunk_size: usize::try_from(chunk_size)
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| StoreError::Corrupt(format!("invalid chunk size for {}", id)))?,
        filename,
        content_type,
        upload_date,
    })
}

/// Reads one chunk per query so memory stays bounded independent of object size.
struct ChunkCursor {
    pool: PgPool,
    sql: String,
    files_id: String,
    next: usize,
    total: usize,
}

async fn next_chunk(mut cursor: ChunkCursor) -> Result<Option<(Bytes, ChunkCursor)>, StoreError> {
    if cursor.next >= cursor.total {
        return Ok(None);
    }
    let data: Option<Vec<u8>> = sqlx::query_scalar(&cursor.sql)
        .bind(&cursor.files_id)
        .bind(cursor.next as i32)
        .fetch_optional(&cursor.pool)
        .await?;
    let data = data.ok_or_else(|| StoreError::Corrupt(format!("missing chunk {} of {}", cursor.next, cursor.files_id)))?;
    cursor.next += 1;
    Ok(Some((Bytes::from(data), cursor)))
}

#[async_trait]
impl LargeObjectStore for PgStore {
    async fn open(&self, database: &str, id: &ObjectId) -> Result<Option<LargeObject>, StoreError> {
        let row = match sqlx::query_as::<_, FileRow>(&sql::select_file(database))
            .bind(id.to_hex())
            .fetch_optional(&self.pool)
            .await
        {
            Ok(row) => row,
            Err(e) if is_missing_relation(&e) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let info = match row {
            Some(row) => file_info(row)?,
            None => return Ok(None),
        };
        let cursor = ChunkCursor {
            pool: self.pool.clone(),
            sql: sql::select_chunk(database),
            files_id: id.to_hex(),
            next: 0,
            total: chunk_count(info.length as usize, info.chunk_size),
        };
        let content = futures_util::stream::try_unfold(cursor, next_chunk).boxed();
        Ok(Some(LargeObject { info, content }))
    }

    async fn put(&self, database: &str, upload: Upload) -> Result<ObjectId, StoreError> {
        self.ensure_files(database).await?;
        let id = ObjectId::new();
        let mut tx = self.pool.begin().await?;
        sqlx::query(&sql::insert_file(database))
            .bind(id.to_hex())
            .bind(upload.data.len() as i64)
            .bind(CHUNK_SIZE as i32)
            .bind(upload.filename.as_deref())
            .bind(upload.content_type.as_deref())
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
        let chunk_sql = sql::insert_chunk(database);
        for (n, chunk) in upload.data.chunks(CHUNK_SIZE).enumerate() {
            sqlx::query(&chunk_sql)
                .bind(id.to_hex())
                .bind(n as i32)
                .bind(chunk)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(id)
    }

    async fn delete(&self, database: &str, id: &ObjectId) -> Result<bool, StoreError> {
        match sqlx::query(&sql::delete_file(database))
            .bind(id.to_hex())
            .execute(&self.pool)
            .await
        {
            Ok(r) => Ok(r.rows_affected() > 0),
            Err(e) if is_missing_relation(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
