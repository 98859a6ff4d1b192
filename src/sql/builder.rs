//! SQL text for the PostgreSQL document layout. Identifiers come from request paths
//! and are always quoted; values are always bound as parameters.
//!
//! Layout: database → schema; collection → table `(id, seq, doc)`; large objects →
//! `"fs.files"` and `"fs.chunks"` inside the same schema.

use crate::store::{CHUNKS_COLLECTION, FILES_COLLECTION};

/// Quote identifier for PostgreSQL.
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
pub fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

pub const LIST_SCHEMAS: &str = "SELECT schema_name::text FROM information_schema.schemata \
     WHERE schema_name NOT LIKE 'pg\\_%' AND schema_name <> 'information_schema' ORDER BY schema_name";

/// Collections are the tables of a schema that carry a `doc` column.
pub const LIST_COLLECTIONS: &str = "SELECT table_name::text FROM information_schema.columns \
     WHERE table_schema = $1 AND column_name = 'doc' ORDER BY table_name";

pub fn create_schema(schema: &str) -> String {
    format!("CREATE SCHEMA IF NOT EXISTS {}", quoted(schema))
}

pub fn create_collection(schema: &str, table: &str) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            id TEXT PRIMARY KEY,
            seq BIGSERIAL NOT NULL,
            doc JSONB NOT NULL
        )
        "#,
        qualified_table(schema, table)
    )
}

pub fn select_docs(schema: &str, table: &str) -> String {
    format!("SELECT doc FROM {} ORDER BY seq", qualified_table(schema, table))
}

/// `$1` is the array of storage keys an identifier can denote; the oldest match wins.
pub fn select_doc_by_id(schema: &str, table: &str) -> String {
    format!(
        "SELECT doc FROM {} WHERE id = ANY($1) ORDER BY seq LIMIT 1",
        qualified_table(schema, table)
    )
}

/// Storage key and stored `_id` of the oldest row matching any key in `$1`.
pub fn select_key_by_id(schema: &str, table: &str) -> String {
    format!(
        "SELECT id, doc -> '_id' FROM {} WHERE id = ANY($1) ORDER BY seq LIMIT 1",
        qualified_table(schema, table)
    )
}

pub fn insert_doc(schema: &str, table: &str) -> String {
    format!("INSERT INTO {} (id, doc) VALUES ($1, $2)", qualified_table(schema, table))
}

/// Upsert keeping the original `seq`; returns whether the row was newly inserted.
pub fn upsert_doc(schema: &str, table: &str) -> String {
    format!(
        "INSERT INTO {} (id, doc) VALUES ($1, $2) ON CONFLICT (id) DO UPDATE SET doc = EXCLUDED.doc RETURNING (xmax = 0) AS inserted",
        qualified_table(schema, table)
    )
}

pub fn update_doc(schema: &str, table: &str) -> String {
    format!("UPDATE {} SET doc = $2 WHERE id = $1", qualified_table(schema, table))
}

/// Removes at most one row: the oldest matching any key in `$1`.
pub fn delete_doc(schema: &str, table: &str) -> String {
    let table = qualified_table(schema, table);
    format!(
        "DELETE FROM {table} WHERE seq = (SELECT seq FROM {table} WHERE id = ANY($1) ORDER BY seq LIMIT 1)"
    )
}

pub fn drop_table(schema: &str, table: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", qualified_table(schema, table))
}

pub fn drop_schema(schema: &str) -> String {
    format!("DROP SCHEMA IF EXISTS {} CASCADE", quoted(schema))
}

pub fn create_files_tables(schema: &str) -> [String; 2] {
    let files = qualified_table(schema, FILES_COLLECTION);
    let chunks = qualified_table(schema, CHUNKS_COLLECTION);
    [
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY,
                length BIGINT NOT NULL,
                chunk_size INT NOT NULL,
                filename TEXT,
                content_type TEXT,
                upload_date TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            files
        ),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                files_id TEXT NOT NULL REFERENCES {} (id) ON DELETE CASCADE,
                n INT NOT NULL,
                data BYTEA NOT NULL,
                PRIMARY KEY (files_id, n)
            )
            "#,
            chunks, files
        ),
    ]
}

pub fn insert_file(schema: &str) -> String {
    format!(
        "INSERT INTO {} (id, length, chunk_size, filename, content_type, upload_date) VALUES ($1, $2, $3, $4, $5, $6)",
        qualified_table(schema, FILES_COLLECTION)
    )
}

pub fn insert_chunk(schema: &str) -> String {
    format!(
        "INSERT INTO {} (files_id, n, data) VALUES ($1, $2, $3)",
        qualified_table(schema, CHUNKS_COLLECTION)
    )
}

pub fn select_file(schema: &str) -> String {
    format!(
        "SELECT id, length, chunk_size, filename, content_type, upload_date FROM {} WHERE id = $1",
        qualified_table(schema, FILES_COLLECTION)
    )
}

pub fn select_chunk(schema: &str) -> String {
    format!(
        "SELECT data FROM {} WHERE files_id = $1 AND n = $2",
        qualified_table(schema, CHUNKS_COLLECTION)
    )
}

pub fn delete_file(schema: &str) -> String {
    format!("DELETE FROM {} WHERE id = $1", qualified_table(schema, FILES_COLLECTION))
}
