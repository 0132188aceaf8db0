//! Idempotent schema migrations.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS collections (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS documents (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        filepath TEXT NOT NULL,
        filename TEXT NOT NULL,
        content_hash TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        UNIQUE (filepath, content_hash)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS collection_documents (
        collection_id INTEGER NOT NULL,
        document_id INTEGER NOT NULL,
        added_at INTEGER NOT NULL,
        PRIMARY KEY (collection_id, document_id),
        FOREIGN KEY (collection_id) REFERENCES collections(id),
        FOREIGN KEY (document_id) REFERENCES documents(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS splittings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        chunk_size INTEGER NOT NULL,
        chunk_overlap INTEGER NOT NULL,
        UNIQUE (chunk_size, chunk_overlap)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS document_chunks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        document_id INTEGER NOT NULL,
        splitting_id INTEGER NOT NULL,
        chunk_no INTEGER NOT NULL,
        content TEXT NOT NULL,
        content_hash TEXT NOT NULL,
        meta_json TEXT NOT NULL DEFAULT '{}',
        UNIQUE (document_id, splitting_id, chunk_no),
        FOREIGN KEY (document_id) REFERENCES documents(id),
        FOREIGN KEY (splitting_id) REFERENCES splittings(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS embedding_vectors (
        embeddings_config_id INTEGER NOT NULL,
        content_hash TEXT NOT NULL,
        dims INTEGER NOT NULL,
        vector BLOB NOT NULL,
        created_at INTEGER NOT NULL,
        PRIMARY KEY (embeddings_config_id, content_hash)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS collection_indexes (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        collection_id INTEGER NOT NULL,
        splitting_id INTEGER NOT NULL,
        embeddings_config_id INTEGER NOT NULL,
        vector_db_config_id INTEGER NOT NULL,
        created_at INTEGER NOT NULL,
        synced_at INTEGER,
        FOREIGN KEY (collection_id) REFERENCES collections(id),
        FOREIGN KEY (splitting_id) REFERENCES splittings(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS collection_index_documents (
        index_id TEXT NOT NULL,
        document_id INTEGER NOT NULL,
        PRIMARY KEY (index_id, document_id),
        FOREIGN KEY (index_id) REFERENCES collection_indexes(id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_document_chunks_doc ON document_chunks(document_id, splitting_id)",
    "CREATE INDEX IF NOT EXISTS idx_collection_documents_doc ON collection_documents(document_id)",
];

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create every table and index that does not exist yet.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
