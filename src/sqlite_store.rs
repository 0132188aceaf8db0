//! SQLite-backed [`IndexStore`].
//!
//! Besides the indexer's persistence needs, [`SqliteStore`] carries the
//! catalogue operations the CLI uses to build collections and indexes.
//! Vectors are stored as little-endian `f32` BLOBs (see
//! [`vec_to_blob`](docsync_core::embedding::vec_to_blob)).

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use docsync_core::embedding::{blob_to_vec, vec_to_blob};
use docsync_core::hash::content_hash;
use docsync_core::models::{
    ChunkMeta, CollectionId, CollectionIndex, Document, DocumentChunk, DocumentId,
    EmbeddingRecord, EmbeddingsConfigId, RawChunk, Splitting, SplittingId, VectorDbConfigId,
};
use docsync_core::store::IndexStore;
use docsync_core::IndexError;

pub struct SqliteStore {
    pool: SqlitePool,
}

/// A row of `docsync list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSummary {
    pub id: CollectionId,
    pub name: String,
    pub documents: i64,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn create_collection(&self, name: &str) -> Result<CollectionId> {
        let result = sqlx::query("INSERT INTO collections (name, created_at) VALUES (?, ?)")
            .bind(name)
            .bind(Utc::now().timestamp())
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn collection_exists(&self, collection_id: CollectionId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM collections WHERE id = ?")
            .bind(collection_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    pub async fn rename_collection(
        &self,
        collection_id: CollectionId,
        name: &str,
    ) -> Result<bool> {
        let result = sqlx::query("UPDATE collections SET name = ? WHERE id = ?")
            .bind(name)
            .bind(collection_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a collection and its memberships. Its indexes must have been
    /// deleted first.
    pub async fn delete_collection(&self, collection_id: CollectionId) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM collection_documents WHERE collection_id = ?")
            .bind(collection_id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM collections WHERE id = ?")
            .bind(collection_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    /// Every collection with its document count, by id.
    pub async fn list_collections(&self) -> Result<Vec<CollectionSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.name,
                   (SELECT COUNT(*) FROM collection_documents cd
                       WHERE cd.collection_id = c.id) AS documents
            FROM collections c
            ORDER BY c.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|row| CollectionSummary {
                id: row.get("id"),
                name: row.get("name"),
                documents: row.get("documents"),
            })
            .collect())
    }

    /// The document for this exact `(filepath, content_hash)`, created on
    /// first import.
    ///
    /// A file whose bytes changed becomes a new document. The previous
    /// version keeps its id and chunks, so an index that still holds it can
    /// delete its vectors.
    pub async fn get_or_create_document(
        &self,
        filepath: &str,
        filename: &str,
        content_hash: &str,
    ) -> Result<Document> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO documents (filepath, filename, content_hash, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(filepath)
        .bind(filename)
        .bind(content_hash)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        let row = sqlx::query(
            r#"
            SELECT id, filepath, filename, content_hash FROM documents
            WHERE filepath = ? AND content_hash = ?
            "#,
        )
        .bind(filepath)
        .bind(content_hash)
        .fetch_one(&self.pool)
        .await?;
        Ok(document_from_row(&row))
    }

    /// Detach from the collection every other version of the file at
    /// `filepath`. Returns how many were detached.
    pub async fn detach_other_versions(
        &self,
        collection_id: CollectionId,
        filepath: &str,
        keep: DocumentId,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM collection_documents
            WHERE collection_id = ?
              AND document_id IN (SELECT id FROM documents WHERE filepath = ? AND id != ?)
            "#,
        )
        .bind(collection_id)
        .bind(filepath)
        .bind(keep)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Returns `false` if the document already belonged to the collection.
    pub async fn add_to_collection(
        &self,
        collection_id: CollectionId,
        document_id: DocumentId,
    ) -> Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO collection_documents (collection_id, document_id, added_at) VALUES (?, ?, ?)",
        )
        .bind(collection_id)
        .bind(document_id)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn remove_from_collection(
        &self,
        collection_id: CollectionId,
        document_id: DocumentId,
    ) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM collection_documents WHERE collection_id = ? AND document_id = ?",
        )
        .bind(collection_id)
        .bind(document_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// The splitting for `(chunk_size, chunk_overlap)`, created on first use.
    pub async fn get_or_create_splitting(
        &self,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Result<Splitting> {
        if chunk_size == 0 || chunk_overlap >= chunk_size {
            return Err(IndexError::InvalidSplitting {
                chunk_size,
                chunk_overlap,
            }
            .into());
        }
        sqlx::query("INSERT OR IGNORE INTO splittings (chunk_size, chunk_overlap) VALUES (?, ?)")
            .bind(chunk_size as i64)
            .bind(chunk_overlap as i64)
            .execute(&self.pool)
            .await?;
        let id: i64 =
            sqlx::query_scalar("SELECT id FROM splittings WHERE chunk_size = ? AND chunk_overlap = ?")
                .bind(chunk_size as i64)
                .bind(chunk_overlap as i64)
                .fetch_one(&self.pool)
                .await?;
        Ok(Splitting {
            id,
            chunk_size,
            chunk_overlap,
        })
    }

    pub async fn create_index(
        &self,
        name: &str,
        collection_id: CollectionId,
        splitting: Splitting,
        embeddings_config_id: EmbeddingsConfigId,
        vector_db_config_id: VectorDbConfigId,
    ) -> Result<CollectionIndex> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO collection_indexes
                (id, name, collection_id, splitting_id, embeddings_config_id, vector_db_config_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(name)
        .bind(collection_id)
        .bind(splitting.id)
        .bind(embeddings_config_id)
        .bind(vector_db_config_id)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(CollectionIndex {
            id,
            name: name.to_string(),
            collection_id,
            splitting,
            embeddings_config_id,
            vector_db_config_id,
            indexed_documents: Vec::new(),
        })
    }

    /// Load an index with its splitting and indexed-documents set.
    pub async fn get_index(&self, index_id: &str) -> Result<Option<CollectionIndex>> {
        let row = sqlx::query(
            r#"
            SELECT ci.id, ci.name, ci.collection_id, ci.embeddings_config_id,
                   ci.vector_db_config_id, s.id AS splitting_id, s.chunk_size, s.chunk_overlap
            FROM collection_indexes ci
            JOIN splittings s ON s.id = ci.splitting_id
            WHERE ci.id = ?
            "#,
        )
        .bind(index_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let indexed_documents: Vec<DocumentId> = sqlx::query_scalar(
            "SELECT document_id FROM collection_index_documents WHERE index_id = ? ORDER BY document_id",
        )
        .bind(index_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(CollectionIndex {
            id: row.get("id"),
            name: row.get("name"),
            collection_id: row.get("collection_id"),
            splitting: Splitting {
                id: row.get("splitting_id"),
                chunk_size: row.get::<i64, _>("chunk_size") as usize,
                chunk_overlap: row.get::<i64, _>("chunk_overlap") as usize,
            },
            embeddings_config_id: row.get("embeddings_config_id"),
            vector_db_config_id: row.get("vector_db_config_id"),
            indexed_documents,
        }))
    }

    /// Ids of the indexes built on a collection, oldest first.
    pub async fn index_ids_for_collection(
        &self,
        collection_id: CollectionId,
    ) -> Result<Vec<String>> {
        let ids = sqlx::query_scalar(
            "SELECT id FROM collection_indexes WHERE collection_id = ? ORDER BY created_at, id",
        )
        .bind(collection_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// Indexes built on a collection, oldest first.
    pub async fn indexes_for_collection(
        &self,
        collection_id: CollectionId,
    ) -> Result<Vec<CollectionIndex>> {
        let mut indexes = Vec::new();
        for id in self.index_ids_for_collection(collection_id).await? {
            if let Some(index) = self.get_index(&id).await? {
                indexes.push(index);
            }
        }
        Ok(indexes)
    }

    /// Drop an index and its indexed-documents rows.
    pub async fn delete_index(&self, index_id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM collection_index_documents WHERE index_id = ?")
            .bind(index_id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM collection_indexes WHERE id = ?")
            .bind(index_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_synced(&self, index_id: &str) -> Result<()> {
        sqlx::query("UPDATE collection_indexes SET synced_at = ? WHERE id = ?")
            .bind(Utc::now().timestamp())
            .bind(index_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn document_from_row(row: &SqliteRow) -> Document {
    Document {
        id: row.get("id"),
        filepath: row.get("filepath"),
        filename: row.get("filename"),
        content_hash: row.get("content_hash"),
    }
}

fn chunk_from_row(row: &SqliteRow) -> Result<DocumentChunk> {
    let meta_json: String = row.get("meta_json");
    let meta: ChunkMeta = serde_json::from_str(&meta_json)
        .with_context(|| format!("Invalid chunk metadata: {}", meta_json))?;
    Ok(DocumentChunk {
        id: row.get("id"),
        document_id: row.get("document_id"),
        splitting_id: row.get("splitting_id"),
        chunk_no: row.get("chunk_no"),
        content: row.get("content"),
        content_hash: row.get("content_hash"),
        meta,
    })
}

#[async_trait]
impl IndexStore for SqliteStore {
    async fn documents_in_collection(&self, collection_id: CollectionId) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            r#"
            SELECT d.id, d.filepath, d.filename, d.content_hash
            FROM documents d
            JOIN collection_documents cd ON cd.document_id = d.id
            WHERE cd.collection_id = ?
            ORDER BY d.id
            "#,
        )
        .bind(collection_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(document_from_row).collect())
    }

    async fn get_chunks(
        &self,
        document_id: DocumentId,
        splitting_id: SplittingId,
    ) -> Result<Vec<DocumentChunk>> {
        let rows = sqlx::query(
            r#"
            SELECT id, document_id, splitting_id, chunk_no, content, content_hash, meta_json
            FROM document_chunks
            WHERE document_id = ? AND splitting_id = ?
            ORDER BY chunk_no
            "#,
        )
        .bind(document_id)
        .bind(splitting_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(chunk_from_row).collect()
    }

    async fn create_chunks(
        &self,
        document_id: DocumentId,
        splitting_id: SplittingId,
        chunks: Vec<RawChunk>,
    ) -> Result<Vec<DocumentChunk>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM document_chunks WHERE document_id = ? AND splitting_id = ?")
            .bind(document_id)
            .bind(splitting_id)
            .execute(&mut *tx)
            .await?;

        let mut created = Vec::with_capacity(chunks.len());
        for (no, raw) in chunks.into_iter().enumerate() {
            let hash = content_hash(&raw.content);
            let meta_json = serde_json::to_string(&raw.meta)?;
            let id = sqlx::query(
                r#"
                INSERT INTO document_chunks
                    (document_id, splitting_id, chunk_no, content, content_hash, meta_json)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(document_id)
            .bind(splitting_id)
            .bind(no as i64)
            .bind(&raw.content)
            .bind(&hash)
            .bind(&meta_json)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

            created.push(DocumentChunk {
                id,
                document_id,
                splitting_id,
                chunk_no: no as i64,
                content: raw.content,
                content_hash: hash,
                meta: raw.meta,
            });
        }
        tx.commit().await?;
        Ok(created)
    }

    async fn chunk_hashes_by_documents(
        &self,
        document_ids: &[DocumentId],
        splitting_id: SplittingId,
    ) -> Result<Vec<String>> {
        if document_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT content_hash FROM document_chunks WHERE splitting_id = ");
        query.push_bind(splitting_id);
        query.push(" AND document_id IN (");
        let mut ids = query.separated(", ");
        for id in document_ids {
            ids.push_bind(*id);
        }
        ids.push_unseparated(") ORDER BY document_id, chunk_no");

        let hashes = query
            .build_query_scalar::<String>()
            .fetch_all(&self.pool)
            .await?;
        Ok(hashes)
    }

    async fn get_embedding(
        &self,
        embeddings_config_id: EmbeddingsConfigId,
        content_hash: &str,
    ) -> Result<Option<Vec<f32>>> {
        let blob: Option<Vec<u8>> = sqlx::query_scalar(
            "SELECT vector FROM embedding_vectors WHERE embeddings_config_id = ? AND content_hash = ?",
        )
        .bind(embeddings_config_id)
        .bind(content_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(blob.map(|b| blob_to_vec(&b)))
    }

    async fn upsert_embeddings(&self, records: &[EmbeddingRecord]) -> Result<usize> {
        let now = Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;
        for record in records {
            sqlx::query(
                r#"
                INSERT INTO embedding_vectors
                    (embeddings_config_id, content_hash, dims, vector, created_at)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(embeddings_config_id, content_hash)
                DO UPDATE SET dims = excluded.dims, vector = excluded.vector
                "#,
            )
            .bind(record.identity.embeddings_config_id)
            .bind(&record.identity.content_hash)
            .bind(record.vector.len() as i64)
            .bind(vec_to_blob(&record.vector))
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(records.len())
    }

    async fn add_indexed_documents(
        &self,
        index_id: &str,
        document_ids: &[DocumentId],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for id in document_ids {
            sqlx::query(
                "INSERT OR IGNORE INTO collection_index_documents (index_id, document_id) VALUES (?, ?)",
            )
            .bind(index_id)
            .bind(*id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn remove_indexed_documents(
        &self,
        index_id: &str,
        document_ids: &[DocumentId],
    ) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let mut removed = 0u64;
        for id in document_ids {
            removed += sqlx::query(
                "DELETE FROM collection_index_documents WHERE index_id = ? AND document_id = ?",
            )
            .bind(index_id)
            .bind(*id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }
        tx.commit().await?;
        Ok(removed as usize)
    }
}
