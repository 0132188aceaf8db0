//! Local persistence abstraction for the indexer.
//!
//! The [`IndexStore`] trait groups everything the indexer reads from or
//! writes to the local database: the collection's documents, the chunk
//! store, the content-addressed embedding cache and the per-index
//! bookkeeping of indexed documents. Backends: SQLite (app crate) and
//! [`memory::InMemoryStore`].
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//!
//! # Operations
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`documents_in_collection`](IndexStore::documents_in_collection) | Live documents of a collection |
//! | [`get_chunks`](IndexStore::get_chunks) | Chunks of a document under one splitting |
//! | [`create_chunks`](IndexStore::create_chunks) | Persist freshly split chunks |
//! | [`chunk_hashes_by_documents`](IndexStore::chunk_hashes_by_documents) | Vector ids of documents being removed |
//! | [`get_embedding`](IndexStore::get_embedding) | Embedding cache lookup |
//! | [`upsert_embeddings`](IndexStore::upsert_embeddings) | Embedding cache write |
//! | [`add_indexed_documents`](IndexStore::add_indexed_documents) | Mark documents indexed |
//! | [`remove_indexed_documents`](IndexStore::remove_indexed_documents) | Unmark documents |

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{
    CollectionId, Document, DocumentChunk, DocumentId, EmbeddingRecord, EmbeddingsConfigId,
    RawChunk, SplittingId,
};

#[async_trait]
pub trait IndexStore: Send + Sync {
    /// All documents currently in the collection, in a stable order.
    async fn documents_in_collection(&self, collection_id: CollectionId) -> Result<Vec<Document>>;

    /// Chunks previously created for `(document, splitting)`, ordered by `chunk_no`.
    async fn get_chunks(
        &self,
        document_id: DocumentId,
        splitting_id: SplittingId,
    ) -> Result<Vec<DocumentChunk>>;

    /// Persist chunks for `(document, splitting)`, numbering them in order
    /// and hashing their content. Returns the stored chunks.
    async fn create_chunks(
        &self,
        document_id: DocumentId,
        splitting_id: SplittingId,
        chunks: Vec<RawChunk>,
    ) -> Result<Vec<DocumentChunk>>;

    /// Content hashes of every chunk of the given documents under one splitting.
    async fn chunk_hashes_by_documents(
        &self,
        document_ids: &[DocumentId],
        splitting_id: SplittingId,
    ) -> Result<Vec<String>>;

    /// Cached vector for `(embeddings_config_id, content_hash)`, if any.
    async fn get_embedding(
        &self,
        embeddings_config_id: EmbeddingsConfigId,
        content_hash: &str,
    ) -> Result<Option<Vec<f32>>>;

    /// Insert or overwrite cache entries. Returns the number written.
    async fn upsert_embeddings(&self, records: &[EmbeddingRecord]) -> Result<usize>;

    /// Record documents as present in the index's namespace.
    async fn add_indexed_documents(&self, index_id: &str, document_ids: &[DocumentId])
        -> Result<()>;

    /// Forget documents from the index. Returns how many were removed.
    async fn remove_indexed_documents(
        &self,
        index_id: &str,
        document_ids: &[DocumentId],
    ) -> Result<usize>;
}

pub(crate) fn poisoned<T>(err: std::sync::PoisonError<T>) -> anyhow::Error {
    anyhow::anyhow!("store lock poisoned: {}", err)
}
