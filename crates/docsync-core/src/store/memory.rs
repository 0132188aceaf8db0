//! In-memory [`IndexStore`] implementation for tests and dry runs.
//!
//! Uses `HashMap`s behind `std::sync::RwLock` for thread safety.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::hash::content_hash;
use crate::models::{
    CollectionId, Document, DocumentChunk, DocumentId, EmbeddingIdentity, EmbeddingRecord,
    EmbeddingsConfigId, RawChunk, SplittingId,
};

use super::{poisoned, IndexStore};

pub struct InMemoryStore {
    collections: RwLock<HashMap<CollectionId, Vec<Document>>>,
    chunks: RwLock<HashMap<(DocumentId, SplittingId), Vec<DocumentChunk>>>,
    embeddings: RwLock<HashMap<EmbeddingIdentity, Vec<f32>>>,
    indexed: RwLock<HashMap<String, BTreeSet<DocumentId>>>,
    next_chunk_id: AtomicI64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            chunks: RwLock::new(HashMap::new()),
            embeddings: RwLock::new(HashMap::new()),
            indexed: RwLock::new(HashMap::new()),
            next_chunk_id: AtomicI64::new(1),
        }
    }

    /// Append a document to a collection (replacing one with the same id).
    pub fn add_document(&self, collection_id: CollectionId, document: Document) -> Result<()> {
        let mut collections = self.collections.write().map_err(poisoned)?;
        let docs = collections.entry(collection_id).or_default();
        docs.retain(|d| d.id != document.id);
        docs.push(document);
        Ok(())
    }

    /// Detach a document from a collection. Its chunks stay cached.
    pub fn remove_document(
        &self,
        collection_id: CollectionId,
        document_id: DocumentId,
    ) -> Result<bool> {
        let mut collections = self.collections.write().map_err(poisoned)?;
        let Some(docs) = collections.get_mut(&collection_id) else {
            return Ok(false);
        };
        let before = docs.len();
        docs.retain(|d| d.id != document_id);
        Ok(docs.len() != before)
    }

    /// Documents recorded as indexed for `index_id`, ascending.
    pub fn indexed_documents(&self, index_id: &str) -> Result<Vec<DocumentId>> {
        let indexed = self.indexed.read().map_err(poisoned)?;
        Ok(indexed
            .get(index_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default())
    }

    pub fn embedding_count(&self) -> Result<usize> {
        Ok(self.embeddings.read().map_err(poisoned)?.len())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IndexStore for InMemoryStore {
    async fn documents_in_collection(&self, collection_id: CollectionId) -> Result<Vec<Document>> {
        let collections = self.collections.read().map_err(poisoned)?;
        Ok(collections.get(&collection_id).cloned().unwrap_or_default())
    }

    async fn get_chunks(
        &self,
        document_id: DocumentId,
        splitting_id: SplittingId,
    ) -> Result<Vec<DocumentChunk>> {
        let chunks = self.chunks.read().map_err(poisoned)?;
        Ok(chunks
            .get(&(document_id, splitting_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn create_chunks(
        &self,
        document_id: DocumentId,
        splitting_id: SplittingId,
        chunks: Vec<RawChunk>,
    ) -> Result<Vec<DocumentChunk>> {
        let created: Vec<DocumentChunk> = chunks
            .into_iter()
            .enumerate()
            .map(|(no, raw)| DocumentChunk {
                id: self.next_chunk_id.fetch_add(1, Ordering::Relaxed),
                document_id,
                splitting_id,
                chunk_no: no as i64,
                content_hash: content_hash(&raw.content),
                content: raw.content,
                meta: raw.meta,
            })
            .collect();
        let mut stored = self.chunks.write().map_err(poisoned)?;
        stored.insert((document_id, splitting_id), created.clone());
        Ok(created)
    }

    async fn chunk_hashes_by_documents(
        &self,
        document_ids: &[DocumentId],
        splitting_id: SplittingId,
    ) -> Result<Vec<String>> {
        let chunks = self.chunks.read().map_err(poisoned)?;
        Ok(document_ids
            .iter()
            .filter_map(|id| chunks.get(&(*id, splitting_id)))
            .flatten()
            .map(|c| c.content_hash.clone())
            .collect())
    }

    async fn get_embedding(
        &self,
        embeddings_config_id: EmbeddingsConfigId,
        content_hash: &str,
    ) -> Result<Option<Vec<f32>>> {
        let embeddings = self.embeddings.read().map_err(poisoned)?;
        let key = EmbeddingIdentity {
            embeddings_config_id,
            content_hash: content_hash.to_string(),
        };
        Ok(embeddings.get(&key).cloned())
    }

    async fn upsert_embeddings(&self, records: &[EmbeddingRecord]) -> Result<usize> {
        let mut embeddings = self.embeddings.write().map_err(poisoned)?;
        for record in records {
            embeddings.insert(record.identity.clone(), record.vector.clone());
        }
        Ok(records.len())
    }

    async fn add_indexed_documents(
        &self,
        index_id: &str,
        document_ids: &[DocumentId],
    ) -> Result<()> {
        let mut indexed = self.indexed.write().map_err(poisoned)?;
        indexed
            .entry(index_id.to_string())
            .or_default()
            .extend(document_ids.iter().copied());
        Ok(())
    }

    async fn remove_indexed_documents(
        &self,
        index_id: &str,
        document_ids: &[DocumentId],
    ) -> Result<usize> {
        let mut indexed = self.indexed.write().map_err(poisoned)?;
        let Some(ids) = indexed.get_mut(index_id) else {
            return Ok(0);
        };
        Ok(document_ids.iter().filter(|id| ids.remove(*id)).count())
    }
}
