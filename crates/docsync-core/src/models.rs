//! Core data models shared by the indexer and its collaborators.

use serde::{Deserialize, Serialize};

/// Free-form chunk attributes (page number, source path, ...).
pub type ChunkMeta = serde_json::Map<String, serde_json::Value>;

pub type DocumentId = i64;
pub type CollectionId = i64;
pub type SplittingId = i64;
pub type EmbeddingsConfigId = i64;
pub type VectorDbConfigId = i64;

/// A document imported into the library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub filepath: String,
    pub filename: String,
    /// Hash of the file content at import time.
    pub content_hash: String,
}

/// A piece of text produced by a loader, before splitting.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceText {
    pub text: String,
    pub meta: ChunkMeta,
}

impl SourceText {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            meta: ChunkMeta::new(),
        }
    }
}

/// Splitter output that has not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct RawChunk {
    pub content: String,
    pub meta: ChunkMeta,
}

/// A persisted chunk of a document under one splitting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: i64,
    pub document_id: DocumentId,
    pub splitting_id: SplittingId,
    pub chunk_no: i64,
    pub content: String,
    /// Cache key and vector-store record id.
    pub content_hash: String,
    pub meta: ChunkMeta,
}

impl DocumentChunk {
    /// Metadata attached to the chunk's vector in the vector store.
    ///
    /// Carries the chunk text under `text` so retrieval can rebuild the
    /// passage without a local lookup.
    pub fn vector_metadata(&self) -> serde_json::Value {
        let mut meta = self.meta.clone();
        meta.insert("text".to_string(), self.content.clone().into());
        meta.insert("document_id".to_string(), self.document_id.into());
        meta.insert("chunk_no".to_string(), self.chunk_no.into());
        serde_json::Value::Object(meta)
    }
}

/// Chunking configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Splitting {
    pub id: SplittingId,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

/// Cache key of an embedding vector.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmbeddingIdentity {
    pub embeddings_config_id: EmbeddingsConfigId,
    pub content_hash: String,
}

/// A cached embedding vector.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingRecord {
    pub identity: EmbeddingIdentity,
    pub vector: Vec<f32>,
}

/// An index profile applied to a collection.
///
/// `indexed_documents` lists the documents whose vectors are believed to be
/// present in the vector-store namespace. It is the authority for what the
/// namespace should contain and may lag the collection until a sync runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionIndex {
    pub id: String,
    pub name: String,
    pub collection_id: CollectionId,
    pub splitting: Splitting,
    pub embeddings_config_id: EmbeddingsConfigId,
    pub vector_db_config_id: VectorDbConfigId,
    pub indexed_documents: Vec<DocumentId>,
}

impl CollectionIndex {
    /// Vector-store namespace isolating this index from others in the same store.
    pub fn namespace(&self) -> String {
        [
            kebab_case(&self.name),
            self.collection_id.to_string(),
            self.splitting.id.to_string(),
            self.embeddings_config_id.to_string(),
            self.vector_db_config_id.to_string(),
        ]
        .join("-")
    }
}

fn kebab_case(name: &str) -> String {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| part.to_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(name: &str) -> CollectionIndex {
        CollectionIndex {
            id: "idx".to_string(),
            name: name.to_string(),
            collection_id: 3,
            splitting: Splitting {
                id: 7,
                chunk_size: 1000,
                chunk_overlap: 200,
            },
            embeddings_config_id: 11,
            vector_db_config_id: 13,
            indexed_documents: Vec::new(),
        }
    }

    #[test]
    fn namespace_joins_profile_ids() {
        assert_eq!(index("My Papers").namespace(), "my-papers-3-7-11-13");
    }

    #[test]
    fn namespace_with_empty_name() {
        assert_eq!(index("  ").namespace(), "-3-7-11-13");
    }

    #[test]
    fn vector_metadata_carries_text() {
        let mut meta = ChunkMeta::new();
        meta.insert("page".to_string(), 2.into());
        let chunk = DocumentChunk {
            id: 1,
            document_id: 5,
            splitting_id: 7,
            chunk_no: 0,
            content: "hello".to_string(),
            content_hash: "h".to_string(),
            meta,
        };
        let value = chunk.vector_metadata();
        assert_eq!(value["text"], "hello");
        assert_eq!(value["page"], 2);
        assert_eq!(value["document_id"], 5);
    }
}
