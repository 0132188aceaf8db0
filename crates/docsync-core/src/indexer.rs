//! Sync orchestration.
//!
//! [`Indexer::sync`] applies an [`IndexSyncStatus`] to one vector-store
//! namespace. Deletions run before indexing, so a chunk whose content hash
//! is shared between a removed and an added document ends up present.
//!
//! # Pipeline per document
//!
//! ```text
//! get_chunks ──(none)──▶ load ──▶ split ──▶ create_chunks
//!      │
//!      ▼
//! get_embedding per chunk ──▶ cached: upload as-is
//!                         └─▶ missing: embed_batch ──▶ upsert_embeddings ──▶ upload
//!      │
//!      ▼
//! add_indexed_documents
//! ```
//!
//! Chunks and embeddings are keyed by content hash, so re-running a sync
//! after a failure only pays for what is still missing.

use std::sync::Arc;

use anyhow::{bail, Context, Result};

use crate::embedding::{validate_batch, EmbeddingsProvider};
use crate::error::IndexError;
use crate::loader::DocumentLoader;
use crate::models::{
    CollectionIndex, Document, DocumentChunk, DocumentId, EmbeddingIdentity, EmbeddingRecord,
    EmbeddingsConfigId, Splitting,
};
use crate::split::RecursiveCharacterSplitter;
use crate::store::IndexStore;
use crate::sync_status::IndexSyncStatus;
use crate::tracer::{Tracer, TracerExt};
use crate::vector_store::VectorStore;

/// What to do when a single document fails to index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Stop the sync and return the error.
    #[default]
    Abort,
    /// Record the failure, skip the document and keep going.
    Continue,
}

#[derive(Debug, Clone, Default)]
pub struct IndexerOptions {
    pub error_policy: ErrorPolicy,
}

/// Outcome of a sync run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    pub indexed: usize,
    pub deleted: usize,
    /// Documents skipped under [`ErrorPolicy::Continue`], with the error text.
    pub failed: Vec<(DocumentId, String)>,
}

pub struct Indexer {
    store: Arc<dyn IndexStore>,
    loader: Arc<dyn DocumentLoader>,
    embeddings: Arc<dyn EmbeddingsProvider>,
    vector_store: Arc<dyn VectorStore>,
    embeddings_config_id: EmbeddingsConfigId,
    splitting: Splitting,
    splitter: RecursiveCharacterSplitter,
    options: IndexerOptions,
}

impl Indexer {
    /// Fails with [`IndexError::InvalidSplitting`] if `splitting` cannot
    /// drive a splitter.
    pub fn new(
        store: Arc<dyn IndexStore>,
        loader: Arc<dyn DocumentLoader>,
        embeddings: Arc<dyn EmbeddingsProvider>,
        vector_store: Arc<dyn VectorStore>,
        embeddings_config_id: EmbeddingsConfigId,
        splitting: Splitting,
        options: IndexerOptions,
    ) -> Result<Self, IndexError> {
        let splitter = RecursiveCharacterSplitter::from_splitting(&splitting)?;
        Ok(Self {
            store,
            loader,
            embeddings,
            vector_store,
            embeddings_config_id,
            splitting,
            splitter,
            options,
        })
    }

    /// Bring the namespace in line with `status`, then clear it.
    ///
    /// `index.indexed_documents` and the store's bookkeeping are updated as
    /// documents are removed and indexed. Under [`ErrorPolicy::Abort`] the
    /// first failing document stops the run and `status` is left intact so
    /// the caller can inspect or retry it.
    pub async fn sync(
        &self,
        status: &mut IndexSyncStatus,
        index: &mut CollectionIndex,
        tracer: &mut dyn Tracer,
    ) -> Result<SyncReport> {
        if index.splitting.id != self.splitting.id {
            bail!(
                "index '{}' uses splitting {} but the indexer was built for splitting {}",
                index.name,
                index.splitting.id,
                self.splitting.id
            );
        }

        let namespace = self.vector_store.namespace().to_string();
        tracing::info!(
            namespace = %namespace,
            to_index = status.to_indexed.len(),
            to_delete = status.to_deleted.len(),
            "sync started"
        );

        let mut report = SyncReport::default();
        let mut top = tracer.step(&format!("Syncing {namespace}"), "", Some(2));

        report.deleted = self
            .delete_documents(&status.to_deleted, index, &mut top)
            .await?;

        {
            let total = status.to_indexed.len();
            let mut phase = top.step("Indexing", &format!("{total} documents"), Some(total));
            for document in &status.to_indexed {
                let mut doc_step = phase.step(&document.filename, &document.filepath, Some(4));
                match self.index_document(document, index, &mut doc_step).await {
                    Ok(()) => {
                        index.indexed_documents.push(document.id);
                        report.indexed += 1;
                    }
                    Err(err) => {
                        let fatal = err.downcast_ref::<IndexError>().is_some();
                        if fatal || self.options.error_policy == ErrorPolicy::Abort {
                            return Err(err.context(format!("indexing {}", document.filepath)));
                        }
                        let reason = format!("{err:#}");
                        tracing::warn!(document = document.id, error = %reason, "document skipped");
                        doc_step.warn(&format!("skipped {}: {reason}", document.filename));
                        report.failed.push((document.id, reason));
                    }
                }
            }
        }

        status.clear();
        top.log(&format!(
            "indexed {} documents, deleted {}, failed {}",
            report.indexed,
            report.deleted,
            report.failed.len()
        ));
        tracing::info!(
            namespace = %namespace,
            indexed = report.indexed,
            deleted = report.deleted,
            failed = report.failed.len(),
            "sync finished"
        );
        Ok(report)
    }

    async fn delete_documents(
        &self,
        document_ids: &[DocumentId],
        index: &mut CollectionIndex,
        tracer: &mut dyn Tracer,
    ) -> Result<usize> {
        remove_documents(
            self.store.as_ref(),
            self.vector_store.as_ref(),
            document_ids,
            index,
            tracer,
        )
        .await
    }

    async fn index_document(
        &self,
        document: &Document,
        index: &CollectionIndex,
        tracer: &mut dyn Tracer,
    ) -> Result<()> {
        let chunks = {
            let mut step = tracer.step("Chunking", "", None);
            let chunks = self.chunks_for(document).await?;
            step.log(&format!("{}: {} chunks", document.filename, chunks.len()));
            chunks
        };

        let mut cached = Vec::new();
        let mut missing = Vec::new();
        for chunk in &chunks {
            match self
                .store
                .get_embedding(self.embeddings_config_id, &chunk.content_hash)
                .await?
            {
                Some(vector) => cached.push((chunk, vector)),
                None => missing.push(chunk),
            }
        }

        {
            let mut step = tracer.step("Reusing cached", "", None);
            if !cached.is_empty() {
                let (chunks, vectors): (Vec<&DocumentChunk>, Vec<Vec<f32>>) =
                    cached.into_iter().unzip();
                self.upload(&chunks, &vectors).await?;
                step.log(&format!("re-uploaded {} cached vectors", vectors.len()));
            }
        }

        let vectors = {
            let mut step = tracer.step("Embedding", "", None);
            if missing.is_empty() {
                Vec::new()
            } else {
                let texts: Vec<String> = missing.iter().map(|c| c.content.clone()).collect();
                let vectors = self
                    .embeddings
                    .embed_batch(&texts)
                    .await
                    .with_context(|| format!("embedding {}", document.filename))?;
                validate_batch(&vectors, texts.len(), self.embeddings.dims())?;

                let records: Vec<EmbeddingRecord> = missing
                    .iter()
                    .zip(&vectors)
                    .map(|(chunk, vector)| EmbeddingRecord {
                        identity: EmbeddingIdentity {
                            embeddings_config_id: self.embeddings_config_id,
                            content_hash: chunk.content_hash.clone(),
                        },
                        vector: vector.clone(),
                    })
                    .collect();
                self.store.upsert_embeddings(&records).await?;
                step.log(&format!(
                    "embedded {} chunks with {}",
                    texts.len(),
                    self.embeddings.model_name()
                ));
                vectors
            }
        };

        {
            let mut step = tracer.step("Uploading", "", None);
            if !vectors.is_empty() {
                self.upload(&missing, &vectors).await?;
                step.log(&format!("uploaded {} vectors", vectors.len()));
            }
        }

        self.store
            .add_indexed_documents(&index.id, &[document.id])
            .await?;
        tracing::debug!(
            document = document.id,
            chunks = chunks.len(),
            embedded = vectors.len(),
            "document indexed"
        );
        Ok(())
    }

    /// Stored chunks for the document, splitting and persisting it first if
    /// it has never been chunked under this splitting.
    async fn chunks_for(&self, document: &Document) -> Result<Vec<DocumentChunk>> {
        let existing = self.store.get_chunks(document.id, self.splitting.id).await?;
        if !existing.is_empty() {
            return Ok(existing);
        }
        let sources = self
            .loader
            .load(document)
            .await
            .with_context(|| format!("loading {}", document.filepath))?;
        let raw = self.splitter.split_sources(&sources);
        self.store
            .create_chunks(document.id, self.splitting.id, raw)
            .await
    }

    async fn upload(&self, chunks: &[&DocumentChunk], vectors: &[Vec<f32>]) -> Result<()> {
        let ids: Option<Vec<String>> = self
            .vector_store
            .supports_custom_ids()
            .then(|| chunks.iter().map(|c| c.content_hash.clone()).collect());
        let metadata: Vec<serde_json::Value> =
            chunks.iter().map(|c| c.vector_metadata()).collect();
        self.vector_store
            .upload(vectors, ids.as_deref(), &metadata)
            .await
            .with_context(|| format!("uploading to '{}'", self.vector_store.namespace()))
    }
}

/// Delete the vectors of `document_ids` from the index's namespace and drop
/// them from its bookkeeping. Returns how many bookkeeping rows were removed.
///
/// A failed remote delete is reported as a warning on the tracer and does
/// not stop the bookkeeping update, so the documents are not retried.
/// [`Indexer::sync`] uses this for removed documents; deleting a whole index
/// passes every indexed document.
pub async fn remove_documents(
    store: &dyn IndexStore,
    vector_store: &dyn VectorStore,
    document_ids: &[DocumentId],
    index: &mut CollectionIndex,
    tracer: &mut dyn Tracer,
) -> Result<usize> {
    let mut step = tracer.step(
        "Deleting",
        &format!("{} documents", document_ids.len()),
        None,
    );
    if document_ids.is_empty() {
        return Ok(0);
    }

    let hashes = store
        .chunk_hashes_by_documents(document_ids, index.splitting.id)
        .await?;
    if !hashes.is_empty() {
        if let Err(err) = vector_store.delete(&hashes).await {
            tracing::warn!(
                namespace = vector_store.namespace(),
                error = %format!("{err:#}"),
                "vector delete failed"
            );
            step.warn(&format!(
                "failed to delete {} vectors: {err:#}",
                hashes.len()
            ));
        }
    }

    let removed = store
        .remove_indexed_documents(&index.id, document_ids)
        .await?;
    index
        .indexed_documents
        .retain(|id| !document_ids.contains(id));
    step.log(&format!(
        "removed {} documents ({} vectors)",
        removed,
        hashes.len()
    ));
    Ok(removed)
}
