//! Vector-store adapter abstraction.
//!
//! An adapter is bound to one namespace at construction. Whether it accepts
//! caller-chosen record ids is a capability the indexer queries once through
//! [`VectorStore::supports_custom_ids`]; stores that mint their own ids
//! receive `None`.
//!
//! Backends: Pinecone-style HTTP store (app crate) and
//! [`memory::InMemoryVectorStore`].

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// The namespace this adapter reads and writes.
    fn namespace(&self) -> &str;

    /// Whether [`upload`](VectorStore::upload) honours caller-provided ids.
    fn supports_custom_ids(&self) -> bool;

    /// Upsert vectors with their metadata.
    ///
    /// `vectors` and `metadata` are parallel slices; `ids`, when given, is
    /// parallel too. Uploading an id that already exists overwrites it.
    async fn upload(
        &self,
        vectors: &[Vec<f32>],
        ids: Option<&[String]>,
        metadata: &[serde_json::Value],
    ) -> Result<()>;

    /// Delete records by id. Unknown ids are ignored.
    async fn delete(&self, ids: &[String]) -> Result<()>;
}

/// Check the parallel-slice contract of [`VectorStore::upload`].
pub fn check_upload_shape(
    vectors: &[Vec<f32>],
    ids: Option<&[String]>,
    metadata: &[serde_json::Value],
) -> Result<()> {
    if metadata.len() != vectors.len() {
        anyhow::bail!(
            "upload has {} vectors but {} metadata entries",
            vectors.len(),
            metadata.len()
        );
    }
    if let Some(ids) = ids {
        if ids.len() != vectors.len() {
            anyhow::bail!(
                "upload has {} vectors but {} ids",
                vectors.len(),
                ids.len()
            );
        }
    }
    Ok(())
}
