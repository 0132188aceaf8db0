//! Vector-store backends.
//!
//! [`create_vector_store`] resolves `[vector_store]` once into an adapter
//! bound to an index namespace:
//!
//! | `kind` | Adapter | Custom ids |
//! |--------|---------|------------|
//! | `"pinecone"` | [`PineconeStore`] | yes |
//! | `"memory"` | [`InMemoryVectorStore`] | yes |

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use docsync_core::vector_store::memory::InMemoryVectorStore;
use docsync_core::vector_store::{check_upload_shape, VectorStore};

use crate::config::{VectorStoreConfig, VectorStoreKind};
use crate::http::{self, JsonPost};

/// Pinecone rejects delete requests with more ids than this.
const DELETE_BATCH: usize = 1000;

/// Pinecone data-plane client for one namespace.
///
/// Upserts go to `POST {host}/vectors/upsert` in batches of `batch_size`;
/// deletes go to `POST {host}/vectors/delete`.
pub struct PineconeStore {
    host: String,
    api_key: String,
    namespace: String,
    batch_size: usize,
    max_retries: u32,
    client: reqwest::Client,
}

impl PineconeStore {
    pub fn new(
        host: &str,
        api_key: String,
        namespace: &str,
        batch_size: usize,
        max_retries: u32,
        timeout_secs: u64,
    ) -> Result<Self> {
        let host = host.trim_end_matches('/');
        let host = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{}", host)
        };
        Ok(Self {
            host,
            api_key,
            namespace: namespace.to_string(),
            batch_size: batch_size.max(1),
            max_retries,
            client: http::client(timeout_secs)?,
        })
    }

    async fn post(&self, path: &str, body: &serde_json::Value) -> Result<serde_json::Value> {
        let url = format!("{}{}", self.host, path);
        http::post_json(
            &self.client,
            JsonPost {
                service: "Pinecone",
                url: &url,
                headers: &[("Api-Key", self.api_key.as_str())],
                body,
                max_retries: self.max_retries,
            },
        )
        .await
    }
}

/// Body of one `/vectors/upsert` request.
fn upsert_body(
    namespace: &str,
    ids: &[String],
    vectors: &[Vec<f32>],
    metadata: &[serde_json::Value],
) -> serde_json::Value {
    let records: Vec<serde_json::Value> = ids
        .iter()
        .zip(vectors)
        .zip(metadata)
        .map(|((id, values), meta)| {
            serde_json::json!({
                "id": id,
                "values": values,
                "metadata": meta,
            })
        })
        .collect();
    serde_json::json!({
        "vectors": records,
        "namespace": namespace,
    })
}

fn delete_body(namespace: &str, ids: &[String]) -> serde_json::Value {
    serde_json::json!({
        "ids": ids,
        "namespace": namespace,
    })
}

#[async_trait]
impl VectorStore for PineconeStore {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn supports_custom_ids(&self) -> bool {
        true
    }

    async fn upload(
        &self,
        vectors: &[Vec<f32>],
        ids: Option<&[String]>,
        metadata: &[serde_json::Value],
    ) -> Result<()> {
        check_upload_shape(vectors, ids, metadata)?;
        let ids: Vec<String> = match ids {
            Some(ids) => ids.to_vec(),
            None => vectors.iter().map(|_| Uuid::new_v4().to_string()).collect(),
        };

        for (batch_no, start) in (0..vectors.len()).step_by(self.batch_size).enumerate() {
            let end = (start + self.batch_size).min(vectors.len());
            let body = upsert_body(
                &self.namespace,
                &ids[start..end],
                &vectors[start..end],
                &metadata[start..end],
            );
            self.post("/vectors/upsert", &body)
                .await
                .with_context(|| format!("upsert batch {} to '{}'", batch_no, self.namespace))?;
            tracing::debug!(
                namespace = %self.namespace,
                batch = batch_no,
                vectors = end - start,
                "pinecone upsert"
            );
        }
        Ok(())
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        for batch in ids.chunks(DELETE_BATCH) {
            self.post("/vectors/delete", &delete_body(&self.namespace, batch))
                .await
                .with_context(|| format!("delete from '{}'", self.namespace))?;
        }
        Ok(())
    }
}

/// Build the configured adapter for `namespace`.
pub fn create_vector_store(
    config: &VectorStoreConfig,
    namespace: &str,
) -> Result<Arc<dyn VectorStore>> {
    match config.backend()? {
        VectorStoreKind::Pinecone {
            host,
            api_key_env,
            batch_size,
        } => {
            let api_key = std::env::var(&api_key_env)
                .map_err(|_| anyhow::anyhow!("{} environment variable not set", api_key_env))?;
            Ok(Arc::new(PineconeStore::new(
                &host,
                api_key,
                namespace,
                batch_size,
                config.max_retries,
                config.timeout_secs,
            )?))
        }
        VectorStoreKind::Memory => Ok(Arc::new(InMemoryVectorStore::new(namespace))),
    }
}
