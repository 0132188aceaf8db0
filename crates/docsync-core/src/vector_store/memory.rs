//! In-memory [`VectorStore`] for tests and dry runs.
//!
//! Records live in a `HashMap` keyed by id. The store also counts upload
//! traffic so callers can assert how many vectors a sync wrote.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;
use uuid::Uuid;

use super::{check_upload_shape, VectorStore};
use crate::store::poisoned;

#[derive(Debug, Clone, PartialEq)]
pub struct StoredVector {
    pub vector: Vec<f32>,
    pub metadata: serde_json::Value,
}

pub struct InMemoryVectorStore {
    namespace: String,
    custom_ids: bool,
    fail_deletes: AtomicBool,
    records: RwLock<HashMap<String, StoredVector>>,
    upload_calls: AtomicUsize,
    uploaded_vectors: AtomicUsize,
}

impl InMemoryVectorStore {
    /// A store that keys records by the ids the caller provides.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            custom_ids: true,
            fail_deletes: AtomicBool::new(false),
            records: RwLock::new(HashMap::new()),
            upload_calls: AtomicUsize::new(0),
            uploaded_vectors: AtomicUsize::new(0),
        }
    }

    /// A store that mints a random id for every uploaded vector.
    pub fn with_generated_ids(namespace: impl Into<String>) -> Self {
        Self {
            custom_ids: false,
            ..Self::new(namespace)
        }
    }

    /// Make subsequent deletes fail, as an unreachable remote would.
    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn get(&self, id: &str) -> Result<Option<StoredVector>> {
        Ok(self.records.read().map_err(poisoned)?.get(id).cloned())
    }

    pub fn contains(&self, id: &str) -> Result<bool> {
        Ok(self.records.read().map_err(poisoned)?.contains_key(id))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.records.read().map_err(poisoned)?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Number of `upload` calls that carried at least one vector.
    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    /// Total vectors written across all uploads, overwrites included.
    pub fn uploaded_vectors(&self) -> usize {
        self.uploaded_vectors.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn supports_custom_ids(&self) -> bool {
        self.custom_ids
    }

    async fn upload(
        &self,
        vectors: &[Vec<f32>],
        ids: Option<&[String]>,
        metadata: &[serde_json::Value],
    ) -> Result<()> {
        check_upload_shape(vectors, ids, metadata)?;
        if vectors.is_empty() {
            return Ok(());
        }
        let mut records = self.records.write().map_err(poisoned)?;
        for (i, (vector, meta)) in vectors.iter().zip(metadata).enumerate() {
            let id = match ids {
                Some(ids) if self.custom_ids => ids[i].clone(),
                _ => Uuid::new_v4().to_string(),
            };
            records.insert(
                id,
                StoredVector {
                    vector: vector.clone(),
                    metadata: meta.clone(),
                },
            );
        }
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        self.uploaded_vectors
            .fetch_add(vectors.len(), Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            bail!("vector store '{}' rejected delete", self.namespace);
        }
        let mut records = self.records.write().map_err(poisoned)?;
        for id in ids {
            records.remove(id);
        }
        Ok(())
    }
}
