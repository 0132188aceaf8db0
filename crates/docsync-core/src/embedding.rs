//! Embeddings provider trait and vector utilities.
//!
//! Concrete providers (OpenAI, Ollama) live in the `docsync` app crate.

use anyhow::Result;
use async_trait::async_trait;

use crate::error::IndexError;

/// A service turning text into fixed-dimension vectors.
#[async_trait]
pub trait EmbeddingsProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;

    /// Embed a batch of texts.
    ///
    /// Must return exactly one vector per input text, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Check a provider response against the request: one vector per text,
/// each of the declared dimension.
pub fn validate_batch(
    vectors: &[Vec<f32>],
    expected_count: usize,
    dims: usize,
) -> Result<(), IndexError> {
    if vectors.len() != expected_count {
        return Err(IndexError::EmbeddingCountMismatch {
            expected: expected_count,
            actual: vectors.len(),
        });
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
        return Err(IndexError::DimensionMismatch {
            expected: dims,
            actual: bad.len(),
        });
    }
    Ok(())
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// # Example
///
/// ```rust
/// use docsync_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector. Trailing bytes that do not form
/// a whole `f32` are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
