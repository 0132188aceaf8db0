//! Embedding provider implementations.
//!
//! Concrete [`EmbeddingsProvider`]s for the `docsync` binary:
//! - **[`DisabledProvider`]**: returns errors; used when embeddings are not configured.
//! - **[`OpenAIProvider`]**: calls the OpenAI embeddings API.
//! - **[`OllamaProvider`]**: calls a local Ollama instance.
//!
//! Both HTTP providers split a request into `embedding.batch_size` texts per
//! call and retry transient failures (see [`crate::http`]).
//!
//! # Provider Selection
//!
//! ```rust,no_run
//! # use docsync::config::EmbeddingConfig;
//! # use docsync::embedding::create_provider;
//! let config = EmbeddingConfig::default(); // provider = "disabled"
//! let provider = create_provider(&config).unwrap();
//! assert_eq!(provider.model_name(), "disabled");
//! ```

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;

use docsync_core::embedding::EmbeddingsProvider;
use docsync_core::IndexError;

use crate::config::EmbeddingConfig;
use crate::http::{self, JsonPost};

const OPENAI_URL: &str = "https://api.openai.com/v1/embeddings";
const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

// ============ Disabled Provider ============

/// A provider that refuses to embed.
///
/// Used when `embedding.provider = "disabled"`. Syncing an index with
/// pending chunks fails with a descriptive error.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingsProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }

    fn dims(&self) -> usize {
        0
    }

    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        bail!("Embedding provider is disabled; set [embedding].provider in the config")
    }
}

// ============ OpenAI Provider ============

/// Embedding provider using `POST https://api.openai.com/v1/embeddings`.
///
/// Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAIProvider {
    model: String,
    dims: usize,
    api_key: String,
    batch_size: usize,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for OpenAI provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for OpenAI provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;

        Ok(Self {
            model,
            dims,
            api_key,
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
            client: http::client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl EmbeddingsProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let auth = format!("Bearer {}", self.api_key);
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let body = serde_json::json!({
                "model": self.model,
                "input": batch,
            });
            let json = http::post_json(
                &self.client,
                JsonPost {
                    service: "OpenAI",
                    url: OPENAI_URL,
                    headers: &[("Authorization", auth.as_str())],
                    body: &body,
                    max_retries: self.max_retries,
                },
            )
            .await?;
            out.extend(parse_openai_response(&json)?);
        }
        Ok(out)
    }
}

/// Extract `data[].embedding`, ordered by each item's `index`.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing embedding"))?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        indexed.push((index, to_f32_vec(embedding)));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama Provider ============

/// Embedding provider using a local Ollama instance.
///
/// Calls `POST /api/embed` on the configured URL (default: `http://localhost:11434`).
/// Requires an embedding model to be pulled (e.g. `ollama pull nomic-embed-text`).
pub struct OllamaProvider {
    model: String,
    dims: usize,
    url: String,
    batch_size: usize,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for Ollama provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for Ollama provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| OLLAMA_DEFAULT_URL.to_string());

        Ok(Self {
            model,
            dims,
            url: url.trim_end_matches('/').to_string(),
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
            client: http::client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl EmbeddingsProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embed", self.url);
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let body = serde_json::json!({
                "model": self.model,
                "input": batch,
            });
            let json = http::post_json(
                &self.client,
                JsonPost {
                    service: "Ollama",
                    url: &url,
                    headers: &[],
                    body: &body,
                    max_retries: self.max_retries,
                },
            )
            .await?;
            out.extend(parse_ollama_response(&json)?);
        }
        Ok(out)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing embeddings array"))?;

    embeddings
        .iter()
        .map(|embedding| {
            embedding
                .as_array()
                .map(|values| to_f32_vec(values))
                .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: embedding is not an array"))
        })
        .collect()
}

fn to_f32_vec(values: &[serde_json::Value]) -> Vec<f32> {
    values
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect()
}

/// Create the [`EmbeddingsProvider`] named by `embedding.provider`.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledProvider`] |
/// | `"openai"` | [`OpenAIProvider`] |
/// | `"ollama"` | [`OllamaProvider`] |
pub fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingsProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledProvider)),
        "openai" => Ok(Arc::new(OpenAIProvider::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaProvider::new(config)?)),
        other => Err(IndexError::UnsupportedBackend {
            kind: "embedding",
            name: other.to_string(),
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn openai_response_is_ordered_by_index() {
        let json = json!({
            "data": [
                {"index": 1, "embedding": [0.5, 0.25]},
                {"index": 0, "embedding": [1.0, 2.0]}
            ]
        });
        let vectors = parse_openai_response(&json).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 2.0], vec![0.5, 0.25]]);
    }

    #[test]
    fn openai_response_without_data_fails() {
        assert!(parse_openai_response(&json!({"error": "nope"})).is_err());
    }

    #[test]
    fn ollama_response() {
        let json = json!({"embeddings": [[1.0, 0.0], [0.0, 1.0]]});
        let vectors = parse_ollama_response(&json).unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[1], vec![0.0, 1.0]);
    }

    #[test]
    fn ollama_response_rejects_scalars() {
        assert!(parse_ollama_response(&json!({"embeddings": [1.0]})).is_err());
    }

    #[tokio::test]
    async fn disabled_provider_refuses() {
        let provider = create_provider(&EmbeddingConfig::default()).unwrap();
        assert_eq!(provider.model_name(), "disabled");
        assert!(provider.embed_batch(&["x".to_string()]).await.is_err());
    }

    #[test]
    fn unknown_provider_is_unsupported() {
        let config = EmbeddingConfig {
            provider: "cohere".to_string(),
            ..EmbeddingConfig::default()
        };
        let err = create_provider(&config).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<IndexError>(),
            Some(IndexError::UnsupportedBackend { kind: "embedding", .. })
        ));
    }

    #[test]
    fn ollama_trims_trailing_slash() {
        let config = EmbeddingConfig {
            provider: "ollama".to_string(),
            model: Some("nomic-embed-text".to_string()),
            dims: Some(768),
            url: Some("http://gpu-box:11434/".to_string()),
            ..EmbeddingConfig::default()
        };
        let provider = OllamaProvider::new(&config).unwrap();
        assert_eq!(provider.url, "http://gpu-box:11434");
        assert_eq!(provider.dims(), 768);
    }
}
