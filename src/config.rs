//! TOML configuration.
//!
//! ```toml
//! [db]
//! path = "./data/docsync.sqlite"
//!
//! [splitting]
//! chunk_size = 1000
//! chunk_overlap = 200
//!
//! [embedding]
//! provider = "openai"
//! model = "text-embedding-3-small"
//! dims = 1536
//!
//! [vector_store]
//! kind = "pinecone"
//! host = "https://my-index.svc.pinecone.io"
//! ```
//!
//! Only `[db]` and `[vector_store]` are required. Backend names are kept as
//! strings in the file and resolved once by [`VectorStoreConfig::backend`]
//! and [`crate::embedding::create_provider`].

use anyhow::{Context, Result};
use docsync_core::IndexError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub splitting: SplittingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub indexing: IndexingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SplittingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for SplittingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Identifies the model/settings pair in the embedding cache.
    #[serde(default = "default_config_id")]
    pub config_id: i64,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            config_id: default_config_id(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            url: None,
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_config_id() -> i64 {
    1
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct VectorStoreConfig {
    /// Identifies this vector database in index namespaces.
    #[serde(default = "default_vector_db_id")]
    pub id: i64,
    pub kind: String,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_upsert_batch")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_vector_db_id() -> i64 {
    1
}
fn default_api_key_env() -> String {
    "PINECONE_API_KEY".to_string()
}
fn default_upsert_batch() -> usize {
    100
}

/// A resolved vector-store backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VectorStoreKind {
    Pinecone {
        host: String,
        api_key_env: String,
        batch_size: usize,
    },
    Memory,
}

impl VectorStoreConfig {
    pub fn backend(&self) -> Result<VectorStoreKind, IndexError> {
        match self.kind.as_str() {
            "pinecone" => Ok(VectorStoreKind::Pinecone {
                host: self.host.clone().unwrap_or_default(),
                api_key_env: self.api_key_env.clone(),
                batch_size: self.batch_size,
            }),
            "memory" => Ok(VectorStoreKind::Memory),
            other => Err(IndexError::UnsupportedBackend {
                kind: "vector store",
                name: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexingConfig {
    #[serde(default)]
    pub continue_on_error: bool,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            continue_on_error: false,
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.md".to_string(),
        "**/*.markdown".to_string(),
        "**/*.txt".to_string(),
        "**/*.pdf".to_string(),
    ]
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    let splitting = &config.splitting;
    if splitting.chunk_size == 0 {
        anyhow::bail!("splitting.chunk_size must be > 0");
    }
    if splitting.chunk_overlap >= splitting.chunk_size {
        anyhow::bail!(
            "splitting.chunk_overlap ({}) must be smaller than splitting.chunk_size ({})",
            splitting.chunk_overlap,
            splitting.chunk_size
        );
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }
    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.batch_size == 0 {
            anyhow::bail!("embedding.batch_size must be > 0");
        }
    }

    match config.vector_store.backend()? {
        VectorStoreKind::Pinecone {
            host, batch_size, ..
        } => {
            if host.is_empty() {
                anyhow::bail!("vector_store.host is required when kind is 'pinecone'");
            }
            if batch_size == 0 {
                anyhow::bail!("vector_store.batch_size must be > 0");
            }
        }
        VectorStoreKind::Memory => {}
    }

    Ok(config)
}
