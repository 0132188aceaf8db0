//! Typed errors for configuration and programmer mistakes.
//!
//! Runtime failures of collaborators (I/O, HTTP, SQL) travel as plain
//! [`anyhow::Error`]s. The variants here mark conditions that retrying will
//! never fix; they are wrapped in `anyhow::Error` and can be recovered with
//! `downcast_ref::<IndexError>()`.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum IndexError {
    #[error("embedding dimension mismatch: provider declares {expected}, got a vector of {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embeddings provider returned {actual} vectors for {expected} texts")]
    EmbeddingCountMismatch { expected: usize, actual: usize },

    #[error("invalid splitting: chunk_size={chunk_size}, chunk_overlap={chunk_overlap}")]
    InvalidSplitting {
        chunk_size: usize,
        chunk_overlap: usize,
    },

    #[error("unsupported {kind} backend: {name}")]
    UnsupportedBackend { kind: &'static str, name: String },
}
