//! Content fingerprinting.
//!
//! The hash of a chunk's text is its embedding-cache key and, where the
//! vector store allows it, its vector record id. It must stay stable across
//! releases: changing it orphans every cached embedding.

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `text`.
pub fn content_hash(text: &str) -> String {
    bytes_hash(text.as_bytes())
}

/// Lowercase hex SHA-256 of raw bytes (used for whole files).
pub fn bytes_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
