//! Document loader trait and an in-memory loader.
//!
//! A loader turns a [`Document`] into raw text sections. The filesystem
//! loader (text, markdown, PDF) lives in the `docsync` app crate.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::models::{Document, DocumentId, SourceText};
use crate::store::poisoned;

#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Load the document's content as one or more sections.
    async fn load(&self, document: &Document) -> Result<Vec<SourceText>>;
}

/// Loader serving fixed text per document id, for tests and dry runs.
#[derive(Default)]
pub struct InMemoryLoader {
    texts: RwLock<HashMap<DocumentId, String>>,
}

impl InMemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, document_id: DocumentId, text: impl Into<String>) -> Result<()> {
        self.texts
            .write()
            .map_err(poisoned)?
            .insert(document_id, text.into());
        Ok(())
    }
}

#[async_trait]
impl DocumentLoader for InMemoryLoader {
    async fn load(&self, document: &Document) -> Result<Vec<SourceText>> {
        let texts = self.texts.read().map_err(poisoned)?;
        let Some(text) = texts.get(&document.id) else {
            bail!("no content for document {} ({})", document.id, document.filepath);
        };
        let mut source = SourceText::new(text.clone());
        source
            .meta
            .insert("source".to_string(), document.filepath.clone().into());
        Ok(vec![source])
    }
}
