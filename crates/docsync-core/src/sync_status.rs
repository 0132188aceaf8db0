//! Which documents an index must add and which it must drop.
//!
//! [`IndexSyncStatus::compute`] diffs a collection's live documents against
//! an index's `indexed_documents`. The result is a short-lived snapshot:
//! compute it right before [`Indexer::sync`](crate::indexer::Indexer::sync),
//! which consumes and clears it.
//!
//! A document that is both live and indexed is left alone even if its
//! content changed. Changed content shows up at chunk granularity through
//! the content-hash keyed embedding cache instead.

use std::collections::HashSet;

use crate::models::{CollectionIndex, Document, DocumentId};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexSyncStatus {
    /// Live documents missing from the index, in collection order.
    pub to_indexed: Vec<Document>,
    /// Indexed document ids no longer in the collection, ascending.
    pub to_deleted: Vec<DocumentId>,
}

impl IndexSyncStatus {
    pub fn compute(documents: &[Document], index: &CollectionIndex) -> Self {
        let mut indexed: HashSet<DocumentId> = index.indexed_documents.iter().copied().collect();
        let to_indexed = documents
            .iter()
            .filter(|document| !indexed.remove(&document.id))
            .cloned()
            .collect();
        let mut to_deleted: Vec<DocumentId> = indexed.into_iter().collect();
        to_deleted.sort_unstable();
        Self {
            to_indexed,
            to_deleted,
        }
    }

    /// True when there is nothing to do.
    pub fn is_clean(&self) -> bool {
        self.to_indexed.is_empty() && self.to_deleted.is_empty()
    }

    pub fn clear(&mut self) {
        self.to_indexed.clear();
        self.to_deleted.clear();
    }
}
