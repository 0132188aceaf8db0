//! `docsync status` and `docsync sync`.
//!
//! Both commands load the index, diff it against its collection, and print
//! the result. `sync` then wires the configured collaborators into an
//! [`Indexer`] and applies the diff.

use anyhow::{Context, Result};
use std::sync::Arc;

use docsync_core::models::CollectionIndex;
use docsync_core::store::IndexStore;
use docsync_core::{
    ErrorPolicy, IndexSyncStatus, IndexTracer, Indexer, IndexerOptions, SyncReport,
};

use crate::config::Config;
use crate::db;
use crate::embedding::create_provider;
use crate::loader::FsLoader;
use crate::progress::ProgressMode;
use crate::sqlite_store::SqliteStore;
use crate::vector_store::create_vector_store;

async fn load_index(store: &SqliteStore, index_id: &str) -> Result<CollectionIndex> {
    store
        .get_index(index_id)
        .await?
        .with_context(|| format!("Index '{}' not found", index_id))
}

/// Diff an index against its collection's current documents.
pub async fn compute_status(
    store: &SqliteStore,
    index: &CollectionIndex,
) -> Result<IndexSyncStatus> {
    let documents = store.documents_in_collection(index.collection_id).await?;
    Ok(IndexSyncStatus::compute(&documents, index))
}

pub async fn run_status(config: &Config, index_id: &str) -> Result<()> {
    let store = SqliteStore::new(db::connect(config).await?);
    let index = load_index(&store, index_id).await?;
    let status = compute_status(&store, &index).await?;

    println!("index {} ({})", index.name, index.namespace());
    println!("  indexed:   {}", index.indexed_documents.len());
    println!("  to index:  {}", status.to_indexed.len());
    for document in &status.to_indexed {
        println!("    + [{}] {}", document.id, document.filepath);
    }
    println!("  to delete: {}", status.to_deleted.len());
    for id in &status.to_deleted {
        println!("    - [{}]", id);
    }
    if status.is_clean() {
        println!("  up to date");
    }

    store.pool().close().await;
    Ok(())
}

pub async fn run_sync(
    config: &Config,
    index_id: &str,
    continue_on_error: bool,
    progress: ProgressMode,
) -> Result<()> {
    let store = Arc::new(SqliteStore::new(db::connect(config).await?));
    let mut index = load_index(&store, index_id).await?;
    let mut status = compute_status(&store, &index).await?;

    if status.is_clean() {
        println!("sync {}: up to date", index.name);
        store.pool().close().await;
        return Ok(());
    }

    if index.embeddings_config_id != config.embedding.config_id {
        tracing::warn!(
            index = %index.id,
            index_config = index.embeddings_config_id,
            configured = config.embedding.config_id,
            "index was created with a different embeddings config id"
        );
    }

    let error_policy = if continue_on_error || config.indexing.continue_on_error {
        ErrorPolicy::Continue
    } else {
        ErrorPolicy::Abort
    };
    let indexer = Indexer::new(
        store.clone(),
        Arc::new(FsLoader),
        create_provider(&config.embedding)?,
        create_vector_store(&config.vector_store, &index.namespace())?,
        index.embeddings_config_id,
        index.splitting,
        IndexerOptions { error_policy },
    )?;

    let mut tracer = IndexTracer::with_reporter(progress.reporter());
    let report = indexer.sync(&mut status, &mut index, &mut tracer).await?;
    store.mark_synced(&index.id).await?;

    print_report(&index, &report);
    store.pool().close().await;
    Ok(())
}

fn print_report(index: &CollectionIndex, report: &SyncReport) {
    println!("sync {} ({})", index.name, index.namespace());
    println!("  indexed: {}", report.indexed);
    println!("  deleted: {}", report.deleted);
    if !report.failed.is_empty() {
        println!("  failed:  {}", report.failed.len());
        for (id, reason) in &report.failed {
            println!("    ! [{}] {}", id, reason);
        }
    }
    println!("ok");
}
