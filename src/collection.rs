//! Collection and index management commands.
//!
//! `collection add` walks directories with the configured include/exclude
//! globs, hashes each file and imports it as a document. A document is one
//! version of a file: re-importing unchanged bytes is a no-op, while a file
//! whose bytes changed becomes a new document that replaces the old version
//! in the collection. The next sync then deletes the old version's vectors.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::PathBuf;
use std::sync::Arc;
use walkdir::WalkDir;

use docsync_core::hash::bytes_hash;
use docsync_core::models::{CollectionId, CollectionIndex, DocumentId};
use docsync_core::vector_store::VectorStore;
use docsync_core::{remove_documents, IndexTracer};

use crate::config::{Config, IndexingConfig};
use crate::db;
use crate::loader;
use crate::sqlite_store::SqliteStore;
use crate::vector_store::create_vector_store;

pub async fn run_collection_create(config: &Config, name: &str) -> Result<()> {
    let store = SqliteStore::new(db::connect(config).await?);
    let id = store.create_collection(name).await?;
    println!("Created collection '{}' (id {})", name, id);
    store.pool().close().await;
    Ok(())
}

pub async fn run_collection_add(
    config: &Config,
    collection_id: CollectionId,
    paths: &[PathBuf],
) -> Result<()> {
    let store = SqliteStore::new(db::connect(config).await?);
    let summary = add_paths(&store, &config.indexing, collection_id, paths).await?;
    println!(
        "collection {}: {} files added, {} already present, {} replaced",
        collection_id, summary.added, summary.present, summary.replaced
    );
    store.pool().close().await;
    Ok(())
}

/// Outcome of importing files into a collection.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    /// Files new to the collection.
    pub added: usize,
    /// Files whose current version was already a member.
    pub present: usize,
    /// Files whose content changed since they were last imported.
    pub replaced: usize,
}

/// Import files into a collection.
pub async fn add_paths(
    store: &SqliteStore,
    indexing: &IndexingConfig,
    collection_id: CollectionId,
    paths: &[PathBuf],
) -> Result<ImportSummary> {
    if !store.collection_exists(collection_id).await? {
        bail!("Collection {} does not exist", collection_id);
    }

    let files = collect_files(paths, indexing)?;
    let mut summary = ImportSummary::default();
    for file in &files {
        let bytes = tokio::fs::read(file)
            .await
            .with_context(|| format!("Failed to read {}", file.display()))?;
        let filepath = file.to_string_lossy().to_string();
        let filename = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| filepath.clone());
        let document = store
            .get_or_create_document(&filepath, &filename, &bytes_hash(&bytes))
            .await?;
        if !store.add_to_collection(collection_id, document.id).await? {
            summary.present += 1;
            continue;
        }
        let stale = store
            .detach_other_versions(collection_id, &filepath, document.id)
            .await?;
        if stale > 0 {
            tracing::debug!(file = %filepath, document = document.id, "file content changed");
            summary.replaced += 1;
        } else {
            summary.added += 1;
        }
    }
    tracing::info!(
        collection = collection_id,
        added = summary.added,
        present = summary.present,
        replaced = summary.replaced,
        "files imported"
    );
    Ok(summary)
}

/// Expand paths into a sorted, de-duplicated list of loadable files.
///
/// Files given explicitly only need a supported extension; directories are
/// walked and filtered through the include/exclude globs (relative to the
/// directory).
pub fn collect_files(paths: &[PathBuf], indexing: &IndexingConfig) -> Result<Vec<PathBuf>> {
    let include_set = build_globset(&indexing.include_globs)?;

    let mut excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    excludes.extend(indexing.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let mut files = Vec::new();
    for path in paths {
        let root = path
            .canonicalize()
            .with_context(|| format!("Path does not exist: {}", path.display()))?;

        if root.is_file() {
            if !loader::is_supported(&root) {
                bail!("Unsupported file type: {}", root.display());
            }
            files.push(root);
            continue;
        }

        let walker = WalkDir::new(&root).follow_links(indexing.follow_symlinks);
        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let file = entry.path();
            let relative = file.strip_prefix(&root).unwrap_or(file);
            let rel_str = relative.to_string_lossy();

            if exclude_set.is_match(rel_str.as_ref()) {
                continue;
            }
            if !include_set.is_match(rel_str.as_ref()) || !loader::is_supported(file) {
                continue;
            }
            files.push(file.to_path_buf());
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}

pub async fn run_collection_remove(
    config: &Config,
    collection_id: CollectionId,
    document_ids: &[DocumentId],
) -> Result<()> {
    let store = SqliteStore::new(db::connect(config).await?);
    let mut removed = 0;
    for id in document_ids {
        if store.remove_from_collection(collection_id, *id).await? {
            removed += 1;
        } else {
            eprintln!("document {} is not in collection {}", id, collection_id);
        }
    }
    println!("collection {}: {} documents removed", collection_id, removed);
    store.pool().close().await;
    Ok(())
}

pub async fn run_index_create(
    config: &Config,
    collection_id: CollectionId,
    name: Option<&str>,
) -> Result<()> {
    let store = SqliteStore::new(db::connect(config).await?);
    let index = create_index(&store, config, collection_id, name).await?;
    println!("Created index '{}'", index.name);
    println!("  id:        {}", index.id);
    println!("  namespace: {}", index.namespace());
    store.pool().close().await;
    Ok(())
}

/// Create an index bound to the configured splitting, embeddings config and
/// vector database.
pub async fn create_index(
    store: &SqliteStore,
    config: &Config,
    collection_id: CollectionId,
    name: Option<&str>,
) -> Result<CollectionIndex> {
    if !store.collection_exists(collection_id).await? {
        bail!("Collection {} does not exist", collection_id);
    }
    let splitting = store
        .get_or_create_splitting(config.splitting.chunk_size, config.splitting.chunk_overlap)
        .await?;
    let name = match name {
        Some(name) => name.to_string(),
        None => default_index_name(&config.embedding.provider, config.embedding.model.as_deref()),
    };
    store
        .create_index(
            &name,
            collection_id,
            splitting,
            config.embedding.config_id,
            config.vector_store.id,
        )
        .await
}

pub async fn run_collection_rename(
    config: &Config,
    collection_id: CollectionId,
    name: &str,
) -> Result<()> {
    let store = SqliteStore::new(db::connect(config).await?);
    if !store.rename_collection(collection_id, name).await? {
        bail!("Collection {} does not exist", collection_id);
    }
    println!("collection {}: renamed to '{}'", collection_id, name);
    store.pool().close().await;
    Ok(())
}

pub async fn run_collection_delete(config: &Config, collection_id: CollectionId) -> Result<()> {
    let store = SqliteStore::new(db::connect(config).await?);
    let indexes = delete_collection(&store, collection_id, |namespace| {
        create_vector_store(&config.vector_store, namespace)
    })
    .await?;
    println!(
        "collection {}: deleted with {} indexes",
        collection_id, indexes
    );
    store.pool().close().await;
    Ok(())
}

/// Delete a collection after deleting each of its indexes. Returns the
/// number of indexes deleted.
///
/// `vector_store_for` opens the vector store of an index namespace.
pub async fn delete_collection<F>(
    store: &SqliteStore,
    collection_id: CollectionId,
    vector_store_for: F,
) -> Result<usize>
where
    F: Fn(&str) -> Result<Arc<dyn VectorStore>>,
{
    if !store.collection_exists(collection_id).await? {
        bail!("Collection {} does not exist", collection_id);
    }
    let index_ids = store.index_ids_for_collection(collection_id).await?;
    for index_id in &index_ids {
        let index = store
            .get_index(index_id)
            .await?
            .with_context(|| format!("Index '{}' not found", index_id))?;
        let vector_store = vector_store_for(&index.namespace())?;
        delete_index(store, vector_store.as_ref(), index).await?;
    }
    store.delete_collection(collection_id).await?;
    tracing::info!(
        collection = collection_id,
        indexes = index_ids.len(),
        "collection deleted"
    );
    Ok(index_ids.len())
}

pub async fn run_index_delete(config: &Config, index_id: &str) -> Result<()> {
    let store = SqliteStore::new(db::connect(config).await?);
    let index = store
        .get_index(index_id)
        .await?
        .with_context(|| format!("Index '{}' not found", index_id))?;
    let name = index.name.clone();
    let vector_store = create_vector_store(&config.vector_store, &index.namespace())?;
    let removed = delete_index(&store, vector_store.as_ref(), index).await?;
    println!("index {}: deleted ({} documents removed)", name, removed);
    store.pool().close().await;
    Ok(())
}

/// Delete the vectors of every document the index holds, then the index
/// itself. A failed remote delete is logged as a warning and the local
/// rows are dropped anyway. Returns how many indexed documents were removed.
pub async fn delete_index(
    store: &SqliteStore,
    vector_store: &dyn VectorStore,
    mut index: CollectionIndex,
) -> Result<usize> {
    let documents = index.indexed_documents.clone();
    let mut tracer = IndexTracer::new();
    let removed =
        remove_documents(store, vector_store, &documents, &mut index, &mut tracer).await?;
    store.delete_index(&index.id).await?;
    tracing::info!(index = %index.id, removed, "index deleted");
    Ok(removed)
}

/// `docsync list`: every collection with its document count and indexes.
pub async fn run_list(config: &Config) -> Result<()> {
    let store = SqliteStore::new(db::connect(config).await?);
    let collections = store.list_collections().await?;
    if collections.is_empty() {
        println!("no collections");
    }
    for collection in &collections {
        println!(
            "[{}] {} ({} documents)",
            collection.id, collection.name, collection.documents
        );
        for index in store.indexes_for_collection(collection.id).await? {
            println!(
                "    {}  {}  {} indexed  ({})",
                index.id,
                index.name,
                index.indexed_documents.len(),
                index.namespace()
            );
        }
    }
    store.pool().close().await;
    Ok(())
}

fn default_index_name(provider: &str, model: Option<&str>) -> String {
    match model {
        Some(model) => format!("{} {}", provider, model),
        None => provider.to_string(),
    }
}
