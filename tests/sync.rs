use anyhow::Result;
use async_trait::async_trait;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

use docsync::collection::{add_paths, create_index, delete_collection, delete_index, ImportSummary};
use docsync::config::{parse_config, Config};
use docsync::loader::FsLoader;
use docsync::sqlite_store::SqliteStore;
use docsync::sync_cmd::compute_status;
use docsync::{db, migrate};
use docsync_core::embedding::EmbeddingsProvider;
use docsync_core::models::DocumentId;
use docsync_core::store::IndexStore;
use docsync_core::vector_store::memory::InMemoryVectorStore;
use docsync_core::vector_store::VectorStore;
use docsync_core::{IndexTracer, Indexer, IndexerOptions, SyncReport};

/// Deterministic provider that counts how much work it was asked to do.
#[derive(Default)]
struct CountingProvider {
    calls: AtomicUsize,
    texts: AtomicUsize,
}

#[async_trait]
impl EmbeddingsProvider for CountingProvider {
    fn model_name(&self) -> &str {
        "counting"
    }

    fn dims(&self) -> usize {
        3
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|t| vec![t.len() as f32, t.lines().count() as f32, 1.0])
            .collect())
    }
}

struct Env {
    _tmp: TempDir,
    files: PathBuf,
    config: Config,
    store: Arc<SqliteStore>,
    provider: Arc<CountingProvider>,
}

impl Env {
    async fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let files = tmp.path().join("files");
        fs::create_dir_all(&files).unwrap();
        let config = parse_config(&format!(
            r#"
[db]
path = "{}/data/docsync.sqlite"

[splitting]
chunk_size = 200
chunk_overlap = 20

[vector_store]
kind = "memory"
"#,
            tmp.path().display()
        ))
        .unwrap();
        let pool = db::connect(&config).await.unwrap();
        migrate::apply(&pool).await.unwrap();
        Self {
            _tmp: tmp,
            files,
            config,
            store: Arc::new(SqliteStore::new(pool)),
            provider: Arc::new(CountingProvider::default()),
        }
    }

    fn write(&self, name: &str, text: &str) {
        fs::write(self.files.join(name), text).unwrap();
    }

    async fn import(&self, collection_id: i64) -> ImportSummary {
        add_paths(
            &self.store,
            &self.config.indexing,
            collection_id,
            &[self.files.clone()],
        )
        .await
        .unwrap()
    }

    async fn document_id(&self, name: &str) -> DocumentId {
        let path = self.files.join(name).canonicalize().unwrap();
        let path = path.to_string_lossy();
        let collection = self.store.documents_in_collection(1).await.unwrap();
        collection
            .iter()
            .find(|d| d.filepath == path)
            .map(|d| d.id)
            .unwrap_or_else(|| panic!("{} not in collection", name))
    }

    async fn hashes_of(&self, id: DocumentId, index_id: &str) -> Vec<String> {
        let index = self.store.get_index(index_id).await.unwrap().unwrap();
        self.store
            .get_chunks(id, index.splitting.id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.content_hash)
            .collect()
    }

    async fn sync(&self, index_id: &str, vectors: &Arc<InMemoryVectorStore>) -> SyncReport {
        let mut index = self.store.get_index(index_id).await.unwrap().unwrap();
        let mut status = compute_status(&self.store, &index).await.unwrap();
        let indexer = Indexer::new(
            self.store.clone(),
            Arc::new(FsLoader),
            self.provider.clone(),
            vectors.clone(),
            index.embeddings_config_id,
            index.splitting,
            IndexerOptions::default(),
        )
        .unwrap();
        let mut tracer = IndexTracer::new();
        let report = indexer
            .sync(&mut status, &mut index, &mut tracer)
            .await
            .unwrap();
        assert!(status.is_clean());
        assert_eq!(tracer.depth(), 0);
        assert!(tracer.message().starts_with("indexed "));
        report
    }

    fn embed_calls(&self) -> usize {
        self.provider.calls.load(Ordering::SeqCst)
    }
}

async fn setup() -> (Env, String, Arc<InMemoryVectorStore>) {
    let env = Env::new().await;
    env.write("a.md", "# Alpha\n\nRust and cargo.");
    env.write("b.md", "# Beta\n\nVector databases.");
    env.write("c.txt", "Gamma notes about deployment.");
    let collection = env.store.create_collection("docs").await.unwrap();
    env.import(collection).await;
    let index = create_index(&env.store, &env.config, collection, Some("Docs"))
        .await
        .unwrap();
    let vectors = Arc::new(InMemoryVectorStore::new(index.namespace()));
    (env, index.id, vectors)
}

#[tokio::test]
async fn test_full_sync_indexes_every_document() {
    let (env, index_id, vectors) = setup().await;

    let report = env.sync(&index_id, &vectors).await;
    assert_eq!(report.indexed, 3);
    assert_eq!(report.deleted, 0);
    assert!(report.failed.is_empty());
    assert_eq!(vectors.len().unwrap(), 3);
    assert_eq!(env.embed_calls(), 3);

    let a = env.document_id("a.md").await;
    let hash = &env.hashes_of(a, &index_id).await[0];
    let stored = vectors.get(hash).unwrap().unwrap();
    assert_eq!(stored.metadata["text"], "# Alpha\n\nRust and cargo.");
    assert_eq!(stored.metadata["filename"], "a.md");

    let index = env.store.get_index(&index_id).await.unwrap().unwrap();
    assert_eq!(index.indexed_documents.len(), 3);
}

#[tokio::test]
async fn test_second_sync_is_a_no_op() {
    let (env, index_id, vectors) = setup().await;
    env.sync(&index_id, &vectors).await;
    let uploads = vectors.upload_calls();

    let index = env.store.get_index(&index_id).await.unwrap().unwrap();
    let status = compute_status(&env.store, &index).await.unwrap();
    assert!(status.is_clean());

    let report = env.sync(&index_id, &vectors).await;
    assert_eq!(report, SyncReport::default());
    assert_eq!(vectors.upload_calls(), uploads);
    assert_eq!(env.embed_calls(), 3);
}

#[tokio::test]
async fn test_removed_document_vectors_are_deleted() {
    let (env, index_id, vectors) = setup().await;
    env.sync(&index_id, &vectors).await;

    let b = env.document_id("b.md").await;
    let b_hashes = env.hashes_of(b, &index_id).await;
    assert!(env.store.remove_from_collection(1, b).await.unwrap());

    let index = env.store.get_index(&index_id).await.unwrap().unwrap();
    let status = compute_status(&env.store, &index).await.unwrap();
    assert_eq!(status.to_deleted, vec![b]);
    assert!(status.to_indexed.is_empty());

    let report = env.sync(&index_id, &vectors).await;
    assert_eq!(report.deleted, 1);
    assert_eq!(vectors.len().unwrap(), 2);
    for hash in &b_hashes {
        assert!(!vectors.contains(hash).unwrap());
    }
    let index = env.store.get_index(&index_id).await.unwrap().unwrap();
    assert!(!index.indexed_documents.contains(&b));
}

#[tokio::test]
async fn test_shared_content_survives_replacement() {
    let (env, index_id, vectors) = setup().await;
    env.sync(&index_id, &vectors).await;

    let b = env.document_id("b.md").await;
    let b_hashes = env.hashes_of(b, &index_id).await;
    env.store.remove_from_collection(1, b).await.unwrap();
    fs::remove_file(env.files.join("b.md")).unwrap();
    env.write("copy-of-b.md", "# Beta\n\nVector databases.");
    env.import(1).await;

    let report = env.sync(&index_id, &vectors).await;
    assert_eq!(report.deleted, 1);
    assert_eq!(report.indexed, 1);
    for hash in &b_hashes {
        assert!(vectors.contains(hash).unwrap());
    }
    // Served from the embedding cache.
    assert_eq!(env.embed_calls(), 3);
}

#[tokio::test]
async fn test_second_index_reuses_embedding_cache() {
    let (env, index_id, vectors) = setup().await;
    env.sync(&index_id, &vectors).await;

    let other = create_index(&env.store, &env.config, 1, Some("Docs copy"))
        .await
        .unwrap();
    let other_vectors = Arc::new(InMemoryVectorStore::new(other.namespace()));
    let report = env.sync(&other.id, &other_vectors).await;

    assert_eq!(report.indexed, 3);
    assert_eq!(other_vectors.len().unwrap(), 3);
    assert_eq!(env.embed_calls(), 3);
}

#[tokio::test]
async fn test_edited_file_replaces_its_vectors() {
    let (env, index_id, vectors) = setup().await;
    env.sync(&index_id, &vectors).await;

    let old_b = env.document_id("b.md").await;
    let old_hashes = env.hashes_of(old_b, &index_id).await;
    env.write("b.md", "# Beta\n\nVector stores and their namespaces.");
    let summary = env.import(1).await;
    assert_eq!(
        summary,
        ImportSummary {
            added: 0,
            present: 2,
            replaced: 1
        }
    );

    let new_b = env.document_id("b.md").await;
    assert_ne!(new_b, old_b);
    let index = env.store.get_index(&index_id).await.unwrap().unwrap();
    let status = compute_status(&env.store, &index).await.unwrap();
    assert_eq!(status.to_deleted, vec![old_b]);
    assert_eq!(status.to_indexed.len(), 1);
    assert_eq!(status.to_indexed[0].id, new_b);

    let report = env.sync(&index_id, &vectors).await;
    assert_eq!((report.indexed, report.deleted), (1, 1));
    for hash in &old_hashes {
        assert!(!vectors.contains(hash).unwrap());
    }
    let new_hashes = env.hashes_of(new_b, &index_id).await;
    for hash in &new_hashes {
        assert!(vectors.contains(hash).unwrap());
    }
    assert_eq!(vectors.len().unwrap(), 3);

    // Removing the edited file afterwards leaves nothing of either version.
    assert!(env.store.remove_from_collection(1, new_b).await.unwrap());
    fs::remove_file(env.files.join("b.md")).unwrap();
    let report = env.sync(&index_id, &vectors).await;
    assert_eq!(report.deleted, 1);
    for hash in old_hashes.iter().chain(&new_hashes) {
        assert!(!vectors.contains(hash).unwrap());
    }
    assert_eq!(vectors.len().unwrap(), 2);
}

#[tokio::test]
async fn test_delete_index_removes_its_vectors() {
    let (env, index_id, vectors) = setup().await;
    env.sync(&index_id, &vectors).await;
    assert_eq!(vectors.len().unwrap(), 3);

    let index = env.store.get_index(&index_id).await.unwrap().unwrap();
    let removed = delete_index(&env.store, vectors.as_ref(), index).await.unwrap();
    assert_eq!(removed, 3);
    assert!(vectors.is_empty().unwrap());
    assert!(env.store.get_index(&index_id).await.unwrap().is_none());
    // Documents and the collection are untouched.
    assert_eq!(env.store.documents_in_collection(1).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_delete_index_survives_failed_remote_delete() {
    let (env, index_id, vectors) = setup().await;
    env.sync(&index_id, &vectors).await;
    vectors.set_fail_deletes(true);

    let index = env.store.get_index(&index_id).await.unwrap().unwrap();
    let removed = delete_index(&env.store, vectors.as_ref(), index).await.unwrap();
    assert_eq!(removed, 3);
    assert!(env.store.get_index(&index_id).await.unwrap().is_none());
    assert_eq!(vectors.len().unwrap(), 3);
}

#[tokio::test]
async fn test_delete_collection_deletes_its_indexes() {
    let (env, index_id, vectors) = setup().await;
    env.sync(&index_id, &vectors).await;
    let unsynced = create_index(&env.store, &env.config, 1, Some("Later"))
        .await
        .unwrap();

    let open = |_: &str| -> Result<Arc<dyn VectorStore>> { Ok(vectors.clone()) };
    let deleted = delete_collection(&env.store, 1, open).await.unwrap();
    assert_eq!(deleted, 2);
    assert!(vectors.is_empty().unwrap());
    assert!(!env.store.collection_exists(1).await.unwrap());
    assert!(env.store.get_index(&index_id).await.unwrap().is_none());
    assert!(env.store.get_index(&unsynced.id).await.unwrap().is_none());

    let open = |_: &str| -> Result<Arc<dyn VectorStore>> { Ok(vectors.clone()) };
    let err = delete_collection(&env.store, 1, open).await.unwrap_err();
    assert!(err.to_string().contains("does not exist"));
}
