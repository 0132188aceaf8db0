use tempfile::TempDir;

use docsync::config::parse_config;
use docsync::sqlite_store::SqliteStore;
use docsync::{db, migrate};
use docsync_core::models::{
    ChunkMeta, EmbeddingIdentity, EmbeddingRecord, RawChunk, Splitting,
};
use docsync_core::store::IndexStore;
use docsync_core::IndexError;

async fn open_store(tmp: &TempDir) -> SqliteStore {
    let config = parse_config(&format!(
        r#"
[db]
path = "{}/data/test.sqlite"

[vector_store]
kind = "memory"
"#,
        tmp.path().display()
    ))
    .unwrap();
    let pool = db::connect(&config).await.unwrap();
    migrate::apply(&pool).await.unwrap();
    SqliteStore::new(pool)
}

fn raw(content: &str) -> RawChunk {
    let mut meta = ChunkMeta::new();
    meta.insert("source".to_string(), "test".into());
    RawChunk {
        content: content.to_string(),
        meta,
    }
}

async fn splitting(store: &SqliteStore) -> Splitting {
    store.get_or_create_splitting(100, 10).await.unwrap()
}

#[tokio::test]
async fn test_migrations_are_idempotent() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    migrate::apply(store.pool()).await.unwrap();
}

#[tokio::test]
async fn test_documents_in_collection() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    let papers = store.create_collection("papers").await.unwrap();
    let notes = store.create_collection("notes").await.unwrap();
    assert!(store.collection_exists(papers).await.unwrap());
    assert!(!store.collection_exists(99).await.unwrap());

    let a = store.get_or_create_document("/docs/a.md", "a.md", "h1").await.unwrap();
    let b = store.get_or_create_document("/docs/b.md", "b.md", "h2").await.unwrap();
    assert!(store.add_to_collection(papers, a.id).await.unwrap());
    assert!(store.add_to_collection(papers, b.id).await.unwrap());
    assert!(!store.add_to_collection(papers, a.id).await.unwrap());
    assert!(store.add_to_collection(notes, b.id).await.unwrap());

    let docs = store.documents_in_collection(papers).await.unwrap();
    assert_eq!(docs, vec![a.clone(), b.clone()]);

    assert!(store.remove_from_collection(papers, a.id).await.unwrap());
    assert!(!store.remove_from_collection(papers, a.id).await.unwrap());
    let docs = store.documents_in_collection(papers).await.unwrap();
    assert_eq!(docs, vec![b.clone()]);
    assert_eq!(store.documents_in_collection(notes).await.unwrap(), vec![b]);
}

#[tokio::test]
async fn test_changed_content_is_a_new_document() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    let split = splitting(&store).await;

    let first = store.get_or_create_document("/docs/a.md", "a.md", "h1").await.unwrap();
    store
        .create_chunks(first.id, split.id, vec![raw("one")])
        .await
        .unwrap();

    let same = store.get_or_create_document("/docs/a.md", "a.md", "h1").await.unwrap();
    assert_eq!(same, first);

    let changed = store.get_or_create_document("/docs/a.md", "a.md", "h2").await.unwrap();
    assert_ne!(changed.id, first.id);
    assert_eq!(changed.content_hash, "h2");
    // The old version keeps its chunks so its vectors can still be found.
    assert_eq!(store.get_chunks(first.id, split.id).await.unwrap().len(), 1);
    assert!(store.get_chunks(changed.id, split.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_detach_other_versions() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    let papers = store.create_collection("papers").await.unwrap();
    let notes = store.create_collection("notes").await.unwrap();

    let old = store.get_or_create_document("/docs/a.md", "a.md", "h1").await.unwrap();
    let other = store.get_or_create_document("/docs/b.md", "b.md", "hb").await.unwrap();
    for collection in [papers, notes] {
        store.add_to_collection(collection, old.id).await.unwrap();
    }
    store.add_to_collection(papers, other.id).await.unwrap();

    let new = store.get_or_create_document("/docs/a.md", "a.md", "h2").await.unwrap();
    store.add_to_collection(papers, new.id).await.unwrap();
    let detached = store
        .detach_other_versions(papers, "/docs/a.md", new.id)
        .await
        .unwrap();
    assert_eq!(detached, 1);

    let docs = store.documents_in_collection(papers).await.unwrap();
    assert_eq!(docs, vec![other, new.clone()]);
    // Other collections keep the version they imported.
    assert_eq!(store.documents_in_collection(notes).await.unwrap(), vec![old]);
    assert_eq!(
        store
            .detach_other_versions(papers, "/docs/a.md", new.id)
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn test_rename_list_and_delete_collection() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    let papers = store.create_collection("papers").await.unwrap();
    let notes = store.create_collection("notes").await.unwrap();
    let doc = store.get_or_create_document("/a.md", "a.md", "h").await.unwrap();
    store.add_to_collection(papers, doc.id).await.unwrap();

    assert!(store.rename_collection(papers, "articles").await.unwrap());
    assert!(!store.rename_collection(99, "nothing").await.unwrap());

    let listed = store.list_collections().await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].name, "articles");
    assert_eq!(listed[0].documents, 1);
    assert_eq!((listed[1].id, listed[1].documents), (notes, 0));

    assert!(store.delete_collection(papers).await.unwrap());
    assert!(!store.collection_exists(papers).await.unwrap());
    assert!(store.documents_in_collection(papers).await.unwrap().is_empty());
    assert!(!store.delete_collection(papers).await.unwrap());
    assert_eq!(store.list_collections().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_index() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    let collection = store.create_collection("papers").await.unwrap();
    let split = splitting(&store).await;
    let first = store
        .create_index("First", collection, split, 1, 1)
        .await
        .unwrap();
    let second = store
        .create_index("Second", collection, split, 1, 1)
        .await
        .unwrap();
    store.add_indexed_documents(&first.id, &[1, 2]).await.unwrap();

    let ids = store.index_ids_for_collection(collection).await.unwrap();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&first.id) && ids.contains(&second.id));

    assert!(store.delete_index(&first.id).await.unwrap());
    assert!(store.get_index(&first.id).await.unwrap().is_none());
    assert!(!store.delete_index(&first.id).await.unwrap());
    let remaining = store.indexes_for_collection(collection).await.unwrap();
    assert_eq!(remaining, vec![second]);
}

#[tokio::test]
async fn test_chunks_round_trip() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    let split = splitting(&store).await;
    let doc = store.get_or_create_document("/docs/a.md", "a.md", "h").await.unwrap();

    let created = store
        .create_chunks(doc.id, split.id, vec![raw("first"), raw("second")])
        .await
        .unwrap();
    assert_eq!(created.len(), 2);
    assert_eq!(created[1].chunk_no, 1);
    assert_eq!(
        created[0].content_hash,
        docsync_core::hash::content_hash("first")
    );

    let loaded = store.get_chunks(doc.id, split.id).await.unwrap();
    assert_eq!(loaded, created);
    assert_eq!(loaded[0].meta["source"], "test");

    // Another splitting sees nothing.
    let other = store.get_or_create_splitting(500, 0).await.unwrap();
    assert!(store.get_chunks(doc.id, other.id).await.unwrap().is_empty());

    // Re-creating replaces the previous chunk set.
    store
        .create_chunks(doc.id, split.id, vec![raw("only")])
        .await
        .unwrap();
    let loaded = store.get_chunks(doc.id, split.id).await.unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].content, "only");
}

#[tokio::test]
async fn test_chunk_hashes_by_documents() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    let split = splitting(&store).await;
    let a = store.get_or_create_document("/a.md", "a.md", "ha").await.unwrap();
    let b = store.get_or_create_document("/b.md", "b.md", "hb").await.unwrap();
    let c = store.get_or_create_document("/c.md", "c.md", "hc").await.unwrap();
    for (doc, text) in [(&a, "alpha"), (&b, "beta"), (&c, "gamma")] {
        store
            .create_chunks(doc.id, split.id, vec![raw(text)])
            .await
            .unwrap();
    }

    let hashes = store
        .chunk_hashes_by_documents(&[a.id, c.id], split.id)
        .await
        .unwrap();
    assert_eq!(
        hashes,
        vec![
            docsync_core::hash::content_hash("alpha"),
            docsync_core::hash::content_hash("gamma"),
        ]
    );
    assert!(store
        .chunk_hashes_by_documents(&[], split.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_embedding_cache_round_trip() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    let record = |config_id, hash: &str, vector: Vec<f32>| EmbeddingRecord {
        identity: EmbeddingIdentity {
            embeddings_config_id: config_id,
            content_hash: hash.to_string(),
        },
        vector,
    };

    let written = store
        .upsert_embeddings(&[record(1, "h", vec![0.5, -1.0, 2.25])])
        .await
        .unwrap();
    assert_eq!(written, 1);
    assert_eq!(
        store.get_embedding(1, "h").await.unwrap(),
        Some(vec![0.5, -1.0, 2.25])
    );
    assert_eq!(store.get_embedding(2, "h").await.unwrap(), None);
    assert_eq!(store.get_embedding(1, "missing").await.unwrap(), None);

    store
        .upsert_embeddings(&[record(1, "h", vec![9.0, 8.0, 7.0])])
        .await
        .unwrap();
    assert_eq!(
        store.get_embedding(1, "h").await.unwrap(),
        Some(vec![9.0, 8.0, 7.0])
    );
}

#[tokio::test]
async fn test_index_bookkeeping() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    let collection = store.create_collection("papers").await.unwrap();
    let split = splitting(&store).await;

    let index = store
        .create_index("Papers", collection, split, 3, 4)
        .await
        .unwrap();
    assert!(index.indexed_documents.is_empty());
    assert_eq!(index.namespace(), format!("papers-{}-{}-3-4", collection, split.id));

    store.add_indexed_documents(&index.id, &[5, 2]).await.unwrap();
    store.add_indexed_documents(&index.id, &[2]).await.unwrap();

    let loaded = store.get_index(&index.id).await.unwrap().unwrap();
    assert_eq!(loaded.indexed_documents, vec![2, 5]);
    assert_eq!(loaded.splitting, split);
    assert_eq!(loaded.embeddings_config_id, 3);
    assert_eq!(loaded.vector_db_config_id, 4);

    let removed = store
        .remove_indexed_documents(&index.id, &[5, 7])
        .await
        .unwrap();
    assert_eq!(removed, 1);
    let loaded = store.get_index(&index.id).await.unwrap().unwrap();
    assert_eq!(loaded.indexed_documents, vec![2]);

    assert!(store.get_index("missing").await.unwrap().is_none());
    store.mark_synced(&index.id).await.unwrap();
}

#[tokio::test]
async fn test_splitting_get_or_create() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    let first = store.get_or_create_splitting(1000, 200).await.unwrap();
    let again = store.get_or_create_splitting(1000, 200).await.unwrap();
    let other = store.get_or_create_splitting(500, 50).await.unwrap();
    assert_eq!(first, again);
    assert_ne!(first.id, other.id);

    let err = store.get_or_create_splitting(100, 100).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<IndexError>(),
        Some(IndexError::InvalidSplitting { .. })
    ));
}
