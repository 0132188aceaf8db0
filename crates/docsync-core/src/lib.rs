//! # docsync core
//!
//! Pure logic for keeping a vector-store namespace in step with a document
//! collection: data models, content hashing, text splitting, collaborator
//! traits, the sync-status diff, the nested progress tracer and the
//! [`Indexer`](indexer::Indexer) that drives a sync.
//!
//! This crate contains no tokio, sqlx or network code. Native adapters
//! (SQLite, OpenAI, Pinecone, filesystem) live in the `docsync` app crate;
//! in-memory collaborators for tests and dry runs live here.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | Documents, chunks, splittings, collection indexes |
//! | [`hash`] | Content fingerprinting |
//! | [`split`] | Recursive character text splitter |
//! | [`embedding`] | Embeddings provider trait and vector helpers |
//! | [`store`] | Local persistence trait and in-memory store |
//! | [`vector_store`] | Vector-store adapter trait and in-memory store |
//! | [`loader`] | Document loader trait |
//! | [`sync_status`] | Which documents to index and which to delete |
//! | [`tracer`] | Nested step-stack progress tracer |
//! | [`indexer`] | Sync orchestration |
//! | [`error`] | Typed configuration and programmer errors |

pub mod embedding;
pub mod error;
pub mod hash;
pub mod indexer;
pub mod loader;
pub mod models;
pub mod split;
pub mod store;
pub mod sync_status;
pub mod tracer;
pub mod vector_store;

pub use error::IndexError;
pub use indexer::{remove_documents, ErrorPolicy, Indexer, IndexerOptions, SyncReport};
pub use sync_status::IndexSyncStatus;
pub use tracer::{IndexTracer, Tracer, TracerExt};
