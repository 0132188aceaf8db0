//! # docsync
//!
//! Keeps vector-store namespaces in step with local document collections.
//!
//! The pure sync logic lives in [`docsync_core`]; this crate provides the
//! native adapters and the `docsync` CLI around it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ Collection  │──▶│ IndexSync-   │──▶│   Indexer    │
//! │ (SQLite)    │   │ Status diff  │   │ split+embed  │
//! └─────────────┘   └──────────────┘   └──────┬───────┘
//!                                             │
//!                       ┌─────────────────────┤
//!                       ▼                     ▼
//!                 ┌───────────┐        ┌────────────┐
//!                 │ embedding │        │  vector    │
//!                 │  cache    │        │  store     │
//!                 └───────────┘        └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docsync init
//! docsync collection create papers          # prints the collection id
//! docsync collection add 1 ~/papers
//! docsync index create 1                    # prints the index id
//! docsync sync <index-id>
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite `IndexStore` and catalogue |
//! | [`http`] | JSON POST with retry and backoff |
//! | [`embedding`] | OpenAI / Ollama providers |
//! | [`vector_store`] | Pinecone / in-memory backends |
//! | [`loader`] | Filesystem document loader |
//! | [`progress`] | Progress reporters |
//! | [`collection`] | Collection and index commands |
//! | [`sync_cmd`] | Status and sync commands |
//! | [`stats`] | Database statistics |

pub mod collection;
pub mod config;
pub mod db;
pub mod embedding;
pub mod http;
pub mod loader;
pub mod migrate;
pub mod progress;
pub mod sqlite_store;
pub mod stats;
pub mod sync_cmd;
pub mod vector_store;
