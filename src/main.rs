//! # docsync CLI
//!
//! ## Usage
//!
//! ```bash
//! docsync --config ./config/docsync.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docsync init` | Create the SQLite database and run schema migrations |
//! | `docsync collection create <name>` | Create a collection |
//! | `docsync collection add <id> <path>...` | Import files into a collection |
//! | `docsync collection remove <id> <doc-id>...` | Detach documents from a collection |
//! | `docsync collection rename <id> <name>` | Rename a collection |
//! | `docsync collection delete <id>` | Delete a collection and its indexes |
//! | `docsync index create <collection-id>` | Create an index for a collection |
//! | `docsync index delete <index-id>` | Delete an index and its vectors |
//! | `docsync list` | Collections, document counts and indexes |
//! | `docsync status <index-id>` | Show what a sync would do |
//! | `docsync sync <index-id>` | Bring the index's namespace up to date |
//! | `docsync stats` | Database statistics |
//!
//! Diagnostics are logged to stderr through `tracing`; set `RUST_LOG`
//! (e.g. `RUST_LOG=docsync=debug`) to see more than warnings.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use docsync::progress::ProgressMode;
use docsync::{collection, config, migrate, stats, sync_cmd};

/// docsync: keep vector-store namespaces in step with local document collections.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file.
#[derive(Parser)]
#[command(name = "docsync", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docsync.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent: running it multiple times is safe.
    Init,

    /// Manage collections of documents.
    Collection {
        #[command(subcommand)]
        action: CollectionAction,
    },

    /// Manage collection indexes.
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },

    /// Show which documents a sync would index and delete.
    Status {
        /// Index id (printed by `index create`).
        index_id: String,
    },

    /// Sync an index: delete vectors of removed documents, then split,
    /// embed and upload new ones.
    Sync {
        /// Index id (printed by `index create`).
        index_id: String,

        /// Skip documents that fail instead of stopping the sync.
        #[arg(long)]
        continue_on_error: bool,

        /// Progress output on stderr: `off`, `human` or `json`.
        /// Defaults to `human` when stderr is a terminal.
        #[arg(long)]
        progress: Option<ProgressMode>,
    },

    /// List collections with their document counts and indexes.
    List,

    /// Show document, chunk, embedding and index counts.
    Stats,
}

#[derive(Subcommand)]
enum CollectionAction {
    /// Create a new, empty collection.
    Create { name: String },

    /// Import files (directories are walked) into a collection.
    Add {
        collection_id: i64,
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Detach documents from a collection.
    Remove {
        collection_id: i64,
        #[arg(required = true)]
        document_ids: Vec<i64>,
    },

    /// Rename a collection.
    Rename { collection_id: i64, name: String },

    /// Delete a collection. Each of its indexes is deleted first, vectors
    /// included.
    Delete { collection_id: i64 },
}

#[derive(Subcommand)]
enum IndexAction {
    /// Create an index using the configured splitting, embeddings and vector store.
    Create {
        collection_id: i64,

        /// Display name; also the first part of the vector-store namespace.
        #[arg(long)]
        name: Option<String>,
    },

    /// Delete an index: remove its vectors from the namespace, then its
    /// bookkeeping.
    Delete {
        /// Index id (printed by `index create`).
        index_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Collection { action } => match action {
            CollectionAction::Create { name } => {
                collection::run_collection_create(&cfg, &name).await?;
            }
            CollectionAction::Add {
                collection_id,
                paths,
            } => {
                collection::run_collection_add(&cfg, collection_id, &paths).await?;
            }
            CollectionAction::Remove {
                collection_id,
                document_ids,
            } => {
                collection::run_collection_remove(&cfg, collection_id, &document_ids).await?;
            }
            CollectionAction::Rename {
                collection_id,
                name,
            } => {
                collection::run_collection_rename(&cfg, collection_id, &name).await?;
            }
            CollectionAction::Delete { collection_id } => {
                collection::run_collection_delete(&cfg, collection_id).await?;
            }
        },
        Commands::Index { action } => match action {
            IndexAction::Create {
                collection_id,
                name,
            } => {
                collection::run_index_create(&cfg, collection_id, name.as_deref()).await?;
            }
            IndexAction::Delete { index_id } => {
                collection::run_index_delete(&cfg, &index_id).await?;
            }
        },
        Commands::Status { index_id } => {
            sync_cmd::run_status(&cfg, &index_id).await?;
        }
        Commands::Sync {
            index_id,
            continue_on_error,
            progress,
        } => {
            let progress = progress.unwrap_or_else(ProgressMode::default_for_tty);
            sync_cmd::run_sync(&cfg, &index_id, continue_on_error, progress).await?;
        }
        Commands::List => {
            collection::run_list(&cfg).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
