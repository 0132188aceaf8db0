//! Database statistics.
//!
//! A quick summary of what the catalogue holds: collections, documents,
//! chunks, cached embeddings, and per-index progress. Used by `docsync stats`.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;

/// Per-index breakdown.
struct IndexStats {
    name: String,
    id: String,
    live: i64,
    indexed: i64,
    synced_at: Option<i64>,
}

pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    let collections = count(&pool, "SELECT COUNT(*) FROM collections").await?;
    let documents = count(&pool, "SELECT COUNT(*) FROM documents").await?;
    let chunks = count(&pool, "SELECT COUNT(*) FROM document_chunks").await?;
    let embeddings = count(&pool, "SELECT COUNT(*) FROM embedding_vectors").await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("docsync database stats");
    println!("======================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Collections: {}", collections);
    println!("  Documents:   {}", documents);
    println!("  Chunks:      {}", chunks);
    println!("  Embeddings:  {}", embeddings);

    let rows = sqlx::query(
        r#"
        SELECT
            ci.id,
            ci.name,
            ci.synced_at,
            (SELECT COUNT(*) FROM collection_documents cd
                WHERE cd.collection_id = ci.collection_id) AS live,
            (SELECT COUNT(*) FROM collection_index_documents cid
                WHERE cid.index_id = ci.id) AS indexed
        FROM collection_indexes ci
        ORDER BY ci.created_at
        "#,
    )
    .fetch_all(&pool)
    .await?;

    let indexes: Vec<IndexStats> = rows
        .iter()
        .map(|row| IndexStats {
            id: row.get("id"),
            name: row.get("name"),
            live: row.get("live"),
            indexed: row.get("indexed"),
            synced_at: row.get("synced_at"),
        })
        .collect();

    if !indexes.is_empty() {
        println!();
        println!("  Indexes:");
        println!(
            "  {:<24} {:<36} {:>8}   {}",
            "NAME", "ID", "INDEXED", "LAST SYNC"
        );
        println!("  {}", "-".repeat(86));
        for index in &indexes {
            let sync_display = match index.synced_at {
                Some(ts) => format_ts_relative(ts),
                None => "never".to_string(),
            };
            println!(
                "  {:<24} {:<36} {:>8}   {}",
                index.name,
                index.id,
                format!("{}/{}", index.indexed, index.live),
                sync_display
            );
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

async fn count(pool: &SqlitePool, sql: &str) -> Result<i64> {
    let n: i64 = sqlx::query_scalar(sql).fetch_one(pool).await?;
    Ok(n)
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
