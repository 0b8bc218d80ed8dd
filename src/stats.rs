//! Store statistics.
//!
//! A quick summary of what has been ingested: document and observation
//! counts per record kind, plus when each kind was last written. Used by
//! `seismo stats` to confirm collectors and runs are landing data.

use anyhow::Result;
use sqlx::Row;

use seismograph_core::models::RecordKind;
use seismograph_core::store::DocumentStore;

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::sqlite_store::SqliteStore;

/// Per-kind breakdown.
struct KindStats {
    kind: RecordKind,
    doc_count: u64,
    observation_count: u64,
    last_write_ts: Option<i64>,
}

/// Run the stats command: query the store and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate::apply_schema(&pool).await?;
    let store = SqliteStore::new(pool.clone());

    let last_writes =
        sqlx::query("SELECT kind, MAX(updated_at) AS last_write FROM documents GROUP BY kind")
            .fetch_all(&pool)
            .await?;

    let mut kinds = Vec::with_capacity(RecordKind::ALL.len());
    for kind in RecordKind::ALL {
        let last_write_ts = last_writes
            .iter()
            .find(|row| row.get::<String, _>("kind") == kind.as_str())
            .map(|row| row.get::<i64, _>("last_write"));

        kinds.push(KindStats {
            kind,
            doc_count: store.count(kind).await?,
            observation_count: store.observation_count(kind).await?,
            last_write_ts,
        });
    }

    let db_path = config.db_path();
    let db_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);
    let total_docs: u64 = kinds.iter().map(|k| k.doc_count).sum();
    let total_obs: u64 = kinds.iter().map(|k| k.observation_count).sum();

    println!("Seismograph Store Stats");
    println!("=======================");
    println!();
    println!("  Store:         {}", db_path.display());
    println!("  Size:          {}", format_bytes(db_size));
    println!();
    println!("  Documents:     {}", total_docs);
    println!("  Observations:  {}", total_obs);
    println!();
    println!("  By kind:");
    println!(
        "  {:<12} {:>8} {:>13}   {}",
        "KIND", "DOCS", "OBSERVATIONS", "LAST WRITE"
    );
    println!("  {}", "-".repeat(56));

    for k in &kinds {
        let observations = if k.kind.tracks_observations() {
            k.observation_count.to_string()
        } else {
            "-".to_string()
        };
        let last_write = match k.last_write_ts {
            Some(ts) => format_ts_relative(ts),
            None => "never".to_string(),
        };
        println!(
            "  {:<12} {:>8} {:>13}   {}",
            k.kind.as_str(),
            k.doc_count,
            observations,
            last_write
        );
    }

    println!();

    pool.close().await;
    Ok(())
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

/// Format a Unix timestamp relative to now, e.g. "3 hours ago".
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
