//! SQLite connection management.
//!
//! The store endpoint names a SQLite file. WAL mode lets `stats` and
//! `get` read while an ingestion run writes; the configured store timeout
//! bounds both pool acquisition and lock waits.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::config::Config;

/// Create a connection pool to the configured database.
///
/// Creates the database file and its parent directories if missing.
pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let db_path = config.db_path();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(config.timeout());

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(config.timeout())
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open store at {}", db_path.display()))?;

    Ok(pool)
}
