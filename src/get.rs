//! Document retrieval by kind and identity.
//!
//! Used by `seismo get`. Besides stored identities, a release version
//! (`0.14.2`) or a news permalink is accepted and converted to the
//! identity it is stored under.

use anyhow::{bail, Result};
use serde_json::Value;

use seismograph_core::identity::{permalink_identity, release_identity};
use seismograph_core::models::RecordKind;
use seismograph_core::store::DocumentStore;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

/// Normalize what a user typed into a stored identity.
pub fn lookup_identity(kind: RecordKind, raw: &str) -> String {
    let raw = raw.trim();
    match kind {
        RecordKind::Release => release_identity(raw),
        RecordKind::News if raw.contains("://") => permalink_identity(raw),
        _ => raw.to_string(),
    }
}

pub async fn get_document(config: &Config, kind: RecordKind, identity: &str) -> Result<Value> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let id = lookup_identity(kind, identity);

    let doc = store.get(kind, &id).await;
    pool.close().await;

    match doc? {
        Some(doc) => Ok(doc),
        None => bail!("{} not found: {}", kind, id),
    }
}

/// CLI entry point: print the stored document as pretty JSON.
pub async fn run_get(config: &Config, kind: &str, identity: &str) -> Result<()> {
    let kind: RecordKind = kind.parse()?;
    let doc = get_document(config, kind, identity).await?;
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}
