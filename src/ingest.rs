//! The `ingest` command.
//!
//! Reads an NDJSON record stream, runs every record through the
//! [`Ingestor`], and prints a run summary. Per-record problems are logged
//! and counted; only a store failure on the final flush fails the run.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::io::AsyncBufRead;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use seismograph_core::error::IngestError;
use seismograph_core::models::{Record, RecordKind};
use seismograph_core::pipeline::{IngestReport, Ingestor};
use seismograph_core::store::DocumentStore;

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::source::{self, NdjsonSource};
use crate::sqlite_store::SqliteStore;

pub async fn run_ingest(
    config: &Config,
    path: Option<&Path>,
    buffer_size: Option<usize>,
    dry_run: bool,
) -> Result<()> {
    let records = source::open(path).await?;
    let label = path
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "-".to_string());

    if dry_run {
        let (by_kind, rejected) = dry_run_counts(records).await;
        println!("ingest {} (dry-run)", label);
        for (kind, count) in &by_kind {
            println!("  {}: {}", kind, count);
        }
        println!("  rejected: {}", rejected);
        return Ok(());
    }

    let buffer_size = buffer_size.unwrap_or(config.ingest.buffer_size).max(1);
    let pool = db::connect(config).await?;
    migrate::apply_schema(&pool).await?;
    let store: Arc<dyn DocumentStore> = Arc::new(SqliteStore::new(pool.clone()));

    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("ingest", %run_id, input = %label);
    let result = ingest_source(store, records, buffer_size)
        .instrument(span)
        .await;
    pool.close().await;

    let report = result.with_context(|| format!("ingest run {} failed", run_id))?;

    println!("ingest {}", label);
    println!("  received: {}", report.received);
    println!("  created: {}", report.created);
    println!("  appended: {}", report.appended);
    println!("  skipped: {}", report.skipped);
    println!("  rejected: {}", report.rejected);
    println!("  failed: {}", report.failed);
    println!(
        "  written: {} in {} flush{}",
        report.written,
        report.flushes,
        if report.flushes == 1 { "" } else { "es" }
    );
    if report.write_rejected > 0 || report.dropped > 0 {
        println!("  write rejected: {}", report.write_rejected);
        println!("  dropped: {}", report.dropped);
    }
    println!("ok");

    Ok(())
}

/// Run one ingestion over an NDJSON stream and close the writer.
pub async fn ingest_source<R>(
    store: Arc<dyn DocumentStore>,
    mut source: NdjsonSource<R>,
    buffer_size: usize,
) -> Result<IngestReport, IngestError>
where
    R: AsyncBufRead + Unpin,
{
    let mut ingestor = Ingestor::new(store, buffer_size);
    while let Some(item) = source.next_record().await {
        // Dropped records are counted and logged by the ingestor.
        let _ = ingestor.ingest_item(item).await;
    }
    finish(ingestor).await
}

/// Run one ingestion over in-memory `records` and close the writer.
pub async fn ingest_records<I>(
    store: Arc<dyn DocumentStore>,
    records: I,
    buffer_size: usize,
) -> Result<IngestReport, IngestError>
where
    I: IntoIterator<Item = Result<Value, IngestError>>,
{
    let mut ingestor = Ingestor::new(store, buffer_size);
    ingestor.run(records).await;
    finish(ingestor).await
}

async fn finish(ingestor: Ingestor) -> Result<IngestReport, IngestError> {
    let pending = ingestor.pending();
    let report = ingestor.close().await?;
    info!(
        received = report.received,
        succeeded = report.succeeded(),
        failures = report.failures(),
        final_batch = pending,
        "ingest run complete"
    );
    Ok(report)
}

async fn dry_run_counts<R>(mut source: NdjsonSource<R>) -> (BTreeMap<RecordKind, u64>, u64)
where
    R: AsyncBufRead + Unpin,
{
    let mut by_kind = BTreeMap::new();
    let mut rejected = 0;
    while let Some(item) = source.next_record().await {
        match item.and_then(|value| Record::from_value(&value)) {
            Ok(record) => *by_kind.entry(record.kind()).or_insert(0) += 1,
            Err(e) => {
                warn!(error = %e, "record would be dropped");
                rejected += 1;
            }
        }
    }
    (by_kind, rejected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use seismograph_core::store::memory::InMemoryStore;

    const RECORDS: &[u8] = b"{\"kind\":\"release\",\"version\":\"0.14.2\",\"release_date\":\"2017-06-17\",\"download_link\":\"https://bitcoin.org/bin/bitcoin-core-0.14.2/\"}
{\"kind\":\"poll\"}
not json
\xff\xfe
{\"kind\":\"release\",\"version\":\"0.14.2\",\"release_date\":\"2017-06-17\",\"download_link\":\"https://bitcoin.org/bin/bitcoin-core-0.14.2/\"}
";

    #[tokio::test]
    async fn dry_run_counts_by_kind() {
        let (by_kind, rejected) = dry_run_counts(NdjsonSource::new(RECORDS)).await;
        assert_eq!(by_kind.get(&RecordKind::Release), Some(&2));
        assert_eq!(rejected, 3);
    }

    #[tokio::test]
    async fn source_run_counts_every_line() {
        let store = Arc::new(InMemoryStore::new());
        let report = ingest_source(store.clone(), NdjsonSource::new(RECORDS), 10)
            .await
            .unwrap();
        assert_eq!(report.received, 5);
        assert_eq!(report.created, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.rejected, 3);
        assert_eq!(report.succeeded() + report.failures(), report.received);
        assert_eq!(store.len(), 1);
    }
}
