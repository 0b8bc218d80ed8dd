//! Ingestion orchestration.
//!
//! Every record flows through [`Ingestor`]:
//!
//! ```text
//! RECEIVED → IDENTITY_RESOLVED → NEW      → CREATE        → ENQUEUED
//!                              → EXISTING → UPDATE_APPEND → ENQUEUED   (thread, submission)
//!                              → EXISTING → SKIPPED                    (release, news)
//! unknown kind / malformed → REJECTED
//! ```
//!
//! Per-record errors are counted and logged; they never abort a run.
//! Only a transport failure on the final flush in [`Ingestor::close`]
//! is terminal.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::batch::{BatchWriter, WriterStats, DEFAULT_BUFFER_SIZE};
use crate::clock::{Clock, SystemClock};
use crate::error::IngestError;
use crate::identity::{resolve, Resolution};
use crate::models::Record;
use crate::ops::WriteOp;
use crate::store::DocumentStore;

/// Terminal state of one accepted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// First observation; a CREATE was queued.
    Created,
    /// Repeat observation; an UPDATE_APPEND was queued.
    Appended,
    /// Repeat observation of a creation-only kind; nothing queued.
    Skipped,
}

/// Counts for one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub received: u64,
    pub created: u64,
    pub appended: u64,
    pub skipped: u64,
    /// Dropped for data-quality reasons (unknown kind, malformed fields).
    pub rejected: u64,
    /// Dropped because the existence check failed.
    pub failed: u64,
    pub flushes: u64,
    pub written: u64,
    pub write_rejected: u64,
    pub dropped: u64,
}

impl IngestReport {
    /// Records that reached their terminal state in the store.
    ///
    /// Each created or appended record queues exactly one operation, so
    /// operations lost at write time are taken back out here and counted
    /// once, under [`failures`](Self::failures).
    pub fn succeeded(&self) -> u64 {
        (self.created + self.appended + self.skipped)
            .saturating_sub(self.write_rejected + self.dropped)
    }

    pub fn failures(&self) -> u64 {
        self.rejected + self.failed + self.write_rejected + self.dropped
    }

    fn absorb(&mut self, stats: WriterStats) {
        self.flushes = stats.flushes;
        self.written = stats.written;
        self.write_rejected = stats.rejected;
        self.dropped = stats.dropped;
    }
}

/// Top-level entry point each record flows through.
///
/// Owns the run's [`BatchWriter`]; the store client is shared.
pub struct Ingestor {
    store: Arc<dyn DocumentStore>,
    writer: BatchWriter,
    clock: Arc<dyn Clock>,
    report: IngestReport,
}

impl Ingestor {
    pub fn new(store: Arc<dyn DocumentStore>, buffer_size: usize) -> Self {
        Self {
            writer: BatchWriter::new(store.clone(), buffer_size),
            store,
            clock: Arc::new(SystemClock),
            report: IngestReport::default(),
        }
    }

    /// Ingestor with the default buffer size.
    pub fn with_defaults(store: Arc<dyn DocumentStore>) -> Self {
        Self::new(store, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Operations buffered but not yet flushed.
    pub fn pending(&self) -> usize {
        self.writer.len()
    }

    /// Snapshot of the counts so far.
    pub fn report(&self) -> IngestReport {
        let mut report = self.report.clone();
        report.absorb(self.writer.stats());
        report
    }

    /// Ingest one typed record.
    pub async fn ingest(&mut self, record: &Record) -> Result<Outcome, IngestError> {
        self.report.received += 1;
        let result = self.apply(record).await;
        self.tally(&result);
        result
    }

    /// Map a collector's JSON object to a record and ingest it.
    pub async fn ingest_value(&mut self, raw: &Value) -> Result<Outcome, IngestError> {
        self.report.received += 1;
        let result = match Record::from_value(raw) {
            Ok(record) => self.apply(&record).await,
            Err(e) => Err(e),
        };
        self.tally(&result);
        result
    }

    /// Ingest one item of a record stream, logging it if dropped.
    ///
    /// An item that already failed upstream (e.g. an unparseable line) is
    /// counted as rejected.
    pub async fn ingest_item(
        &mut self,
        item: Result<Value, IngestError>,
    ) -> Result<Outcome, IngestError> {
        let result = match item {
            Ok(value) => self.ingest_value(&value).await,
            Err(e) => {
                self.report.received += 1;
                let result = Err(e);
                self.tally(&result);
                result
            }
        };
        if let Err(e) = &result {
            warn!(error = %e, "record dropped");
        }
        result
    }

    /// Consume a record sequence until exhausted.
    pub async fn run<I>(&mut self, records: I)
    where
        I: IntoIterator<Item = Result<Value, IngestError>>,
    {
        for item in records {
            // Already counted and logged.
            let _ = self.ingest_item(item).await;
        }
    }

    /// Flush the remaining buffer and return the run's counts.
    ///
    /// Individual rejections in the final batch are reported but not
    /// terminal. A transport failure is.
    pub async fn close(mut self) -> Result<IngestReport, IngestError> {
        match self.writer.close().await {
            Ok(_) => {}
            Err(e @ IngestError::PartialBulkFailure { .. }) => {
                warn!(error = %e, "final flush partially rejected");
            }
            Err(e) => {
                error!(error = %e, "final flush failed");
                return Err(e);
            }
        }
        Ok(self.report())
    }

    async fn apply(&mut self, record: &Record) -> Result<Outcome, IngestError> {
        let kind = record.kind();
        let identity = record.identity();
        if self.writer.has_pending_create(kind, &identity) {
            // Make the buffered CREATE visible so this sighting resolves EXISTING.
            debug!(%kind, %identity, "repeat of a buffered create; flushing first");
            if let Err(e) = self.writer.flush().await {
                warn!(error = %e, "batch flush failed; buffer cleared");
            }
        }
        let resolution = resolve(self.store.as_ref(), kind, &identity).await?;
        let now = self.clock.now();

        let (op, outcome) = match resolution {
            Resolution::New => (WriteOp::create(record, now), Outcome::Created),
            Resolution::Existing => match WriteOp::append(record, now) {
                Some(op) => (op, Outcome::Appended),
                None => {
                    debug!(%kind, %identity, "already recorded; skipping");
                    return Ok(Outcome::Skipped);
                }
            },
        };

        if let Err(e) = self.writer.enqueue(op).await {
            warn!(error = %e, "batch flush failed; buffer cleared");
        }
        Ok(outcome)
    }

    fn tally(&mut self, result: &Result<Outcome, IngestError>) {
        match result {
            Ok(Outcome::Created) => self.report.created += 1,
            Ok(Outcome::Appended) => self.report.appended += 1,
            Ok(Outcome::Skipped) => self.report.skipped += 1,
            Err(e) if e.is_data_quality() => self.report.rejected += 1,
            Err(_) => self.report.failed += 1,
        }
    }
}
