//! Buffered bulk writes.
//!
//! [`BatchWriter`] accumulates [`WriteOp`]s and sends them as one bulk
//! request when the buffer reaches its limit, on an explicit
//! [`flush`](BatchWriter::flush), or on [`close`](BatchWriter::close).
//!
//! Delivery is at-most-once: the buffer is cleared after every flush
//! attempt, whatever the store reports, so one bad batch never blocks
//! the rest of the run. Rejected and dropped operations are counted in
//! [`WriterStats`] and logged individually.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::IngestError;
use crate::models::RecordKind;
use crate::ops::{WriteAction, WriteOp};
use crate::store::DocumentStore;

/// Default number of buffered operations that triggers a flush.
pub const DEFAULT_BUFFER_SIZE: usize = 100;

/// Running totals over a writer's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    /// Bulk requests sent (successful or not).
    pub flushes: u64,
    /// Operations the store applied.
    pub written: u64,
    /// Operations the store rejected individually.
    pub rejected: u64,
    /// Operations lost to a failed bulk request.
    pub dropped: u64,
}

/// Single-owner operation buffer in front of a [`DocumentStore`].
///
/// Appends go through `&mut self`, so buffer order and the threshold
/// check are serialized by ownership. Share it across tasks behind a
/// `tokio::sync::Mutex` if resolution is parallelized.
pub struct BatchWriter {
    store: Arc<dyn DocumentStore>,
    buffer: Vec<WriteOp>,
    // Identities with a CREATE in `buffer`, not yet visible to the store.
    pending_creates: HashSet<(RecordKind, String)>,
    limit: usize,
    stats: WriterStats,
}

impl BatchWriter {
    /// Create a writer flushing every `limit` operations (minimum 1).
    pub fn new(store: Arc<dyn DocumentStore>, limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            store,
            buffer: Vec::with_capacity(limit),
            pending_creates: HashSet::new(),
            limit,
            stats: WriterStats::default(),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn stats(&self) -> WriterStats {
        self.stats
    }

    /// True if a CREATE for this identity is buffered but not yet flushed.
    pub fn has_pending_create(&self, kind: RecordKind, identity: &str) -> bool {
        self.pending_creates.contains(&(kind, identity.to_string()))
    }

    /// Buffer one operation, flushing once the limit is reached.
    ///
    /// The operation is always accepted. An `Err` reports the outcome of
    /// the automatic flush; the buffer is empty afterwards either way.
    pub async fn enqueue(&mut self, op: WriteOp) -> Result<(), IngestError> {
        debug!(
            action = ?op.action,
            kind = %op.kind,
            identity = %op.identity,
            "queued operation"
        );
        if op.action == WriteAction::Create {
            self.pending_creates.insert((op.kind, op.identity.clone()));
        }
        self.buffer.push(op);
        if self.buffer.len() >= self.limit {
            self.flush().await?;
        }
        Ok(())
    }

    /// Send the whole buffer as one bulk request and clear it.
    ///
    /// Returns the number of operations the store applied. A partial
    /// rejection returns [`IngestError::PartialBulkFailure`]; a store
    /// outage returns [`IngestError::Transport`].
    pub async fn flush(&mut self) -> Result<usize, IngestError> {
        if self.buffer.is_empty() {
            return Ok(0);
        }

        let batch = std::mem::take(&mut self.buffer);
        self.pending_creates.clear();
        self.stats.flushes += 1;

        let response = match self.store.bulk(&batch).await {
            Ok(response) => response,
            Err(source) => {
                self.stats.dropped += batch.len() as u64;
                return Err(IngestError::Transport {
                    context: format!("bulk flush of {} operations", batch.len()),
                    source,
                });
            }
        };

        let written = response.succeeded();
        self.stats.written += written as u64;

        let rejected: Vec<_> = response.failures().cloned().collect();
        if rejected.is_empty() {
            info!(operations = written, "flushed batch");
            return Ok(written);
        }

        self.stats.rejected += rejected.len() as u64;
        for item in &rejected {
            warn!(
                action = ?item.action,
                kind = %item.kind,
                identity = %item.identity,
                error = item.error.as_deref().unwrap_or_default(),
                "store rejected operation"
            );
        }
        Err(IngestError::PartialBulkFailure {
            attempted: batch.len(),
            rejected,
        })
    }

    /// Flush whatever is still buffered. Call this at shutdown.
    pub async fn close(&mut self) -> Result<usize, IngestError> {
        self.flush().await
    }
}

impl Drop for BatchWriter {
    fn drop(&mut self) {
        if !self.buffer.is_empty() {
            warn!(
                operations = self.buffer.len(),
                "batch writer dropped without close; buffered operations lost"
            );
        }
    }
}
