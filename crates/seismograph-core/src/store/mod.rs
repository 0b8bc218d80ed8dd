//! Document store abstraction.
//!
//! The [`DocumentStore`] trait defines the operations the pipeline needs
//! from a document database: existence check, create-only insert, atomic
//! append to a document's observation array, and an ordered bulk write.
//!
//! Implementations must be `Send + Sync`; one client is created per run
//! and shared read-only.

pub mod memory;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::models::RecordKind;
use crate::ops::{WriteAction, WriteOp};

/// Failures reported by a store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached or timed out.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("{kind} '{identity}' already exists")]
    Conflict { kind: RecordKind, identity: String },

    #[error("{kind} '{identity}' not found")]
    NotFound { kind: RecordKind, identity: String },

    /// The store was reachable but refused the operation.
    #[error("store rejected operation: {0}")]
    Backend(String),

    #[error("document serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_transport(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Per-operation result within a bulk request.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkItem {
    pub action: WriteAction,
    pub kind: RecordKind,
    pub identity: String,
    /// `None` on success, the store's reason otherwise.
    pub error: Option<String>,
}

impl BulkItem {
    fn ok(op: &WriteOp) -> Self {
        Self {
            action: op.action,
            kind: op.kind,
            identity: op.identity.clone(),
            error: None,
        }
    }

    fn rejected(op: &WriteOp, reason: String) -> Self {
        Self {
            action: op.action,
            kind: op.kind,
            identity: op.identity.clone(),
            error: Some(reason),
        }
    }
}

/// Result of a bulk request, one item per submitted operation, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkResponse {
    pub items: Vec<BulkItem>,
}

impl BulkResponse {
    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|i| i.error.is_none()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &BulkItem> {
        self.items.iter().filter(|i| i.error.is_some())
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }
}

/// Abstract document store.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`exists`](DocumentStore::exists) | Existence check by kind + identity |
/// | [`create`](DocumentStore::create) | Insert; fails with [`StoreError::Conflict`] if present |
/// | [`append_observation`](DocumentStore::append_observation) | Atomic append to `scrapes` |
/// | [`get`](DocumentStore::get) | Fetch a stored document |
/// | [`count`](DocumentStore::count) | Number of documents of a kind |
/// | [`bulk`](DocumentStore::bulk) | Apply an ordered batch of [`WriteOp`]s |
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn exists(&self, kind: RecordKind, identity: &str) -> Result<bool, StoreError>;

    async fn create(
        &self,
        kind: RecordKind,
        identity: &str,
        document: &Value,
    ) -> Result<(), StoreError>;

    /// Append `observation` to the document's `scrapes` array.
    ///
    /// Must be atomic at the store: concurrent appends to one document
    /// may not lose each other. No other field is touched.
    async fn append_observation(
        &self,
        kind: RecordKind,
        identity: &str,
        observation: &Value,
    ) -> Result<(), StoreError>;

    async fn get(&self, kind: RecordKind, identity: &str) -> Result<Option<Value>, StoreError>;

    async fn count(&self, kind: RecordKind) -> Result<u64, StoreError>;

    /// Apply `ops` in order as one request.
    ///
    /// Per-item rejections are reported in the response. A transport
    /// failure aborts the request and is returned as `Err`.
    async fn bulk(&self, ops: &[WriteOp]) -> Result<BulkResponse, StoreError> {
        apply_sequentially(self, ops).await
    }
}

/// Default bulk strategy: apply each op through the single-item methods.
pub async fn apply_sequentially<S>(store: &S, ops: &[WriteOp]) -> Result<BulkResponse, StoreError>
where
    S: DocumentStore + ?Sized,
{
    let mut items = Vec::with_capacity(ops.len());
    for op in ops {
        let result = match op.action {
            WriteAction::Create => store.create(op.kind, &op.identity, &op.payload).await,
            WriteAction::UpdateAppend => {
                store
                    .append_observation(op.kind, &op.identity, &op.payload)
                    .await
            }
        };
        items.push(bulk_item(op, result)?);
    }
    Ok(BulkResponse { items })
}

/// Classify one operation's outcome: transport errors abort the bulk
/// request, anything else becomes a per-item rejection.
pub fn bulk_item(op: &WriteOp, result: Result<(), StoreError>) -> Result<BulkItem, StoreError> {
    match result {
        Ok(()) => Ok(BulkItem::ok(op)),
        Err(e) if e.is_transport() => Err(e),
        Err(e) => Ok(BulkItem::rejected(op, e.to_string())),
    }
}
