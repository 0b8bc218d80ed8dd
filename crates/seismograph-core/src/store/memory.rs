//! In-memory [`DocumentStore`] for tests and dry runs.
//!
//! Documents live in a `HashMap` behind `std::sync::RwLock`; appends take
//! the write lock, which makes them atomic. Call counters and a
//! switchable outage let tests observe lookups and flushes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use serde_json::Value;

use crate::models::RecordKind;
use crate::ops::WriteOp;

use super::{apply_sequentially, BulkResponse, DocumentStore, StoreError};

type Key = (RecordKind, String);

/// In-memory store for testing.
pub struct InMemoryStore {
    docs: RwLock<HashMap<Key, Value>>,
    exists_calls: AtomicUsize,
    bulk_batches: Mutex<Vec<Vec<WriteOp>>>,
    unavailable: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
            exists_calls: AtomicUsize::new(0),
            bulk_batches: Mutex::new(Vec::new()),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Simulate an outage: every call fails with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of existence checks served so far.
    pub fn exists_calls(&self) -> usize {
        self.exists_calls.load(Ordering::SeqCst)
    }

    /// Every bulk request received, in order, including failed ones.
    pub fn bulk_batches(&self) -> Vec<Vec<WriteOp>> {
        self.bulk_batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.docs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("in-memory store marked unavailable".into()))
        } else {
            Ok(())
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn exists(&self, kind: RecordKind, identity: &str) -> Result<bool, StoreError> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let docs = self.docs.read().unwrap_or_else(PoisonError::into_inner);
        Ok(docs.contains_key(&(kind, identity.to_string())))
    }

    async fn create(
        &self,
        kind: RecordKind,
        identity: &str,
        document: &Value,
    ) -> Result<(), StoreError> {
        self.check_available()?;
        let mut docs = self.docs.write().unwrap_or_else(PoisonError::into_inner);
        let key = (kind, identity.to_string());
        if docs.contains_key(&key) {
            return Err(StoreError::Conflict {
                kind,
                identity: identity.to_string(),
            });
        }
        docs.insert(key, document.clone());
        Ok(())
    }

    async fn append_observation(
        &self,
        kind: RecordKind,
        identity: &str,
        observation: &Value,
    ) -> Result<(), StoreError> {
        self.check_available()?;
        let mut docs = self.docs.write().unwrap_or_else(PoisonError::into_inner);
        let doc = docs
            .get_mut(&(kind, identity.to_string()))
            .ok_or_else(|| StoreError::NotFound {
                kind,
                identity: identity.to_string(),
            })?;
        let scrapes = doc
            .get_mut("scrapes")
            .and_then(Value::as_array_mut)
            .ok_or_else(|| {
                StoreError::Backend(format!("{} '{}' has no scrapes array", kind, identity))
            })?;
        scrapes.push(observation.clone());
        Ok(())
    }

    async fn get(&self, kind: RecordKind, identity: &str) -> Result<Option<Value>, StoreError> {
        self.check_available()?;
        let docs = self.docs.read().unwrap_or_else(PoisonError::into_inner);
        Ok(docs.get(&(kind, identity.to_string())).cloned())
    }

    async fn count(&self, kind: RecordKind) -> Result<u64, StoreError> {
        self.check_available()?;
        let docs = self.docs.read().unwrap_or_else(PoisonError::into_inner);
        Ok(docs.keys().filter(|(k, _)| *k == kind).count() as u64)
    }

    async fn bulk(&self, ops: &[WriteOp]) -> Result<BulkResponse, StoreError> {
        self.bulk_batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ops.to_vec());
        self.check_available()?;
        apply_sequentially(self, ops).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::WriteAction;
    use serde_json::json;

    fn op(action: WriteAction, identity: &str, payload: Value) -> WriteOp {
        WriteOp {
            action,
            kind: RecordKind::Thread,
            identity: identity.to_string(),
            payload,
        }
    }

    #[tokio::test]
    async fn create_is_not_upsert() {
        let store = InMemoryStore::new();
        store
            .create(RecordKind::Thread, "1", &json!({ "title": "a", "scrapes": [] }))
            .await
            .unwrap();
        let err = store
            .create(RecordKind::Thread, "1", &json!({ "title": "b", "scrapes": [] }))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
        let doc = store.get(RecordKind::Thread, "1").await.unwrap().unwrap();
        assert_eq!(doc["title"], "a");
    }

    #[tokio::test]
    async fn append_requires_existing_document() {
        let store = InMemoryStore::new();
        let err = store
            .append_observation(RecordKind::Thread, "missing", &json!({ "views": 1 }))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn bulk_reports_rejections_per_item() {
        let store = InMemoryStore::new();
        let ops = vec![
            op(WriteAction::Create, "1", json!({ "scrapes": [] })),
            op(WriteAction::Create, "1", json!({ "scrapes": [] })),
            op(WriteAction::UpdateAppend, "1", json!({ "views": 3 })),
            op(WriteAction::UpdateAppend, "2", json!({ "views": 3 })),
        ];
        let response = store.bulk(&ops).await.unwrap();
        assert_eq!(response.items.len(), 4);
        assert_eq!(response.succeeded(), 2);
        let rejected: Vec<&str> = response.failures().map(|i| i.identity.as_str()).collect();
        assert_eq!(rejected, vec!["1", "2"]);

        let doc = store.get(RecordKind::Thread, "1").await.unwrap().unwrap();
        assert_eq!(doc["scrapes"].as_array().unwrap().len(), 1);
        assert_eq!(store.bulk_batches().len(), 1);
    }

    #[tokio::test]
    async fn outage_fails_whole_bulk() {
        let store = InMemoryStore::new();
        store.set_unavailable(true);
        let err = store
            .bulk(&[op(WriteAction::Create, "1", json!({}))])
            .await
            .unwrap_err();
        assert!(err.is_transport());
        assert!(store.is_empty());
    }
}
