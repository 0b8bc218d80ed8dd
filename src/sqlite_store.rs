//! SQLite-backed [`DocumentStore`] implementation.
//!
//! Every record lives in one `documents` row keyed by `(kind, id)`, with
//! the stored document as a JSON `body`. Observation appends run as a
//! single `json_insert` UPDATE, so SQLite's write lock makes them atomic
//! and concurrent appends to the same document cannot lose each other.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::{SqliteConnection, SqlitePool};

use seismograph_core::models::RecordKind;
use seismograph_core::ops::{WriteAction, WriteOp};
use seismograph_core::store::{bulk_item, BulkResponse, DocumentStore, StoreError};

/// SQLite implementation of the [`DocumentStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Total observations stored across documents of `kind`.
    pub async fn observation_count(&self, kind: RecordKind) -> Result<u64, StoreError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(json_array_length(body, '$.scrapes')), 0) FROM documents WHERE kind = ?",
        )
        .bind(kind.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(total.max(0) as u64)
    }

    async fn connection(&self) -> Result<sqlx::pool::PoolConnection<sqlx::Sqlite>, StoreError> {
        self.pool.acquire().await.map_err(map_sqlx)
    }
}

/// Classify a driver error. Anything suggesting the store is unreachable
/// or locked past the timeout is a transport failure.
fn map_sqlx(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::WorkerCrashed => StoreError::Unavailable(err.to_string()),
        sqlx::Error::Database(db) if is_busy(db.code().as_deref()) => {
            StoreError::Unavailable(err.to_string())
        }
        _ => StoreError::Backend(err.to_string()),
    }
}

// SQLITE_BUSY (5) and SQLITE_LOCKED (6), including extended codes.
fn is_busy(code: Option<&str>) -> bool {
    code.and_then(|c| c.parse::<i32>().ok())
        .map(|c| matches!(c & 0xff, 5 | 6))
        .unwrap_or(false)
}

async fn insert(
    conn: &mut SqliteConnection,
    kind: RecordKind,
    identity: &str,
    document: &Value,
) -> Result<(), StoreError> {
    let body = serde_json::to_string(document)?;
    let now = Utc::now().timestamp();

    let result = sqlx::query(
        "INSERT INTO documents (kind, id, body, inserted_at, updated_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(kind.as_str())
    .bind(identity)
    .bind(body)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(StoreError::Conflict {
            kind,
            identity: identity.to_string(),
        }),
        Err(e) => Err(map_sqlx(e)),
    }
}

async fn append(
    conn: &mut SqliteConnection,
    kind: RecordKind,
    identity: &str,
    observation: &Value,
) -> Result<(), StoreError> {
    let observation = serde_json::to_string(observation)?;

    let result = sqlx::query(
        r#"
        UPDATE documents
        SET body = json_insert(body, '$.scrapes[#]', json(?)),
            updated_at = ?
        WHERE kind = ? AND id = ? AND json_type(body, '$.scrapes') = 'array'
        "#,
    )
    .bind(observation)
    .bind(Utc::now().timestamp())
    .bind(kind.as_str())
    .bind(identity)
    .execute(&mut *conn)
    .await
    .map_err(map_sqlx)?;

    if result.rows_affected() == 1 {
        return Ok(());
    }

    // Nothing matched: tell a missing document from one without a series.
    if exists_in(conn, kind, identity).await? {
        Err(StoreError::Backend(format!(
            "{} '{}' has no scrapes array",
            kind, identity
        )))
    } else {
        Err(StoreError::NotFound {
            kind,
            identity: identity.to_string(),
        })
    }
}

async fn exists_in(
    conn: &mut SqliteConnection,
    kind: RecordKind,
    identity: &str,
) -> Result<bool, StoreError> {
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM documents WHERE kind = ? AND id = ?)")
        .bind(kind.as_str())
        .bind(identity)
        .fetch_one(&mut *conn)
        .await
        .map_err(map_sqlx)
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn exists(&self, kind: RecordKind, identity: &str) -> Result<bool, StoreError> {
        let mut conn = self.connection().await?;
        exists_in(&mut conn, kind, identity).await
    }

    async fn create(
        &self,
        kind: RecordKind,
        identity: &str,
        document: &Value,
    ) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        insert(&mut conn, kind, identity, document).await
    }

    async fn append_observation(
        &self,
        kind: RecordKind,
        identity: &str,
        observation: &Value,
    ) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        append(&mut conn, kind, identity, observation).await
    }

    async fn get(&self, kind: RecordKind, identity: &str) -> Result<Option<Value>, StoreError> {
        let body: Option<String> =
            sqlx::query_scalar("SELECT body FROM documents WHERE kind = ? AND id = ?")
                .bind(kind.as_str())
                .bind(identity)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx)?;

        match body {
            Some(body) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }

    async fn count(&self, kind: RecordKind) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE kind = ?")
            .bind(kind.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(count.max(0) as u64)
    }

    /// Apply the batch in one transaction.
    ///
    /// A rejected statement does not abort the transaction; a transport
    /// failure rolls the whole batch back.
    async fn bulk(&self, ops: &[WriteOp]) -> Result<BulkResponse, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        let mut items = Vec::with_capacity(ops.len());
        for op in ops {
            let result = match op.action {
                WriteAction::Create => insert(&mut *tx, op.kind, &op.identity, &op.payload).await,
                WriteAction::UpdateAppend => {
                    append(&mut *tx, op.kind, &op.identity, &op.payload).await
                }
            };
            items.push(bulk_item(op, result)?);
        }

        tx.commit().await.map_err(map_sqlx)?;
        Ok(BulkResponse { items })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_and_locked_are_transport() {
        assert!(is_busy(Some("5")));
        assert!(is_busy(Some("517")));
        assert!(is_busy(Some("6")));
        assert!(!is_busy(Some("19")));
        assert!(!is_busy(Some("2067")));
        assert!(!is_busy(None));
    }

    #[test]
    fn pool_timeout_is_transport() {
        assert!(map_sqlx(sqlx::Error::PoolTimedOut).is_transport());
        assert!(!map_sqlx(sqlx::Error::RowNotFound).is_transport());
    }
}
