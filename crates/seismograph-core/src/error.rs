//! Error types surfaced by the ingestion pipeline.

use thiserror::Error;

use crate::store::{BulkItem, StoreError};

/// Failure modes of a single record or a single flush.
///
/// Data-quality errors ([`is_data_quality`](IngestError::is_data_quality))
/// drop the offending record and never abort a run. Transport errors are
/// fatal to the record or flush that hit them; only a transport failure
/// on the final flush becomes the run's terminal error.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("store transport failure during {context}: {source}")]
    Transport {
        context: String,
        #[source]
        source: StoreError,
    },

    #[error("unknown record kind: {0}")]
    UnknownRecordKind(String),

    #[error("malformed timestamp in field '{field}': {raw}")]
    MalformedTimestamp { field: &'static str, raw: String },

    #[error("malformed identity: {raw}")]
    MalformedIdentity { raw: String },

    #[error("malformed {kind} record: {reason}")]
    MalformedRecord { kind: String, reason: String },

    #[error("{} of {attempted} operations rejected by store", .rejected.len())]
    PartialBulkFailure {
        attempted: usize,
        rejected: Vec<BulkItem>,
    },
}

impl IngestError {
    /// True for errors caused by the record's content rather than the store.
    pub fn is_data_quality(&self) -> bool {
        matches!(
            self,
            IngestError::UnknownRecordKind(_)
                | IngestError::MalformedTimestamp { .. }
                | IngestError::MalformedIdentity { .. }
                | IngestError::MalformedRecord { .. }
        )
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, IngestError::Transport { .. })
    }
}
