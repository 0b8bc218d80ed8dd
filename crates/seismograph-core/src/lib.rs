//! # Seismograph Core
//!
//! Runtime-free ingestion logic for Seismograph: the record model,
//! identity derivation and dedup resolution, the hotness ranking, the
//! document store abstraction, the batch writer, and the ingestion
//! orchestrator that ties them together.
//!
//! This crate contains no tokio, sqlx, or filesystem I/O. Concrete
//! store backends and the record source live in the `seismograph`
//! application crate.
//!
//! ## Data Flow
//!
//! ```text
//! collector ─▶ Record ─▶ Ingestor ─▶ resolve (EXISTS) ─▶ WriteOp ─▶ BatchWriter ─▶ BULK
//!                                         │
//!                                    NEW → CREATE
//!                               EXISTING → UPDATE_APPEND | skip
//! ```

pub mod batch;
pub mod clock;
pub mod enrich;
pub mod error;
pub mod identity;
pub mod models;
pub mod ops;
pub mod pipeline;
pub mod ranking;
pub mod raw;
pub mod store;
