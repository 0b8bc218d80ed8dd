//! # Seismograph
//!
//! Ingestion pipeline for scraped community content: forum threads,
//! link-aggregator submissions, software releases, and news items.
//!
//! Each record is resolved against the store by its stable identity. A
//! first sighting creates the document; a repeat sighting of a thread or
//! submission appends one timestamped observation to its `scrapes`
//! series, so the store accumulates a popularity time series per item.
//! Writes are buffered and sent in bulk.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────────┐   ┌──────────────┐
//! │ Collectors  │──▶│ Ingestor             │──▶│   SQLite     │
//! │ (NDJSON)    │   │ resolve → op → batch │   │  documents   │
//! └─────────────┘   └──────────────────────┘   └──────┬───────┘
//!                                                     │
//!                                              ┌──────┴──────┐
//!                                              │ CLI (seismo)│
//!                                              │ stats / get │
//!                                              └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! seismo init                          # create database
//! seismo ingest records.ndjson         # ingest one collector run
//! collector | seismo ingest -          # or stream from stdin
//! seismo stats
//! seismo get submission abc123
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite [`DocumentStore`](seismograph_core::store::DocumentStore) |
//! | [`source`] | NDJSON record input |
//! | [`ingest`] | The ingestion run command |
//! | [`stats`] | Store statistics |
//! | [`get`] | Document retrieval |
//!
//! The ingestion logic itself lives in [`seismograph_core`].

pub mod config;
pub mod db;
pub mod get;
pub mod ingest;
pub mod migrate;
pub mod source;
pub mod sqlite_store;
pub mod stats;
