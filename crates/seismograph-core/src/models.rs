//! Core data types produced by collectors and consumed by the pipeline.
//!
//! A [`Record`] is a closed set of variants, one per source kind. The
//! orchestrator dispatches on the variant with an exhaustive `match`, so
//! adding a kind forces every branch (identity, document shape,
//! observation shape) to be handled.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::IngestError;
use crate::identity::{permalink_identity, release_identity};

/// Kind tag discriminating record variants and store collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Thread,
    Submission,
    Release,
    News,
}

impl RecordKind {
    pub const ALL: [RecordKind; 4] = [
        RecordKind::Thread,
        RecordKind::Submission,
        RecordKind::Release,
        RecordKind::News,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Thread => "thread",
            RecordKind::Submission => "submission",
            RecordKind::Release => "release",
            RecordKind::News => "news",
        }
    }

    /// Whether re-observed records of this kind accumulate observations.
    ///
    /// Kinds that don't are creation-only: a repeat sighting is a no-op.
    pub fn tracks_observations(&self) -> bool {
        match self {
            RecordKind::Thread | RecordKind::Submission => true,
            RecordKind::Release | RecordKind::News => false,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "thread" => Ok(RecordKind::Thread),
            "submission" => Ok(RecordKind::Submission),
            "release" => Ok(RecordKind::Release),
            "news" => Ok(RecordKind::News),
            other => Err(IngestError::UnknownRecordKind(other.to_string())),
        }
    }
}

/// Sentiment as reported by the enrichment adapter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    /// In `[-1.0, 1.0]`.
    pub polarity: f64,
    /// In `[0.0, 1.0]`.
    pub subjectivity: f64,
}

/// Enrichment output attached to a record before it reaches the pipeline.
///
/// Every field is optional: the adapter may have been skipped, or the
/// record may have no body to analyze.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    #[serde(default)]
    pub title_sentiment: Option<Sentiment>,
    #[serde(default)]
    pub title_keywords: Option<BTreeSet<String>>,
    #[serde(default)]
    pub body_sentiment: Option<Sentiment>,
}

/// A forum thread (bitcointalk, forum.bitcoin.com, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadRecord {
    /// Native thread ID from the forum.
    pub id: String,
    pub community: String,
    pub board: String,
    pub title: String,
    pub permalink: String,
    pub created_at: DateTime<Utc>,
    /// The thread-starter post, when scraped.
    pub body: Option<String>,
    pub views: u64,
    pub replies: u64,
    pub enrichment: Enrichment,
}

/// A social-news submission (reddit).
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionRecord {
    pub id: String,
    pub community: String,
    pub subreddit: String,
    pub title: String,
    pub permalink: String,
    pub created_at: DateTime<Utc>,
    pub body: Option<String>,
    /// Hotness computed by the collector; filled at observation time when absent.
    pub rank: Option<f64>,
    pub score: i64,
    pub comments: u64,
    pub enrichment: Enrichment,
}

/// A software release. Immutable once recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseRecord {
    pub version: String,
    pub release_date: DateTime<Utc>,
    pub notable_changes: Vec<String>,
    pub download_link: String,
}

/// A news headline. Keyed by a hash of its permalink.
#[derive(Debug, Clone, PartialEq)]
pub struct NewsRecord {
    pub source: String,
    pub title: String,
    pub permalink: String,
    pub published_at: DateTime<Utc>,
}

/// A unit of scraped content flowing into the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Thread(ThreadRecord),
    Submission(SubmissionRecord),
    Release(ReleaseRecord),
    News(NewsRecord),
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Thread(_) => RecordKind::Thread,
            Record::Submission(_) => RecordKind::Submission,
            Record::Release(_) => RecordKind::Release,
            Record::News(_) => RecordKind::News,
        }
    }

    /// Stable per-kind key used for dedup and storage addressing.
    pub fn identity(&self) -> String {
        match self {
            Record::Thread(t) => t.id.clone(),
            Record::Submission(s) => s.id.clone(),
            Record::Release(r) => release_identity(&r.version),
            Record::News(n) => permalink_identity(&n.permalink),
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Record::Thread(t) => &t.title,
            Record::Submission(s) => &s.title,
            Record::Release(r) => &r.version,
            Record::News(n) => &n.title,
        }
    }

    /// Time of original authorship (not scrape time).
    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Record::Thread(t) => t.created_at,
            Record::Submission(s) => s.created_at,
            Record::Release(r) => r.release_date,
            Record::News(n) => n.published_at,
        }
    }

    pub fn body(&self) -> Option<&str> {
        match self {
            Record::Thread(t) => t.body.as_deref(),
            Record::Submission(s) => s.body.as_deref(),
            Record::Release(_) | Record::News(_) => None,
        }
    }

    /// Enrichment slot, for kinds that carry one.
    pub fn enrichment_mut(&mut self) -> Option<&mut Enrichment> {
        match self {
            Record::Thread(t) => Some(&mut t.enrichment),
            Record::Submission(s) => Some(&mut s.enrichment),
            Record::Release(_) | Record::News(_) => None,
        }
    }
}

/// Immutable snapshot of a record's mutable counters at scrape time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Observation {
    Thread {
        scraped_at: DateTime<Utc>,
        views: u64,
        replies: u64,
    },
    Submission {
        scraped_at: DateTime<Utc>,
        rank: f64,
        score: i64,
        comments: u64,
    },
}

impl Observation {
    pub fn scraped_at(&self) -> DateTime<Utc> {
        match self {
            Observation::Thread { scraped_at, .. } | Observation::Submission { scraped_at, .. } => {
                *scraped_at
            }
        }
    }
}
