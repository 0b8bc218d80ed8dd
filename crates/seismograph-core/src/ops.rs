//! Store write operations built from records.
//!
//! Document field names match the documents already in the store
//! (`op` for the body, `scrapes` for the observation series, `url` on
//! releases and news), so new writes stay queryable alongside old ones.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::models::{Enrichment, Observation, Record, RecordKind};
use crate::ranking::hotness;

/// What a [`WriteOp`] does at the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteAction {
    /// Insert a new document; fails if the identity already exists.
    Create,
    /// Atomically append the payload to the document's `scrapes` array.
    UpdateAppend,
}

/// One queued operation for the batch writer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriteOp {
    pub action: WriteAction,
    pub kind: RecordKind,
    pub identity: String,
    /// Full document for [`WriteAction::Create`], observation for
    /// [`WriteAction::UpdateAppend`].
    pub payload: Value,
}

impl WriteOp {
    /// First-observation operation carrying the full document.
    pub fn create(record: &Record, scraped_at: DateTime<Utc>) -> WriteOp {
        WriteOp {
            action: WriteAction::Create,
            kind: record.kind(),
            identity: record.identity(),
            payload: document(record, scraped_at),
        }
    }

    /// Repeat-observation operation, or `None` for creation-only kinds.
    pub fn append(record: &Record, scraped_at: DateTime<Utc>) -> Option<WriteOp> {
        let obs = observation(record, scraped_at)?;
        Some(WriteOp {
            action: WriteAction::UpdateAppend,
            kind: record.kind(),
            identity: record.identity(),
            payload: json!(obs),
        })
    }
}

/// Snapshot of the record's counters at `scraped_at`.
///
/// A submission without a collector-supplied rank gets its hotness
/// computed as of `scraped_at`.
pub fn observation(record: &Record, scraped_at: DateTime<Utc>) -> Option<Observation> {
    match record {
        Record::Thread(t) => Some(Observation::Thread {
            scraped_at,
            views: t.views,
            replies: t.replies,
        }),
        Record::Submission(s) => Some(Observation::Submission {
            scraped_at,
            rank: s
                .rank
                .unwrap_or_else(|| hotness(s.score, s.created_at, scraped_at)),
            score: s.score,
            comments: s.comments,
        }),
        Record::Release(_) | Record::News(_) => None,
    }
}

/// Full stored document for a first observation.
pub fn document(record: &Record, scraped_at: DateTime<Utc>) -> Value {
    let scrapes: Vec<Observation> = observation(record, scraped_at).into_iter().collect();

    match record {
        Record::Thread(t) => json!({
            "title": t.title,
            "keywords": keywords(&t.enrichment),
            "op": t.body,
            "created_at": t.created_at,
            "sentiment": sentiment(&t.enrichment),
            "community": t.community,
            "board": t.board,
            "permalink": t.permalink,
            "scrapes": scrapes,
        }),
        Record::Submission(s) => json!({
            "title": s.title,
            "keywords": keywords(&s.enrichment),
            "op": s.body,
            "created_at": s.created_at,
            "sentiment": sentiment(&s.enrichment),
            "community": s.community,
            "subreddit": s.subreddit,
            "permalink": s.permalink,
            "scrapes": scrapes,
        }),
        Record::Release(r) => json!({
            "version": r.version,
            "release_date": r.release_date,
            "notable_changes": r.notable_changes,
            "url": r.download_link,
        }),
        Record::News(n) => json!({
            "title": n.title,
            "timestamp": n.published_at,
            "url": n.permalink,
            "source": n.source,
        }),
    }
}

fn keywords(enrichment: &Enrichment) -> Vec<&str> {
    enrichment
        .title_keywords
        .iter()
        .flatten()
        .map(String::as_str)
        .collect()
}

// Partial when the adapter skipped the title or there was no body.
fn sentiment(enrichment: &Enrichment) -> Value {
    let mut out = Map::new();
    if let Some(s) = &enrichment.title_sentiment {
        out.insert("title".to_string(), json!(s));
    }
    if let Some(s) = &enrichment.body_sentiment {
        out.insert("op".to_string(), json!(s));
    }
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ReleaseRecord, Sentiment, SubmissionRecord, ThreadRecord};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2017, 5, 2, 0, 0, 0).unwrap()
    }

    fn submission(score: i64, rank: Option<f64>) -> Record {
        Record::Submission(SubmissionRecord {
            id: "abc123".into(),
            community: "reddit".into(),
            subreddit: "Bitcoin".into(),
            title: "Fees are dropping".into(),
            permalink: "https://www.reddit.com/r/Bitcoin/comments/abc123/".into(),
            created_at: now(),
            body: None,
            rank,
            score,
            comments: 3,
            enrichment: Enrichment {
                title_sentiment: Some(Sentiment {
                    polarity: 0.1,
                    subjectivity: 0.2,
                }),
                title_keywords: Some(["fee".to_string()].into_iter().collect()),
                body_sentiment: None,
            },
        })
    }

    #[test]
    fn create_embeds_single_observation() {
        let op = WriteOp::create(&submission(10, None), now());
        assert_eq!(op.action, WriteAction::Create);
        assert_eq!(op.kind, RecordKind::Submission);
        assert_eq!(op.identity, "abc123");

        let scrapes = op.payload["scrapes"].as_array().unwrap();
        assert_eq!(scrapes.len(), 1);
        assert_eq!(scrapes[0]["score"], 10);
        assert_eq!(scrapes[0]["rank"], 1.0);
        assert_eq!(op.payload["subreddit"], "Bitcoin");
        assert_eq!(op.payload["keywords"], json!(["fee"]));
    }

    #[test]
    fn sentiment_is_partial_without_body() {
        let op = WriteOp::create(&submission(10, None), now());
        let sentiment = op.payload["sentiment"].as_object().unwrap();
        assert!(sentiment.contains_key("title"));
        assert!(!sentiment.contains_key("op"));
        assert!(op.payload["op"].is_null());
    }

    #[test]
    fn append_carries_only_the_observation() {
        let later = now() + Duration::seconds(45000);
        let op = WriteOp::append(&submission(15, None), later).unwrap();
        assert_eq!(op.action, WriteAction::UpdateAppend);
        assert_eq!(op.payload["score"], 15);
        assert_eq!(op.payload["comments"], 3);
        assert!(op.payload.get("title").is_none());
        // log10(15) + 1 decay period, rounded to 7 places.
        assert_eq!(op.payload["rank"], 2.1760913);
    }

    #[test]
    fn collector_rank_is_preserved() {
        let op = WriteOp::append(&submission(15, Some(4.25)), now()).unwrap();
        assert_eq!(op.payload["rank"], 4.25);
    }

    #[test]
    fn thread_document_shape() {
        let record = Record::Thread(ThreadRecord {
            id: "77".into(),
            community: "forum.bitcoin.com".into(),
            board: "Mining".into(),
            title: "Difficulty".into(),
            permalink: "https://forum.bitcoin.com/mining/difficulty-t77.html".into(),
            created_at: now(),
            body: Some("body text".into()),
            views: 120,
            replies: 4,
            enrichment: Enrichment::default(),
        });
        let doc = document(&record, now());
        assert_eq!(doc["op"], "body text");
        assert_eq!(doc["board"], "Mining");
        assert_eq!(doc["keywords"], json!([]));
        assert_eq!(doc["sentiment"], json!({}));
        assert_eq!(doc["scrapes"][0]["views"], 120);
    }

    #[test]
    fn releases_are_creation_only() {
        let record = Record::Release(ReleaseRecord {
            version: "0.14.2".into(),
            release_date: now(),
            notable_changes: vec!["Faster validation".into()],
            download_link: "https://bitcoin.org/bin/bitcoin-core-0.14.2/".into(),
        });
        assert!(WriteOp::append(&record, now()).is_none());
        let op = WriteOp::create(&record, now());
        assert_eq!(op.identity, "0-14-2");
        assert_eq!(op.payload["url"], "https://bitcoin.org/bin/bitcoin-core-0.14.2/");
        assert!(op.payload.get("scrapes").is_none());
    }
}
