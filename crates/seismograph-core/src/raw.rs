//! Mapping of loosely-typed collector output into [`Record`]s.
//!
//! Collectors emit JSON objects tagged with a `"kind"` field. Mapping
//! errors are per-record data-quality errors: the caller reports them
//! and moves on to the next record.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::error::IngestError;
use crate::models::{
    Enrichment, NewsRecord, Record, RecordKind, ReleaseRecord, SubmissionRecord, ThreadRecord,
};

#[derive(Deserialize)]
struct RawThread {
    id: Value,
    #[serde(default)]
    community: String,
    board: String,
    title: String,
    permalink: String,
    created_at: Value,
    #[serde(default, alias = "op")]
    body: Option<String>,
    views: u64,
    replies: u64,
    #[serde(flatten)]
    enrichment: Enrichment,
}

#[derive(Deserialize)]
struct RawSubmission {
    id: Value,
    #[serde(default)]
    community: String,
    subreddit: String,
    title: String,
    permalink: String,
    created_at: Value,
    #[serde(default, alias = "op")]
    body: Option<String>,
    #[serde(default)]
    rank: Option<f64>,
    score: i64,
    comments: u64,
    #[serde(flatten)]
    enrichment: Enrichment,
}

#[derive(Deserialize)]
struct RawRelease {
    version: Value,
    #[serde(alias = "rel_date")]
    release_date: Value,
    #[serde(default)]
    notable_changes: Vec<String>,
    #[serde(alias = "dl_link")]
    download_link: String,
}

#[derive(Deserialize)]
struct RawNews {
    #[serde(default)]
    source: String,
    title: String,
    #[serde(alias = "url")]
    permalink: String,
    #[serde(alias = "timestamp")]
    published_at: Value,
}

impl Record {
    /// Map a collector's JSON object to a typed record.
    ///
    /// # Errors
    ///
    /// - [`IngestError::UnknownRecordKind`] when `kind` is missing or unrecognized.
    /// - [`IngestError::MalformedIdentity`] when the native ID is empty or not a string/integer.
    /// - [`IngestError::MalformedTimestamp`] when a timestamp cannot be parsed.
    /// - [`IngestError::MalformedRecord`] for any other shape problem.
    pub fn from_value(value: &Value) -> Result<Record, IngestError> {
        let kind = match value.get("kind") {
            Some(Value::String(s)) => s.parse::<RecordKind>()?,
            Some(other) => return Err(IngestError::UnknownRecordKind(other.to_string())),
            None if value.is_object() => {
                return Err(IngestError::UnknownRecordKind("<missing>".to_string()))
            }
            None => {
                return Err(IngestError::MalformedRecord {
                    kind: "<unknown>".to_string(),
                    reason: "record is not a JSON object".to_string(),
                })
            }
        };

        match kind {
            RecordKind::Thread => {
                let raw: RawThread = decode(kind, value)?;
                Ok(Record::Thread(ThreadRecord {
                    id: native_identity(&raw.id)?,
                    community: raw.community,
                    board: raw.board,
                    title: raw.title,
                    permalink: raw.permalink,
                    created_at: parse_timestamp("created_at", &raw.created_at)?,
                    body: raw.body,
                    views: raw.views,
                    replies: raw.replies,
                    enrichment: raw.enrichment,
                }))
            }
            RecordKind::Submission => {
                let raw: RawSubmission = decode(kind, value)?;
                Ok(Record::Submission(SubmissionRecord {
                    id: native_identity(&raw.id)?,
                    community: raw.community,
                    subreddit: raw.subreddit,
                    title: raw.title,
                    permalink: raw.permalink,
                    created_at: parse_timestamp("created_at", &raw.created_at)?,
                    body: raw.body,
                    rank: raw.rank,
                    score: raw.score,
                    comments: raw.comments,
                    enrichment: raw.enrichment,
                }))
            }
            RecordKind::Release => {
                let raw: RawRelease = decode(kind, value)?;
                Ok(Record::Release(ReleaseRecord {
                    version: native_identity(&raw.version)?,
                    release_date: parse_timestamp("release_date", &raw.release_date)?,
                    notable_changes: raw.notable_changes,
                    download_link: raw.download_link,
                }))
            }
            RecordKind::News => {
                let raw: RawNews = decode(kind, value)?;
                if raw.permalink.trim().is_empty() {
                    return Err(IngestError::MalformedIdentity {
                        raw: Value::String(raw.permalink).to_string(),
                    });
                }
                Ok(Record::News(NewsRecord {
                    source: raw.source,
                    title: raw.title,
                    permalink: raw.permalink,
                    published_at: parse_timestamp("published_at", &raw.published_at)?,
                }))
            }
        }
    }
}

fn decode<T: DeserializeOwned>(kind: RecordKind, value: &Value) -> Result<T, IngestError> {
    serde_json::from_value(value.clone()).map_err(|e| IngestError::MalformedRecord {
        kind: kind.to_string(),
        reason: e.to_string(),
    })
}

/// Accept a non-empty string or an integer as a native identity.
fn native_identity(raw: &Value) -> Result<String, IngestError> {
    match raw {
        Value::String(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Value::Number(n) if n.is_u64() || n.is_i64() => Ok(n.to_string()),
        other => Err(IngestError::MalformedIdentity {
            raw: other.to_string(),
        }),
    }
}

/// Parse a timestamp from RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC),
/// `YYYY-MM-DD`, or Unix epoch seconds.
pub fn parse_timestamp(field: &'static str, raw: &Value) -> Result<DateTime<Utc>, IngestError> {
    let parsed = match raw {
        Value::String(s) => parse_timestamp_str(s.trim()),
        Value::Number(n) => {
            if let Some(secs) = n.as_i64() {
                DateTime::from_timestamp(secs, 0)
            } else {
                n.as_f64().and_then(|f| {
                    let secs = f.floor();
                    let nanos = ((f - secs) * 1e9).round() as u32;
                    DateTime::from_timestamp(secs as i64, nanos.min(999_999_999))
                })
            }
        }
        _ => None,
    };

    parsed.ok_or_else(|| IngestError::MalformedTimestamp {
        field,
        raw: raw.to_string(),
    })
}

fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn maps_submission_with_enrichment() {
        let value = json!({
            "kind": "submission",
            "id": "abc123",
            "community": "reddit",
            "subreddit": "Bitcoin",
            "title": "Fees are dropping",
            "permalink": "https://www.reddit.com/r/Bitcoin/comments/abc123/",
            "created_at": "2017-05-01T10:00:00Z",
            "score": 10,
            "comments": 3,
            "title_sentiment": { "polarity": 0.25, "subjectivity": 0.5 },
            "title_keywords": ["fee", "drop"]
        });

        let record = Record::from_value(&value).unwrap();
        let Record::Submission(sub) = &record else {
            panic!("expected submission, got {:?}", record);
        };
        assert_eq!(sub.id, "abc123");
        assert_eq!(sub.score, 10);
        assert_eq!(sub.rank, None);
        assert_eq!(sub.body, None);
        assert_eq!(sub.enrichment.title_sentiment.unwrap().polarity, 0.25);
        assert!(sub.enrichment.body_sentiment.is_none());
        assert_eq!(
            sub.enrichment.title_keywords.as_ref().unwrap().len(),
            2
        );
    }

    #[test]
    fn maps_thread_with_numeric_id_and_op_alias() {
        let value = json!({
            "kind": "thread",
            "id": 1834563,
            "community": "bitcointalk",
            "board": "Bitcoin Discussion",
            "title": "Segwit activation",
            "permalink": "https://bitcointalk.org/index.php?topic=1834563.0",
            "created_at": "2017-03-14 09:12:44",
            "op": "What do you think?",
            "views": 812,
            "replies": 14
        });

        let record = Record::from_value(&value).unwrap();
        assert_eq!(record.identity(), "1834563");
        assert_eq!(record.body(), Some("What do you think?"));
        assert_eq!(
            record.created_at(),
            Utc.with_ymd_and_hms(2017, 3, 14, 9, 12, 44).unwrap()
        );
    }

    #[test]
    fn maps_release_and_news() {
        let release = Record::from_value(&json!({
            "kind": "release",
            "version": "0.14.2",
            "rel_date": "2017-06-17",
            "notable_changes": ["Low-level RPC changes"],
            "dl_link": "https://bitcoin.org/bin/bitcoin-core-0.14.2/"
        }))
        .unwrap();
        assert_eq!(release.identity(), "0-14-2");

        let news = Record::from_value(&json!({
            "kind": "news",
            "source": "news.bitcoin.com",
            "title": "Headline",
            "url": "https://news.bitcoin.com/headline/",
            "timestamp": 1493632800
        }))
        .unwrap();
        assert_eq!(news.identity().len(), 40);
        assert_eq!(news.created_at().timestamp(), 1493632800);
    }

    #[test]
    fn rejects_unknown_and_missing_kind() {
        let err = Record::from_value(&json!({ "kind": "poll", "id": "1" })).unwrap_err();
        assert!(matches!(err, IngestError::UnknownRecordKind(ref k) if k == "poll"));

        let err = Record::from_value(&json!({ "id": "1" })).unwrap_err();
        assert!(matches!(err, IngestError::UnknownRecordKind(_)));
    }

    #[test]
    fn reports_malformed_timestamp_with_raw_value() {
        let err = Record::from_value(&json!({
            "kind": "thread",
            "id": "9",
            "board": "b",
            "title": "t",
            "permalink": "p",
            "created_at": "yesterday",
            "views": 1,
            "replies": 0
        }))
        .unwrap_err();
        match err {
            IngestError::MalformedTimestamp { field, raw } => {
                assert_eq!(field, "created_at");
                assert_eq!(raw, "\"yesterday\"");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn reports_malformed_identity() {
        let err = Record::from_value(&json!({
            "kind": "submission",
            "id": "",
            "subreddit": "btc",
            "title": "t",
            "permalink": "p",
            "created_at": 0,
            "score": 1,
            "comments": 0
        }))
        .unwrap_err();
        assert!(matches!(err, IngestError::MalformedIdentity { .. }));
    }

    #[test]
    fn reports_missing_fields_as_malformed_record() {
        let err = Record::from_value(&json!({ "kind": "thread", "id": "1" })).unwrap_err();
        assert!(matches!(err, IngestError::MalformedRecord { ref kind, .. } if kind == "thread"));
        assert!(err.is_data_quality());
    }

    #[test]
    fn parses_fractional_epoch() {
        let ts = parse_timestamp("created_at", &json!(1493632800.5)).unwrap();
        assert_eq!(ts.timestamp(), 1493632800);
        assert_eq!(ts.timestamp_subsec_millis(), 500);
    }
}
