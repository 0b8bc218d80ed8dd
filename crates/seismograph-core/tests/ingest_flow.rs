//! End-to-end flows through the public API with the in-memory store.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use serde_json::json;

use seismograph_core::clock::FixedClock;
use seismograph_core::enrich::{enrich_record, Enricher, TextAnalysis};
use seismograph_core::models::{Record, RecordKind};
use seismograph_core::pipeline::{Ingestor, Outcome};
use seismograph_core::store::memory::InMemoryStore;
use seismograph_core::store::DocumentStore;

struct KeywordEnricher;

impl Enricher for KeywordEnricher {
    fn analyze(&self, text: &str) -> TextAnalysis {
        TextAnalysis {
            polarity: if text.contains("up") { 0.5 } else { -0.5 },
            subjectivity: 0.3,
            keywords: text
                .split_whitespace()
                .filter(|w| w.len() > 3)
                .map(str::to_lowercase)
                .collect::<BTreeSet<_>>(),
        }
    }
}

fn raw_submission(score: i64) -> serde_json::Value {
    json!({
        "kind": "submission",
        "id": "9zq1",
        "community": "reddit",
        "subreddit": "btc",
        "title": "Hashrate keeps going up",
        "permalink": "https://www.reddit.com/r/btc/comments/9zq1/",
        "created_at": "2017-05-01T00:00:00Z",
        "op": "Difficulty adjusts next week.",
        "score": score,
        "comments": 1
    })
}

#[tokio::test]
async fn enriched_record_is_created_then_tracked() {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2017, 5, 1, 0, 0, 0).unwrap(),
    ));
    let mut ingestor = Ingestor::new(store.clone(), 10).with_clock(clock.clone());

    let mut record = Record::from_value(&raw_submission(1)).unwrap();
    enrich_record(&mut record, &KeywordEnricher);
    assert_eq!(ingestor.ingest(&record).await.unwrap(), Outcome::Created);

    clock.advance(Duration::seconds(45_000));
    let record = Record::from_value(&raw_submission(100)).unwrap();
    assert_eq!(ingestor.ingest(&record).await.unwrap(), Outcome::Appended);

    let report = ingestor.close().await.unwrap();
    assert_eq!(report.flushes, 1);
    assert_eq!(report.written, 2);

    let doc = store
        .get(RecordKind::Submission, "9zq1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc["sentiment"]["title"]["polarity"], 0.5);
    assert_eq!(doc["sentiment"]["op"]["polarity"], -0.5);
    assert_eq!(doc["keywords"], json!(["going", "hashrate", "keeps"]));
    assert_eq!(doc["op"], "Difficulty adjusts next week.");

    // log10(1) + 0 periods, then log10(100) + 1 period.
    let ranks: Vec<f64> = doc["scrapes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["rank"].as_f64().unwrap())
        .collect();
    assert_eq!(ranks, vec![0.0, 3.0]);
}

#[tokio::test]
async fn news_is_keyed_by_permalink_hash_and_created_once() {
    let store = Arc::new(InMemoryStore::new());
    let mut ingestor = Ingestor::with_defaults(store.clone());
    let news = json!({
        "kind": "news",
        "source": "news.bitcoin.com",
        "title": "Headline",
        "url": "https://news.bitcoin.com/headline/",
        "timestamp": "2017-05-01 10:00:00"
    });

    assert_eq!(ingestor.ingest_value(&news).await.unwrap(), Outcome::Created);
    let report = ingestor.close().await.unwrap();
    assert_eq!(report.written, 1);

    let mut ingestor = Ingestor::with_defaults(store.clone());
    assert_eq!(ingestor.ingest_value(&news).await.unwrap(), Outcome::Skipped);
    let report = ingestor.close().await.unwrap();
    assert_eq!(report.flushes, 0);

    let id = seismograph_core::identity::permalink_identity("https://news.bitcoin.com/headline/");
    let doc = store.get(RecordKind::News, &id).await.unwrap().unwrap();
    assert_eq!(doc["source"], "news.bitcoin.com");
    assert_eq!(store.count(RecordKind::News).await.unwrap(), 1);
}
