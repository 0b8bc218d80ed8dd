//! Enrichment stage boundary.
//!
//! Text analysis (sentiment, keyword lemmas) is supplied by an external
//! [`Enricher`]; this module only defines the contract and attaches its
//! output to records before they reach the [`Ingestor`](crate::pipeline::Ingestor).

use std::collections::BTreeSet;

use crate::models::{Record, Sentiment};

/// Output of one text-analysis call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextAnalysis {
    pub polarity: f64,
    pub subjectivity: f64,
    pub keywords: BTreeSet<String>,
}

impl TextAnalysis {
    /// Sentiment with polarity clamped to `[-1, 1]` and subjectivity to `[0, 1]`.
    pub fn sentiment(&self) -> Sentiment {
        Sentiment {
            polarity: self.polarity.clamp(-1.0, 1.0),
            subjectivity: self.subjectivity.clamp(0.0, 1.0),
        }
    }
}

/// A synchronous, possibly slow, text analyzer.
pub trait Enricher: Send + Sync {
    fn analyze(&self, text: &str) -> TextAnalysis;
}

/// Attach title sentiment and keywords, plus body sentiment when a
/// non-empty body is present. Kinds without an enrichment slot are
/// left untouched.
pub fn enrich_record(record: &mut Record, enricher: &dyn Enricher) {
    let title = record.title().to_string();
    let body = record
        .body()
        .filter(|b| !b.trim().is_empty())
        .map(str::to_string);

    let Some(slot) = record.enrichment_mut() else {
        return;
    };

    let title_analysis = enricher.analyze(&title);
    slot.title_sentiment = Some(title_analysis.sentiment());
    slot.title_keywords = Some(title_analysis.keywords);
    slot.body_sentiment = body.map(|b| enricher.analyze(&b).sentiment());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Enrichment, NewsRecord, ThreadRecord};
    use chrono::Utc;

    struct LengthEnricher;

    impl Enricher for LengthEnricher {
        fn analyze(&self, text: &str) -> TextAnalysis {
            TextAnalysis {
                polarity: text.len() as f64 / 10.0,
                subjectivity: -1.0,
                keywords: text.split_whitespace().map(str::to_lowercase).collect(),
            }
        }
    }

    fn thread(body: Option<&str>) -> Record {
        Record::Thread(ThreadRecord {
            id: "1".into(),
            community: "bitcointalk".into(),
            board: "Mining".into(),
            title: "New ASIC".into(),
            permalink: "https://bitcointalk.org/index.php?topic=1.0".into(),
            created_at: Utc::now(),
            body: body.map(str::to_string),
            views: 0,
            replies: 0,
            enrichment: Enrichment::default(),
        })
    }

    #[test]
    fn enriches_title_and_body() {
        let mut record = thread(Some("hashrate"));
        enrich_record(&mut record, &LengthEnricher);
        let e = record.enrichment_mut().unwrap().clone();

        let title = e.title_sentiment.unwrap();
        assert_eq!(title.polarity, 0.8);
        assert_eq!(title.subjectivity, 0.0);
        assert!(e.title_keywords.unwrap().contains("asic"));
        assert_eq!(e.body_sentiment.unwrap().polarity, 0.8);
    }

    #[test]
    fn empty_body_leaves_body_sentiment_absent() {
        let mut record = thread(Some("   "));
        enrich_record(&mut record, &LengthEnricher);
        let e = record.enrichment_mut().unwrap();
        assert!(e.title_sentiment.is_some());
        assert!(e.body_sentiment.is_none());
    }

    #[test]
    fn clamps_polarity() {
        let analysis = TextAnalysis {
            polarity: 3.5,
            subjectivity: 0.4,
            keywords: BTreeSet::new(),
        };
        assert_eq!(analysis.sentiment().polarity, 1.0);
    }

    #[test]
    fn news_is_not_enriched() {
        let mut record = Record::News(NewsRecord {
            source: "coindesk.com".into(),
            title: "Markets".into(),
            permalink: "https://coindesk.com/markets".into(),
            published_at: Utc::now(),
        });
        let before = record.clone();
        enrich_record(&mut record, &LengthEnricher);
        assert_eq!(record, before);
    }
}
