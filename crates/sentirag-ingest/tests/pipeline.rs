//! End-to-end ingestion against the in-memory snapshot store.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use sentirag_core::{FetchResult, RawItem, Source};
use sentirag_db::{InMemorySnapshotStore, SnapshotStore};
use sentirag_ingest::{Embedder, IngestError, Ingestor, SentimentScorer, SourceFetcher};

struct StaticFetcher {
    source: Source,
    items: Vec<RawItem>,
}

#[async_trait]
impl SourceFetcher for StaticFetcher {
    fn source(&self) -> Source {
        self.source
    }

    async fn fetch(&self, ticker: &str) -> Result<FetchResult, IngestError> {
        Ok(FetchResult {
            ticker: ticker.to_string(),
            items: self.items.clone(),
        })
    }
}

struct BrokenFetcher(Source);

#[async_trait]
impl SourceFetcher for BrokenFetcher {
    fn source(&self) -> Source {
        self.0
    }

    async fn fetch(&self, _ticker: &str) -> Result<FetchResult, IngestError> {
        Err(IngestError::Fetch {
            source_name: self.0,
            reason: "connection refused".to_string(),
        })
    }
}

fn item(i: usize, text: &str, source: Source) -> RawItem {
    RawItem {
        title: format!("Headline {i}"),
        url: format!("https://example.com/{source}/{i}"),
        text: text.to_string(),
        source,
        timestamp: Utc.with_ymd_and_hms(2026, 6, 2, 15, 4, 37).unwrap(),
    }
}

fn finnhub_batch() -> Vec<RawItem> {
    let mut items = Vec::new();
    for i in 0..6 {
        items.push(item(i, "AAPL shares rally on strong iPhone demand", Source::Finnhub));
    }
    for i in 6..10 {
        items.push(item(i, "AAPL shares slump after weak guidance", Source::Finnhub));
    }
    items
}

fn ingestor(fetchers: Vec<Arc<dyn SourceFetcher>>, store: Arc<InMemorySnapshotStore>) -> Ingestor {
    Ingestor::new(
        fetchers,
        SentimentScorer::lexical(),
        Embedder::hashed(),
        store,
    )
}

#[tokio::test]
async fn six_positive_four_negative_yields_one_snapshot() {
    let store = Arc::new(InMemorySnapshotStore::new());
    let fetchers: Vec<Arc<dyn SourceFetcher>> = vec![Arc::new(StaticFetcher {
        source: Source::Finnhub,
        items: finnhub_batch(),
    })];
    let ingestor = ingestor(fetchers, store.clone());

    let report = ingestor.ingest_ticker("AAPL").await;

    assert_eq!(report.items, 10);
    assert_eq!(report.snapshots_saved, 1);
    assert!(report.failed_sources.is_empty());
    assert_eq!(store.count_snapshots().await.unwrap(), 1);
    assert_eq!(store.count_embeddings().await.unwrap(), 1);

    let since = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
    let rows = store.list_snapshots("AAPL", since).await.unwrap();
    let snap = &rows[0].snapshot;
    assert!((snap.pos_ratio - 0.6).abs() < 1e-9);
    assert!((snap.neg_ratio - 0.4).abs() < 1e-9);
    assert!(snap.neu_ratio.abs() < 1e-9);
    assert_eq!(snap.volume, 10);
    assert_eq!(snap.ts, Utc.with_ymd_and_hms(2026, 6, 2, 15, 4, 0).unwrap());
    assert_eq!(snap.top_mentions.len(), 3);
}

#[tokio::test]
async fn reingesting_the_same_minute_is_idempotent() {
    let store = Arc::new(InMemorySnapshotStore::new());
    let fetchers: Vec<Arc<dyn SourceFetcher>> = vec![Arc::new(StaticFetcher {
        source: Source::Finnhub,
        items: finnhub_batch(),
    })];
    let ingestor = ingestor(fetchers, store.clone());

    ingestor.ingest_ticker("AAPL").await;
    let second = ingestor.ingest_ticker("AAPL").await;

    assert_eq!(second.snapshots_saved, 0);
    assert_eq!(second.snapshots_existing, 1);
    assert_eq!(store.count_snapshots().await.unwrap(), 1);
    assert_eq!(store.count_embeddings().await.unwrap(), 1);
}

#[tokio::test]
async fn failed_sources_do_not_block_the_survivor() {
    let store = Arc::new(InMemorySnapshotStore::new());
    let fetchers: Vec<Arc<dyn SourceFetcher>> = vec![
        Arc::new(BrokenFetcher(Source::Finnhub)),
        Arc::new(BrokenFetcher(Source::Reddit)),
        Arc::new(BrokenFetcher(Source::NewsApi)),
        Arc::new(StaticFetcher {
            source: Source::Stocktwits,
            items: vec![item(1, "bullish on AAPL", Source::Stocktwits)],
        }),
    ];
    let ingestor = ingestor(fetchers, store.clone());

    let report = ingestor.ingest_ticker("AAPL").await;

    assert_eq!(report.snapshots_saved, 1);
    assert_eq!(
        report.failed_sources,
        vec![Source::Finnhub, Source::Reddit, Source::NewsApi]
    );
    assert_eq!(store.count_snapshots().await.unwrap(), 1);
}

#[tokio::test]
async fn duplicates_across_sources_keep_the_first() {
    let store = Arc::new(InMemorySnapshotStore::new());
    let shared = item(1, "AAPL beats estimates", Source::Finnhub);
    let mut copy = shared.clone();
    copy.source = Source::Reddit;
    let fetchers: Vec<Arc<dyn SourceFetcher>> = vec![
        Arc::new(StaticFetcher {
            source: Source::Finnhub,
            items: vec![shared],
        }),
        Arc::new(StaticFetcher {
            source: Source::Reddit,
            items: vec![copy],
        }),
    ];
    let ingestor = ingestor(fetchers, store.clone());

    let report = ingestor.ingest_ticker("AAPL").await;

    assert_eq!(report.items, 1);
    assert_eq!(report.snapshots_saved, 1);
    let since = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
    let rows = store.list_snapshots("AAPL", since).await.unwrap();
    assert_eq!(rows[0].snapshot.source, Source::Finnhub);
}

#[tokio::test]
async fn ingest_tickers_sums_reports() {
    let store = Arc::new(InMemorySnapshotStore::new());
    let fetchers: Vec<Arc<dyn SourceFetcher>> = vec![Arc::new(StaticFetcher {
        source: Source::Finnhub,
        items: finnhub_batch(),
    })];
    let ingestor = ingestor(fetchers, store.clone());
    let tickers = vec!["AAPL".to_string(), "TSLA".to_string(), "MSFT".to_string()];

    let summary = ingestor.ingest_tickers(&tickers, 2).await;

    assert_eq!(summary.tickers, 3);
    assert_eq!(summary.items, 30);
    assert_eq!(summary.snapshots_saved, 3);
    assert_eq!(summary.failed_sources, 0);
    assert_eq!(summary.reports.len(), 3);
    assert_eq!(store.count_snapshots().await.unwrap(), 3);
}
