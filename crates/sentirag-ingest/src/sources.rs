//! Source fetcher abstraction and per-ticker collection.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use sentirag_core::{FetchResult, RawItem, Source};

use crate::error::IngestError;

/// One upstream provider of raw items for a ticker.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    fn source(&self) -> Source;

    async fn fetch(&self, ticker: &str) -> Result<FetchResult, IngestError>;
}

/// Replays previously captured items from a JSON file.
///
/// The file holds an array of [`FetchResult`]s. Items for the requested ticker
/// whose `source` differs from this fetcher's source are dropped.
#[derive(Debug, Clone)]
pub struct JsonFeedFetcher {
    source: Source,
    path: PathBuf,
}

impl JsonFeedFetcher {
    #[must_use]
    pub fn new(source: Source, path: impl Into<PathBuf>) -> Self {
        Self {
            source,
            path: path.into(),
        }
    }
}

#[async_trait]
impl SourceFetcher for JsonFeedFetcher {
    fn source(&self) -> Source {
        self.source
    }

    async fn fetch(&self, ticker: &str) -> Result<FetchResult, IngestError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| IngestError::Fetch {
                source_name: self.source,
                reason: format!("failed to read {}: {e}", self.path.display()),
            })?;
        let feed: Vec<FetchResult> =
            serde_json::from_str(&raw).map_err(|e| IngestError::Fetch {
                source_name: self.source,
                reason: format!("invalid feed {}: {e}", self.path.display()),
            })?;

        let items: Vec<RawItem> = feed
            .into_iter()
            .filter(|r| r.ticker.eq_ignore_ascii_case(ticker))
            .flat_map(|r| r.items)
            .filter(|item| item.source == self.source)
            .collect();

        Ok(FetchResult {
            ticker: ticker.to_string(),
            items,
        })
    }
}

/// Items gathered for one ticker plus the sources whose fetch failed.
#[derive(Debug, Default)]
pub struct Collected {
    pub items: Vec<RawItem>,
    pub failed_sources: Vec<Source>,
}

/// Run every fetcher for `ticker` concurrently.
///
/// A failing fetcher is logged and contributes zero items; it never affects
/// the others. Items are concatenated in fetcher order.
pub async fn collect_items(fetchers: &[Arc<dyn SourceFetcher>], ticker: &str) -> Collected {
    let results = join_all(fetchers.iter().map(|f| f.fetch(ticker))).await;

    let mut collected = Collected::default();
    for (fetcher, result) in fetchers.iter().zip(results) {
        let source = fetcher.source();
        match result {
            Ok(fetched) => {
                tracing::debug!(
                    ticker,
                    source = %source,
                    count = fetched.items.len(),
                    "collected items"
                );
                collected.items.extend(fetched.items);
            }
            Err(e) => {
                tracing::warn!(ticker, source = %source, error = %e, "source fetch failed");
                collected.failed_sources.push(source);
            }
        }
    }
    collected
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn item(title: &str, source: Source) -> RawItem {
        RawItem {
            title: title.to_string(),
            url: format!("https://example.com/{title}"),
            text: String::new(),
            source,
            timestamp: Utc::now(),
        }
    }

    fn write_feed(results: &[FetchResult]) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), serde_json::to_string(results).unwrap()).unwrap();
        file
    }

    #[tokio::test]
    async fn json_feed_returns_matching_ticker_and_source() {
        let file = write_feed(&[
            FetchResult {
                ticker: "AAPL".to_string(),
                items: vec![item("a1", Source::Reddit), item("a2", Source::Finnhub)],
            },
            FetchResult {
                ticker: "TSLA".to_string(),
                items: vec![item("t1", Source::Reddit)],
            },
        ]);
        let fetcher = JsonFeedFetcher::new(Source::Reddit, file.path());

        let result = fetcher.fetch("AAPL").await.unwrap();
        assert_eq!(result.ticker, "AAPL");
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].title, "a1");

        let none = fetcher.fetch("MSFT").await.unwrap();
        assert!(none.items.is_empty());
    }

    #[tokio::test]
    async fn missing_feed_is_a_fetch_error() {
        let fetcher = JsonFeedFetcher::new(Source::Finnhub, "/nonexistent/feed.json");
        let err = fetcher.fetch("AAPL").await.unwrap_err();
        assert!(matches!(
            err,
            IngestError::Fetch {
                source_name: Source::Finnhub,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn failing_source_does_not_block_the_others() {
        let good = write_feed(&[FetchResult {
            ticker: "AAPL".to_string(),
            items: vec![item("n1", Source::NewsApi)],
        }]);
        let fetchers: Vec<Arc<dyn SourceFetcher>> = vec![
            Arc::new(JsonFeedFetcher::new(Source::Finnhub, "/nonexistent/feed.json")),
            Arc::new(JsonFeedFetcher::new(Source::NewsApi, good.path())),
        ];

        let collected = collect_items(&fetchers, "AAPL").await;
        assert_eq!(collected.items.len(), 1);
        assert_eq!(collected.failed_sources, vec![Source::Finnhub]);
    }
}
