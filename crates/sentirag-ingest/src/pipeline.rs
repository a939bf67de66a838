//! Ingestion orchestration: fetch, dedup, score, embed, aggregate, save.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use sentirag_core::{RawItem, SaveOutcome, Source};
use sentirag_db::SnapshotStore;

use crate::aggregate::aggregate_snapshot;
use crate::dedup::{deduplicate, group_by_source};
use crate::embeddings::Embedder;
use crate::error::IngestError;
use crate::scorer::SentimentScorer;
use crate::sources::{collect_items, SourceFetcher};

/// Outcome of ingesting one ticker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickerReport {
    pub ticker: String,
    /// Items left after deduplication.
    pub items: usize,
    pub snapshots_saved: usize,
    /// Snapshots whose identity key already existed.
    pub snapshots_existing: usize,
    /// Sources that failed to fetch or to persist.
    pub failed_sources: Vec<Source>,
}

/// Totals across an ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub tickers: usize,
    pub items: usize,
    pub snapshots_saved: usize,
    pub snapshots_existing: usize,
    pub failed_sources: usize,
    pub reports: Vec<TickerReport>,
}

/// The ingestion service. Construct once and share by reference.
pub struct Ingestor {
    fetchers: Vec<Arc<dyn SourceFetcher>>,
    scorer: SentimentScorer,
    embedder: Embedder,
    store: Arc<dyn SnapshotStore>,
}

impl Ingestor {
    #[must_use]
    pub fn new(
        fetchers: Vec<Arc<dyn SourceFetcher>>,
        scorer: SentimentScorer,
        embedder: Embedder,
        store: Arc<dyn SnapshotStore>,
    ) -> Self {
        Self {
            fetchers,
            scorer,
            embedder,
            store,
        }
    }

    /// Ingest every source for one ticker.
    ///
    /// Fetches run concurrently; a failed fetch contributes no items. Each
    /// `(ticker, source)` group is processed independently, so a persistence
    /// failure for one source never aborts its siblings.
    pub async fn ingest_ticker(&self, ticker: &str) -> TickerReport {
        let collected = collect_items(&self.fetchers, ticker).await;
        let items = deduplicate(collected.items);

        let mut report = TickerReport {
            ticker: ticker.to_string(),
            items: items.len(),
            failed_sources: collected.failed_sources,
            ..TickerReport::default()
        };

        for (source, group) in group_by_source(items) {
            match self.process_source(ticker, source, &group).await {
                Ok(outcome) if outcome.created => report.snapshots_saved += 1,
                Ok(_) => report.snapshots_existing += 1,
                Err(e) => {
                    tracing::error!(
                        ticker,
                        source = %source,
                        error = %e,
                        "failed to ingest source batch"
                    );
                    if !report.failed_sources.contains(&source) {
                        report.failed_sources.push(source);
                    }
                }
            }
        }

        tracing::info!(
            ticker,
            items = report.items,
            saved = report.snapshots_saved,
            existing = report.snapshots_existing,
            failed = report.failed_sources.len(),
            "ticker ingested"
        );
        report
    }

    /// Score, embed, aggregate, and persist one source's items.
    async fn process_source(
        &self,
        ticker: &str,
        source: Source,
        items: &[RawItem],
    ) -> Result<SaveOutcome, IngestError> {
        let texts: Vec<&str> = items.iter().map(RawItem::content).collect();

        let sentiments = self.scorer.score_texts(&texts).await;
        let embeddings = self.embedder.embed_batch(&texts).await?;
        tracing::debug!(
            ticker,
            source = %source,
            count = items.len(),
            scorer = self.scorer.backend_name(),
            embedder = self.embedder.backend_name(),
            "scored and embedded items"
        );

        let aggregation = aggregate_snapshot(ticker, source, items, &sentiments, &embeddings)?;
        let vector = self.embedder.embed(&aggregation.description).await?;

        let outcome = self
            .store
            .save(&aggregation.snapshot, &aggregation.description, &vector)
            .await?;
        Ok(outcome)
    }

    /// Ingest many tickers with at most `max_concurrent` in flight.
    pub async fn ingest_tickers(&self, tickers: &[String], max_concurrent: usize) -> IngestSummary {
        let futures: Vec<_> = tickers.iter().map(|t| self.ingest_ticker(t)).collect();
        let reports: Vec<TickerReport> = stream::iter(futures)
            .buffer_unordered(max_concurrent.max(1))
            .collect()
            .await;

        let mut summary = IngestSummary {
            tickers: reports.len(),
            ..IngestSummary::default()
        };
        for r in &reports {
            summary.items += r.items;
            summary.snapshots_saved += r.snapshots_saved;
            summary.snapshots_existing += r.snapshots_existing;
            summary.failed_sources += r.failed_sources.len();
        }
        summary.reports = reports;

        tracing::info!(
            tickers = summary.tickers,
            items = summary.items,
            saved = summary.snapshots_saved,
            existing = summary.snapshots_existing,
            failed_sources = summary.failed_sources,
            "ingestion run complete"
        );
        summary
    }
}
