//! Ingestion and retention command handlers.

use std::sync::Arc;

use sentirag_core::AppConfig;
use sentirag_db::{InMemorySnapshotStore, PgSnapshotStore, SnapshotStore};
use sentirag_ingest::{IngestSummary, Ingestor};

use crate::services::{self, FeedSpec};

/// Build an [`Ingestor`] over `store` from config and feed arguments.
///
/// # Errors
///
/// Returns an error if a configured model backend cannot be constructed.
pub(crate) fn build_ingestor(
    config: &AppConfig,
    feeds: &[FeedSpec],
    store: Arc<dyn SnapshotStore>,
) -> anyhow::Result<Ingestor> {
    Ok(Ingestor::new(
        services::build_fetchers(feeds),
        services::build_scorer(config)?,
        services::build_embedder(config)?,
        store,
    ))
}

/// Run one ingestion pass.
///
/// With `dry_run` the pipeline writes into an in-memory store and no database
/// connection is opened.
///
/// # Errors
///
/// Returns an error if ticker resolution, backend construction, or the
/// database connection fails. Per-source failures are reported, not raised.
pub(crate) async fn run_ingest(
    config: &AppConfig,
    tier: Option<&str>,
    tickers: &[String],
    feeds: &[FeedSpec],
    dry_run: bool,
) -> anyhow::Result<()> {
    let tickers = services::resolve_tickers(config, tier, tickers)?;

    if dry_run {
        let store = Arc::new(InMemorySnapshotStore::new());
        let ingestor = build_ingestor(config, feeds, store.clone())?;
        let summary = ingestor
            .ingest_tickers(&tickers, config.ingest_max_concurrent_tickers)
            .await;
        print_summary(&summary);
        println!(
            "dry run: {} snapshot(s) kept in memory, nothing written",
            store.count_snapshots().await?
        );
        return Ok(());
    }

    let pool = services::connect(config).await?;
    let store = Arc::new(PgSnapshotStore::new(pool.clone()));
    let ingestor = build_ingestor(config, feeds, store)?;
    let summary = ingestor
        .ingest_tickers(&tickers, config.ingest_max_concurrent_tickers)
        .await;
    print_summary(&summary);
    pool.close().await;
    Ok(())
}

/// Run the retention sweep with `hours` or the configured horizon.
///
/// # Errors
///
/// Returns an error if `hours` is not positive or the purge fails.
pub(crate) async fn run_retention(config: &AppConfig, hours: Option<i64>) -> anyhow::Result<()> {
    let hours = hours.unwrap_or(config.retention_hours);
    if hours <= 0 {
        anyhow::bail!("--hours must be positive, got {hours}");
    }

    let pool = services::connect(config).await?;
    let store = PgSnapshotStore::new(pool.clone());
    let outcome = sentirag_ingest::run_retention(&store, hours).await;
    pool.close().await;

    let outcome = outcome?;
    println!(
        "retention ({hours}h): removed {} snapshot(s), {} embedding(s)",
        outcome.snapshots, outcome.embeddings
    );
    Ok(())
}

fn print_summary(summary: &IngestSummary) {
    println!("{:<8}{:<8}{:<8}{:<10}FAILED", "TICKER", "ITEMS", "SAVED", "EXISTING");
    for report in &summary.reports {
        let failed = report
            .failed_sources
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        println!(
            "{:<8}{:<8}{:<8}{:<10}{}",
            report.ticker,
            report.items,
            report.snapshots_saved,
            report.snapshots_existing,
            if failed.is_empty() { "-" } else { failed.as_str() }
        );
    }
    println!(
        "{} ticker(s), {} item(s), {} saved, {} existing, {} failed source(s)",
        summary.tickers,
        summary.items,
        summary.snapshots_saved,
        summary.snapshots_existing,
        summary.failed_sources
    );
}
