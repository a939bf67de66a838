//! Cron-driven ingestion and retention.
//!
//! Registers two recurring jobs on a [`JobScheduler`] and keeps them running
//! until ctrl-c. Both jobs are safe to overlap with manual runs because
//! snapshot writes are idempotent.

use std::sync::Arc;

use sentirag_core::{AppConfig, TickerTiers};
use sentirag_db::{PgSnapshotStore, SnapshotStore};
use sentirag_ingest::Ingestor;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::ingest::build_ingestor;
use crate::services::{self, FeedSpec};

/// Every 15 minutes, on the minute.
pub(crate) const DEFAULT_INGEST_CRON: &str = "0 */15 * * * *";
/// Hourly.
pub(crate) const DEFAULT_RETENTION_CRON: &str = "0 0 * * * *";

/// Every configured ticker across all tiers, first occurrence kept.
fn all_tier_tickers(tiers: &TickerTiers) -> Vec<String> {
    let mut tickers: Vec<String> = Vec::new();
    for tier in tiers.names() {
        let Ok(list) = tiers.tickers(tier) else {
            continue;
        };
        for ticker in list {
            if !tickers.contains(ticker) {
                tickers.push(ticker.clone());
            }
        }
    }
    tickers
}

/// Run the scheduler until ctrl-c, then stop it and close the pool.
///
/// # Errors
///
/// Returns an error if the database connection, a backend, or the scheduler
/// cannot be set up.
pub(crate) async fn run_schedule(
    config: AppConfig,
    feeds: &[FeedSpec],
    ingest_cron: &str,
    retention_cron: &str,
) -> anyhow::Result<()> {
    let config = Arc::new(config);
    let tickers = Arc::new(all_tier_tickers(&config.ticker_tiers));
    if tickers.is_empty() {
        anyhow::bail!("no tickers configured in any tier");
    }

    let pool = services::connect(&config).await?;
    let store: Arc<dyn SnapshotStore> = Arc::new(PgSnapshotStore::new(pool.clone()));
    let ingestor = Arc::new(build_ingestor(&config, feeds, Arc::clone(&store))?);

    let mut scheduler = JobScheduler::new().await?;
    register_ingest_job(
        &scheduler,
        ingest_cron,
        ingestor,
        tickers,
        config.ingest_max_concurrent_tickers,
    )
    .await?;
    register_retention_job(&scheduler, retention_cron, store, config.retention_hours).await?;
    scheduler.start().await?;

    tracing::info!(ingest_cron, retention_cron, "scheduler running; ctrl-c to stop");
    tokio::signal::ctrl_c().await?;
    tracing::info!("received shutdown signal, stopping scheduler");

    scheduler.shutdown().await?;
    pool.close().await;
    Ok(())
}

async fn register_ingest_job(
    scheduler: &JobScheduler,
    cron: &str,
    ingestor: Arc<Ingestor>,
    tickers: Arc<Vec<String>>,
    max_concurrent: usize,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(cron, move |_uuid, _lock| {
        let ingestor = Arc::clone(&ingestor);
        let tickers = Arc::clone(&tickers);

        Box::pin(async move {
            tracing::info!(tickers = tickers.len(), "scheduler: starting ingestion run");
            let summary = ingestor.ingest_tickers(&tickers, max_concurrent).await;
            tracing::info!(
                saved = summary.snapshots_saved,
                existing = summary.snapshots_existing,
                failed_sources = summary.failed_sources,
                "scheduler: ingestion run complete"
            );
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

async fn register_retention_job(
    scheduler: &JobScheduler,
    cron: &str,
    store: Arc<dyn SnapshotStore>,
    hours: i64,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(cron, move |_uuid, _lock| {
        let store = Arc::clone(&store);

        Box::pin(async move {
            if let Err(e) = sentirag_ingest::run_retention(store.as_ref(), hours).await {
                tracing::error!(error = %e, "scheduler: retention sweep failed");
            }
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}
