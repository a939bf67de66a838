//! Read-side command handlers: `ask` and `snapshots`.

use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use sentirag_core::{window_start, AppConfig};
use sentirag_db::{PgSnapshotStore, SnapshotStore};
use sentirag_rag::{AnswerGenerator, AskResponse, AskService, VectorRetriever};

use crate::services;

/// Answer a question from stored snapshots.
///
/// # Errors
///
/// Returns an error for invalid input, a failed connection, or a failed
/// retrieval. Model and cache failures degrade inside the answer.
pub(crate) async fn run_ask(
    config: &AppConfig,
    query: &str,
    tickers: &[String],
    k: Option<usize>,
    window_hours: Option<i64>,
    json: bool,
) -> anyhow::Result<()> {
    let tickers = services::normalize_tickers(tickers)?;

    let pool = services::connect(config).await?;
    let store: Arc<dyn SnapshotStore> = Arc::new(PgSnapshotStore::new(pool.clone()));
    let retriever = VectorRetriever::new(services::build_embedder(config)?, store);
    let generator = AnswerGenerator::new(
        services::build_language_model(config)?,
        services::build_answer_cache(config).await,
        config.answer_cache_ttl_secs,
    );
    let service = AskService::new(
        retriever,
        generator,
        config.retrieval_k,
        config.retrieval_window_hours,
    );

    let response = service.ask(query, &tickers, k, window_hours).await;
    pool.close().await;
    let response = response?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_response(&response);
    }
    Ok(())
}

fn print_response(response: &AskResponse) {
    println!("{}", response.answer);
    if response.citations.is_empty() {
        return;
    }
    println!();
    for (i, cite) in response.citations.iter().enumerate() {
        println!(
            "[#{}] {} {} {} {}",
            i + 1,
            cite.ticker,
            cite.source,
            cite.ts.format("%Y-%m-%d %H:%M"),
            if cite.url.is_empty() { "-" } else { cite.url.as_str() }
        );
    }
    println!(
        "\n{} retrieved in {} ms",
        response.retrieved, response.latency_ms
    );
}

/// Show snapshots for `ticker` captured in the last `since_minutes`.
///
/// # Errors
///
/// Returns an error for an invalid ticker or a failed query.
pub(crate) async fn run_snapshots(
    config: &AppConfig,
    ticker: &str,
    since_minutes: i64,
) -> anyhow::Result<()> {
    let ticker = services::normalize_tickers(&[ticker.to_string()])?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("ticker is required"))?;
    if since_minutes <= 0 {
        anyhow::bail!("--since-minutes must be positive, got {since_minutes}");
    }

    let pool = services::connect(config).await?;
    let store = PgSnapshotStore::new(pool.clone());
    let since = window_start(Utc::now(), TimeDelta::try_minutes(since_minutes));
    let snapshots = store.list_snapshots(&ticker, since).await;
    pool.close().await;
    let snapshots = snapshots?;

    if snapshots.is_empty() {
        println!("no snapshots for {ticker} in the last {since_minutes} minute(s); run `ingest` first");
        return Ok(());
    }

    println!(
        "{:<18}{:<12}{:<9}{:<8}{:<8}{:<8}VOLUME",
        "CAPTURED", "SOURCE", "MEAN", "POS", "NEG", "NEU"
    );
    for stored in &snapshots {
        let snap = &stored.snapshot;
        println!(
            "{:<18}{:<12}{:<9.3}{:<8.2}{:<8.2}{:<8.2}{}",
            snap.ts.format("%Y-%m-%d %H:%M").to_string(),
            snap.source.as_str(),
            snap.mean_score,
            snap.pos_ratio,
            snap.neg_ratio,
            snap.neu_ratio,
            snap.volume
        );
    }
    Ok(())
}
