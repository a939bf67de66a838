//! Construction of the long-lived services from [`AppConfig`].
//!
//! Each backend is picked once here: a configured URL or key selects the real
//! client, anything else selects the deterministic fallback.

use std::path::PathBuf;
use std::sync::Arc;

use sentirag_core::{is_valid_ticker, AppConfig, Source};
use sentirag_ingest::{
    Embedder, JsonFeedFetcher, SentimentScorer, SourceFetcher, TeiClassifier, TeiEmbedder,
};
use sentirag_rag::{
    AnswerCache, LanguageModel, NoopCache, OpenAiChatModel, RedisAnswerCache, UnconfiguredModel,
};
use sqlx::PgPool;

/// A `--feed <source>=<path>` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FeedSpec {
    pub source: Source,
    pub path: PathBuf,
}

/// Parse `<source>=<path>` into a [`FeedSpec`].
pub(crate) fn parse_feed(raw: &str) -> Result<FeedSpec, String> {
    let (source, path) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected <source>=<path>, got '{raw}'"))?;
    let source: Source = source.trim().parse().map_err(|e| format!("{e}"))?;
    let path = path.trim();
    if path.is_empty() {
        return Err(format!("feed for {source} has an empty path"));
    }
    Ok(FeedSpec {
        source,
        path: PathBuf::from(path),
    })
}

pub(crate) fn build_fetchers(feeds: &[FeedSpec]) -> Vec<Arc<dyn SourceFetcher>> {
    feeds
        .iter()
        .map(|f| Arc::new(JsonFeedFetcher::new(f.source, f.path.clone())) as Arc<dyn SourceFetcher>)
        .collect()
}

/// Tickers to ingest: explicit `--ticker` values win, otherwise the tier.
///
/// # Errors
///
/// Returns an error for a malformed ticker, an unknown tier, or when neither
/// is given.
pub(crate) fn resolve_tickers(
    config: &AppConfig,
    tier: Option<&str>,
    tickers: &[String],
) -> anyhow::Result<Vec<String>> {
    if !tickers.is_empty() {
        return normalize_tickers(tickers);
    }
    let Some(tier) = tier else {
        anyhow::bail!("pass --tier or at least one --ticker");
    };
    let list = config.ticker_tiers.tickers(tier)?;
    if list.is_empty() {
        anyhow::bail!("no tickers configured for tier {tier}");
    }
    Ok(list.to_vec())
}

/// Uppercase and validate user-supplied ticker symbols.
///
/// # Errors
///
/// Returns an error naming the first symbol that is not a valid ticker.
pub(crate) fn normalize_tickers(tickers: &[String]) -> anyhow::Result<Vec<String>> {
    tickers
        .iter()
        .map(|t| {
            let upper = t.trim().to_uppercase();
            if is_valid_ticker(&upper) {
                Ok(upper)
            } else {
                Err(anyhow::anyhow!("invalid ticker '{t}'"))
            }
        })
        .collect()
}

pub(crate) async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    let pool_config = sentirag_db::PoolConfig::from_app_config(config);
    let pool = sentirag_db::connect_pool(config.require_database_url()?, pool_config).await?;
    Ok(pool)
}

pub(crate) fn build_scorer(config: &AppConfig) -> anyhow::Result<SentimentScorer> {
    let scorer = match &config.tei_classify_url {
        Some(url) => SentimentScorer::new(Arc::new(TeiClassifier::new(
            url,
            config.llm_timeout_secs,
        )?)),
        None => SentimentScorer::lexical(),
    };
    tracing::debug!(backend = scorer.backend_name(), "sentiment backend selected");
    Ok(scorer)
}

/// Build the embedder shared by ingestion and retrieval.
///
/// Both sides must be built from the same config so query and corpus vectors
/// live in one embedding space.
pub(crate) fn build_embedder(config: &AppConfig) -> anyhow::Result<Embedder> {
    let embedder = match &config.tei_embed_url {
        Some(url) => Embedder::new(Arc::new(TeiEmbedder::new(url, config.llm_timeout_secs)?)),
        None => Embedder::hashed(),
    };
    tracing::debug!(backend = embedder.backend_name(), "embedding backend selected");
    Ok(embedder)
}

pub(crate) fn build_language_model(config: &AppConfig) -> anyhow::Result<Arc<dyn LanguageModel>> {
    match &config.openai_api_key {
        Some(key) => Ok(Arc::new(OpenAiChatModel::new(
            &config.llm_base_url,
            key,
            &config.llm_model,
            config.llm_timeout_secs,
        )?)),
        None => {
            tracing::info!("OPENAI_API_KEY not set; answers will carry the not-configured notice");
            Ok(Arc::new(UnconfiguredModel))
        }
    }
}

/// Connect the answer cache, degrading to no cache when Redis is absent or
/// unreachable.
pub(crate) async fn build_answer_cache(config: &AppConfig) -> Arc<dyn AnswerCache> {
    let Some(url) = &config.redis_url else {
        return Arc::new(NoopCache);
    };
    match RedisAnswerCache::connect(url).await {
        Ok(cache) => Arc::new(cache),
        Err(e) => {
            tracing::warn!(error = %e, "redis unavailable; answering without a cache");
            Arc::new(NoopCache)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_feed_splits_source_and_path() {
        let spec = parse_feed("reddit=feeds/reddit.json").expect("valid feed");
        assert_eq!(spec.source, Source::Reddit);
        assert_eq!(spec.path, PathBuf::from("feeds/reddit.json"));
    }

    #[test]
    fn parse_feed_rejects_unknown_source_and_missing_path() {
        assert!(parse_feed("twitter=feeds/t.json").is_err());
        assert!(parse_feed("finnhub=").is_err());
        assert!(parse_feed("finnhub").is_err());
    }

    #[test]
    fn normalize_tickers_uppercases_and_validates() {
        let tickers = normalize_tickers(&["aapl".to_string(), "BRK.B".to_string()]).unwrap();
        assert_eq!(tickers, vec!["AAPL".to_string(), "BRK.B".to_string()]);
        assert!(normalize_tickers(&["TOOLONG".to_string()]).is_err());
    }
}
