//! Question answering: retrieve, cite, answer.

use std::time::Instant;

use sentirag_core::{is_valid_ticker, Citation};
use serde::Serialize;

use crate::answer::AnswerGenerator;
use crate::error::RagError;
use crate::retriever::VectorRetriever;

pub const MAX_QUERY_CHARS: usize = 500;
pub const MAX_TICKERS: usize = 10;
pub const MAX_K: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AskResponse {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub retrieved: usize,
    pub latency_ms: u64,
}

/// Ties retrieval and answer generation together with request defaults.
pub struct AskService {
    retriever: VectorRetriever,
    generator: AnswerGenerator,
    default_k: usize,
    window_hours: i64,
}

impl AskService {
    #[must_use]
    pub fn new(
        retriever: VectorRetriever,
        generator: AnswerGenerator,
        default_k: usize,
        window_hours: i64,
    ) -> Self {
        Self {
            retriever,
            generator,
            default_k,
            window_hours,
        }
    }

    /// Answer a question about `tickers` (all tickers when empty).
    ///
    /// `k` and `window_hours` fall back to the service defaults.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidRequest`] for an empty or overlong query,
    /// too many or malformed tickers, or `k` outside `1..=20`; otherwise
    /// propagates retrieval failures.
    pub async fn ask(
        &self,
        query: &str,
        tickers: &[String],
        k: Option<usize>,
        window_hours: Option<i64>,
    ) -> Result<AskResponse, RagError> {
        let started = Instant::now();
        let k = k.unwrap_or(self.default_k);
        let window_hours = window_hours.unwrap_or(self.window_hours);
        validate(query, tickers, k, window_hours)?;

        let results = self
            .retriever
            .search(query, tickers, k, window_hours)
            .await?;
        let citations = if results.is_empty() {
            Vec::new()
        } else {
            self.retriever.citations(&results).await?
        };

        let answer = self.generator.answer(query, tickers, &citations).await;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        tracing::info!(
            tickers = ?tickers,
            retrieved = results.len(),
            latency_ms,
            "question answered"
        );

        Ok(AskResponse {
            answer,
            citations,
            retrieved: results.len(),
            latency_ms,
        })
    }
}

fn validate(query: &str, tickers: &[String], k: usize, window_hours: i64) -> Result<(), RagError> {
    let invalid = |msg: String| Err(RagError::InvalidRequest(msg));

    if query.trim().is_empty() {
        return invalid("query must not be empty".to_string());
    }
    if query.chars().count() > MAX_QUERY_CHARS {
        return invalid(format!("query exceeds {MAX_QUERY_CHARS} characters"));
    }
    if tickers.len() > MAX_TICKERS {
        return invalid(format!("at most {MAX_TICKERS} tickers are allowed"));
    }
    if let Some(bad) = tickers.iter().find(|t| !is_valid_ticker(t)) {
        return invalid(format!("invalid ticker format: {bad}"));
    }
    if !(1..=MAX_K).contains(&k) {
        return invalid(format!("k must be between 1 and {MAX_K}"));
    }
    if window_hours <= 0 {
        return invalid("window must be a positive number of hours".to_string());
    }
    Ok(())
}
