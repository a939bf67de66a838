//! Cached, grounded answer generation.

use std::sync::Arc;

use sentirag_core::Citation;

use crate::cache::{cache_key, AnswerCache, HITS_KEY, MISSES_KEY};
use crate::error::LlmError;
use crate::llm::LanguageModel;
use crate::prompt::{build_prompt, SYSTEM_PROMPT};

/// Answer returned when there is no evidence to ground on.
pub const NOT_ENOUGH_INFORMATION: &str =
    "I could not find any relevant information about the requested tickers in the requested time window.";

/// Answer returned when no language model is configured.
pub const NOT_CONFIGURED_NOTICE: &str = "I apologize, but the AI service is not currently \
configured. Please check the OPENAI_API_KEY environment variable.";

/// Answer returned when the language model call fails.
pub const DEGRADED_ANSWER: &str = "I apologize, but I could not generate an answer right now. \
Please review the cited snippets directly or try again later.";

/// Builds prompts from citations, calls the model, and caches results.
///
/// Two identical requests that miss the cache at the same moment both call
/// the model and both write the same key; the last write wins. Work may be
/// duplicated, never lost.
pub struct AnswerGenerator {
    llm: Arc<dyn LanguageModel>,
    cache: Arc<dyn AnswerCache>,
    ttl_secs: u64,
}

impl AnswerGenerator {
    #[must_use]
    pub fn new(llm: Arc<dyn LanguageModel>, cache: Arc<dyn AnswerCache>, ttl_secs: u64) -> Self {
        Self {
            llm,
            cache,
            ttl_secs,
        }
    }

    /// Answer `query` from `citations`.
    ///
    /// No citations returns [`NOT_ENOUGH_INFORMATION`] without touching the
    /// model or the cache. Model failures return a fixed notice that is not
    /// cached.
    pub async fn answer(&self, query: &str, tickers: &[String], citations: &[Citation]) -> String {
        if citations.is_empty() {
            return NOT_ENOUGH_INFORMATION.to_string();
        }

        let ids: Vec<i64> = citations.iter().map(|c| c.embedding_id).collect();
        let key = cache_key(query, tickers, &ids);

        if let Some(cached) = self.cache.get(&key).await {
            self.cache.incr(HITS_KEY).await;
            tracing::debug!(%key, "answer cache hit");
            return cached;
        }
        self.cache.incr(MISSES_KEY).await;

        let prompt = build_prompt(query, citations);
        match self.llm.complete(SYSTEM_PROMPT, &prompt).await {
            Ok(answer) => {
                self.cache.set_ex(&key, &answer, self.ttl_secs).await;
                answer
            }
            Err(LlmError::Unconfigured) => {
                tracing::warn!("language model not configured; returning notice");
                NOT_CONFIGURED_NOTICE.to_string()
            }
            Err(e) => {
                tracing::error!(error = %e, "language model call failed");
                DEGRADED_ANSWER.to_string()
            }
        }
    }
}
