//! Grounded prompt construction.

use std::fmt::Write;

use chrono::SecondsFormat;
use sentirag_core::Citation;

/// System instruction sent with every completion request.
pub const SYSTEM_PROMPT: &str = "You are a financial assistant that reports stock market \
sentiment. Answer only from the numbered snippets you are given and cite them with their [#] \
markers. Never add facts that are not in the snippets.";

/// Build the user message: the question, each citation as a numbered
/// snippet, then the answering instructions.
#[must_use]
pub fn build_prompt(query: &str, citations: &[Citation]) -> String {
    let mut context = String::new();
    for (idx, cite) in citations.iter().enumerate() {
        let _ = writeln!(
            context,
            "[#{}] {} (ticker: {}, source: {}, ts: {})",
            idx + 1,
            cite.snippet,
            cite.ticker,
            cite.source,
            cite.ts.to_rfc3339_opts(SecondsFormat::Millis, true),
        );
    }

    format!(
        "USER QUERY: {query}\n\
         \n\
         CONTEXT:\n\
         {context}\n\
         TASK:\n\
         - Only use the snippets in CONTEXT to answer.\n\
         - Summarize the recent sentiment (Positive/Neutral/Negative) for the mentioned tickers.\n\
         - Identify key drivers and include any caveats.\n\
         - Cite snippets with their [#] markers and add a \"Citations:\" line.\n\
         - If the snippets are not enough to answer, say you don't know.\n\
         - End with a \"Confidence:\" score from 0 to 1."
    )
}
