//! Domain types shared by ingestion, storage, and retrieval.

use std::str::FromStr;

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Dimension of every embedding vector in the system.
pub const EMBEDDING_DIM: usize = 384;

/// Maximum characters kept for mention excerpts and citation snippets.
pub const SNIPPET_MAX_CHARS: usize = 200;

/// Number of top mentions retained per snapshot.
pub const TOP_MENTIONS: usize = 3;

/// Number of body characters that feed the dedup fingerprint.
pub const FINGERPRINT_BODY_CHARS: usize = 200;

// ---------------------------------------------------------------------------
// Sources and raw items
// ---------------------------------------------------------------------------

/// Upstream provider an item was fetched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Finnhub,
    Reddit,
    #[serde(rename = "newsapi")]
    NewsApi,
    Stocktwits,
}

impl Source {
    /// All sources in canonical processing order.
    pub const ALL: [Source; 4] = [
        Source::Finnhub,
        Source::Reddit,
        Source::NewsApi,
        Source::Stocktwits,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Finnhub => "finnhub",
            Source::Reddit => "reddit",
            Source::NewsApi => "newsapi",
            Source::Stocktwits => "stocktwits",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "finnhub" => Ok(Source::Finnhub),
            "reddit" => Ok(Source::Reddit),
            "newsapi" => Ok(Source::NewsApi),
            "stocktwits" => Ok(Source::Stocktwits),
            other => Err(CoreError::UnknownSource(other.to_string())),
        }
    }
}

/// A single piece of fetched content, immutable for the lifetime of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawItem {
    pub title: String,
    pub url: String,
    /// Body text. May be empty for headline-only sources.
    pub text: String,
    pub source: Source,
    pub timestamp: DateTime<Utc>,
}

impl RawItem {
    /// Text fed to the scorer and embedder: the body, or the title when the
    /// body is blank.
    #[must_use]
    pub fn content(&self) -> &str {
        if self.text.trim().is_empty() {
            &self.title
        } else {
            &self.text
        }
    }
}

/// Items returned by one fetcher for one ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchResult {
    pub ticker: String,
    pub items: Vec<RawItem>,
}

// ---------------------------------------------------------------------------
// Sentiment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Negative => "negative",
            SentimentLabel::Neutral => "neutral",
        }
    }
}

/// Per-item sentiment. `score` is in `[-1.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentScore {
    pub label: SentimentLabel,
    pub score: f32,
}

impl SentimentScore {
    #[must_use]
    pub fn neutral() -> Self {
        Self {
            label: SentimentLabel::Neutral,
            score: 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshots and embeddings
// ---------------------------------------------------------------------------

/// One of the highest-magnitude items in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopMention {
    pub text: String,
    pub url: String,
    /// Absolute sentiment score of the item.
    pub score: f32,
}

/// Aggregated sentiment for a `(ticker, source, minute)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub ticker: String,
    pub source: Source,
    /// Always truncated to the whole minute.
    pub ts: DateTime<Utc>,
    pub mean_score: f64,
    pub pos_ratio: f64,
    pub neg_ratio: f64,
    pub neu_ratio: f64,
    pub volume: i32,
    pub top_mentions: Vec<TopMention>,
}

/// Stored embedding row, without its vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub id: i64,
    pub snapshot_id: i64,
    pub ticker: String,
    pub ts: DateTime<Utc>,
    pub text: String,
}

/// An embedding record returned from a similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredEmbedding {
    pub record: EmbeddingRecord,
    /// Cosine similarity to the query vector.
    pub similarity: f64,
}

/// Ids produced by a snapshot save. `created` is `false` when the identity key
/// already existed and the pre-existing ids were returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveOutcome {
    pub snapshot_id: i64,
    pub embedding_id: i64,
    pub created: bool,
}

/// Rows removed by a retention sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeOutcome {
    pub snapshots: u64,
    pub embeddings: u64,
}

/// A grounded reference handed to the answer generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    pub embedding_id: i64,
    pub snapshot_id: i64,
    pub ticker: String,
    pub ts: DateTime<Utc>,
    pub source: String,
    pub url: String,
    pub snippet: String,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Truncate to at most `max_chars` characters, respecting char boundaries.
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Round a timestamp down to the start of its minute.
#[must_use]
pub fn truncate_to_minute(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.duration_trunc(TimeDelta::minutes(1)).unwrap_or(ts)
}

/// Start of a look-back window of `span` ending at `now`.
///
/// Pass the result of `TimeDelta::try_hours` and friends. A span that does
/// not fit (`None`, or one reaching past the Unix epoch) yields the epoch, so
/// an oversized window means "no lower bound" instead of a panic.
#[must_use]
pub fn window_start(now: DateTime<Utc>, span: Option<TimeDelta>) -> DateTime<Utc> {
    span.and_then(|span| now.checked_sub_signed(span))
        .filter(|start| *start > DateTime::<Utc>::UNIX_EPOCH)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}
