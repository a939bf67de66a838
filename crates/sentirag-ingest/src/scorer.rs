//! Sentiment scoring: a lexical marker-word rule and a TEI classifier backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sentirag_core::{SentimentLabel, SentimentScore};
use serde::{Deserialize, Serialize};

use crate::error::IngestError;

/// Maximum number of texts sent to a backend per call.
pub const SENTIMENT_BATCH_SIZE: usize = 64;

/// Minimum lead one marker count needs over the other for a non-neutral label.
pub const LABEL_MARGIN: usize = 1;

pub(crate) const POSITIVE_MARKERS: &[&str] = &[
    "up",
    "rise",
    "rises",
    "rising",
    "gain",
    "gains",
    "bullish",
    "buy",
    "growth",
    "profit",
    "profits",
    "strong",
    "beat",
    "beats",
    "surge",
    "surges",
    "rally",
    "upgrade",
    "record",
    "outperform",
];

pub(crate) const NEGATIVE_MARKERS: &[&str] = &[
    "down",
    "fall",
    "falls",
    "drop",
    "drops",
    "bearish",
    "sell",
    "loss",
    "losses",
    "weak",
    "crash",
    "miss",
    "misses",
    "plunge",
    "plunges",
    "downgrade",
    "lawsuit",
    "recall",
    "underperform",
    "slump",
];

/// Score a text by counting positive and negative marker words.
///
/// Words are split on whitespace, stripped of non-alphanumeric edges, and
/// lowercased. With `p` positive and `n` negative hits the score is
/// `(p - n) / (p + n + 1)`; the label needs a lead of [`LABEL_MARGIN`].
#[must_use]
pub fn lexical_score(text: &str) -> SentimentScore {
    let mut positive = 0_usize;
    let mut negative = 0_usize;
    for word in text.split_whitespace() {
        let w = word
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        if POSITIVE_MARKERS.contains(&w.as_str()) {
            positive += 1;
        } else if NEGATIVE_MARKERS.contains(&w.as_str()) {
            negative += 1;
        }
    }

    let label = if positive >= negative + LABEL_MARGIN {
        SentimentLabel::Positive
    } else if negative >= positive + LABEL_MARGIN {
        SentimentLabel::Negative
    } else {
        SentimentLabel::Neutral
    };

    #[allow(clippy::cast_precision_loss)]
    let score = (positive as f32 - negative as f32) / (positive + negative + 1) as f32;

    SentimentScore { label, score }
}

/// A source of per-text sentiment.
#[async_trait]
pub trait SentimentBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Score every text, returning one entry per input in order.
    ///
    /// `None` marks a single input the backend answered for but could not
    /// turn into a score. `Err` means the whole call failed.
    async fn score_batch(
        &self,
        texts: &[&str],
    ) -> Result<Vec<Option<SentimentScore>>, IngestError>;
}

/// Deterministic marker-word backend. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalSentiment;

#[async_trait]
impl SentimentBackend for LexicalSentiment {
    fn name(&self) -> &'static str {
        "lexical"
    }

    async fn score_batch(
        &self,
        texts: &[&str],
    ) -> Result<Vec<Option<SentimentScore>>, IngestError> {
        Ok(texts.iter().map(|t| Some(lexical_score(t))).collect())
    }
}

// ---------------------------------------------------------------------------
// TEI classifier
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct PredictRequest<'a> {
    inputs: Vec<[&'a str; 1]>,
}

#[derive(Debug, Deserialize)]
struct LabelProbability {
    label: String,
    score: f32,
}

/// Client for a TEI sequence-classification endpoint (`POST {url}/predict`).
///
/// Expects a three-way financial sentiment model whose labels contain
/// `positive`, `negative`, and `neutral` (case-insensitive).
pub struct TeiClassifier {
    client: reqwest::Client,
    url: String,
}

impl TeiClassifier {
    /// # Errors
    ///
    /// Returns [`IngestError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, IngestError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: format!("{}/predict", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl SentimentBackend for TeiClassifier {
    fn name(&self) -> &'static str {
        "tei"
    }

    async fn score_batch(
        &self,
        texts: &[&str],
    ) -> Result<Vec<Option<SentimentScore>>, IngestError> {
        let request = PredictRequest {
            inputs: texts.iter().map(|t| [*t]).collect(),
        };
        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| IngestError::Classifier(format!("TEI request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(IngestError::Classifier(format!(
                "TEI returned status {}",
                response.status()
            )));
        }

        let predictions: Vec<Vec<LabelProbability>> = response
            .json()
            .await
            .map_err(|e| IngestError::Classifier(format!("TEI response parse error: {e}")))?;

        if predictions.len() != texts.len() {
            return Err(IngestError::Classifier(format!(
                "TEI returned {} predictions for {} inputs",
                predictions.len(),
                texts.len()
            )));
        }

        Ok(predictions
            .iter()
            .enumerate()
            .map(|(index, p)| match from_probabilities(p) {
                Ok(score) => Some(score),
                Err(e) => {
                    tracing::debug!(index, error = %e, "unusable TEI prediction");
                    None
                }
            })
            .collect())
    }
}

/// Collapse label probabilities into a score of `p(positive) - p(negative)`
/// labelled by the most probable class.
fn from_probabilities(probs: &[LabelProbability]) -> Result<SentimentScore, IngestError> {
    let mut positive = None;
    let mut negative = None;
    let mut best: Option<(SentimentLabel, f32)> = None;

    for p in probs {
        let label = match p.label.to_ascii_lowercase().as_str() {
            "positive" => SentimentLabel::Positive,
            "negative" => SentimentLabel::Negative,
            "neutral" => SentimentLabel::Neutral,
            _ => continue,
        };
        match label {
            SentimentLabel::Positive => positive = Some(p.score),
            SentimentLabel::Negative => negative = Some(p.score),
            SentimentLabel::Neutral => {}
        }
        if best.is_none_or(|(_, s)| p.score > s) {
            best = Some((label, p.score));
        }
    }

    let (label, _) = best.ok_or_else(|| {
        IngestError::Classifier("prediction has no recognised sentiment labels".to_string())
    })?;
    let score = (positive.unwrap_or(0.0) - negative.unwrap_or(0.0)).clamp(-1.0, 1.0);
    Ok(SentimentScore { label, score })
}

// ---------------------------------------------------------------------------
// Scorer
// ---------------------------------------------------------------------------

/// Batches texts through a [`SentimentBackend`].
///
/// A failed or short batch is re-scored with [`lexical_score`], as is any
/// single item the backend could not score. Scoring itself never fails and
/// output stays index-aligned with input.
#[derive(Clone)]
pub struct SentimentScorer {
    backend: Arc<dyn SentimentBackend>,
}

impl SentimentScorer {
    #[must_use]
    pub fn new(backend: Arc<dyn SentimentBackend>) -> Self {
        Self { backend }
    }

    #[must_use]
    pub fn lexical() -> Self {
        Self::new(Arc::new(LexicalSentiment))
    }

    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub async fn score_texts(&self, texts: &[&str]) -> Vec<SentimentScore> {
        let mut scores = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(SENTIMENT_BATCH_SIZE) {
            match self.backend.score_batch(chunk).await {
                Ok(batch) if batch.len() == chunk.len() => {
                    let mut fallbacks = 0_usize;
                    for (text, score) in chunk.iter().zip(batch) {
                        scores.push(score.unwrap_or_else(|| {
                            fallbacks += 1;
                            lexical_score(text)
                        }));
                    }
                    if fallbacks > 0 {
                        tracing::warn!(
                            backend = self.backend.name(),
                            fallbacks,
                            "using lexical fallback for unscored items"
                        );
                    }
                }
                Ok(batch) => {
                    tracing::warn!(
                        backend = self.backend.name(),
                        expected = chunk.len(),
                        got = batch.len(),
                        "sentiment backend returned a short batch; using lexical fallback"
                    );
                    scores.extend(chunk.iter().map(|t| lexical_score(t)));
                }
                Err(e) => {
                    tracing::warn!(
                        backend = self.backend.name(),
                        error = %e,
                        "sentiment backend failed; using lexical fallback"
                    );
                    scores.extend(chunk.iter().map(|t| lexical_score(t)));
                }
            }
        }
        scores
    }
}

#[cfg(test)]
#[path = "scorer_test.rs"]
mod tests;
