//! Fold one `(ticker, source)` batch into a [`Snapshot`] and its description.

use std::cmp::Ordering;

use sentirag_core::{
    truncate_chars, truncate_to_minute, RawItem, SentimentLabel, SentimentScore, Snapshot, Source,
    TopMention, SNIPPET_MAX_CHARS, TOP_MENTIONS,
};

use crate::error::AggregateError;

/// A snapshot plus the text that represents it in embedding space.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub snapshot: Snapshot,
    pub description: String,
}

/// Aggregate an index-aligned batch of items, sentiments, and embeddings.
///
/// The snapshot timestamp is the first item's timestamp truncated to the
/// minute. Ratios come from label counts. Top mentions are the
/// [`TOP_MENTIONS`] items with the largest absolute score; equal scores keep
/// input order.
///
/// # Errors
///
/// Returns [`AggregateError::EmptyBatch`] for zero items and
/// [`AggregateError::MisalignedBatch`] when the three slices differ in length.
pub fn aggregate_snapshot(
    ticker: &str,
    source: Source,
    items: &[RawItem],
    sentiments: &[SentimentScore],
    embeddings: &[Vec<f32>],
) -> Result<Aggregation, AggregateError> {
    if items.len() != sentiments.len() || items.len() != embeddings.len() {
        return Err(AggregateError::MisalignedBatch {
            items: items.len(),
            sentiments: sentiments.len(),
            embeddings: embeddings.len(),
        });
    }
    let Some(first) = items.first() else {
        return Err(AggregateError::EmptyBatch);
    };

    #[allow(clippy::cast_precision_loss)]
    let total = items.len() as f64;
    let mean_score = sentiments.iter().map(|s| f64::from(s.score)).sum::<f64>() / total;

    let count = |label: SentimentLabel| sentiments.iter().filter(|s| s.label == label).count();
    #[allow(clippy::cast_precision_loss)]
    let (pos_ratio, neg_ratio, neu_ratio) = (
        count(SentimentLabel::Positive) as f64 / total,
        count(SentimentLabel::Negative) as f64 / total,
        count(SentimentLabel::Neutral) as f64 / total,
    );

    let snapshot = Snapshot {
        ticker: ticker.to_string(),
        source,
        ts: truncate_to_minute(first.timestamp),
        mean_score,
        pos_ratio,
        neg_ratio,
        neu_ratio,
        volume: i32::try_from(items.len()).unwrap_or(i32::MAX),
        top_mentions: top_mentions(items, sentiments),
    };
    let description = describe_snapshot(&snapshot);

    Ok(Aggregation {
        snapshot,
        description,
    })
}

fn top_mentions(items: &[RawItem], sentiments: &[SentimentScore]) -> Vec<TopMention> {
    let mut ranked: Vec<(&RawItem, f32)> = items
        .iter()
        .zip(sentiments)
        .map(|(item, s)| (item, s.score.abs()))
        .collect();
    // sort_by is stable, so equal magnitudes keep input order
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

    ranked
        .into_iter()
        .take(TOP_MENTIONS)
        .map(|(item, score)| {
            let headline = if item.title.trim().is_empty() {
                item.content()
            } else {
                &item.title
            };
            TopMention {
                text: truncate_chars(headline, SNIPPET_MAX_CHARS).to_string(),
                url: item.url.clone(),
                score,
            }
        })
        .collect()
}

/// Human-readable summary used as the snapshot's embedding text.
///
/// `AAPL finnhub sentiment: mean=0.200 pos=60.0% neg=40.0% neu=0.0%, volume=10;
/// headlines: first; second; third`
#[must_use]
pub fn describe_snapshot(snapshot: &Snapshot) -> String {
    let headlines: Vec<&str> = snapshot
        .top_mentions
        .iter()
        .map(|m| m.text.as_str())
        .collect();
    format!(
        "{} {} sentiment: mean={:.3} pos={:.1}% neg={:.1}% neu={:.1}%, volume={}; headlines: {}",
        snapshot.ticker,
        snapshot.source,
        snapshot.mean_score,
        snapshot.pos_ratio * 100.0,
        snapshot.neg_ratio * 100.0,
        snapshot.neu_ratio * 100.0,
        snapshot.volume,
        headlines.join("; ")
    )
}
