//! Nearest-neighbour queries over the pgvector `embeddings` table.

use chrono::{DateTime, Utc};
use sentirag_core::{EmbeddingRecord, ScoredEmbedding};
use sqlx::PgPool;

use crate::{check_dimension, DbError};

#[derive(Debug, sqlx::FromRow)]
struct NearestRow {
    id: i64,
    snapshot_id: i64,
    ticker: String,
    ts: DateTime<Utc>,
    text: String,
    similarity: f64,
}

/// Render a vector as a pgvector text literal (`[0.1,0.2,...]`).
#[must_use]
pub fn vector_literal(vector: &[f32]) -> String {
    let parts: Vec<String> = vector.iter().map(ToString::to_string).collect();
    format!("[{}]", parts.join(","))
}

/// Return the `k` embeddings closest to `query` by cosine distance.
///
/// Only rows with `ts > since` are considered; when `tickers` is non-empty the
/// rows must also match one of them. Ties on distance fall back to id order.
/// Similarity is reported as `1 - cosine_distance`.
///
/// # Errors
///
/// Returns [`DbError::DimensionMismatch`] for a wrong-sized query vector, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn nearest_embeddings(
    pool: &PgPool,
    query: &[f32],
    tickers: &[String],
    since: DateTime<Utc>,
    k: usize,
) -> Result<Vec<ScoredEmbedding>, DbError> {
    check_dimension(query)?;
    if k == 0 {
        return Ok(Vec::new());
    }
    let limit = i64::try_from(k).unwrap_or(i64::MAX);

    let rows = sqlx::query_as::<_, NearestRow>(
        "SELECT id, snapshot_id, ticker, ts, text, \
                1 - (embedding <=> $1::vector) AS similarity \
         FROM embeddings \
         WHERE ts > $2 \
           AND (cardinality($3::text[]) = 0 OR ticker = ANY($3::text[])) \
         ORDER BY embedding <=> $1::vector, id \
         LIMIT $4",
    )
    .bind(vector_literal(query))
    .bind(since)
    .bind(tickers.to_vec())
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| ScoredEmbedding {
            record: EmbeddingRecord {
                id: row.id,
                snapshot_id: row.snapshot_id,
                ticker: row.ticker,
                ts: row.ts,
                text: row.text,
            },
            similarity: row.similarity,
        })
        .collect())
}
