//! Database operations for the `snapshots` table and its owned `embeddings` row.

use chrono::{DateTime, Utc};
use sentirag_core::{PurgeOutcome, SaveOutcome, Snapshot, Source, TopMention};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use crate::embeddings::vector_literal;
use crate::store::StoredSnapshot;
use crate::{check_dimension, DbError};

// ---------------------------------------------------------------------------
// Row type
// ---------------------------------------------------------------------------

/// A row from the `snapshots` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SnapshotRow {
    pub id: i64,
    pub ticker: String,
    pub source: String,
    pub ts: DateTime<Utc>,
    pub mean_score: f64,
    pub pos_ratio: f64,
    pub neg_ratio: f64,
    pub neu_ratio: f64,
    pub volume: i32,
    pub top_mentions: Json<Vec<TopMention>>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<SnapshotRow> for StoredSnapshot {
    type Error = DbError;

    fn try_from(row: SnapshotRow) -> Result<Self, Self::Error> {
        let source: Source = row
            .source
            .parse()
            .map_err(|e: sentirag_core::CoreError| DbError::Decode(e.to_string()))?;

        Ok(StoredSnapshot {
            id: row.id,
            snapshot: Snapshot {
                ticker: row.ticker,
                source,
                ts: row.ts,
                mean_score: row.mean_score,
                pos_ratio: row.pos_ratio,
                neg_ratio: row.neg_ratio,
                neu_ratio: row.neu_ratio,
                volume: row.volume,
                top_mentions: row.top_mentions.0,
            },
        })
    }
}

const SNAPSHOT_COLUMNS: &str = "id, ticker, source, ts, mean_score, pos_ratio, neg_ratio, \
                                neu_ratio, volume, top_mentions, created_at";

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Insert a snapshot and its embedding as one unit, idempotent on
/// `(ticker, source, ts)`.
///
/// On an identity-key conflict the pre-existing snapshot id and its embedding
/// id are returned with `created = false`. Both inserts share one transaction,
/// so an embedding is never committed without its snapshot or vice versa.
///
/// # Errors
///
/// Returns [`DbError::DimensionMismatch`] for a wrong-sized vector, or
/// [`DbError::Sqlx`] if any statement or the commit fails.
pub async fn save_snapshot_with_embedding(
    pool: &PgPool,
    snapshot: &Snapshot,
    embedding_text: &str,
    embedding: &[f32],
) -> Result<SaveOutcome, DbError> {
    check_dimension(embedding)?;

    let mut tx = pool.begin().await?;
    let (snapshot_id, created) = insert_snapshot_or_get(&mut tx, snapshot).await?;
    let embedding_id =
        insert_embedding_or_get(&mut tx, snapshot_id, snapshot, embedding_text, embedding).await?;
    tx.commit().await?;

    tracing::debug!(
        snapshot_id,
        embedding_id,
        created,
        ticker = %snapshot.ticker,
        source = %snapshot.source,
        "saved snapshot and embedding"
    );

    Ok(SaveOutcome {
        snapshot_id,
        embedding_id,
        created,
    })
}

/// Insert the snapshot row, or return the id of the row already holding its
/// identity key. The boolean is `true` when a new row was written.
async fn insert_snapshot_or_get(
    conn: &mut PgConnection,
    snapshot: &Snapshot,
) -> Result<(i64, bool), DbError> {
    let inserted: Option<i64> = sqlx::query_scalar(
        "INSERT INTO snapshots \
             (ticker, source, ts, mean_score, pos_ratio, neg_ratio, neu_ratio, volume, top_mentions) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         ON CONFLICT (ticker, source, ts) DO NOTHING \
         RETURNING id",
    )
    .bind(&snapshot.ticker)
    .bind(snapshot.source.as_str())
    .bind(snapshot.ts)
    .bind(snapshot.mean_score)
    .bind(snapshot.pos_ratio)
    .bind(snapshot.neg_ratio)
    .bind(snapshot.neu_ratio)
    .bind(snapshot.volume)
    .bind(Json(&snapshot.top_mentions))
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(id) = inserted {
        return Ok((id, true));
    }

    let existing: i64 = sqlx::query_scalar(
        "SELECT id FROM snapshots WHERE ticker = $1 AND source = $2 AND ts = $3",
    )
    .bind(&snapshot.ticker)
    .bind(snapshot.source.as_str())
    .bind(snapshot.ts)
    .fetch_one(&mut *conn)
    .await?;

    Ok((existing, false))
}

async fn insert_embedding_or_get(
    conn: &mut PgConnection,
    snapshot_id: i64,
    snapshot: &Snapshot,
    text: &str,
    embedding: &[f32],
) -> Result<i64, DbError> {
    let inserted: Option<i64> = sqlx::query_scalar(
        "INSERT INTO embeddings (snapshot_id, ticker, ts, text, embedding) \
         VALUES ($1, $2, $3, $4, $5::vector) \
         ON CONFLICT (snapshot_id) DO NOTHING \
         RETURNING id",
    )
    .bind(snapshot_id)
    .bind(&snapshot.ticker)
    .bind(snapshot.ts)
    .bind(text)
    .bind(vector_literal(embedding))
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(id) = inserted {
        return Ok(id);
    }

    let existing: i64 = sqlx::query_scalar("SELECT id FROM embeddings WHERE snapshot_id = $1")
        .bind(snapshot_id)
        .fetch_one(&mut *conn)
        .await?;

    Ok(existing)
}

/// Delete every snapshot (and its embedding) with `ts` strictly before `cutoff`.
///
/// Embeddings are deleted first, then snapshots, inside one transaction.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if either delete or the commit fails.
pub async fn purge_before(pool: &PgPool, cutoff: DateTime<Utc>) -> Result<PurgeOutcome, DbError> {
    let mut tx = pool.begin().await?;

    let embeddings = sqlx::query("DELETE FROM embeddings WHERE ts < $1")
        .bind(cutoff)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    let snapshots = sqlx::query("DELETE FROM snapshots WHERE ts < $1")
        .bind(cutoff)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    tx.commit().await?;

    Ok(PurgeOutcome {
        snapshots,
        embeddings,
    })
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Fetch snapshots by id. Missing ids are silently absent from the result.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails or [`DbError::Decode`] if a
/// stored source name is unrecognised.
pub async fn get_snapshots_by_ids(
    pool: &PgPool,
    ids: &[i64],
) -> Result<Vec<StoredSnapshot>, DbError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query_as::<_, SnapshotRow>(&format!(
        "SELECT {SNAPSHOT_COLUMNS} FROM snapshots WHERE id = ANY($1) ORDER BY id"
    ))
    .bind(ids.to_vec())
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(StoredSnapshot::try_from).collect()
}

/// List snapshots for a ticker captured at or after `since`.
///
/// Results are ordered by `ts DESC` then `source`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails or [`DbError::Decode`] if a
/// stored source name is unrecognised.
pub async fn list_snapshots(
    pool: &PgPool,
    ticker: &str,
    since: DateTime<Utc>,
) -> Result<Vec<StoredSnapshot>, DbError> {
    let rows = sqlx::query_as::<_, SnapshotRow>(&format!(
        "SELECT {SNAPSHOT_COLUMNS} FROM snapshots \
         WHERE ticker = $1 AND ts >= $2 \
         ORDER BY ts DESC, source"
    ))
    .bind(ticker)
    .bind(since)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(StoredSnapshot::try_from).collect()
}

/// Total number of snapshot rows.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_snapshots(pool: &PgPool) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM snapshots")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Total number of embedding rows.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_embeddings(pool: &PgPool) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM embeddings")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
