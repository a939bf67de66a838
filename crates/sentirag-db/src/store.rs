//! The snapshot store seam shared by ingestion and retrieval.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sentirag_core::{PurgeOutcome, SaveOutcome, ScoredEmbedding, Snapshot};
use sqlx::PgPool;

use crate::DbError;

/// A persisted snapshot with its row id.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSnapshot {
    pub id: i64,
    pub snapshot: Snapshot,
}

/// Persistence for snapshots and their single owned embedding.
///
/// `save` must be idempotent on `(ticker, source, ts)` and must write the
/// snapshot and embedding together or not at all.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn save(
        &self,
        snapshot: &Snapshot,
        embedding_text: &str,
        embedding: &[f32],
    ) -> Result<SaveOutcome, DbError>;

    /// Top-`k` embeddings by descending cosine similarity, restricted to
    /// `ts > since` and, when non-empty, to `tickers`.
    async fn nearest(
        &self,
        query: &[f32],
        tickers: &[String],
        since: DateTime<Utc>,
        k: usize,
    ) -> Result<Vec<ScoredEmbedding>, DbError>;

    async fn snapshots_by_ids(&self, ids: &[i64]) -> Result<Vec<StoredSnapshot>, DbError>;

    async fn list_snapshots(
        &self,
        ticker: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<StoredSnapshot>, DbError>;

    /// Destructive: remove every snapshot and embedding with `ts < cutoff`.
    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<PurgeOutcome, DbError>;

    async fn count_snapshots(&self) -> Result<i64, DbError>;

    async fn count_embeddings(&self) -> Result<i64, DbError>;
}

/// [`SnapshotStore`] backed by Postgres with the pgvector extension.
#[derive(Debug, Clone)]
pub struct PgSnapshotStore {
    pool: PgPool,
}

impl PgSnapshotStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Close the underlying pool, waiting for checked-out connections.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl SnapshotStore for PgSnapshotStore {
    async fn save(
        &self,
        snapshot: &Snapshot,
        embedding_text: &str,
        embedding: &[f32],
    ) -> Result<SaveOutcome, DbError> {
        crate::snapshots::save_snapshot_with_embedding(
            &self.pool,
            snapshot,
            embedding_text,
            embedding,
        )
        .await
    }

    async fn nearest(
        &self,
        query: &[f32],
        tickers: &[String],
        since: DateTime<Utc>,
        k: usize,
    ) -> Result<Vec<ScoredEmbedding>, DbError> {
        crate::embeddings::nearest_embeddings(&self.pool, query, tickers, since, k).await
    }

    async fn snapshots_by_ids(&self, ids: &[i64]) -> Result<Vec<StoredSnapshot>, DbError> {
        crate::snapshots::get_snapshots_by_ids(&self.pool, ids).await
    }

    async fn list_snapshots(
        &self,
        ticker: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<StoredSnapshot>, DbError> {
        crate::snapshots::list_snapshots(&self.pool, ticker, since).await
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<PurgeOutcome, DbError> {
        crate::snapshots::purge_before(&self.pool, cutoff).await
    }

    async fn count_snapshots(&self) -> Result<i64, DbError> {
        crate::snapshots::count_snapshots(&self.pool).await
    }

    async fn count_embeddings(&self) -> Result<i64, DbError> {
        crate::snapshots::count_embeddings(&self.pool).await
    }
}
