//! In-memory [`SnapshotStore`] for tests and dry runs.
//!
//! Rows live in `Vec`s behind a `Mutex`. Vector search is brute-force cosine
//! similarity over every stored embedding.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sentirag_core::{EmbeddingRecord, PurgeOutcome, SaveOutcome, ScoredEmbedding, Snapshot};

use crate::store::{SnapshotStore, StoredSnapshot};
use crate::{check_dimension, DbError};

struct StoredVector {
    record: EmbeddingRecord,
    vector: Vec<f32>,
}

#[derive(Default)]
struct Tables {
    next_snapshot_id: i64,
    next_embedding_id: i64,
    snapshots: Vec<StoredSnapshot>,
    vectors: Vec<StoredVector>,
}

/// In-memory snapshot store with the same idempotency rules as Postgres.
#[derive(Default)]
pub struct InMemorySnapshotStore {
    tables: Mutex<Tables>,
}

impl InMemorySnapshotStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cosine similarity; zero-magnitude inputs score `0.0`.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f64 = a
        .iter()
        .zip(b)
        .map(|(x, y)| f64::from(*x) * f64::from(*y))
        .sum();
    let mag_a: f64 = a.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    let mag_b: f64 = b.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    if mag_a < f64::EPSILON || mag_b < f64::EPSILON {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn save(
        &self,
        snapshot: &Snapshot,
        embedding_text: &str,
        embedding: &[f32],
    ) -> Result<SaveOutcome, DbError> {
        check_dimension(embedding)?;
        let mut tables = self.tables();

        let existing = tables.snapshots.iter().find(|s| {
            s.snapshot.ticker == snapshot.ticker
                && s.snapshot.source == snapshot.source
                && s.snapshot.ts == snapshot.ts
        });

        if let Some(existing) = existing {
            let snapshot_id = existing.id;
            let embedding_id = tables
                .vectors
                .iter()
                .find(|v| v.record.snapshot_id == snapshot_id)
                .map(|v| v.record.id)
                .ok_or(DbError::NotFound)?;
            return Ok(SaveOutcome {
                snapshot_id,
                embedding_id,
                created: false,
            });
        }

        tables.next_snapshot_id += 1;
        tables.next_embedding_id += 1;
        let snapshot_id = tables.next_snapshot_id;
        let embedding_id = tables.next_embedding_id;

        tables.snapshots.push(StoredSnapshot {
            id: snapshot_id,
            snapshot: snapshot.clone(),
        });
        tables.vectors.push(StoredVector {
            record: EmbeddingRecord {
                id: embedding_id,
                snapshot_id,
                ticker: snapshot.ticker.clone(),
                ts: snapshot.ts,
                text: embedding_text.to_string(),
            },
            vector: embedding.to_vec(),
        });

        Ok(SaveOutcome {
            snapshot_id,
            embedding_id,
            created: true,
        })
    }

    async fn nearest(
        &self,
        query: &[f32],
        tickers: &[String],
        since: DateTime<Utc>,
        k: usize,
    ) -> Result<Vec<ScoredEmbedding>, DbError> {
        check_dimension(query)?;
        let tables = self.tables();

        let mut scored: Vec<ScoredEmbedding> = tables
            .vectors
            .iter()
            .filter(|v| v.record.ts > since)
            .filter(|v| tickers.is_empty() || tickers.contains(&v.record.ticker))
            .map(|v| ScoredEmbedding {
                record: v.record.clone(),
                similarity: cosine_similarity(query, &v.vector),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then(a.record.id.cmp(&b.record.id))
        });
        scored.truncate(k);
        Ok(scored)
    }

    async fn snapshots_by_ids(&self, ids: &[i64]) -> Result<Vec<StoredSnapshot>, DbError> {
        let tables = self.tables();
        Ok(tables
            .snapshots
            .iter()
            .filter(|s| ids.contains(&s.id))
            .cloned()
            .collect())
    }

    async fn list_snapshots(
        &self,
        ticker: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<StoredSnapshot>, DbError> {
        let tables = self.tables();
        let mut rows: Vec<StoredSnapshot> = tables
            .snapshots
            .iter()
            .filter(|s| s.snapshot.ticker == ticker && s.snapshot.ts >= since)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.snapshot
                .ts
                .cmp(&a.snapshot.ts)
                .then(a.snapshot.source.as_str().cmp(b.snapshot.source.as_str()))
        });
        Ok(rows)
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<PurgeOutcome, DbError> {
        let mut tables = self.tables();

        let vectors_before = tables.vectors.len();
        tables.vectors.retain(|v| v.record.ts >= cutoff);
        let embeddings = vectors_before - tables.vectors.len();

        let snapshots_before = tables.snapshots.len();
        tables.snapshots.retain(|s| s.snapshot.ts >= cutoff);
        let snapshots = snapshots_before - tables.snapshots.len();

        Ok(PurgeOutcome {
            snapshots: snapshots as u64,
            embeddings: embeddings as u64,
        })
    }

    async fn count_snapshots(&self) -> Result<i64, DbError> {
        Ok(i64::try_from(self.tables().snapshots.len()).unwrap_or(i64::MAX))
    }

    async fn count_embeddings(&self) -> Result<i64, DbError> {
        Ok(i64::try_from(self.tables().vectors.len()).unwrap_or(i64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, TimeZone};
    use sentirag_core::{Source, EMBEDDING_DIM};

    use super::*;

    fn snapshot(ticker: &str, source: Source, ts: DateTime<Utc>) -> Snapshot {
        Snapshot {
            ticker: ticker.to_string(),
            source,
            ts,
            mean_score: 0.2,
            pos_ratio: 0.5,
            neg_ratio: 0.25,
            neu_ratio: 0.25,
            volume: 4,
            top_mentions: Vec::new(),
        }
    }

    /// Weight `w` on axis 0 and `1 - w` on axis `i`. Not normalized.
    fn axis_vector(i: usize, w: f32) -> Vec<f32> {
        let mut v = vec![0.0; EMBEDDING_DIM];
        v[0] = w;
        v[i] = 1.0 - w;
        v
    }

    fn now_minute() -> DateTime<Utc> {
        sentirag_core::truncate_to_minute(Utc::now())
    }

    #[tokio::test]
    async fn save_is_idempotent_on_identity_key() {
        let store = InMemorySnapshotStore::new();
        let ts = now_minute();
        let snap = snapshot("AAPL", Source::Finnhub, ts);
        let v = axis_vector(1, 0.0);

        let first = store.save(&snap, "text", &v).await.unwrap();
        let second = store.save(&snap, "text again", &v).await.unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.snapshot_id, second.snapshot_id);
        assert_eq!(first.embedding_id, second.embedding_id);
        assert_eq!(store.count_snapshots().await.unwrap(), 1);
        assert_eq!(store.count_embeddings().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn save_rejects_wrong_dimension() {
        let store = InMemorySnapshotStore::new();
        let snap = snapshot("AAPL", Source::Reddit, now_minute());
        let err = store.save(&snap, "text", &[1.0, 0.0]).await.unwrap_err();
        assert!(matches!(err, DbError::DimensionMismatch { .. }));
        assert_eq!(store.count_snapshots().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn nearest_orders_by_similarity_and_truncates() {
        let store = InMemorySnapshotStore::new();
        let base = now_minute();
        let weights = [0.1_f32, 0.9, 0.5, 0.7, 0.3];
        for (i, w) in weights.iter().enumerate() {
            let snap = snapshot("AAPL", Source::Finnhub, base - TimeDelta::minutes(i as i64));
            store
                .save(&snap, &format!("doc {i}"), &axis_vector(i + 1, *w))
                .await
                .unwrap();
        }

        let query = axis_vector(1, 1.0);
        let since = base - TimeDelta::hours(24);
        let top = store.nearest(&query, &[], since, 2).await.unwrap();

        assert_eq!(top.len(), 2);
        assert_eq!(top[0].record.text, "doc 1");
        assert_eq!(top[1].record.text, "doc 3");
        assert!(top[0].similarity >= top[1].similarity);
    }

    #[tokio::test]
    async fn nearest_applies_ticker_and_time_filters() {
        let store = InMemorySnapshotStore::new();
        let now = now_minute();
        let v = axis_vector(1, 0.0);
        store
            .save(&snapshot("AAPL", Source::Finnhub, now), "aapl", &v)
            .await
            .unwrap();
        store
            .save(&snapshot("TSLA", Source::Finnhub, now), "tsla", &v)
            .await
            .unwrap();
        store
            .save(
                &snapshot("AAPL", Source::Reddit, now - TimeDelta::hours(48)),
                "old",
                &v,
            )
            .await
            .unwrap();

        let since = now - TimeDelta::hours(24);
        let hits = store
            .nearest(&v, &["AAPL".to_string()], since, 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.text, "aapl");

        let all = store.nearest(&v, &[], since, 10).await.unwrap();
        assert_eq!(all.len(), 2);

        let none = store
            .nearest(&v, &["MSFT".to_string()], since, 10)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn purge_removes_only_rows_before_cutoff() {
        let store = InMemorySnapshotStore::new();
        let ts = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let v = axis_vector(1, 0.0);
        store
            .save(&snapshot("AAPL", Source::Finnhub, ts), "old", &v)
            .await
            .unwrap();
        store
            .save(
                &snapshot("AAPL", Source::Finnhub, ts + TimeDelta::hours(2)),
                "new",
                &v,
            )
            .await
            .unwrap();

        let outcome = store
            .purge_before(ts + TimeDelta::hours(1))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            PurgeOutcome {
                snapshots: 1,
                embeddings: 1
            }
        );
        assert_eq!(store.count_snapshots().await.unwrap(), 1);
        assert_eq!(store.count_embeddings().await.unwrap(), 1);

        let again = store
            .purge_before(ts + TimeDelta::hours(1))
            .await
            .unwrap();
        assert_eq!(again, PurgeOutcome::default());
    }

    #[test]
    fn cosine_similarity_handles_zero_vectors() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-12);
    }
}
