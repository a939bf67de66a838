//! Retention sweep over the snapshot store.

use chrono::{TimeDelta, Utc};
use sentirag_core::{window_start, PurgeOutcome};
use sentirag_db::SnapshotStore;

use crate::error::IngestError;

/// Delete every snapshot and embedding older than `hours`.
///
/// Destructive and explicit; re-running it is harmless. A horizon too large
/// to represent removes nothing.
///
/// # Errors
///
/// Returns [`IngestError::Db`] if the purge fails.
pub async fn run_retention(
    store: &dyn SnapshotStore,
    hours: i64,
) -> Result<PurgeOutcome, IngestError> {
    let cutoff = window_start(Utc::now(), TimeDelta::try_hours(hours));
    let outcome = store.purge_before(cutoff).await?;
    tracing::info!(
        %cutoff,
        snapshots = outcome.snapshots,
        embeddings = outcome.embeddings,
        "retention sweep complete"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use sentirag_core::{truncate_to_minute, Snapshot, Source, EMBEDDING_DIM};
    use sentirag_db::InMemorySnapshotStore;

    use super::*;

    fn snapshot(hours_ago: i64) -> Snapshot {
        Snapshot {
            ticker: "AAPL".to_string(),
            source: Source::Finnhub,
            ts: truncate_to_minute(Utc::now() - TimeDelta::hours(hours_ago)),
            mean_score: 0.0,
            pos_ratio: 0.0,
            neg_ratio: 0.0,
            neu_ratio: 1.0,
            volume: 1,
            top_mentions: Vec::new(),
        }
    }

    #[tokio::test]
    async fn removes_only_rows_past_the_horizon() {
        let store = InMemorySnapshotStore::new();
        let v = vec![1.0 / (EMBEDDING_DIM as f32).sqrt(); EMBEDDING_DIM];
        store.save(&snapshot(48), "old", &v).await.unwrap();
        store.save(&snapshot(1), "fresh", &v).await.unwrap();

        let outcome = run_retention(&store, 24).await.unwrap();
        assert_eq!(outcome.snapshots, 1);
        assert_eq!(outcome.embeddings, 1);
        assert_eq!(store.count_snapshots().await.unwrap(), 1);

        let again = run_retention(&store, 24).await.unwrap();
        assert_eq!(again, PurgeOutcome::default());
    }

    #[tokio::test]
    async fn oversized_horizon_removes_nothing() {
        let store = InMemorySnapshotStore::new();
        let v = vec![1.0 / (EMBEDDING_DIM as f32).sqrt(); EMBEDDING_DIM];
        store.save(&snapshot(48), "old", &v).await.unwrap();

        let outcome = run_retention(&store, i64::MAX).await.unwrap();
        assert_eq!(outcome, PurgeOutcome::default());
        assert_eq!(store.count_snapshots().await.unwrap(), 1);
    }
}
