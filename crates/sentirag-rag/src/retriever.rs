//! Vector retrieval over stored snapshot embeddings.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use sentirag_core::{truncate_chars, window_start, Citation, ScoredEmbedding, SNIPPET_MAX_CHARS};
use sentirag_db::{SnapshotStore, StoredSnapshot};
use sentirag_ingest::Embedder;

use crate::error::RagError;

/// Embeds queries with the ingestion [`Embedder`] and searches the store.
#[derive(Clone)]
pub struct VectorRetriever {
    embedder: Embedder,
    store: Arc<dyn SnapshotStore>,
}

impl VectorRetriever {
    #[must_use]
    pub fn new(embedder: Embedder, store: Arc<dyn SnapshotStore>) -> Self {
        Self { embedder, store }
    }

    /// Top-`k` embedding records by descending cosine similarity to `query`,
    /// limited to the last `window_hours` and, when non-empty, to `tickers`.
    /// A window too large to represent has no lower bound.
    ///
    /// No match is an empty result, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Embedding`] if the query cannot be embedded or
    /// [`RagError::Db`] if the store query fails.
    pub async fn search(
        &self,
        query: &str,
        tickers: &[String],
        k: usize,
        window_hours: i64,
    ) -> Result<Vec<ScoredEmbedding>, RagError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let vector = self.embedder.embed(query).await?;
        let since = window_start(Utc::now(), TimeDelta::try_hours(window_hours));
        let results = self.store.nearest(&vector, tickers, since, k).await?;

        tracing::debug!(
            query_len = query.len(),
            tickers = ?tickers,
            k,
            window_hours,
            results = results.len(),
            "vector search completed"
        );
        Ok(results)
    }

    /// Resolve search results into citations using their owning snapshots.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Db`] if the snapshot lookup fails.
    pub async fn citations(&self, results: &[ScoredEmbedding]) -> Result<Vec<Citation>, RagError> {
        let mut ids: Vec<i64> = results.iter().map(|r| r.record.snapshot_id).collect();
        ids.sort_unstable();
        ids.dedup();
        let snapshots = self.store.snapshots_by_ids(&ids).await?;
        Ok(build_citations(results, &snapshots))
    }
}

/// One citation per result, in result order.
///
/// Source and url come from the owning snapshot (url of its first top
/// mention); a snapshot purged since the search yields source `unknown` and
/// an empty url.
#[must_use]
pub fn build_citations(results: &[ScoredEmbedding], snapshots: &[StoredSnapshot]) -> Vec<Citation> {
    let by_id: HashMap<i64, &StoredSnapshot> = snapshots.iter().map(|s| (s.id, s)).collect();

    results
        .iter()
        .map(|r| {
            let snapshot = by_id.get(&r.record.snapshot_id);
            let source = snapshot.map_or_else(
                || "unknown".to_string(),
                |s| s.snapshot.source.to_string(),
            );
            let url = snapshot
                .and_then(|s| s.snapshot.top_mentions.first())
                .map(|m| m.url.clone())
                .unwrap_or_default();

            Citation {
                embedding_id: r.record.id,
                snapshot_id: r.record.snapshot_id,
                ticker: r.record.ticker.clone(),
                ts: r.record.ts,
                source,
                url,
                snippet: truncate_chars(&r.record.text, SNIPPET_MAX_CHARS).to_string(),
            }
        })
        .collect()
}
