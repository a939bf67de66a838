use sentirag_core::Source;
use sentirag_db::DbError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{source_name} fetch failed: {reason}")]
    Fetch { source_name: Source, reason: String },

    #[error("sentiment classifier error: {0}")]
    Classifier(String),

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    #[error(transparent)]
    Db(#[from] DbError),
}

/// Precondition failures for snapshot aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregateError {
    #[error("cannot aggregate an empty batch")]
    EmptyBatch,

    #[error(
        "batch is not index-aligned: {items} items, {sentiments} sentiments, {embeddings} embeddings"
    )]
    MisalignedBatch {
        items: usize,
        sentiments: usize,
        embeddings: usize,
    },
}
