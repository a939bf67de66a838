//! Ingestion pipeline for sentirag.
//!
//! Collects raw items per ticker, deduplicates them by content fingerprint,
//! scores sentiment, embeds text, folds each `(ticker, source)` group into a
//! snapshot, and persists it with one representative embedding.

pub mod aggregate;
pub mod dedup;
pub mod embeddings;
pub mod error;
pub mod pipeline;
pub mod retention;
pub mod scorer;
pub mod sources;

pub use aggregate::{aggregate_snapshot, describe_snapshot, Aggregation};
pub use dedup::{deduplicate, fingerprint, group_by_source};
pub use embeddings::{
    hash_embedding, normalize, Embedder, EmbeddingBackend, HashEmbedder, TeiEmbedder,
};
pub use error::{AggregateError, IngestError};
pub use pipeline::{IngestSummary, Ingestor, TickerReport};
pub use retention::run_retention;
pub use scorer::{
    lexical_score, LexicalSentiment, SentimentBackend, SentimentScorer, TeiClassifier,
    LABEL_MARGIN, SENTIMENT_BATCH_SIZE,
};
pub use sources::{collect_items, Collected, JsonFeedFetcher, SourceFetcher};
