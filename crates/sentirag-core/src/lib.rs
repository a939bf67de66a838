//! Shared domain types and configuration for the sentirag workspace.

pub mod app_config;
pub mod config;
pub mod tiers;
pub mod types;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use tiers::{is_valid_ticker, TickerTiers};
pub use types::{
    truncate_chars, truncate_to_minute, window_start, Citation, EmbeddingRecord, FetchResult,
    PurgeOutcome, RawItem, SaveOutcome, ScoredEmbedding, SentimentLabel, SentimentScore, Snapshot,
    Source, TopMention, EMBEDDING_DIM, FINGERPRINT_BODY_CHARS, SNIPPET_MAX_CHARS, TOP_MENTIONS,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown source: {0}")]
    UnknownSource(String),
    #[error("unknown ticker tier '{tier}' (valid tiers: {valid})")]
    UnknownTier { tier: String, valid: String },
}
