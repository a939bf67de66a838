use sentirag_db::DbError;
use sentirag_ingest::IngestError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("query embedding failed: {0}")]
    Embedding(#[from] IngestError),

    #[error(transparent)]
    Db(#[from] DbError),
}

/// Failures from the language-model backend.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("language model is not configured")]
    Unconfigured,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("language model returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid language model response: {0}")]
    InvalidResponse(String),
}
