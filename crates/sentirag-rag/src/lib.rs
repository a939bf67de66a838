//! Retrieval-augmented question answering over sentiment snapshots.
//!
//! Questions are embedded with the same [`sentirag_ingest::Embedder`] used at
//! ingestion, matched against stored snapshot embeddings, turned into
//! citations, and answered by a language model behind a content-addressed
//! cache.

pub mod answer;
pub mod ask;
pub mod cache;
pub mod error;
pub mod llm;
pub mod prompt;
pub mod retriever;

pub use answer::{AnswerGenerator, DEGRADED_ANSWER, NOT_CONFIGURED_NOTICE, NOT_ENOUGH_INFORMATION};
pub use ask::{AskResponse, AskService};
pub use cache::{
    cache_key, AnswerCache, InMemoryAnswerCache, NoopCache, RedisAnswerCache, HITS_KEY, MISSES_KEY,
};
pub use error::{LlmError, RagError};
pub use llm::{LanguageModel, OpenAiChatModel, UnconfiguredModel, DEFAULT_BASE_URL};
pub use prompt::{build_prompt, SYSTEM_PROMPT};
pub use retriever::{build_citations, VectorRetriever};
