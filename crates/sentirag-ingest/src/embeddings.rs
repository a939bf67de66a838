//! Text embedding: a TEI client and a deterministic hash fallback.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sentirag_core::EMBEDDING_DIM;
use serde::Serialize;

use crate::error::IngestError;

/// Maximum number of texts per /embed call.
const BATCH_SIZE: usize = 64;

/// A source of raw (not yet normalized) embedding vectors.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Embed every text, returning one vector per input in order.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, IngestError>;
}

// ---------------------------------------------------------------------------
// TEI
// ---------------------------------------------------------------------------

/// TEI (Text Embeddings Inference) HTTP client.
pub struct TeiEmbedder {
    client: reqwest::Client,
    url: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    inputs: &'a [&'a str],
}

impl TeiEmbedder {
    /// # Errors
    ///
    /// Returns [`IngestError::Http`] if the HTTP client cannot be built.
    pub fn new(tei_url: &str, timeout_secs: u64) -> Result<Self, IngestError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: format!("{}/embed", tei_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl EmbeddingBackend for TeiEmbedder {
    fn name(&self) -> &'static str {
        "tei"
    }

    /// Texts are sent in groups of [`BATCH_SIZE`] (64) per request.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, IngestError> {
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(BATCH_SIZE) {
            let request = EmbedRequest { inputs: chunk };
            let response = self
                .client
                .post(&self.url)
                .json(&request)
                .send()
                .await
                .map_err(|e| IngestError::Embedding(format!("TEI request failed: {e}")))?;

            if !response.status().is_success() {
                return Err(IngestError::Embedding(format!(
                    "TEI returned status {}",
                    response.status()
                )));
            }

            let embeddings: Vec<Vec<f32>> = response
                .json()
                .await
                .map_err(|e| IngestError::Embedding(format!("TEI response parse error: {e}")))?;

            if embeddings.len() != chunk.len() {
                return Err(IngestError::Embedding(format!(
                    "TEI returned {} embeddings for {} inputs",
                    embeddings.len(),
                    chunk.len()
                )));
            }

            all_embeddings.extend(embeddings);
        }

        Ok(all_embeddings)
    }
}

// ---------------------------------------------------------------------------
// Hash fallback
// ---------------------------------------------------------------------------

/// Deterministic text-derived vectors for running without a model server.
///
/// Not semantically meaningful; identical text always yields identical
/// vectors.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashEmbedder;

/// `0.5 * sin(seed + i)` per component, where `seed` is the sum of the text's
/// Unicode scalar values. Returned unit-normalized.
#[must_use]
pub fn hash_embedding(text: &str) -> Vec<f32> {
    let seed: u64 = text.chars().map(u64::from).sum();
    #[allow(clippy::cast_precision_loss)]
    let seed = seed as f64;

    #[allow(clippy::cast_precision_loss)]
    let raw: Vec<f64> = (0..EMBEDDING_DIM)
        .map(|i| 0.5 * (seed + i as f64).sin())
        .collect();
    let norm = raw.iter().map(|x| x * x).sum::<f64>().sqrt();

    #[allow(clippy::cast_possible_truncation)]
    let vector: Vec<f32> = raw
        .into_iter()
        .map(|x| if norm > 0.0 { (x / norm) as f32 } else { x as f32 })
        .collect();
    vector
}

#[async_trait]
impl EmbeddingBackend for HashEmbedder {
    fn name(&self) -> &'static str {
        "hash"
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, IngestError> {
        Ok(texts.iter().map(|t| hash_embedding(t)).collect())
    }
}

// ---------------------------------------------------------------------------
// Embedder
// ---------------------------------------------------------------------------

/// Divide every component by the Euclidean norm. Zero vectors are untouched.
pub fn normalize(vector: &mut [f32]) {
    let norm = vector
        .iter()
        .map(|x| f64::from(*x).powi(2))
        .sum::<f64>()
        .sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            #[allow(clippy::cast_possible_truncation)]
            let scaled = (f64::from(*x) / norm) as f32;
            *x = scaled;
        }
    }
}

/// The single embedding path shared by ingestion and query time.
///
/// The backend is fixed at construction. Every returned vector has
/// [`EMBEDDING_DIM`] components and is unit-normalized.
#[derive(Clone)]
pub struct Embedder {
    backend: Arc<dyn EmbeddingBackend>,
}

impl Embedder {
    #[must_use]
    pub fn new(backend: Arc<dyn EmbeddingBackend>) -> Self {
        Self { backend }
    }

    #[must_use]
    pub fn hashed() -> Self {
        Self::new(Arc::new(HashEmbedder))
    }

    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// # Errors
    ///
    /// Returns [`IngestError::Embedding`] if the backend fails or returns a
    /// vector of the wrong dimension.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, IngestError> {
        let mut vectors = self.embed_batch(&[text]).await?;
        vectors
            .pop()
            .ok_or_else(|| IngestError::Embedding("backend returned no vector".to_string()))
    }

    /// # Errors
    ///
    /// Returns [`IngestError::Embedding`] if the backend fails, returns the
    /// wrong number of vectors, or returns a vector of the wrong dimension.
    pub async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, IngestError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let mut vectors = self.backend.embed_batch(texts).await?;
        if vectors.len() != texts.len() {
            return Err(IngestError::Embedding(format!(
                "{} backend returned {} vectors for {} inputs",
                self.backend.name(),
                vectors.len(),
                texts.len()
            )));
        }
        for vector in &mut vectors {
            if vector.len() != EMBEDDING_DIM {
                return Err(IngestError::Embedding(format!(
                    "{} backend returned {} dimensions, expected {EMBEDDING_DIM}",
                    self.backend.name(),
                    vector.len()
                )));
            }
            normalize(vector);
        }
        Ok(vectors)
    }
}
