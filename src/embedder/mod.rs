/// Embedder trait and shared types for text embedding.
///
/// The index build and query paths must go through the same embedding
/// capability, so both take the trait; `model_id` and `dimensions` are
/// recorded in the index artifacts and re-checked at load time.
pub mod ngram;
pub mod remote;

use thiserror::Error;

/// Errors that can occur during embedding operations.
#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("inference failed: {0}")]
    InferenceFailed(String),

    #[error("embedding service unreachable: {0}")]
    ServiceUnreachable(String),

    #[error("embedding service returned status {0}")]
    BadStatus(u16),

    #[error("embedding response malformed: {0}")]
    MalformedResponse(String),
}

/// Trait for text embedding implementations.
///
/// All implementations must be `Send + Sync` to allow concurrent use
/// behind `Arc`. Returned vectors are L2-normalized so that inner product
/// equals cosine similarity.
pub trait Embedder: Send + Sync {
    /// Embed a single text string into a normalized vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError>;

    /// Embed multiple text strings into normalized vectors.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Dimensionality of the embedding vectors.
    fn dimensions(&self) -> usize;

    /// Stable identifier of the underlying model, persisted with the index.
    fn model_id(&self) -> &str;
}

/// L2-normalize a vector in place. A zero vector is left unchanged.
pub(crate) fn normalize(vec: &mut [f32]) {
    let norm_sq: f32 = vec.iter().map(|v| v * v).sum();
    if norm_sq > 0.0 {
        let inv = 1.0 / norm_sq.sqrt();
        for v in vec {
            *v *= inv;
        }
    }
}
