//! AI traits for text generation and embeddings.
//!
//! Output from both is untrusted input to the pipeline: generations may be
//! empty or carry bogus markers, and embeddings may fail at any time.

use async_trait::async_trait;

use crate::error::Result;

/// Text generation.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate text for a prompt. May return an empty string.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Model name reported alongside agent responses.
    fn model_name(&self) -> &str {
        "unknown"
    }
}

/// Text embeddings for semantic reranking.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding vector for text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}
