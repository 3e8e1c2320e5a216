//! Testing utilities including mock implementations.
//!
//! These are useful for testing applications that use the grounding library
//! without making real retrieval, verification or AI calls.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::error::{GroundingError, Result, VerificationError, VerificationResult};
use crate::traits::{
    ai::{Embedder, Generator},
    retriever::Retriever,
    store::ChunkStore,
};
use crate::types::{
    citation::ResolvedChunk,
    question::{ChunkId, Retrieval, RetrievalRequest},
};

/// A mock retrieval service.
///
/// Returns one predefined retrieval for every question, or fails every call.
#[derive(Default, Clone)]
pub struct MockRetriever {
    /// Retrieval returned for every request
    retrieval: Arc<RwLock<Retrieval>>,

    /// Failure message, if every call should fail
    failure: Arc<RwLock<Option<String>>>,

    /// Call tracking for assertions
    requests: Arc<RwLock<Vec<RetrievalRequest>>>,
}

impl MockRetriever {
    /// Create a retriever that returns an empty draft and no candidates.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the retrieval returned for every request.
    pub fn with_retrieval(self, retrieval: Retrieval) -> Self {
        *self.retrieval.write().unwrap() = retrieval;
        self
    }

    /// Make every call fail with a retrieval error.
    pub fn failing(self, message: impl Into<String>) -> Self {
        *self.failure.write().unwrap() = Some(message.into());
        self
    }

    /// Get all requests made to this mock.
    pub fn requests(&self) -> Vec<RetrievalRequest> {
        self.requests.read().unwrap().clone()
    }
}

#[async_trait]
impl Retriever for MockRetriever {
    async fn query_collection(&self, request: &RetrievalRequest) -> Result<Retrieval> {
        self.requests.write().unwrap().push(request.clone());

        if let Some(message) = self.failure.read().unwrap().clone() {
            return Err(GroundingError::Retrieval(message));
        }

        Ok(self.retrieval.read().unwrap().clone())
    }
}

/// A mock chunk store.
///
/// Unknown ids fail with a 404 status, like the real service.
#[derive(Default, Clone)]
pub struct MockChunkStore {
    /// Records returned by requested id
    chunks: Arc<RwLock<HashMap<ChunkId, ResolvedChunk>>>,

    /// Ids that should fail, with their error
    failures: Arc<RwLock<HashMap<ChunkId, VerificationError>>>,

    /// Delay before answering each call
    delay: Option<Duration>,

    /// Requested ids in call order
    requested: Arc<RwLock<Vec<ChunkId>>>,

    /// Ids whose call finished
    completed: Arc<RwLock<Vec<ChunkId>>>,
}

impl MockChunkStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a chunk, served under its own id.
    pub fn with_chunk(self, chunk: ResolvedChunk) -> Self {
        self.chunks.write().unwrap().insert(chunk.chunk_id, chunk);
        self
    }

    /// Serve `chunk` when `chunk_id` is requested, whatever its own id.
    pub fn with_alias(self, chunk_id: ChunkId, chunk: ResolvedChunk) -> Self {
        self.chunks.write().unwrap().insert(chunk_id, chunk);
        self
    }

    /// Make verification of `chunk_id` fail.
    pub fn with_failure(self, chunk_id: ChunkId, error: VerificationError) -> Self {
        self.failures.write().unwrap().insert(chunk_id, error);
        self
    }

    /// Delay every answer.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Ids requested so far, in call order.
    pub fn requested(&self) -> Vec<ChunkId> {
        self.requested.read().unwrap().clone()
    }

    /// Ids whose verification call ran to completion.
    pub fn completed(&self) -> Vec<ChunkId> {
        self.completed.read().unwrap().clone()
    }
}

#[async_trait]
impl ChunkStore for MockChunkStore {
    async fn verify_chunk(&self, chunk_id: ChunkId) -> VerificationResult<ResolvedChunk> {
        self.requested.write().unwrap().push(chunk_id);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.completed.write().unwrap().push(chunk_id);

        if let Some(error) = self.failures.read().unwrap().get(&chunk_id).cloned() {
            return Err(error);
        }

        self.chunks
            .read()
            .unwrap()
            .get(&chunk_id)
            .cloned()
            .ok_or_else(|| VerificationError::Status {
                status: 404,
                message: format!("chunk {} not found", chunk_id),
            })
    }
}

/// A mock text generator.
///
/// Returns a fixed response (empty by default) and records every prompt.
#[derive(Default, Clone)]
pub struct MockGenerator {
    /// Response for every prompt
    response: Arc<RwLock<String>>,

    /// Failure message, if every call should fail
    failure: Arc<RwLock<Option<String>>>,

    /// Reported model name
    model: String,

    /// Prompts received, in call order
    prompts: Arc<RwLock<Vec<String>>>,
}

impl MockGenerator {
    /// Create a generator that returns empty text.
    pub fn new() -> Self {
        Self {
            model: "mock-model".to_string(),
            ..Default::default()
        }
    }

    /// Set the response for every prompt.
    pub fn with_response(self, response: impl Into<String>) -> Self {
        *self.response.write().unwrap() = response.into();
        self
    }

    /// Make every call fail with a generation error.
    pub fn failing(self, message: impl Into<String>) -> Self {
        *self.failure.write().unwrap() = Some(message.into());
        self
    }

    /// Set the reported model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Get all prompts sent to this mock.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.read().unwrap().clone()
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.write().unwrap().push(prompt.to_string());

        if let Some(message) = self.failure.read().unwrap().clone() {
            return Err(GroundingError::Generation(message));
        }

        Ok(self.response.read().unwrap().clone())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// A mock embedder.
///
/// Predefined embeddings by text; any other text gets a deterministic
/// embedding derived from its hash.
#[derive(Default, Clone)]
pub struct MockEmbedder {
    /// Predefined embeddings by text
    embeddings: Arc<RwLock<HashMap<String, Vec<f32>>>>,

    /// Texts whose embedding call should fail
    failing: Arc<RwLock<HashSet<String>>>,

    /// Dimension of generated embeddings
    embedding_dim: usize,

    /// Embedded texts, in call order
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockEmbedder {
    /// Create a new mock embedder.
    pub fn new() -> Self {
        Self {
            embedding_dim: 64,
            ..Default::default()
        }
    }

    /// Add a predefined embedding for text.
    pub fn with_embedding(self, text: impl Into<String>, embedding: Vec<f32>) -> Self {
        self.embeddings
            .write()
            .unwrap()
            .insert(text.into(), embedding);
        self
    }

    /// Make embedding of `text` fail.
    pub fn failing_on(self, text: impl Into<String>) -> Self {
        self.failing.write().unwrap().insert(text.into());
        self
    }

    /// Get all texts embedded by this mock.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }

    /// Generate a deterministic embedding based on text.
    fn generate_deterministic_embedding(&self, text: &str) -> Vec<f32> {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        let hash = hasher.finalize();

        (0..self.embedding_dim)
            .map(|i| (hash[i % 32] as f32 / 127.5) - 1.0)
            .collect()
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.write().unwrap().push(text.to_string());

        if self.failing.read().unwrap().contains(text) {
            return Err(GroundingError::Embedding(format!(
                "mock embedding failure for '{}'",
                text
            )));
        }

        Ok(self
            .embeddings
            .read()
            .unwrap()
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.generate_deterministic_embedding(text)))
    }
}
