//! Retrieval: the black box that turns a question into candidates.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::question::{Retrieval, RetrievalRequest};

/// Retrieval service.
///
/// Implementations return the draft answer and candidate chunks for a
/// question. Any failure is reported as `GroundingError::Retrieval`; the
/// orchestrator treats it as fatal for the run.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn query_collection(&self, request: &RetrievalRequest) -> Result<Retrieval>;
}
