//! The ground-truth chunk store.

use async_trait::async_trait;

use crate::error::VerificationResult;
use crate::types::{citation::ResolvedChunk, question::ChunkId};

/// Authoritative chunk store used for verification.
///
/// `verify_chunk` resolves one id. Implementations own transport retries
/// and timeouts; the pipeline calls each id exactly once per run.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    async fn verify_chunk(&self, chunk_id: ChunkId) -> VerificationResult<ResolvedChunk>;
}
