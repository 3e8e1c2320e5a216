//! Per-chunk verification against the ground-truth store.

use futures::future::join_all;
use tracing::{info, warn};

use crate::error::{VerificationError, VerificationResult};
use crate::traits::store::ChunkStore;
use crate::types::citation::{ResolvedChunk, VerifiedCitation};
use crate::types::question::ChunkId;

/// Resolves selected chunk ids into citations.
///
/// Each id is verified independently: one failure never stops the others,
/// and every id yields exactly one citation.
pub struct ChunkVerifier<S> {
    store: S,
    snippet_chars: usize,
}

impl<S: ChunkStore> ChunkVerifier<S> {
    pub fn new(store: S, snippet_chars: usize) -> Self {
        Self {
            store,
            snippet_chars,
        }
    }

    /// Set the snippet length.
    pub fn with_snippet_chars(mut self, snippet_chars: usize) -> Self {
        self.snippet_chars = snippet_chars;
        self
    }

    /// Resolve one chunk id.
    ///
    /// A record for a different id than the one requested is rejected.
    pub async fn verify(&self, chunk_id: ChunkId) -> VerificationResult<ResolvedChunk> {
        let chunk = self.store.verify_chunk(chunk_id).await?;
        if chunk.chunk_id != chunk_id {
            return Err(VerificationError::Mismatch {
                requested: chunk_id,
                returned: chunk.chunk_id,
            });
        }
        Ok(chunk)
    }

    /// Verify one chunk id and wrap the outcome as a citation.
    pub async fn verify_citation(&self, chunk_id: ChunkId, score: Option<f32>) -> VerifiedCitation {
        match self.verify(chunk_id).await {
            Ok(chunk) => {
                info!(
                    chunk_id,
                    title = chunk.title.as_deref().unwrap_or("N/A"),
                    "Verified chunk"
                );
                VerifiedCitation::verified(chunk_id, chunk, score, self.snippet_chars)
            }
            Err(e) => {
                warn!(chunk_id, error = %e, "verify_chunk failed");
                VerifiedCitation::failed(chunk_id, &e, score)
            }
        }
    }

    /// Verify all selected ids concurrently.
    ///
    /// Citations come back in selection order, not completion order.
    pub async fn verify_all(&self, selection: &[(ChunkId, Option<f32>)]) -> Vec<VerifiedCitation> {
        join_all(
            selection
                .iter()
                .map(|&(chunk_id, score)| self.verify_citation(chunk_id, score)),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockChunkStore;
    use crate::types::citation::VerificationStatus;

    #[tokio::test]
    async fn test_partial_failure_keeps_every_citation() {
        let store = MockChunkStore::new()
            .with_chunk(ResolvedChunk::new(1, "one").with_title("Paper A"))
            .with_chunk(ResolvedChunk::new(3, "three").with_title("Paper C"))
            .with_failure(2, VerificationError::Status {
                status: 500,
                message: "boom".into(),
            });
        let verifier = ChunkVerifier::new(store, 200);

        let citations = verifier
            .verify_all(&[(1, Some(0.9)), (2, None), (3, Some(0.1))])
            .await;

        let ids: Vec<_> = citations.iter().map(|c| c.chunk_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(citations[0].verification_status, VerificationStatus::Verified);
        assert_eq!(citations[1].verification_status, VerificationStatus::Failed);
        assert!(citations[1].error.is_some());
        assert_eq!(citations[2].paper_title.as_deref(), Some("Paper C"));
        assert_eq!(citations[0].score, Some(0.9));
    }

    #[tokio::test]
    async fn test_unknown_chunk_fails() {
        let verifier = ChunkVerifier::new(MockChunkStore::new(), 200);
        let citation = verifier.verify_citation(99, None).await;
        assert_eq!(citation.verification_status, VerificationStatus::Failed);
        assert!(citation.snippet.is_none());
    }

    #[tokio::test]
    async fn test_mismatched_record_is_rejected() {
        let store = MockChunkStore::new().with_alias(5, ResolvedChunk::new(6, "six"));
        let verifier = ChunkVerifier::new(store, 200);

        let err = verifier.verify(5).await.unwrap_err();
        assert_eq!(
            err,
            VerificationError::Mismatch {
                requested: 5,
                returned: 6
            }
        );
    }

    #[tokio::test]
    async fn test_each_id_is_requested_once() {
        let store = MockChunkStore::new().with_chunk(ResolvedChunk::new(1, "one"));
        let verifier = ChunkVerifier::new(store.clone(), 200);

        verifier.verify_all(&[(1, None), (4, None)]).await;

        assert_eq!(store.requested(), vec![1, 4]);
    }
}
