//! Retriever and chunk store backed by the MCP REST service.

use async_trait::async_trait;
use mcp_client::{ChunkRecord, McpClient, McpError, QueryCollectionRequest, QueryCollectionResponse};
use tracing::debug;

use crate::error::{GroundingError, Result, VerificationError, VerificationResult};
use crate::traits::{retriever::Retriever, store::ChunkStore};
use crate::types::{
    citation::ResolvedChunk,
    question::{Candidate, ChunkId, Retrieval, RetrievalRequest},
};

impl From<McpError> for VerificationError {
    fn from(e: McpError) -> Self {
        match e {
            McpError::Timeout { .. } => VerificationError::Timeout,
            McpError::Status { status, body, .. } => VerificationError::Status {
                status,
                message: body,
            },
            McpError::Parse(msg) => VerificationError::Malformed(msg),
            McpError::Network(msg) => VerificationError::Network(msg),
        }
    }
}

/// Convert a `query_collection` response, dropping entries without a chunk id.
///
/// `snippet` stands in for `text` when retrieval sent only a snippet.
pub fn retrieval_from_response(response: QueryCollectionResponse) -> Retrieval {
    let total = response.citations.len();
    let candidates: Vec<Candidate> = response
        .citations
        .into_iter()
        .filter_map(|c| {
            let chunk_id = c.chunk_id?;
            Some(Candidate {
                chunk_id,
                score: c.score,
                text: c.text.or(c.snippet),
                similarity: None,
            })
        })
        .collect();

    if candidates.len() < total {
        debug!(
            dropped = total - candidates.len(),
            "Ignored candidates without chunk_id"
        );
    }

    Retrieval::new(response.answer, candidates)
}

impl From<ChunkRecord> for ResolvedChunk {
    fn from(record: ChunkRecord) -> Self {
        Self {
            chunk_id: record.chunk_id,
            text: record.text,
            paper_id: record.paper_id,
            title: record.title,
            page_num: record.page_num,
            char_start: record.char_start,
            char_end: record.char_end,
            pdf_url: record.pdf_url,
        }
    }
}

#[async_trait]
impl Retriever for McpClient {
    async fn query_collection(&self, request: &RetrievalRequest) -> Result<Retrieval> {
        let request = QueryCollectionRequest {
            collection_id: request.collection_id,
            question: request.question.clone(),
            max_sources: request.max_sources,
        };

        McpClient::query_collection(self, &request)
            .await
            .map(retrieval_from_response)
            .map_err(|e| GroundingError::Retrieval(e.to_string()))
    }
}

#[async_trait]
impl ChunkStore for McpClient {
    async fn verify_chunk(&self, chunk_id: ChunkId) -> VerificationResult<ResolvedChunk> {
        McpClient::verify_chunk(self, chunk_id)
            .await
            .map(ResolvedChunk::from)
            .map_err(VerificationError::from)
    }
}
