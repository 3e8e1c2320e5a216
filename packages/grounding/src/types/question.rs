//! Pipeline inputs: the question and what retrieval returned for it.

use serde::{Deserialize, Serialize};

/// Chunk identifier as assigned by the chunk store.
pub type ChunkId = i64;

/// A question scoped to one document collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub collection_id: i64,
    pub text: String,
}

impl Question {
    pub fn new(collection_id: i64, text: impl Into<String>) -> Self {
        Self {
            collection_id,
            text: text.into(),
        }
    }
}

/// A retrieval-suggested chunk, not yet verified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub chunk_id: ChunkId,

    /// Heuristic relevance score (absent means 0.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,

    /// Chunk text as returned by retrieval
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Cosine similarity to the draft answer, set by reranking
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f32>,
}

impl Candidate {
    /// Create a candidate with no score or text.
    pub fn new(chunk_id: ChunkId) -> Self {
        Self {
            chunk_id,
            score: None,
            text: None,
            similarity: None,
        }
    }

    /// Set the retrieval score.
    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }

    /// Set the chunk text.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Score used for ranking.
    pub fn effective_score(&self) -> f32 {
        self.score.unwrap_or(0.0)
    }

    /// Text to embed or show in a prompt, if there is any.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.trim().is_empty())
    }
}

/// What retrieval returned for a question.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Retrieval {
    /// Draft answer, possibly containing citation markers
    pub draft_answer: String,

    /// Candidate chunks in retrieval order
    pub candidates: Vec<Candidate>,
}

impl Retrieval {
    pub fn new(draft_answer: impl Into<String>, candidates: Vec<Candidate>) -> Self {
        Self {
            draft_answer: draft_answer.into(),
            candidates,
        }
    }

    /// Score of a candidate by id, if retrieval returned it.
    pub fn score_of(&self, chunk_id: ChunkId) -> Option<f32> {
        self.candidates
            .iter()
            .find(|c| c.chunk_id == chunk_id)
            .and_then(|c| c.score)
    }
}

/// Retrieval request parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalRequest {
    pub collection_id: i64,
    pub question: String,
    pub max_sources: usize,
}
