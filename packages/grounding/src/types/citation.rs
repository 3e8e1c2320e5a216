//! Verified citations and the pipeline's externally visible result.

use serde::{Deserialize, Serialize};

use super::question::ChunkId;
use crate::error::VerificationError;

/// Sentinel answer when no chunk can be selected by any method.
pub const UNGROUNDED_ANSWER: &str = "I don't know";

/// Answer placed in the result when retrieval fails.
pub const RETRIEVAL_FAILED_ANSWER: &str = "query_failed";

/// Disclosure appended when citations were inferred rather than declared.
pub const INFERRED_CITATIONS_NOTE: &str =
    " Note: citations were not provided by the model; system appended candidate citations for verification.";

/// Ground-truth chunk record from the chunk store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedChunk {
    pub chunk_id: ChunkId,
    pub text: String,
    pub paper_id: Option<String>,
    pub title: Option<String>,
    pub page_num: Option<i64>,
    pub char_start: Option<i64>,
    pub char_end: Option<i64>,
    pub pdf_url: Option<String>,
}

impl ResolvedChunk {
    /// Minimal record with only id and text.
    pub fn new(chunk_id: ChunkId, text: impl Into<String>) -> Self {
        Self {
            chunk_id,
            text: text.into(),
            paper_id: None,
            title: None,
            page_num: None,
            char_start: None,
            char_end: None,
            pdf_url: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_page(mut self, page_num: i64) -> Self {
        self.page_num = Some(page_num);
        self
    }

    pub fn with_paper_id(mut self, paper_id: impl Into<String>) -> Self {
        self.paper_id = Some(paper_id.into());
        self
    }

    pub fn with_pdf_url(mut self, pdf_url: impl Into<String>) -> Self {
        self.pdf_url = Some(pdf_url.into());
        self
    }

    pub fn with_span(mut self, char_start: i64, char_end: i64) -> Self {
        self.char_start = Some(char_start);
        self.char_end = Some(char_end);
        self
    }
}

/// Outcome of verifying one chunk id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Verified,
    Failed,
}

/// One citation, produced exactly once per selected chunk id.
///
/// Only the two constructors create values, so a FAILED citation can never
/// carry display fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiedCitation {
    pub chunk_id: ChunkId,
    pub verification_status: VerificationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paper_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_num: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paper_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub char_start: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub char_end: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VerifiedCitation {
    /// Citation for a chunk the store resolved.
    ///
    /// `chunk_id` is the requested id; the snippet is the chunk text cut to
    /// `snippet_chars` characters.
    pub fn verified(
        chunk_id: ChunkId,
        chunk: ResolvedChunk,
        score: Option<f32>,
        snippet_chars: usize,
    ) -> Self {
        Self {
            chunk_id,
            verification_status: VerificationStatus::Verified,
            paper_title: chunk.title,
            page_num: chunk.page_num,
            snippet: Some(truncate_chars(&chunk.text, snippet_chars)),
            pdf_url: chunk.pdf_url,
            paper_id: chunk.paper_id,
            char_start: chunk.char_start,
            char_end: chunk.char_end,
            score,
            error: None,
        }
    }

    /// Citation for a chunk that could not be verified.
    pub fn failed(chunk_id: ChunkId, error: &VerificationError, score: Option<f32>) -> Self {
        Self {
            chunk_id,
            verification_status: VerificationStatus::Failed,
            paper_title: None,
            page_num: None,
            snippet: None,
            pdf_url: None,
            paper_id: None,
            char_start: None,
            char_end: None,
            score,
            error: Some(error.to_string()),
        }
    }

    pub fn is_verified(&self) -> bool {
        self.verification_status == VerificationStatus::Verified
    }
}

/// How the citation set of a result was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grounding {
    /// The answer declared its citations with markers
    Explicit,
    /// The system picked candidates because the answer declared none
    Inferred,
    /// Nothing could be selected
    Ungrounded,
    /// Retrieval failed; no citations were attempted
    Failed,
}

/// The externally visible output of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub answer: String,
    pub citations: Vec<VerifiedCitation>,
    pub grounding: Grounding,
    /// Draft answer as it came from retrieval or generation
    #[serde(default)]
    pub draft_answer: String,
    /// Number of candidates retrieval returned
    #[serde(default)]
    pub candidate_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PipelineResult {
    /// Terminal result when no chunk can be selected.
    pub fn ungrounded(draft_answer: impl Into<String>, candidate_count: usize) -> Self {
        Self {
            answer: UNGROUNDED_ANSWER.to_string(),
            citations: Vec::new(),
            grounding: Grounding::Ungrounded,
            draft_answer: draft_answer.into(),
            candidate_count,
            error: None,
        }
    }

    /// Error-flagged result for a fatal failure.
    pub fn failed(error: impl std::fmt::Display) -> Self {
        Self {
            answer: RETRIEVAL_FAILED_ANSWER.to_string(),
            citations: Vec::new(),
            grounding: Grounding::Failed,
            draft_answer: String::new(),
            candidate_count: 0,
            error: Some(error.to_string()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn verified_count(&self) -> usize {
        self.citations.iter().filter(|c| c.is_verified()).count()
    }
}

/// Cut `text` to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
