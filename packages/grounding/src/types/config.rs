//! Configuration for the grounding pipeline.

use serde::{Deserialize, Serialize};

/// How candidates are chosen when the answer declares no citations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Take up to `max_sources` candidates by descending score.
    #[default]
    TopK,

    /// Take only the single best candidate.
    SingleBest,
}

/// Configuration for a grounding pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundingConfig {
    /// Upper bound on citations per result. Default: 5.
    pub max_sources: usize,

    /// Selection policy for inferred grounding. Default: TopK.
    pub selection: SelectionPolicy,

    /// Rerank candidates by similarity to the draft before selection.
    ///
    /// Only takes effect when an embedder is configured. Default: true.
    pub rerank: bool,

    /// Score boost for the top reranked candidate. Default: 1.0.
    pub rerank_boost: f32,

    /// Characters of chunk text kept in a citation snippet. Default: 200.
    pub snippet_chars: usize,

    /// Candidates enumerated in a grounded-generation prompt. Default: 8.
    pub prompt_candidates: usize,

    /// Characters of candidate text shown per prompt entry. Default: 600.
    pub prompt_snippet_chars: usize,
}

impl Default for GroundingConfig {
    fn default() -> Self {
        Self {
            max_sources: 5,
            selection: SelectionPolicy::TopK,
            rerank: true,
            rerank_boost: 1.0,
            snippet_chars: 200,
            prompt_candidates: 8,
            prompt_snippet_chars: 600,
        }
    }
}

impl GroundingConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the citation cap.
    pub fn with_max_sources(mut self, max_sources: usize) -> Self {
        self.max_sources = max_sources;
        self
    }

    /// Set the selection policy.
    pub fn with_selection(mut self, selection: SelectionPolicy) -> Self {
        self.selection = selection;
        self
    }

    /// Enable or disable reranking.
    pub fn with_rerank(mut self, rerank: bool) -> Self {
        self.rerank = rerank;
        self
    }

    /// Set the rerank boost.
    pub fn with_rerank_boost(mut self, boost: f32) -> Self {
        self.rerank_boost = boost;
        self
    }

    /// Set the snippet length.
    pub fn with_snippet_chars(mut self, chars: usize) -> Self {
        self.snippet_chars = chars;
        self
    }

    /// Set how many candidates a grounded prompt enumerates.
    pub fn with_prompt_candidates(mut self, count: usize) -> Self {
        self.prompt_candidates = count;
        self
    }
}
