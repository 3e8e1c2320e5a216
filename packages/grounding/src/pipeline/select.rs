//! Candidate selection when the answer declares no citations.
//!
//! Retrieval order is never trusted. Candidates are ranked by descending
//! score and ties go to the lowest chunk id, so equal scores always produce
//! the same selection.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::types::config::SelectionPolicy;
use crate::types::question::{Candidate, ChunkId};

/// Ranking order: score descending, then chunk id ascending. NaN scores last.
pub fn compare_candidates(a: &Candidate, b: &Candidate) -> Ordering {
    let (sa, sb) = (a.effective_score(), b.effective_score());
    let by_score = match (sa.is_nan(), sb.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => sb.partial_cmp(&sa).unwrap_or(Ordering::Equal),
    };
    by_score.then(a.chunk_id.cmp(&b.chunk_id))
}

/// Candidates in ranking order, each chunk id once (its best-ranked entry).
pub fn rank_candidates(candidates: &[Candidate]) -> Vec<&Candidate> {
    let mut ranked: Vec<&Candidate> = candidates.iter().collect();
    ranked.sort_by(|a, b| compare_candidates(a, b));

    let mut seen = HashSet::new();
    ranked.retain(|c| seen.insert(c.chunk_id));
    ranked
}

/// Top-k policy: the first `max_sources` ids in ranking order.
pub fn select_top_k(candidates: &[Candidate], max_sources: usize) -> Vec<ChunkId> {
    rank_candidates(candidates)
        .into_iter()
        .take(max_sources)
        .map(|c| c.chunk_id)
        .collect()
}

/// Single-best policy: the candidate maximizing `(score, -chunk_id)`.
pub fn select_single_best(candidates: &[Candidate]) -> Option<ChunkId> {
    candidates
        .iter()
        .min_by(|a, b| compare_candidates(a, b))
        .map(|c| c.chunk_id)
}

/// Select chunk ids under `policy`, never more than `max_sources`.
///
/// Empty input gives an empty selection, which the orchestrator treats as
/// the ungroundable case.
pub fn select(candidates: &[Candidate], policy: SelectionPolicy, max_sources: usize) -> Vec<ChunkId> {
    match policy {
        SelectionPolicy::TopK => select_top_k(candidates, max_sources),
        SelectionPolicy::SingleBest if max_sources == 0 => Vec::new(),
        SelectionPolicy::SingleBest => select_single_best(candidates).into_iter().collect(),
    }
}
