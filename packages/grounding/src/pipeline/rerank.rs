//! Semantic reranking of candidates against the draft answer.
//!
//! A best-effort refinement: if any embedding call fails the whole stage is
//! skipped and candidates come back exactly as they went in.

use std::cmp::Ordering;

use futures::future::try_join_all;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::traits::ai::Embedder;
use crate::types::question::Candidate;

/// Cosine similarity; 0.0 for empty, mismatched or zero-norm vectors.
///
/// Accumulates in `f64` and returns 0.0 for any non-finite result, so large
/// but finite components never produce NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| *x as f64 * *y as f64).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let similarity = (dot / (norm_a * norm_b)) as f32;
    if similarity.is_finite() {
        similarity
    } else {
        0.0
    }
}

/// Similarity descending with NaN last, then chunk id ascending.
fn compare_similarity(a: &Candidate, b: &Candidate) -> Ordering {
    let key = |c: &Candidate| c.similarity.filter(|s| !s.is_nan()).unwrap_or(f32::NEG_INFINITY);
    key(b).total_cmp(&key(a)).then(a.chunk_id.cmp(&b.chunk_id))
}

/// Rerank candidates, propagating the first embedding failure.
///
/// Candidates without text get similarity 0.0 and cost no embedding call.
/// The result is sorted by similarity descending (chunk id ascending on
/// ties) and the top candidate's score is raised by `boost`.
pub async fn try_rerank(
    embedder: &dyn Embedder,
    draft_answer: &str,
    candidates: Vec<Candidate>,
    boost: f32,
) -> Result<Vec<Candidate>> {
    let answer_vec = embedder.embed(draft_answer).await?;

    let vectors = try_join_all(candidates.iter().map(|c| async move {
        match c.text() {
            Some(text) => embedder.embed(text).await.map(Some),
            None => Ok(None),
        }
    }))
    .await?;

    let mut reranked: Vec<Candidate> = candidates
        .into_iter()
        .zip(vectors)
        .map(|(mut candidate, vector)| {
            candidate.similarity = Some(
                vector
                    .map(|v| cosine_similarity(&answer_vec, &v))
                    .unwrap_or(0.0),
            );
            candidate
        })
        .collect();

    reranked.sort_by(compare_similarity);

    if let Some(top) = reranked.first_mut() {
        top.score = Some(top.effective_score() + boost);
        info!(
            chunk_id = top.chunk_id,
            similarity = top.similarity.unwrap_or(0.0),
            "Top semantic match"
        );
    }

    Ok(reranked)
}

/// Rerank candidates, falling back to the input unchanged on any failure.
pub async fn rerank(
    embedder: &dyn Embedder,
    draft_answer: &str,
    candidates: Vec<Candidate>,
    boost: f32,
) -> Vec<Candidate> {
    if candidates.is_empty() || draft_answer.trim().is_empty() {
        debug!("Semantic ranking skipped: nothing to compare");
        return candidates;
    }

    match try_rerank(embedder, draft_answer, candidates.clone(), boost).await {
        Ok(reranked) => reranked,
        Err(e) => {
            warn!(error = %e, "Semantic ranking skipped");
            candidates
        }
    }
}
