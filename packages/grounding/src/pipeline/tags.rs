//! Citation marker parsing.
//!
//! Two marker styles exist:
//!
//! - `[SRC:chunk_<digits>]` names a chunk id directly. Only the `SRC` token is
//!   case-insensitive; `chunk_` must be lowercase.
//! - `[CHUNK_<digits>]` names a 1-based position in the candidate list that was
//!   enumerated in a grounded-generation prompt. It only means something
//!   relative to that list, see [`rewrite_chunk_markers`].
//!
//! Absence of markers is normal and yields an empty list, never an error.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::types::question::{Candidate, ChunkId};

static RE_SRC_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(?i:src):chunk_([0-9]+)\]").unwrap());

static RE_INDEX_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[CHUNK_([0-9]+)\]").unwrap());

/// Extract chunk ids from `[SRC:chunk_<id>]` markers.
///
/// Unique ids in order of first appearance. Ids that overflow `i64` are skipped.
pub fn extract_citation_ids(text: &str) -> Vec<ChunkId> {
    let ids = unique_in_order(
        RE_SRC_MARKER
            .captures_iter(text)
            .filter_map(|cap| cap[1].parse::<ChunkId>().ok()),
    );
    debug!(count = ids.len(), ids = ?ids, "Extracted citation ids from answer");
    ids
}

/// Rewrite `[CHUNK_<n>]` markers as `[SRC:chunk_<id>]` using the prompt-time list.
///
/// Positions outside the list are left untouched, so they never resolve to an id.
pub fn rewrite_chunk_markers(text: &str, prompt_candidates: &[Candidate]) -> String {
    RE_INDEX_MARKER
        .replace_all(text, |cap: &regex::Captures| {
            cap[1]
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| prompt_candidates.get(i))
                .map(|c| format!("[SRC:chunk_{}]", c.chunk_id))
                .unwrap_or_else(|| cap[0].to_string())
        })
        .into_owned()
}

fn unique_in_order<T, I>(items: I) -> Vec<T>
where
    T: Copy + Eq + std::hash::Hash,
    I: IntoIterator<Item = T>,
{
    let mut seen = HashSet::new();
    items.into_iter().filter(|item| seen.insert(*item)).collect()
}
