//! MCP tool request and response types.

use serde::{Deserialize, Deserializer, Serialize};

// =============================================================================
// query_collection
// =============================================================================

/// Request body for the `query_collection` tool.
#[derive(Debug, Clone, Serialize)]
pub struct QueryCollectionRequest {
    pub collection_id: i64,
    pub question: String,
    pub max_sources: usize,
}

/// Response from `query_collection`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryCollectionResponse {
    /// Draft answer, possibly containing `[SRC:chunk_<id>]` markers
    #[serde(default)]
    pub answer: String,

    /// Candidate chunks with heuristic scores
    #[serde(default)]
    pub citations: Vec<CandidateChunk>,
}

/// A candidate chunk as returned by retrieval.
///
/// Every field is optional on the wire; entries without a `chunk_id`
/// cannot be cited and are dropped by consumers.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidateChunk {
    #[serde(default)]
    pub chunk_id: Option<i64>,

    #[serde(default)]
    pub score: Option<f32>,

    #[serde(default)]
    pub text: Option<String>,

    #[serde(default)]
    pub snippet: Option<String>,
}

// =============================================================================
// verify_chunk
// =============================================================================

/// Request body for the `verify_chunk` tool.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyChunkRequest {
    pub chunk_id: i64,
}

/// Ground-truth chunk record returned by `verify_chunk`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkRecord {
    pub chunk_id: i64,

    pub text: String,

    /// Paper identifiers are strings in some deployments and integers in others
    #[serde(default, deserialize_with = "string_or_number")]
    pub paper_id: Option<String>,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub page_num: Option<i64>,

    #[serde(default)]
    pub char_start: Option<i64>,

    #[serde(default)]
    pub char_end: Option<i64>,

    #[serde(default)]
    pub pdf_url: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}
