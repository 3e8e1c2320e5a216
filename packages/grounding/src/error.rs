//! Typed errors for the grounding library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so callers can tell
//! fatal failures apart from the ones the pipeline recovers from.

use thiserror::Error;

/// Errors that can end or interrupt a pipeline run.
#[derive(Debug, Error)]
pub enum GroundingError {
    /// Retrieval call unreachable or non-success. Fatal to the run.
    #[error("retrieval failed: {0}")]
    Retrieval(String),

    /// Embedding call failed. The reranking stage recovers from this.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Answer generation failed
    #[error("generation error: {0}")]
    Generation(String),

    /// Operation was cancelled by the caller
    #[error("operation cancelled")]
    Cancelled,
}

/// Why a single chunk could not be verified.
///
/// Always recovered: it becomes a FAILED citation and never aborts the run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VerificationError {
    /// Network failure reaching the chunk store
    #[error("network error: {0}")]
    Network(String),

    /// The call did not finish within its timeout
    #[error("verification timed out")]
    Timeout,

    /// Non-success response from the chunk store
    #[error("chunk store returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// Response could not be parsed
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The store resolved a different chunk than the one requested
    #[error("requested chunk {requested} but store returned chunk {returned}")]
    Mismatch { requested: i64, returned: i64 },
}

/// Result type alias for grounding operations.
pub type Result<T> = std::result::Result<T, GroundingError>;

/// Result type alias for single-chunk verification.
pub type VerificationResult<T> = std::result::Result<T, VerificationError>;
