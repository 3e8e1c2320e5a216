//! Grounded Citation Library
//!
//! Turns an answer produced by a retrieval service into an answer whose
//! citations have each been checked against the authoritative chunk store.
//!
//! # Design Philosophy
//!
//! **"Never cite what you haven't verified"**
//!
//! - Citations the answer declares (`[SRC:chunk_N]`) are honoured in order
//! - When none are declared, candidates are picked deterministically and the
//!   answer says so
//! - Every selected chunk is verified; failures are reported, not hidden
//! - When nothing can be selected the answer is "I don't know"
//!
//! # Usage
//!
//! ```rust,ignore
//! use grounding::{GroundingOrchestrator, Question};
//! use grounding::testing::{MockChunkStore, MockRetriever};
//!
//! let orchestrator = GroundingOrchestrator::new(MockRetriever::new(), MockChunkStore::new());
//! let result = orchestrator.run(&Question::new(1, "What is attention?")).await;
//! println!("{} ({} citations)", result.answer, result.citations.len());
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Core trait abstractions (Retriever, ChunkStore, Generator, Embedder)
//! - [`types`] - Questions, candidates, citations and results
//! - [`pipeline`] - Marker parsing, reranking, selection, verification and orchestration
//! - [`agent`] - Research agent with answer composition and reasoning trace
//! - [`ai`] - Gemini generator and embedder (feature `gemini`)
//! - [`mcp`] - Retriever and chunk store over the MCP service (feature `mcp`)
//! - [`testing`] - Mock implementations for testing

pub mod agent;
pub mod ai;
pub mod error;
pub mod pipeline;
pub mod testing;
pub mod traits;
pub mod types;

#[cfg(feature = "mcp")]
pub mod mcp;

// Re-export core types at crate root
pub use agent::{AgentEvent, AgentResponse, ReasoningStep, ResearchAgent};
pub use error::{GroundingError, Result, VerificationError, VerificationResult};
pub use pipeline::{cancellable, ChunkVerifier, GroundingOrchestrator, PipelineState, Selection};
pub use traits::{
    ai::{Embedder, Generator},
    retriever::Retriever,
    store::ChunkStore,
};
pub use types::{
    citation::{
        Grounding, PipelineResult, ResolvedChunk, VerificationStatus, VerifiedCitation,
        INFERRED_CITATIONS_NOTE, RETRIEVAL_FAILED_ANSWER, UNGROUNDED_ANSWER,
    },
    config::{GroundingConfig, SelectionPolicy},
    question::{Candidate, ChunkId, Question, Retrieval, RetrievalRequest},
};

#[cfg(feature = "gemini")]
pub use ai::Gemini;
