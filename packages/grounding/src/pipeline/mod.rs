//! Grounding pipeline - the core of the library.
//!
//! The pipeline orchestrates:
//! - Retrieval of a draft answer and candidate chunks
//! - Citation marker parsing (`[SRC:chunk_N]`, `[CHUNK_N]`)
//! - Semantic reranking against the draft (optional)
//! - Deterministic candidate selection
//! - Concurrent per-chunk verification
//! - Result assembly with inferred-citation disclosure

pub mod orchestrator;
pub mod prompts;
pub mod rerank;
pub mod select;
pub mod tags;
pub mod verify;

pub use orchestrator::{cancellable, GroundingOrchestrator, PipelineState, Selection};
pub use prompts::{format_compose_prompt, format_grounded_prompt, prompt_hash, COMPOSE_PROMPT, GROUNDED_PROMPT};
pub use rerank::{cosine_similarity, rerank, try_rerank};
pub use select::{rank_candidates, select, select_single_best, select_top_k};
pub use tags::{extract_citation_ids, rewrite_chunk_markers};
pub use verify::ChunkVerifier;
