//! The grounding state machine.
//!
//! ```text
//! INIT -> RETRIEVED -> SELECTING -> VERIFYING -> DONE
//!                               \-> UNGROUNDABLE -> DONE
//! ```
//!
//! Retrieval failure is the only fatal error. Every other failure is
//! recovered inside its stage: embedding failures skip reranking, and
//! verification failures become FAILED citations.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::{GroundingError, Result};
use crate::pipeline::prompts::{format_grounded_prompt, prompt_hash};
use crate::pipeline::rerank::rerank;
use crate::pipeline::select::{rank_candidates, select};
use crate::pipeline::tags::{extract_citation_ids, rewrite_chunk_markers};
use crate::pipeline::verify::ChunkVerifier;
use crate::traits::{
    ai::{Embedder, Generator},
    retriever::Retriever,
    store::ChunkStore,
};
use crate::types::{
    citation::{Grounding, PipelineResult, VerifiedCitation, INFERRED_CITATIONS_NOTE},
    config::GroundingConfig,
    question::{Candidate, ChunkId, Question, Retrieval, RetrievalRequest},
};

/// Pipeline states, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Init,
    Retrieved,
    Selecting,
    Verifying,
    Ungroundable,
    Done,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PipelineState::Init => "INIT",
            PipelineState::Retrieved => "RETRIEVED",
            PipelineState::Selecting => "SELECTING",
            PipelineState::Verifying => "VERIFYING",
            PipelineState::Ungroundable => "UNGROUNDABLE",
            PipelineState::Done => "DONE",
        };
        f.write_str(s)
    }
}

/// Chunk ids chosen for verification, with their candidate scores.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Ids in selection order, each once
    pub selected: Vec<(ChunkId, Option<f32>)>,

    /// `Explicit` for markers, `Inferred` for the selector,
    /// `Ungrounded` when nothing was selected
    pub grounding: Grounding,
}

impl Selection {
    fn new(selected: Vec<(ChunkId, Option<f32>)>, grounding: Grounding) -> Self {
        if selected.is_empty() {
            return Self::empty();
        }
        Self {
            selected,
            grounding,
        }
    }

    fn empty() -> Self {
        Self {
            selected: Vec::new(),
            grounding: Grounding::Ungrounded,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn chunk_ids(&self) -> Vec<ChunkId> {
        self.selected.iter().map(|(id, _)| *id).collect()
    }
}

/// Run `fut` unless `cancel` fires first.
///
/// On cancellation `fut` is dropped at its current suspension point, so
/// in-flight calls produce nothing.
pub async fn cancellable<F, T>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = T>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(GroundingError::Cancelled),
        out = fut => Ok(out),
    }
}

/// Drives one question from retrieval to a verified citation set.
///
/// # Example
///
/// ```rust,ignore
/// use grounding::{GroundingOrchestrator, GroundingConfig, Question};
///
/// let orchestrator = GroundingOrchestrator::new(retriever, store)
///     .with_config(GroundingConfig::new().with_max_sources(3));
///
/// let result = orchestrator.run(&Question::new(1, "What is attention?")).await;
/// for citation in &result.citations {
///     println!("{} {:?}", citation.chunk_id, citation.verification_status);
/// }
/// ```
pub struct GroundingOrchestrator<R, S> {
    retriever: R,
    verifier: ChunkVerifier<S>,
    embedder: Option<Arc<dyn Embedder>>,
    generator: Option<Arc<dyn Generator>>,
    config: GroundingConfig,
}

impl<R: Retriever, S: ChunkStore> GroundingOrchestrator<R, S> {
    /// Create an orchestrator with default config, no embedder and no generator.
    pub fn new(retriever: R, store: S) -> Self {
        let config = GroundingConfig::default();
        Self {
            retriever,
            verifier: ChunkVerifier::new(store, config.snippet_chars),
            embedder: None,
            generator: None,
            config,
        }
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: GroundingConfig) -> Self {
        self.verifier = self.verifier.with_snippet_chars(config.snippet_chars);
        self.config = config;
        self
    }

    /// Enable semantic reranking with this embedder.
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Enable grounded generation with this generator.
    pub fn with_generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn config(&self) -> &GroundingConfig {
        &self.config
    }

    pub fn generator(&self) -> Option<&Arc<dyn Generator>> {
        self.generator.as_ref()
    }

    /// Run the pipeline for one question.
    ///
    /// Never fails: retrieval failure yields an error-flagged result.
    pub async fn run(&self, question: &Question) -> PipelineResult {
        let span = info_span!(
            "grounding_run",
            run_id = %Uuid::new_v4(),
            collection_id = question.collection_id,
            mode = "draft"
        );

        async {
            match self.retrieve(question).await {
                Ok(retrieval) => self.ground(retrieval).await,
                Err(e) => Self::fail(e),
            }
        }
        .instrument(span)
        .await
    }

    /// [`run`](Self::run), abandoned when `cancel` fires.
    pub async fn run_with_cancel(
        &self,
        question: &Question,
        cancel: CancellationToken,
    ) -> Result<PipelineResult> {
        cancellable(&cancel, self.run(question)).await
    }

    /// Run in grounded-generation mode.
    ///
    /// The generator answers from an enumerated candidate list and cites
    /// with `[CHUNK_n]` markers, which are resolved against that list.
    /// Without a generator, or when generation fails or comes back empty,
    /// the retrieval draft is grounded instead.
    pub async fn run_grounded(&self, question: &Question) -> PipelineResult {
        let span = info_span!(
            "grounding_run",
            run_id = %Uuid::new_v4(),
            collection_id = question.collection_id,
            mode = "grounded",
            prompt_hash = %prompt_hash()
        );

        async {
            let retrieval = match self.retrieve(question).await {
                Ok(retrieval) => retrieval,
                Err(e) => return Self::fail(e),
            };

            let Some(generator) = self.generator.as_ref() else {
                warn!("No generator configured, grounding the retrieval draft");
                return self.ground(retrieval).await;
            };

            let prompt_candidates: Vec<Candidate> = rank_candidates(&retrieval.candidates)
                .into_iter()
                .take(self.config.prompt_candidates)
                .cloned()
                .collect();
            if prompt_candidates.is_empty() {
                return self.ground(retrieval).await;
            }

            let prompt = format_grounded_prompt(
                &question.text,
                &prompt_candidates,
                self.config.prompt_snippet_chars,
            );

            match generator.generate(&prompt).await {
                Ok(text) if !text.trim().is_empty() => {
                    info!(
                        prompt_candidates = prompt_candidates.len(),
                        "Grounded generation complete"
                    );
                    let answer = rewrite_chunk_markers(&text, &prompt_candidates);
                    self.ground(Retrieval::new(answer, retrieval.candidates)).await
                }
                Ok(_) => {
                    warn!("Grounded generation was empty, using retrieval draft");
                    self.ground(retrieval).await
                }
                Err(e) => {
                    warn!(error = %e, "Grounded generation failed, using retrieval draft");
                    self.ground(retrieval).await
                }
            }
        }
        .instrument(span)
        .await
    }

    /// [`run_grounded`](Self::run_grounded), abandoned when `cancel` fires.
    pub async fn run_grounded_with_cancel(
        &self,
        question: &Question,
        cancel: CancellationToken,
    ) -> Result<PipelineResult> {
        cancellable(&cancel, self.run_grounded(question)).await
    }

    /// INIT -> RETRIEVED.
    pub async fn retrieve(&self, question: &Question) -> Result<Retrieval> {
        debug!(state = %PipelineState::Init, "Querying collection");

        let request = RetrievalRequest {
            collection_id: question.collection_id,
            question: question.text.clone(),
            max_sources: self.config.max_sources,
        };
        let retrieval = self.retriever.query_collection(&request).await?;

        info!(
            state = %PipelineState::Retrieved,
            candidates = retrieval.candidates.len(),
            "Retrieved candidates"
        );
        Ok(retrieval)
    }

    /// SELECTING: markers in the draft if any, otherwise the selector.
    pub async fn select(&self, retrieval: &Retrieval) -> Selection {
        debug!(state = %PipelineState::Selecting, "Selecting chunks");

        let marked = extract_citation_ids(&retrieval.draft_answer);
        if !marked.is_empty() {
            let selected = marked
                .into_iter()
                .take(self.config.max_sources)
                .map(|id| (id, retrieval.score_of(id)))
                .collect();
            return Selection::new(selected, Grounding::Explicit);
        }

        self.select_candidates(&retrieval.draft_answer, retrieval.candidates.clone())
            .await
    }

    async fn select_candidates(&self, draft_answer: &str, candidates: Vec<Candidate>) -> Selection {
        if candidates.is_empty() {
            return Selection::empty();
        }

        let candidates = match (&self.embedder, self.config.rerank) {
            (Some(embedder), true) => {
                rerank(
                    embedder.as_ref(),
                    draft_answer,
                    candidates,
                    self.config.rerank_boost,
                )
                .await
            }
            _ => candidates,
        };

        let ranked = rank_candidates(&candidates);
        let selected = select(&candidates, self.config.selection, self.config.max_sources)
            .into_iter()
            .map(|id| {
                let score = ranked
                    .iter()
                    .find(|c| c.chunk_id == id)
                    .and_then(|c| c.score);
                (id, score)
            })
            .collect();

        Selection::new(selected, Grounding::Inferred)
    }

    /// VERIFYING: one citation per selected id, in selection order.
    pub async fn verify(&self, selection: &Selection) -> Vec<VerifiedCitation> {
        info!(
            state = %PipelineState::Verifying,
            chunk_ids = ?selection.chunk_ids(),
            "Verifying chunks"
        );
        self.verifier.verify_all(&selection.selected).await
    }

    /// DONE: build the result. Inferred citations are disclosed in the answer.
    pub fn assemble(
        &self,
        draft_answer: String,
        selection: &Selection,
        citations: Vec<VerifiedCitation>,
        candidate_count: usize,
    ) -> PipelineResult {
        let answer = match selection.grounding {
            Grounding::Inferred => format!("{}{}", draft_answer, INFERRED_CITATIONS_NOTE),
            _ => draft_answer.clone(),
        };

        let result = PipelineResult {
            answer,
            citations,
            grounding: selection.grounding,
            draft_answer,
            candidate_count,
            error: None,
        };

        info!(
            state = %PipelineState::Done,
            grounding = ?result.grounding,
            citations = result.citations.len(),
            verified = result.verified_count(),
            "Grounding complete"
        );
        result
    }

    /// RETRIEVED -> DONE.
    async fn ground(&self, retrieval: Retrieval) -> PipelineResult {
        let candidate_count = retrieval.candidates.len();
        let selection = self.select(&retrieval).await;

        if selection.is_empty() {
            info!(state = %PipelineState::Ungroundable, candidate_count, "No chunk could be selected");
            return PipelineResult::ungrounded(retrieval.draft_answer, candidate_count);
        }

        let citations = self.verify(&selection).await;
        self.assemble(retrieval.draft_answer, &selection, citations, candidate_count)
    }

    fn fail(e: GroundingError) -> PipelineResult {
        error!(error = %e, "Retrieval failed");
        PipelineResult::failed(e)
    }
}
