//! Research agent: grounded retrieval followed by answer composition.
//!
//! The agent runs the orchestrator's retrieve, select and verify stages,
//! then asks the generator for a final answer built from the draft and the
//! verified citations. Each stage is recorded as a reasoning step, and
//! [`ResearchAgent::chat_stream`] emits those steps as they complete.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use async_stream::stream;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::{GroundingError, Result};
use crate::pipeline::orchestrator::{cancellable, GroundingOrchestrator};
use crate::pipeline::prompts::{format_compose_prompt, prompt_hash};
use crate::traits::{ai::Generator, retriever::Retriever, store::ChunkStore};
use crate::types::{
    citation::{Grounding, VerifiedCitation, UNGROUNDED_ANSWER},
    question::Question,
};

/// Final output of an agent run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub answer: String,
    pub citations: Vec<VerifiedCitation>,
    /// Human-readable trace, one line per stage
    pub reasoning: Vec<String>,
    pub model: String,
    /// Draft answer from retrieval
    pub initial_answer: String,
    pub grounding: Grounding,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentResponse {
    fn failed(
        error: &GroundingError,
        mut reasoning: Vec<String>,
        model: String,
        initial_answer: String,
        citations: Vec<VerifiedCitation>,
    ) -> Self {
        reasoning.push(format!("Error: {}", error));
        Self {
            answer: format!("I encountered an error: {}", error),
            citations,
            reasoning,
            model,
            initial_answer,
            grounding: Grounding::Failed,
            error: Some(error.to_string()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// One completed stage of an agent run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningStep {
    pub step: String,
    /// Seconds spent in the stage
    pub time_spent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Event emitted by [`ResearchAgent::chat_stream`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    Step(ReasoningStep),
    Done(AgentResponse),
}

/// Agent that answers research questions with verified citations.
pub struct ResearchAgent<R, S> {
    orchestrator: GroundingOrchestrator<R, S>,
    generator: Arc<dyn Generator>,
}

impl<R: Retriever, S: ChunkStore> ResearchAgent<R, S> {
    pub fn new(orchestrator: GroundingOrchestrator<R, S>, generator: Arc<dyn Generator>) -> Self {
        Self {
            orchestrator,
            generator,
        }
    }

    pub fn orchestrator(&self) -> &GroundingOrchestrator<R, S> {
        &self.orchestrator
    }

    /// Answer a question. Never fails: errors are reported in the response.
    pub async fn chat(&self, question: &Question) -> AgentResponse {
        let span = info_span!(
            "agent_chat",
            run_id = %Uuid::new_v4(),
            collection_id = question.collection_id,
            prompt_hash = %prompt_hash()
        );

        let response = async {
            let mut events = self.chat_stream(question);
            let mut response = None;
            while let Some(event) = events.next().await {
                if let AgentEvent::Done(done) = event {
                    response = Some(done);
                }
            }
            response
        }
        .instrument(span)
        .await;

        response.unwrap_or_else(|| {
            AgentResponse::failed(
                &GroundingError::Generation("agent stream ended without a response".into()),
                Vec::new(),
                self.generator.model_name().to_string(),
                String::new(),
                Vec::new(),
            )
        })
    }

    /// [`chat`](Self::chat), abandoned when `cancel` fires.
    pub async fn chat_with_cancel(
        &self,
        question: &Question,
        cancel: CancellationToken,
    ) -> Result<AgentResponse> {
        cancellable(&cancel, self.chat(question)).await
    }

    /// Answer a question, yielding each reasoning step as it completes.
    ///
    /// The last event is always [`AgentEvent::Done`].
    pub fn chat_stream(
        &self,
        question: &Question,
    ) -> Pin<Box<dyn Stream<Item = AgentEvent> + Send + '_>> {
        let question = question.clone();

        Box::pin(stream! {
            let started = Instant::now();
            let model = self.generator.model_name().to_string();
            let mut reasoning: Vec<String> = Vec::new();

            // Step 1: retrieval
            let step_started = Instant::now();
            let retrieval = match self.orchestrator.retrieve(&question).await {
                Ok(retrieval) => retrieval,
                Err(e) => {
                    let step = format!("Step 1: Querying collection {}", question.collection_id);
                    reasoning.push(step.clone());
                    yield AgentEvent::Step(ReasoningStep {
                        step,
                        time_spent: step_started.elapsed().as_secs_f64(),
                        error: Some(e.to_string()),
                    });
                    warn!(error = %e, "Agent chat failed");
                    yield AgentEvent::Done(AgentResponse::failed(&e, reasoning, model, String::new(), Vec::new()));
                    return;
                }
            };
            let step = format!(
                "Step 1: Queried collection {}, {} candidate chunks",
                question.collection_id,
                retrieval.candidates.len()
            );
            reasoning.push(step.clone());
            yield AgentEvent::Step(ReasoningStep {
                step,
                time_spent: step_started.elapsed().as_secs_f64(),
                error: None,
            });

            // Step 2: selection
            let step_started = Instant::now();
            let selection = self.orchestrator.select(&retrieval).await;
            let step = match selection.grounding {
                Grounding::Explicit => format!("Step 2: Found cited chunks {:?}", selection.chunk_ids()),
                Grounding::Inferred => format!(
                    "Step 2: No citations in answer, selected candidate chunks {:?}",
                    selection.chunk_ids()
                ),
                _ => "Step 2: No chunk could be selected".to_string(),
            };
            reasoning.push(step.clone());
            yield AgentEvent::Step(ReasoningStep {
                step,
                time_spent: step_started.elapsed().as_secs_f64(),
                error: None,
            });

            if selection.is_empty() {
                info!("Agent chat ungroundable");
                yield AgentEvent::Done(AgentResponse {
                    answer: UNGROUNDED_ANSWER.to_string(),
                    citations: Vec::new(),
                    reasoning,
                    model,
                    initial_answer: retrieval.draft_answer,
                    grounding: Grounding::Ungrounded,
                    error: None,
                });
                return;
            }

            // Step 3: verification
            let step_started = Instant::now();
            let citations = self.orchestrator.verify(&selection).await;
            let verified = citations.iter().filter(|c| c.is_verified()).count();
            let step = format!("Step 3: Verified {}/{} citations", verified, citations.len());
            reasoning.push(step.clone());
            yield AgentEvent::Step(ReasoningStep {
                step,
                time_spent: step_started.elapsed().as_secs_f64(),
                error: None,
            });

            // Step 4: composition
            let step_started = Instant::now();
            let prompt = format_compose_prompt(&question.text, &retrieval.draft_answer, &citations);
            let (composed, error) = match self.generator.generate(&prompt).await {
                Ok(text) if !text.trim().is_empty() => (text, None),
                Ok(_) => {
                    warn!("Composed answer was empty, using initial answer");
                    (retrieval.draft_answer.clone(), Some("empty generation".to_string()))
                }
                Err(e) => {
                    warn!(error = %e, "Answer composition failed, using initial answer");
                    (retrieval.draft_answer.clone(), Some(e.to_string()))
                }
            };
            let step = match error {
                None => format!("Step 4: Generated answer with {}", model),
                Some(_) => format!("Step 4: Generation with {} failed, kept initial answer", model),
            };
            reasoning.push(step.clone());
            yield AgentEvent::Step(ReasoningStep {
                step,
                time_spent: step_started.elapsed().as_secs_f64(),
                error,
            });

            let result = self.orchestrator.assemble(
                composed,
                &selection,
                citations,
                retrieval.candidates.len(),
            );

            info!(
                elapsed_secs = started.elapsed().as_secs_f64(),
                citations = result.citations.len(),
                "Agent chat completed"
            );

            yield AgentEvent::Done(AgentResponse {
                answer: result.answer,
                citations: result.citations,
                reasoning,
                model,
                initial_answer: retrieval.draft_answer,
                grounding: result.grounding,
                error: None,
            });
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockChunkStore, MockGenerator, MockRetriever};
    use crate::types::citation::ResolvedChunk;
    use crate::types::question::{Candidate, Retrieval};

    fn agent(
        retrieval: Retrieval,
        generator: MockGenerator,
    ) -> ResearchAgent<MockRetriever, MockChunkStore> {
        let store = MockChunkStore::new()
            .with_chunk(ResolvedChunk::new(42, "Transformers rely on attention.").with_title("Attention"));
        let orchestrator =
            GroundingOrchestrator::new(MockRetriever::new().with_retrieval(retrieval), store);
        ResearchAgent::new(orchestrator, Arc::new(generator))
    }

    #[tokio::test]
    async fn test_chat_composes_from_verified_citations() {
        let generator = MockGenerator::new().with_response("Attention is key [SRC:chunk_42].");
        let agent = agent(
            Retrieval::new("Draft [SRC:chunk_42].", vec![Candidate::new(42)]),
            generator.clone(),
        );

        let response = agent.chat(&Question::new(1, "What is attention?")).await;

        assert_eq!(response.answer, "Attention is key [SRC:chunk_42].");
        assert_eq!(response.initial_answer, "Draft [SRC:chunk_42].");
        assert_eq!(response.model, "mock-model");
        assert_eq!(response.reasoning.len(), 4);
        assert!(response.citations[0].is_verified());
        assert!(generator.prompts()[0].contains("- Attention (page N/A): Transformers rely on attention...."));
    }

    #[tokio::test]
    async fn test_failed_generation_keeps_draft() {
        let agent = agent(
            Retrieval::new("Draft [SRC:chunk_42].", vec![]),
            MockGenerator::new().failing("quota"),
        );

        let response = agent.chat(&Question::new(1, "q")).await;

        assert_eq!(response.answer, "Draft [SRC:chunk_42].");
        assert!(response.error.is_none());
        assert!(response.reasoning[3].contains("kept initial answer"));
    }

    #[tokio::test]
    async fn test_stream_ends_with_done() {
        let agent = agent(
            Retrieval::new("Draft.", vec![Candidate::new(42).with_score(0.4)]),
            MockGenerator::new().with_response("Final."),
        );

        let events: Vec<AgentEvent> = agent.chat_stream(&Question::new(1, "q")).collect().await;

        assert_eq!(events.len(), 5);
        assert!(events[..4].iter().all(|e| matches!(e, AgentEvent::Step(_))));
        match events.last() {
            Some(AgentEvent::Done(response)) => {
                assert_eq!(response.grounding, Grounding::Inferred);
                assert!(response.answer.starts_with("Final. Note:"));
            }
            other => panic!("expected Done, got {:?}", other),
        }
    }
}
