//! Grounded generation and research agent runs against mock services.

use std::sync::Arc;

use futures::StreamExt;
use grounding::{
    testing::{MockChunkStore, MockGenerator, MockRetriever},
    AgentEvent, Candidate, Grounding, GroundingConfig, GroundingOrchestrator, Question,
    ResearchAgent, ResolvedChunk, Retrieval, INFERRED_CITATIONS_NOTE, UNGROUNDED_ANSWER,
};

fn store_with(ids: &[i64]) -> MockChunkStore {
    ids.iter().fold(MockChunkStore::new(), |store, &id| {
        store.with_chunk(ResolvedChunk::new(id, format!("Text of chunk {}", id)))
    })
}

fn question() -> Question {
    Question::new(3, "How does attention work?")
}

/// Candidates whose score order differs from retrieval order.
fn shuffled_retrieval() -> Retrieval {
    Retrieval::new(
        "Draft without markers.",
        vec![
            Candidate::new(30).with_score(0.1).with_text("low"),
            Candidate::new(10).with_score(0.9).with_text("high"),
            Candidate::new(20).with_score(0.5).with_text("mid"),
        ],
    )
}

// ============================================================================
// Grounded generation
// ============================================================================

#[tokio::test]
async fn test_chunk_markers_resolve_against_prompt_order() {
    let generator = MockGenerator::new().with_response("Mid fact [CHUNK_2]. High fact [CHUNK_1].");
    let orch = GroundingOrchestrator::new(
        MockRetriever::new().with_retrieval(shuffled_retrieval()),
        store_with(&[10, 20, 30]),
    )
    .with_generator(Arc::new(generator.clone()));

    let result = orch.run_grounded(&question()).await;

    let ids: Vec<_> = result.citations.iter().map(|c| c.chunk_id).collect();
    assert_eq!(ids, vec![20, 10]);
    assert_eq!(result.grounding, Grounding::Explicit);
    assert_eq!(
        result.answer,
        "Mid fact [SRC:chunk_20]. High fact [SRC:chunk_10]."
    );

    let prompt = &generator.prompts()[0];
    assert!(prompt.contains("[CHUNK_1]\nhigh"));
    assert!(prompt.contains("[CHUNK_2]\nmid"));
    assert!(prompt.contains("[CHUNK_3]\nlow"));
}

#[tokio::test]
async fn test_out_of_range_markers_are_dropped() {
    let generator = MockGenerator::new().with_response("Fact [CHUNK_9]. Other [CHUNK_1].");
    let orch = GroundingOrchestrator::new(
        MockRetriever::new().with_retrieval(shuffled_retrieval()),
        store_with(&[10, 20, 30]),
    )
    .with_generator(Arc::new(generator));

    let result = orch.run_grounded(&question()).await;

    let ids: Vec<_> = result.citations.iter().map(|c| c.chunk_id).collect();
    assert_eq!(ids, vec![10]);
}

#[tokio::test]
async fn test_prompt_candidates_limit_the_enumeration() {
    let generator = MockGenerator::new().with_response("Fact [CHUNK_3].");
    let orch = GroundingOrchestrator::new(
        MockRetriever::new().with_retrieval(shuffled_retrieval()),
        store_with(&[10, 20, 30]),
    )
    .with_config(GroundingConfig::new().with_prompt_candidates(2))
    .with_generator(Arc::new(generator.clone()));

    let result = orch.run_grounded(&question()).await;

    assert!(!generator.prompts()[0].contains("[CHUNK_3]"));
    // [CHUNK_3] is outside the prompt list, so the selector takes over
    assert_eq!(result.grounding, Grounding::Inferred);
}

#[tokio::test]
async fn test_unmarked_generation_uses_selector_with_note() {
    let generator = MockGenerator::new().with_response("Attention weighs tokens.");
    let orch = GroundingOrchestrator::new(
        MockRetriever::new().with_retrieval(shuffled_retrieval()),
        store_with(&[10, 20, 30]),
    )
    .with_config(GroundingConfig::new().with_max_sources(2))
    .with_generator(Arc::new(generator));

    let result = orch.run_grounded(&question()).await;

    let ids: Vec<_> = result.citations.iter().map(|c| c.chunk_id).collect();
    assert_eq!(ids, vec![10, 20]);
    assert_eq!(
        result.answer,
        format!("Attention weighs tokens.{}", INFERRED_CITATIONS_NOTE)
    );
}

#[tokio::test]
async fn test_failed_generation_grounds_the_draft() {
    let retrieval = Retrieval::new("Draft [SRC:chunk_30].", shuffled_retrieval().candidates);
    let orch = GroundingOrchestrator::new(
        MockRetriever::new().with_retrieval(retrieval),
        store_with(&[10, 20, 30]),
    )
    .with_generator(Arc::new(MockGenerator::new().failing("quota exceeded")));

    let result = orch.run_grounded(&question()).await;

    assert_eq!(result.answer, "Draft [SRC:chunk_30].");
    assert_eq!(result.citations[0].chunk_id, 30);
}

#[tokio::test]
async fn test_empty_generation_grounds_the_draft() {
    let orch = GroundingOrchestrator::new(
        MockRetriever::new().with_retrieval(shuffled_retrieval()),
        store_with(&[10, 20, 30]),
    )
    .with_generator(Arc::new(MockGenerator::new().with_response("   ")));

    let result = orch.run_grounded(&question()).await;

    assert_eq!(result.draft_answer, "Draft without markers.");
    assert_eq!(result.grounding, Grounding::Inferred);
}

#[tokio::test]
async fn test_grounded_without_candidates_is_ungroundable() {
    let generator = MockGenerator::new().with_response("Anything [CHUNK_1].");
    let orch = GroundingOrchestrator::new(
        MockRetriever::new().with_retrieval(Retrieval::new("Draft.", vec![])),
        MockChunkStore::new(),
    )
    .with_generator(Arc::new(generator.clone()));

    let result = orch.run_grounded(&question()).await;

    assert_eq!(result.answer, UNGROUNDED_ANSWER);
    assert!(generator.prompts().is_empty());
}

// ============================================================================
// Research agent
// ============================================================================

fn agent(
    retrieval: Retrieval,
    generator: MockGenerator,
) -> ResearchAgent<MockRetriever, MockChunkStore> {
    let orchestrator = GroundingOrchestrator::new(
        MockRetriever::new().with_retrieval(retrieval),
        store_with(&[10, 20, 30]),
    );
    ResearchAgent::new(orchestrator, Arc::new(generator))
}

#[tokio::test]
async fn test_agent_retrieval_failure_reports_error() {
    let orchestrator = GroundingOrchestrator::new(
        MockRetriever::new().failing("mcp down"),
        MockChunkStore::new(),
    );
    let agent = ResearchAgent::new(orchestrator, Arc::new(MockGenerator::new()));

    let response = agent.chat(&question()).await;

    assert!(response.answer.starts_with("I encountered an error:"));
    assert!(response.answer.contains("mcp down"));
    assert!(response.error.is_some());
    assert!(response.citations.is_empty());
    assert!(response.reasoning.last().unwrap().starts_with("Error:"));
}

#[tokio::test]
async fn test_agent_ungroundable_skips_generation() {
    let generator = MockGenerator::new().with_response("should not be used");
    let agent = agent(Retrieval::new("Draft.", vec![]), generator.clone());

    let response = agent.chat(&question()).await;

    assert_eq!(response.answer, UNGROUNDED_ANSWER);
    assert!(response.citations.is_empty());
    assert!(generator.prompts().is_empty());
}

#[tokio::test]
async fn test_agent_selection_ignores_retrieval_order() {
    let agent = agent(shuffled_retrieval(), MockGenerator::new().with_response("Final."));

    let response = agent.chat(&question()).await;

    let ids: Vec<_> = response.citations.iter().map(|c| c.chunk_id).collect();
    assert_eq!(ids, vec![10, 20, 30]);
    assert_eq!(response.grounding, Grounding::Inferred);
}

#[tokio::test]
async fn test_agent_stream_reports_each_stage() {
    let agent = agent(shuffled_retrieval(), MockGenerator::new().with_response("Final."));

    let events: Vec<AgentEvent> = agent.chat_stream(&question()).collect().await;

    let steps: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            AgentEvent::Step(step) => Some(step.step.clone()),
            AgentEvent::Done(_) => None,
        })
        .collect();
    assert_eq!(steps.len(), 4);
    assert!(steps[0].starts_with("Step 1"));
    assert!(steps[3].starts_with("Step 4"));
    assert!(matches!(events.last(), Some(AgentEvent::Done(_))));
}
