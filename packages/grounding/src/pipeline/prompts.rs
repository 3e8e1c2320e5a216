//! LLM prompts for answer composition and grounded generation.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use sha2::{Digest, Sha256};

use crate::types::citation::{truncate_chars, VerifiedCitation};
use crate::types::question::Candidate;

/// Characters of each citation snippet shown in the compose prompt.
pub const COMPOSE_SNIPPET_CHARS: usize = 100;

/// Prompt for composing a final answer from a draft and verified citations.
pub const COMPOSE_PROMPT: &str = r#"You are Cortex Assistant, an AI agent helping researchers understand research papers.

User Question: {question}

Initial Answer from Collection Query:
{initial_answer}

Verified Citations:
{citations}

Based on the initial answer and verified citations above, provide a comprehensive, well-structured answer that:
1. Directly addresses the user's question
2. Incorporates information from the verified citations
3. Includes paper titles and page numbers where relevant
4. Is clear, accurate, and well-formatted

Answer:"#;

/// Prompt for answering from an enumerated list of chunks.
pub const GROUNDED_PROMPT: &str = r#"Answer the question using only the numbered sources below.

After every sentence that relies on a source, cite it with its marker, for example [CHUNK_2].
Cite only sources that appear in the list. If the sources do not contain the answer, say that you don't know.

Question: {question}

Sources:
{sources}

Answer:"#;

/// Hash of both prompts, logged with runs so answers can be traced to a prompt version.
pub fn prompt_hash() -> String {
    let mut hasher = Sha256::new();
    hasher.update(COMPOSE_PROMPT.as_bytes());
    hasher.update(GROUNDED_PROMPT.as_bytes());
    format!("{:x}", hasher.finalize())
}

static RE_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-z_]+)\}").unwrap());

/// Fill `{name}` placeholders in one pass.
///
/// Substituted text is never rescanned, so braces inside a question, draft
/// or snippet come through literally. Unknown placeholders are kept.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    RE_PLACEHOLDER
        .replace_all(template, |cap: &Captures| {
            values
                .iter()
                .find(|(name, _)| *name == &cap[1])
                .map(|(_, value)| value.to_string())
                .unwrap_or_else(|| cap[0].to_string())
        })
        .into_owned()
}

/// Format the compose prompt. Only verified citations are listed.
pub fn format_compose_prompt(
    question: &str,
    initial_answer: &str,
    citations: &[VerifiedCitation],
) -> String {
    let citations_text = citations
        .iter()
        .filter(|c| c.is_verified())
        .map(|c| {
            let page = c
                .page_num
                .map(|p| p.to_string())
                .unwrap_or_else(|| "N/A".to_string());
            format!(
                "- {} (page {}): {}...",
                c.paper_title.as_deref().unwrap_or("Unknown"),
                page,
                truncate_chars(c.snippet.as_deref().unwrap_or(""), COMPOSE_SNIPPET_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    fill_template(
        COMPOSE_PROMPT,
        &[
            ("question", question),
            ("initial_answer", initial_answer),
            ("citations", &citations_text),
        ],
    )
}

/// Format the grounded prompt.
///
/// `candidates[i]` is shown as `[CHUNK_{i+1}]`; the same slice must be used
/// to resolve the markers in the generation.
pub fn format_grounded_prompt(question: &str, candidates: &[Candidate], snippet_chars: usize) -> String {
    let sources_text = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| {
            format!(
                "[CHUNK_{}]\n{}\n",
                i + 1,
                truncate_chars(c.text().unwrap_or(""), snippet_chars)
            )
        })
        .collect::<Vec<_>>()
        .join("\n---\n");

    fill_template(
        GROUNDED_PROMPT,
        &[("question", question), ("sources", &sources_text)],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VerificationError;
    use crate::types::citation::ResolvedChunk;

    #[test]
    fn test_prompt_hash_is_consistent() {
        let hash1 = prompt_hash();
        let hash2 = prompt_hash();
        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64); // SHA-256 hex
    }

    #[test]
    fn test_compose_prompt_lists_only_verified_citations() {
        let verified = VerifiedCitation::verified(
            1,
            ResolvedChunk::new(1, "y".repeat(300))
                .with_title("Attention Is All You Need")
                .with_page(3),
            None,
            200,
        );
        let failed = VerifiedCitation::failed(2, &VerificationError::Timeout, None);

        let prompt = format_compose_prompt("What is attention?", "Draft.", &[verified, failed]);

        assert!(prompt.contains("User Question: What is attention?"));
        assert!(prompt.contains("Draft."));
        assert!(prompt.contains(&format!(
            "- Attention Is All You Need (page 3): {}...",
            "y".repeat(100)
        )));
        assert_eq!(prompt.matches("\n- ").count(), 1);
    }

    #[test]
    fn test_compose_prompt_placeholders_for_missing_fields() {
        let citation = VerifiedCitation::verified(5, ResolvedChunk::new(5, "text"), None, 200);
        let prompt = format_compose_prompt("q", "a", &[citation]);
        assert!(prompt.contains("- Unknown (page N/A): text..."));
    }

    #[test]
    fn test_grounded_prompt_numbers_from_one() {
        let candidates = vec![
            Candidate::new(40).with_text("first chunk"),
            Candidate::new(17).with_text("second chunk"),
        ];
        let prompt = format_grounded_prompt("q", &candidates, 600);

        assert!(prompt.contains("[CHUNK_1]\nfirst chunk"));
        assert!(prompt.contains("[CHUNK_2]\nsecond chunk"));
        assert!(!prompt.contains("[CHUNK_3]"));
        assert!(!prompt.contains("40"));
    }

    #[test]
    fn test_placeholders_in_inputs_are_kept_literally() {
        let prompt = format_compose_prompt("REAL_Q", "draft mentions {question} literally", &[]);
        assert!(prompt.contains("draft mentions {question} literally"));
        assert!(prompt.contains("User Question: REAL_Q"));

        let candidates = vec![Candidate::new(1).with_text("see {question} and {sources}")];
        let prompt = format_grounded_prompt("{sources}", &candidates, 600);
        assert!(prompt.contains("Question: {sources}"));
        assert!(prompt.contains("[CHUNK_1]\nsee {question} and {sources}"));
    }
}
