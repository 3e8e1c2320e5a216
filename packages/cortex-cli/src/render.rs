//! Human-readable output for pipeline results and agent responses.

use colored::Colorize;
use grounding::{AgentResponse, PipelineResult, ReasoningStep, VerificationStatus, VerifiedCitation};

const SNIPPET_PREVIEW_CHARS: usize = 200;

fn rule(title: &str) {
    println!("\n{}", "=".repeat(80));
    println!("{}", title.bold());
    println!("{}", "-".repeat(80));
}

/// Print a pipeline result.
pub fn print_result(result: &PipelineResult) {
    rule("Answer:");
    println!("{}", result.answer);
    if let Some(error) = &result.error {
        println!("{} {}", "error:".red().bold(), error);
    }
    print_citations(&result.citations);
}

/// Print an agent response with its reasoning trace.
pub fn print_agent_response(response: &AgentResponse) {
    rule("Agent Response:");
    println!("{}", response.answer);

    if !response.reasoning.is_empty() {
        rule("Reasoning Steps:");
        for step in &response.reasoning {
            println!("  {}", step);
        }
    }

    println!("\n{} {}", "Model:".dimmed(), response.model);
    print_citations(&response.citations);
}

/// Print one streamed reasoning step.
pub fn print_step(step: &ReasoningStep) {
    let timing = format!("({:.2}s)", step.time_spent).dimmed();
    match &step.error {
        Some(error) => println!("{} {} {}", step.step.yellow(), timing, error.red()),
        None => println!("{} {}", step.step.cyan(), timing),
    }
}

fn print_citations(citations: &[VerifiedCitation]) {
    rule("Citations:");
    if citations.is_empty() {
        println!("No citations found.");
        return;
    }

    for (idx, citation) in citations.iter().enumerate() {
        let mut lines = format_citation(idx + 1, citation).into_iter();
        if let Some(header) = lines.next() {
            let header = match citation.verification_status {
                VerificationStatus::Verified => header.green(),
                VerificationStatus::Failed => header.red(),
            };
            println!("\n{}", header);
        }
        for line in lines {
            println!("{}", line);
        }
    }
}

/// Plain-text lines for one citation, header first.
pub fn format_citation(index: usize, citation: &VerifiedCitation) -> Vec<String> {
    let status = match citation.verification_status {
        VerificationStatus::Verified => "verified".to_string(),
        VerificationStatus::Failed => format!(
            "failed — error: {}",
            citation.error.as_deref().unwrap_or("unknown")
        ),
    };
    let mut lines = vec![format!("{}) chunk_{} — {}", index, citation.chunk_id, status)];

    if citation.is_verified() {
        let title = citation.paper_title.as_deref().unwrap_or("Unknown Title");
        match citation.page_num {
            Some(page) => lines.push(format!("   \"{}\" (page {})", title, page)),
            None => lines.push(format!("   \"{}\"", title)),
        }
    }

    if let Some(snippet) = citation.snippet.as_deref().filter(|s| !s.is_empty()) {
        let mut preview: String = snippet.chars().take(SNIPPET_PREVIEW_CHARS).collect();
        if snippet.chars().count() > SNIPPET_PREVIEW_CHARS {
            preview.push_str("...");
        }
        lines.push(format!("   snippet: \"{}\"", preview));
    }

    if let Some(url) = citation.pdf_url.as_deref().filter(|u| !u.is_empty()) {
        lines.push(format!("   pdf: {}", url));
    }

    lines
}
