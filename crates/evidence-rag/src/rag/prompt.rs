//! Prompt assembly for answer drafting and gate-driven repairs.
//!
//! Sources are numbered `[S1]`, `[S2]`, ... in the order given; the citation
//! analyzer maps those numbers back onto the same list.

use crate::llm::ChatMessage;
use crate::rag::intent::QueryProfile;
use crate::rag::signals::required_sections;
use crate::retrieval::RetrievalOutcome;
use crate::types::Chunk;

/// Longest excerpt of a single source placed in a prompt.
const MAX_SOURCE_CHARS: usize = 1200;

fn system_prompt(profile: &QueryProfile) -> String {
    let mut prompt = String::new();
    prompt.push_str("You answer questions strictly from the numbered sources provided.\n");
    prompt.push_str("Cite every factual claim with the source number in brackets, e.g. [S1] or [S2, S4].\n");
    prompt.push_str("Never cite a number that is not in the source list. If the sources do not cover something, say so.\n");
    prompt.push_str("Explain how the evidence connects (because, therefore, however) instead of listing facts.\n\n");

    if profile.expects_cross_source() {
        prompt.push_str("Combine evidence from several different documents and point out where they disagree.\n\n");
    }

    prompt.push_str("Structure the answer with these markdown sections, in order:\n");
    for section in required_sections(profile) {
        prompt.push_str(&format!("## {}\n", section.heading()));
    }
    prompt
}

/// Numbered source list with filenames, pages and pass tags.
pub fn format_sources(sources: &[Chunk]) -> String {
    let mut out = String::new();
    for (i, source) in sources.iter().enumerate() {
        out.push_str(&format!("[S{}] {}", i + 1, source.filename));
        if let Some(page) = source.page {
            out.push_str(&format!(" (page {})", page));
        }
        if source.adversarial_signal.is_some() {
            out.push_str(" [possible counter-evidence]");
        }
        out.push('\n');
        let excerpt: String = source.text.chars().take(MAX_SOURCE_CHARS).collect();
        out.push_str(excerpt.trim());
        out.push_str("\n\n");
    }
    out
}

fn retrieval_notes(outcome: &RetrievalOutcome) -> String {
    let report = &outcome.report;
    let mut notes = format!(
        "Retrieval covered {} of {} documents ({:.0}%).",
        report.activated_documents, report.total_documents, report.coverage_pct
    );
    if !report.bridge_concepts.is_empty() {
        let shared: Vec<&str> = report
            .bridge_concepts
            .iter()
            .take(5)
            .map(|b| b.concept.as_str())
            .collect();
        notes.push_str(&format!(" Concepts shared across documents: {}.", shared.join(", ")));
    }
    notes
}

/// Messages for the first draft of an answer.
pub fn build_answer_messages(query: &str, outcome: &RetrievalOutcome) -> Vec<ChatMessage> {
    let mut user = String::new();
    user.push_str("# SOURCES\n\n");
    user.push_str(&format_sources(&outcome.chunks));
    user.push_str("# RETRIEVAL NOTES\n");
    user.push_str(&retrieval_notes(outcome));
    user.push_str("\n\n# QUESTION\n");
    user.push_str(query);

    vec![ChatMessage::system(system_prompt(&outcome.profile)), ChatMessage::user(user)]
}

/// Messages asking for a rewrite of `draft` that fixes `reasons`.
pub fn build_repair_messages(
    query: &str,
    outcome: &RetrievalOutcome,
    draft: &str,
    reasons: &[String],
) -> Vec<ChatMessage> {
    let mut messages = build_answer_messages(query, outcome);
    messages.push(ChatMessage::assistant(draft));

    let mut request = String::from("Your answer did not pass review. Rewrite the complete answer and fix every issue:\n");
    for reason in reasons {
        request.push_str(&format!("- {}\n", reason));
    }
    request.push_str("Keep only claims the sources support, and keep the required sections.");
    messages.push(ChatMessage::user(request));
    messages
}
