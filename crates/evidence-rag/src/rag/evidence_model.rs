//! Structured evidence model: what the query is about and which parts of it
//! the retrieved sources do not mention.
//!
//! The heuristic model is always available. A completion provider may refine
//! it with one JSON extraction call; any failure keeps the heuristic model.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::llm::{complete_with_timeout, ChatMessage, CompletionProvider, GenerationParams};
use crate::rag::intent::IntentGraph;
use crate::types::Chunk;

const MAX_MODEL_ITEMS: usize = 12;
const MAX_PROMPT_SOURCES: usize = 12;
const SOURCE_EXCERPT_CHARS: usize = 400;

const EXTRACTION_PROMPT: &str = r#"You analyse whether retrieved sources can answer a question.
Respond with ONLY a JSON object (no markdown, no explanation):
{"entities": ["named things the answer must cover"], "concepts": ["key topics"], "gaps": ["parts of the question the sources do not address"]}
Use short noun phrases. Leave "gaps" empty when the sources cover the question."#;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvidenceModel {
    pub entities: Vec<String>,
    pub concepts: Vec<String>,
    /// Parts of the question no source addresses.
    pub gaps: Vec<String>,
}

impl EvidenceModel {
    /// Heuristic model: query entities and concepts, with the ones that no
    /// source mentions recorded as gaps.
    pub fn from_sources(intent: &IntentGraph, sources: &[Chunk]) -> Self {
        let haystacks: Vec<String> = sources.iter().map(|s| s.text.to_lowercase()).collect();
        let mentioned = |term: &str| {
            let needle = term.to_lowercase();
            haystacks.iter().any(|text| text.contains(&needle))
        };

        let entities = dedupe_capped(intent.entities.iter().cloned());
        let concepts = dedupe_capped(intent.concepts.iter().cloned());
        let gaps = dedupe_capped(
            entities
                .iter()
                .chain(concepts.iter())
                .filter(|term| !mentioned(term))
                .cloned(),
        );

        Self { entities, concepts, gaps }
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.concepts.is_empty() && self.gaps.is_empty()
    }

    /// Ask `provider` for a model of `query` against `sources`.
    ///
    /// Fields the provider leaves empty come from `fallback`; a failed or
    /// unparseable call returns `fallback` unchanged.
    pub async fn extract(
        provider: &dyn CompletionProvider,
        query: &str,
        sources: &[Chunk],
        fallback: EvidenceModel,
        timeout: Duration,
    ) -> EvidenceModel {
        let messages = vec![
            ChatMessage::system(EXTRACTION_PROMPT),
            ChatMessage::user(format!(
                "Question: {}\n\nSources:\n{}",
                query,
                source_excerpts(sources)
            )),
        ];

        let raw = match complete_with_timeout(provider, &messages, &GenerationParams::extraction(), timeout).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "Evidence model extraction failed, using heuristic model");
                return fallback;
            }
        };

        match parse_model_response(&raw) {
            Ok(parsed) => {
                let model = parsed.filled_from(fallback);
                tracing::debug!(
                    entities = model.entities.len(),
                    concepts = model.concepts.len(),
                    gaps = model.gaps.len(),
                    "Evidence model extracted"
                );
                model
            }
            Err(e) => {
                tracing::warn!(error = %e, "Evidence model response unparseable, using heuristic model");
                fallback
            }
        }
    }

    fn filled_from(self, fallback: EvidenceModel) -> Self {
        let pick = |own: Vec<String>, other: Vec<String>| {
            if own.iter().all(|s| s.trim().is_empty()) {
                other
            } else {
                dedupe_capped(own.into_iter())
            }
        };
        Self {
            entities: pick(self.entities, fallback.entities),
            concepts: pick(self.concepts, fallback.concepts),
            gaps: pick(self.gaps, fallback.gaps),
        }
    }
}

fn source_excerpts(sources: &[Chunk]) -> String {
    sources
        .iter()
        .take(MAX_PROMPT_SOURCES)
        .enumerate()
        .map(|(i, source)| {
            let excerpt: String = source.text.chars().take(SOURCE_EXCERPT_CHARS).collect();
            format!("[S{}] ({}) {}", i + 1, source.filename, excerpt)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_model_response(raw: &str) -> Result<EvidenceModel> {
    let cleaned = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let json_str = match (cleaned.find('{'), cleaned.rfind('}')) {
        (Some(start), Some(end)) if end > start => &cleaned[start..=end],
        _ => cleaned,
    };

    serde_json::from_str::<EvidenceModel>(json_str).context("evidence model is not valid JSON")
}

/// Trimmed, case-insensitively distinct, at most [`MAX_MODEL_ITEMS`].
fn dedupe_capped(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && seen.insert(s.to_lowercase()))
        .take(MAX_MODEL_ITEMS)
        .collect()
}
