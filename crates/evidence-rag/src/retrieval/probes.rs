//! Probe Query Generation
//!
//! Follow-up queries for the refinement loop and contradiction-seeking
//! queries for the adversarial pass. Probes are plain strings handed to the
//! base retriever; generation is deterministic for a given query.

use std::collections::HashSet;

use crate::rag::intent::{IntentGraph, QueryProfile};
use crate::search::QueryTerms;

/// Content tokens carried by each probe.
const FOCUS_TOKENS: usize = 4;
const MAX_ENTITY_PROBES: usize = 2;
const MAX_CONCEPT_PROBES: usize = 2;

const ADVERSARIAL_SUFFIXES: &[&str] = &[
    "contradictory evidence",
    "limitations",
    "exceptions",
    "counterexamples",
    "failure modes",
];

/// Refinement probes for `query`, at most `max` and never the query itself.
///
/// Order: entity-expanded, concept-expanded, constraint-expanded, then
/// comparative/timeline/broad/decision variants by profile, then
/// hypothesis-validation variants.
pub fn build_refinement_probes(
    query: &str,
    intent: &IntentGraph,
    profile: &QueryProfile,
    terms: &QueryTerms,
    max: usize,
) -> Vec<String> {
    let focus = terms.focus(FOCUS_TOKENS);
    let mut probes = ProbeSet::new(query, max);
    if focus.trim().is_empty() {
        return probes.finish();
    }

    for entity in intent.entities.iter().take(MAX_ENTITY_PROBES) {
        probes.push(format!("{} {}", entity, focus));
    }

    let mut concepts = intent.concepts.iter().take(MAX_CONCEPT_PROBES + 1);
    if let Some(first) = concepts.next() {
        match concepts.next() {
            Some(second) => {
                probes.push(format!("{} {}", first, second));
                if let Some(third) = concepts.next() {
                    probes.push(format!("{} {}", first, third));
                }
            }
            None => probes.push(format!("{} overview", first)),
        }
    }

    for constraint in &intent.constraints {
        probes.push(format!("{} {}", focus, constraint));
    }
    for relation in &intent.relations {
        probes.push(relation.clone());
    }

    if profile.comparative {
        probes.push(format!("{} differences trade-offs", focus));
    }
    if profile.timeline {
        probes.push(format!("{} timeline changes history", focus));
    }
    if profile.broad_coverage {
        probes.push(format!("{} key findings", focus));
        probes.push(format!("{} overview summary", focus));
    }
    if profile.decision_mode {
        probes.push(format!("{} options alternatives", focus));
        probes.push(format!("{} risks outcomes", focus));
    }

    for unknown in &intent.unknowns {
        probes.push(format!("{} {}", unknown, focus));
    }
    probes.push(format!("{} evidence results", focus));
    probes.push(format!("{} impact consequences", focus));

    probes.finish()
}

/// Contradiction-seeking probes, alternating explicit variants with
/// variants qualified by the strongest seed concepts.
pub fn build_adversarial_probes(terms: &QueryTerms, seed_concepts: &[String], max: usize) -> Vec<String> {
    let focus = terms.focus(FOCUS_TOKENS);
    let mut probes = ProbeSet::new(&terms.query, max);
    if focus.trim().is_empty() {
        return probes.finish();
    }

    let explicit = ADVERSARIAL_SUFFIXES.iter().map(|suffix| format!("{} {}", focus, suffix));
    let qualified = seed_concepts
        .iter()
        .map(|concept| format!("{} limitations risks", concept));

    let mut explicit = explicit.peekable();
    let mut qualified = qualified.peekable();
    while explicit.peek().is_some() || qualified.peek().is_some() {
        if let Some(probe) = explicit.next() {
            probes.push(probe);
        }
        if let Some(probe) = qualified.next() {
            probes.push(probe);
        }
    }

    probes.finish()
}

/// Ordered, case-insensitively distinct probes with an upper bound.
struct ProbeSet {
    seen: HashSet<String>,
    probes: Vec<String>,
    max: usize,
}

impl ProbeSet {
    fn new(query: &str, max: usize) -> Self {
        let mut seen = HashSet::new();
        seen.insert(normalize(query));
        Self {
            seen,
            probes: Vec::new(),
            max,
        }
    }

    fn push(&mut self, probe: String) {
        let probe = probe.split_whitespace().collect::<Vec<_>>().join(" ");
        if probe.is_empty() || self.probes.len() >= self.max {
            return;
        }
        if self.seen.insert(normalize(&probe)) {
            self.probes.push(probe);
        }
    }

    fn finish(self) -> Vec<String> {
        self.probes
    }
}

fn normalize(probe: &str) -> String {
    probe.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}
