//! Query Intent Profiling
//!
//! Classifies a query into the scope flags that drive retrieval breadth,
//! completeness thresholds and answer structure, and extracts the per-query
//! intent graph used to build refinement probes.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::graph::extract_concepts;
use crate::search::RetrieveOptions;
use crate::text::TextAnalyzer;

static BROAD_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(
        r"(?i)\b(?:all|every|everything|overall|across|summar(?:y|ize|ise|ies)|overview|comprehensive|themes?|entire|whole|each|landscape)\b",
    )
    .expect("broad coverage regex is valid")
});

static DECISION_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(
        r"(?i)\b(?:should (?:we|i)|recommend(?:ation|ed)?|decide|decision|choose|which (?:option|approach|one)|best (?:approach|option|way)|strategy|go with|prioriti[sz]e)\b",
    )
    .expect("decision regex is valid")
});

static COMPARATIVE_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(
        r"(?i)\b(?:compare|comparison|versus|vs\.?|differ(?:s|ence|ences|ent)?|trade-?offs?|pros and cons|better than|worse than)\b",
    )
    .expect("comparative regex is valid")
});

static TIMELINE_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(
        r"(?i)\b(?:timeline|history|historical|over time|evolution|evolved|trends?|chronolog\w*|since|progression)\b",
    )
    .expect("timeline regex is valid")
});

static CONSTRAINT_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(
        r"(?i)\b(?:within|under|before|after|without|must|only|at most|at least|no more than|budget|deadline|limited to)\b[^,.;?!]{0,40}",
    )
    .expect("constraint regex is valid")
});

static RELATION_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(
        r"(?i)\b(?:impact of|effect of|relationship between|depends on|caused by|leads? to|affects?|influences?|compared to|related to)\b[^,.;?!]{0,40}",
    )
    .expect("relation regex is valid")
});

static UNKNOWN_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(
        r"(?i)\b(?:unknown|unclear|uncertain\w*|risks?|assum(?:e|es|ption|ptions)|gaps?|open questions?|whether)\b[^,.;?!]{0,40}",
    )
    .expect("unknown regex is valid")
});

/// Queries with at least this many words are treated as broad.
const BROAD_WORD_COUNT: usize = 14;
const MAX_INTENT_PHRASES: usize = 4;
const MAX_INTENT_CONCEPTS: usize = 8;

/// Scope flags inferred from a query, optionally overridden by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryProfile {
    pub broad_coverage: bool,
    pub decision_mode: bool,
    pub comparative: bool,
    pub timeline: bool,
}

impl QueryProfile {
    pub fn from_query(query: &str) -> Self {
        Self {
            broad_coverage: BROAD_RE.is_match(query)
                || query.split_whitespace().count() >= BROAD_WORD_COUNT,
            decision_mode: DECISION_RE.is_match(query),
            comparative: COMPARATIVE_RE.is_match(query),
            timeline: TIMELINE_RE.is_match(query),
        }
    }

    /// Apply caller overrides; explicit options win over inference.
    pub fn with_options(mut self, options: &RetrieveOptions) -> Self {
        if let Some(broad) = options.broad_coverage {
            self.broad_coverage = broad;
        }
        if let Some(decision) = options.decision_mode {
            self.decision_mode = decision;
        }
        self
    }

    /// A single-fact question: one good source is enough.
    pub fn is_narrow(&self) -> bool {
        !self.broad_coverage && !self.decision_mode && !self.comparative
    }

    /// Answers are expected to combine evidence from several documents.
    pub fn expects_cross_source(&self) -> bool {
        self.broad_coverage || self.decision_mode || self.comparative
    }

    /// Whether the multi-pass refinement loop is worth running.
    pub fn needs_refinement(&self) -> bool {
        !self.is_narrow() || self.timeline
    }

    /// Broad or decision queries get the stricter citation thresholds.
    pub fn is_strict(&self) -> bool {
        self.broad_coverage || self.decision_mode
    }
}

/// Per-query structure pulled from the raw query text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentGraph {
    pub entities: Vec<String>,
    pub concepts: Vec<String>,
    pub constraints: Vec<String>,
    pub relations: Vec<String>,
    pub unknowns: Vec<String>,
}

impl IntentGraph {
    pub fn build(query: &str, analyzer: &dyn TextAnalyzer) -> Self {
        let mut concepts = extract_concepts(query);
        concepts.truncate(MAX_INTENT_CONCEPTS);

        Self {
            entities: analyzer.extract_entities(query),
            concepts,
            constraints: phrases(&CONSTRAINT_RE, query),
            relations: phrases(&RELATION_RE, query),
            unknowns: phrases(&UNKNOWN_RE, query),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
            && self.concepts.is_empty()
            && self.constraints.is_empty()
            && self.relations.is_empty()
            && self.unknowns.is_empty()
    }
}

fn phrases(re: &regex::Regex, query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    re.find_iter(query)
        .map(|m| m.as_str().trim().to_string())
        .filter(|p| !p.is_empty() && seen.insert(p.to_lowercase()))
        .take(MAX_INTENT_PHRASES)
        .collect()
}
