//! Concept Extraction
//!
//! Pulls normalized concept strings out of chunk text. Concepts are the node
//! keys of the concept graph and the vocabulary used to bridge chunks from
//! different documents that do not share surface wording.
//!
//! Extraction order is significant: the graph builder weights co-occurring
//! concepts by their distance in this order.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use crate::text::{is_stopword, word_tokens};

/// Upper bound on concepts returned for a single text.
pub const MAX_CONCEPTS: usize = 28;

/// Number of frequent tokens considered as concepts.
pub const MAX_FREQUENT_TOKENS: usize = 18;

const MIN_FREQUENT_TOKEN_LEN: usize = 4;
const MIN_FREQUENT_TOKEN_COUNT: usize = 2;

static CAPITALIZED_PHRASE_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"\b[A-Z][A-Za-z0-9]+(?:\s+[A-Z][A-Za-z0-9]+){0,2}\b")
        .expect("capitalized phrase regex is valid")
});

static QUOTED_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r#"["“]([^"”\n]{3,90})["”]"#).expect("quoted regex is valid")
});

static TECHNICAL_TOKEN_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"\b[A-Za-z0-9]+(?:[-_][A-Za-z0-9]+)+\b").expect("technical token regex is valid")
});

static NON_CONCEPT_CHARS_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"[^\w\s\-]").expect("non-concept chars regex is valid")
});

static WHITESPACE_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"\s+").expect("whitespace regex is valid")
});

/// Normalize a raw phrase into a concept key.
///
/// Trims, lowercases, strips everything except word characters, spaces and
/// hyphens, and collapses internal whitespace.
pub fn normalize_concept(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    let stripped = NON_CONCEPT_CHARS_RE.replace_all(&lower, "");
    WHITESPACE_RE.replace_all(stripped.trim(), " ").into_owned()
}

/// Extract up to [`MAX_CONCEPTS`] normalized concepts from `text`.
///
/// Order: capitalized phrases (1-3 words), quoted substrings (3-90 chars),
/// hyphen/underscore technical tokens, then the most frequent long tokens
/// (occurring at least twice) by descending frequency. No duplicates.
pub fn extract_concepts(text: &str) -> Vec<String> {
    let mut collector = ConceptCollector::new(MAX_CONCEPTS);
    if text.trim().is_empty() {
        return collector.finish();
    }

    for m in CAPITALIZED_PHRASE_RE.find_iter(text) {
        let concept = normalize_concept(m.as_str());
        // A lone capitalized stopword is just a sentence start
        if !concept.contains(' ') && is_stopword(&concept) {
            continue;
        }
        collector.push(concept);
    }

    for cap in QUOTED_RE.captures_iter(text) {
        if let Some(inner) = cap.get(1) {
            collector.push(normalize_concept(inner.as_str()));
        }
    }

    for m in TECHNICAL_TOKEN_RE.find_iter(text) {
        collector.push(normalize_concept(m.as_str()));
    }

    for token in frequent_tokens(text) {
        collector.push(token);
    }

    collector.finish()
}

/// Tokens of at least four characters that occur two or more times, most
/// frequent first. Ties keep first-occurrence order.
fn frequent_tokens(text: &str) -> Vec<String> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    for (position, token) in word_tokens(text).into_iter().enumerate() {
        if token.chars().count() < MIN_FREQUENT_TOKEN_LEN || is_stopword(&token) {
            continue;
        }
        counts.entry(token).or_insert((0, position)).0 += 1;
    }

    let mut ranked: Vec<(String, usize, usize)> = counts
        .into_iter()
        .filter(|(_, (count, _))| *count >= MIN_FREQUENT_TOKEN_COUNT)
        .map(|(token, (count, first))| (token, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    ranked.truncate(MAX_FREQUENT_TOKENS);

    ranked
        .into_iter()
        .map(|(token, _, _)| normalize_concept(&token))
        .collect()
}

struct ConceptCollector {
    seen: HashSet<String>,
    concepts: Vec<String>,
    limit: usize,
}

impl ConceptCollector {
    fn new(limit: usize) -> Self {
        Self {
            seen: HashSet::new(),
            concepts: Vec::new(),
            limit,
        }
    }

    fn push(&mut self, concept: String) {
        if self.concepts.len() >= self.limit || concept.chars().count() < 2 {
            return;
        }
        if self.seen.insert(concept.clone()) {
            self.concepts.push(concept);
        }
    }

    fn finish(self) -> Vec<String> {
        self.concepts
    }
}
