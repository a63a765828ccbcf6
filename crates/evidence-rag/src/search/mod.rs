//! Base retrieval seam.
//!
//! The engine augments an external top-K retriever and relevance scorer; both
//! are injected through the traits here. [`lexical`] provides in-memory
//! implementations over a [`crate::corpus::CorpusStore`].

pub mod lexical;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::graph::extract_concepts;
use crate::text::TextAnalyzer;
use crate::types::Chunk;

pub use lexical::{InMemoryRetriever, LexicalScorer};

/// Query concepts kept when building [`QueryTerms`].
const MAX_QUERY_CONCEPTS: usize = 8;

/// Per-call retrieval options.
///
/// The profile overrides win over what is inferred from the query text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieveOptions {
    pub broad_coverage: Option<bool>,
    pub decision_mode: Option<bool>,
    pub skip_refinement: bool,
    pub skip_adversarial: bool,
}

/// The underlying lexical/embedding retriever.
#[async_trait]
pub trait BaseRetriever: Send + Sync {
    /// Up to `top_k` chunks for `query`, best first, with `score` set.
    async fn retrieve(&self, query: &str, top_k: usize, options: &RetrieveOptions) -> Result<Vec<Chunk>>;
}

/// Analyzed form of a query, computed once and shared by every scoring call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryTerms {
    pub query: String,
    pub tokens: Vec<String>,
    pub entities: Vec<String>,
    pub concepts: Vec<String>,
}

impl QueryTerms {
    pub fn build(query: &str, analyzer: &dyn TextAnalyzer) -> Self {
        let mut concepts = extract_concepts(query);
        concepts.truncate(MAX_QUERY_CONCEPTS);
        Self {
            query: query.to_string(),
            tokens: analyzer.tokenize(query),
            entities: analyzer.extract_entities(query),
            concepts,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty() && self.entities.is_empty() && self.concepts.is_empty()
    }

    /// Up to `limit` content tokens joined with spaces; the query itself when
    /// it has none.
    pub fn focus(&self, limit: usize) -> String {
        if self.tokens.is_empty() {
            return self.query.clone();
        }
        self.tokens
            .iter()
            .take(limit)
            .cloned()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Scoring primitive shared by anchor sampling, bridge expansion and the
/// adversarial pass. Scores are expected in `[0, 1]`.
pub trait RelevanceScorer: Send + Sync {
    fn score(&self, chunk: &Chunk, terms: &QueryTerms) -> f32;
}
