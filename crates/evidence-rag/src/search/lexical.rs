use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

use super::{BaseRetriever, QueryTerms, RelevanceScorer, RetrieveOptions};
use crate::corpus::CorpusStore;
use crate::text::{word_tokens, SimpleTextAnalyzer, TextAnalyzer};
use crate::types::Chunk;

const TOKEN_WEIGHT: f32 = 0.6;
const ENTITY_BOOST: f32 = 0.15;
const ENTITY_BOOST_CAP: f32 = 0.3;
const CONCEPT_BOOST: f32 = 0.1;
const CONCEPT_BOOST_CAP: f32 = 0.2;

/// Token-overlap scorer with entity and concept phrase boosts.
///
/// `0.6 × (matched query tokens / query tokens)` plus capped boosts for
/// entities and multi-word concepts found verbatim, clamped to `[0, 1]`.
#[derive(Debug, Clone, Default)]
pub struct LexicalScorer;

impl LexicalScorer {
    pub fn new() -> Self {
        Self
    }
}

impl RelevanceScorer for LexicalScorer {
    fn score(&self, chunk: &Chunk, terms: &QueryTerms) -> f32 {
        if terms.is_empty() || chunk.text.is_empty() {
            return 0.0;
        }

        let lower = chunk.text.to_lowercase();
        let chunk_tokens: HashSet<String> = word_tokens(&lower).into_iter().collect();

        let token_ratio = if terms.tokens.is_empty() {
            0.0
        } else {
            let matched = terms
                .tokens
                .iter()
                .filter(|t| chunk_tokens.contains(t.as_str()))
                .count();
            matched as f32 / terms.tokens.len() as f32
        };

        let entity_boost = terms
            .entities
            .iter()
            .filter(|e| lower.contains(&e.to_lowercase()))
            .count() as f32
            * ENTITY_BOOST;

        // Single-word concepts are already counted as tokens
        let concept_boost = terms
            .concepts
            .iter()
            .filter(|c| c.contains(' ') || c.contains('-'))
            .filter(|c| lower.contains(c.as_str()))
            .count() as f32
            * CONCEPT_BOOST;

        (TOKEN_WEIGHT * token_ratio
            + entity_boost.min(ENTITY_BOOST_CAP)
            + concept_boost.min(CONCEPT_BOOST_CAP))
        .clamp(0.0, 1.0)
    }
}

/// Reference [`BaseRetriever`] that scores every chunk of the current corpus
/// snapshot with a [`RelevanceScorer`].
pub struct InMemoryRetriever {
    store: Arc<CorpusStore>,
    analyzer: Arc<dyn TextAnalyzer>,
    scorer: Arc<dyn RelevanceScorer>,
}

impl InMemoryRetriever {
    pub fn new(store: Arc<CorpusStore>) -> Self {
        Self {
            store,
            analyzer: Arc::new(SimpleTextAnalyzer::new()),
            scorer: Arc::new(LexicalScorer::new()),
        }
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn TextAnalyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn RelevanceScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    /// Synchronous core of [`BaseRetriever::retrieve`].
    pub fn search(&self, query: &str, top_k: usize) -> Vec<Chunk> {
        let snapshot = self.store.snapshot();
        let terms = QueryTerms::build(query, self.analyzer.as_ref());
        if terms.is_empty() || top_k == 0 {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f32)> = snapshot
            .chunks()
            .iter()
            .enumerate()
            .map(|(pos, chunk)| (pos, self.scorer.score(chunk, &terms)))
            .filter(|(_, score)| *score > 0.0)
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(top_k);

        scored
            .into_iter()
            .map(|(pos, score)| snapshot.chunks()[pos].scored(score))
            .collect()
    }
}

#[async_trait]
impl BaseRetriever for InMemoryRetriever {
    async fn retrieve(&self, query: &str, top_k: usize, _options: &RetrieveOptions) -> Result<Vec<Chunk>> {
        Ok(self.search(query, top_k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(query: &str) -> QueryTerms {
        QueryTerms::build(query, &SimpleTextAnalyzer::new())
    }

    #[test]
    fn test_score_rewards_token_overlap() {
        let scorer = LexicalScorer::new();
        let relevant = Chunk::new("c1", "a.md", 0, "Retry budgets bound the backoff schedule.");
        let unrelated = Chunk::new("c2", "a.md", 1, "The cafeteria menu changes weekly.");
        let query = terms("retry budget backoff");

        let relevant_score = scorer.score(&relevant, &query);
        assert!(relevant_score > 0.0);
        assert_eq!(scorer.score(&unrelated, &query), 0.0);
        assert!(relevant_score <= 1.0);
    }

    #[test]
    fn test_entity_boost() {
        let scorer = LexicalScorer::new();
        let query = terms("What did Acme Corp decide about pricing?");
        let with_entity = Chunk::new("c1", "a.md", 0, "Acme Corp decided to hold pricing flat.");
        let without_entity = Chunk::new("c2", "b.md", 0, "They decided to hold pricing flat.");

        assert!(scorer.score(&with_entity, &query) > scorer.score(&without_entity, &query));
    }

    #[test]
    fn test_empty_query_scores_zero() {
        let scorer = LexicalScorer::new();
        let chunk = Chunk::new("c1", "a.md", 0, "anything");
        assert_eq!(scorer.score(&chunk, &terms("")), 0.0);
    }

    #[tokio::test]
    async fn test_in_memory_retriever_ranks_and_truncates() {
        let store = Arc::new(CorpusStore::from_chunks(vec![
            Chunk::new("c1", "a.md", 0, "cache eviction policy uses LRU"),
            Chunk::new("c2", "a.md", 1, "cache eviction and cache warming"),
            Chunk::new("c3", "b.md", 0, "unrelated text about gardening"),
        ]));
        let retriever = InMemoryRetriever::new(store);

        let results = retriever
            .retrieve("cache eviction policy", 2, &RetrieveOptions::default())
            .await
            .expect("in-memory retrieval never fails");

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "c1");
        assert!(results.iter().all(|c| c.score > 0.0));
        assert!(!results.iter().any(|c| c.id == "c3"));
    }

    #[tokio::test]
    async fn test_in_memory_retriever_on_empty_corpus() {
        let retriever = InMemoryRetriever::new(Arc::new(CorpusStore::new()));
        let results = retriever
            .retrieve("anything at all", 5, &RetrieveOptions::default())
            .await
            .expect("in-memory retrieval never fails");
        assert!(results.is_empty());
    }
}
