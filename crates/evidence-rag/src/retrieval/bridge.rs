//! Concept-bridge expansion.
//!
//! Walks one hop through the concept graph from the seeds' dominant concepts
//! and surfaces chunks that share a bridging concept without sharing the
//! query's wording.

use std::collections::{HashMap, HashSet};

use crate::config::BridgeConfig;
use crate::corpus::CorpusSnapshot;
use crate::search::{QueryTerms, RelevanceScorer};
use crate::types::Chunk;

/// Chunks related to `seeds` through the concept graph, best first.
///
/// Seed chunks vote for their concepts with `score + seed_vote_base`; the
/// strongest `max_seed_concepts` are expanded to their top neighbors. A
/// candidate concept scores `seed_share × vote` (plus `(1 - seed_share) ×
/// edge weight` for neighbors), keeping the best score when reached twice.
/// Each indexed chunk of a candidate concept scores
/// `lexical_weight × relevance + bridge_weight × min(concept score, cap)` and
/// is tagged with the concept that reached it.
///
/// Never returns a seed. Empty when there are no seeds or no concept graph.
pub fn expand_bridges(
    snapshot: &CorpusSnapshot,
    seeds: &[Chunk],
    terms: &QueryTerms,
    scorer: &dyn RelevanceScorer,
    config: &BridgeConfig,
    limit: usize,
) -> Vec<Chunk> {
    let index = snapshot.concepts();
    if seeds.is_empty() || index.is_empty() || limit == 0 {
        return Vec::new();
    }

    let seed_concepts = seed_concept_votes(snapshot, seeds, config);
    if seed_concepts.is_empty() {
        return Vec::new();
    }

    let mut candidates: HashMap<String, f32> = HashMap::new();
    let mut raise = |concept: String, score: f32| {
        let entry = candidates.entry(concept).or_insert(0.0);
        if score > *entry {
            *entry = score;
        }
    };
    for (concept, vote) in &seed_concepts {
        let base = config.seed_share * vote;
        raise(concept.clone(), base);
        for (neighbor, weight) in index.graph().top_neighbors(concept, config.neighbors_per_concept) {
            raise(neighbor, base + (1.0 - config.seed_share) * weight);
        }
    }

    let mut ranked_concepts: Vec<(String, f32)> = candidates.into_iter().collect();
    ranked_concepts.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });

    let seed_ids: HashSet<&str> = seeds.iter().map(|c| c.id.as_str()).collect();
    // First (strongest) concept to reach a chunk wins
    let mut reached: HashMap<&str, (f32, &str)> = HashMap::new();
    for (concept, bridge_score) in &ranked_concepts {
        for chunk_id in index.chunks_for(concept) {
            if seed_ids.contains(chunk_id.as_str()) {
                continue;
            }
            reached
                .entry(chunk_id.as_str())
                .or_insert((*bridge_score, concept.as_str()));
        }
    }

    let mut bridged: Vec<(usize, Chunk)> = reached
        .into_iter()
        .filter_map(|(chunk_id, (bridge_score, concept))| {
            let pos = snapshot.position(chunk_id)?;
            let chunk = snapshot.chunk(chunk_id)?;
            let score = config.lexical_weight * scorer.score(chunk, terms)
                + config.bridge_weight * bridge_score.min(config.bridge_weight_cap);
            let mut copy = chunk.scored(score);
            copy.bridge_concept = Some(concept.to_string());
            Some((pos, copy))
        })
        .collect();

    bridged.sort_by(|a, b| {
        b.1.score
            .partial_cmp(&a.1.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    bridged.truncate(limit.min(config.max_results));

    tracing::debug!(
        seeds = seeds.len(),
        seed_concepts = seed_concepts.len(),
        candidate_concepts = ranked_concepts.len(),
        bridged = bridged.len(),
        "Concept bridge expansion"
    );

    bridged.into_iter().map(|(_, chunk)| chunk).collect()
}

/// Strongest seed concepts with their accumulated votes.
pub(crate) fn seed_concept_votes(snapshot: &CorpusSnapshot, seeds: &[Chunk], config: &BridgeConfig) -> Vec<(String, f32)> {
    let index = snapshot.concepts();
    let mut votes: HashMap<String, f32> = HashMap::new();
    for seed in seeds {
        let vote = seed.score.max(0.0) + config.seed_vote_base;
        for concept in index.concepts_for_chunk(seed) {
            *votes.entry(concept).or_insert(0.0) += vote;
        }
    }

    let mut ranked: Vec<(String, f32)> = votes.into_iter().collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    ranked.truncate(config.max_seed_concepts);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::LexicalScorer;
    use crate::text::SimpleTextAnalyzer;

    fn snapshot() -> CorpusSnapshot {
        CorpusSnapshot::build(
            1,
            vec![
                Chunk::new("c1", "a.md", 0, "retry retry backoff backoff"),
                Chunk::new("c2", "b.md", 0, "backoff backoff jitter jitter"),
                Chunk::new("c3", "c.md", 0, "jitter jitter entropy entropy"),
                Chunk::new("c4", "d.md", 0, "gardening gardening soil soil"),
            ],
        )
    }

    fn expand(snapshot: &CorpusSnapshot, seeds: &[Chunk]) -> Vec<Chunk> {
        let terms = QueryTerms::build("retry backoff", &SimpleTextAnalyzer::new());
        expand_bridges(snapshot, seeds, &terms, &LexicalScorer::new(), &BridgeConfig::default(), 10)
    }

    #[test]
    fn test_bridges_reach_other_documents() {
        let snapshot = snapshot();
        let seeds = vec![snapshot.chunks()[0].scored(0.5)];

        let bridged = expand(&snapshot, &seeds);
        let ids: Vec<&str> = bridged.iter().map(|c| c.id.as_str()).collect();

        assert_eq!(ids, vec!["c2", "c3"]);
        assert_eq!(bridged[1].bridge_concept.as_deref(), Some("jitter"));
        assert!(bridged[0].score > bridged[1].score);
    }

    #[test]
    fn test_never_returns_seeds() {
        let snapshot = snapshot();
        let seeds: Vec<Chunk> = snapshot.chunks()[..2].iter().map(|c| c.scored(0.4)).collect();

        let bridged = expand(&snapshot, &seeds);
        assert!(!bridged.is_empty());
        assert!(bridged.iter().all(|c| c.id != "c1" && c.id != "c2"));
    }

    #[test]
    fn test_deterministic() {
        let snapshot = snapshot();
        let seeds = vec![snapshot.chunks()[0].scored(0.5)];
        assert_eq!(expand(&snapshot, &seeds), expand(&snapshot, &seeds));
    }

    #[test]
    fn test_no_seeds_or_empty_graph() {
        let snapshot = snapshot();
        assert!(expand(&snapshot, &[]).is_empty());

        let empty = CorpusSnapshot::default();
        let seeds = vec![Chunk::new("x", "x.md", 0, "retry retry backoff backoff").scored(0.5)];
        assert!(expand(&empty, &seeds).is_empty());
    }
}
