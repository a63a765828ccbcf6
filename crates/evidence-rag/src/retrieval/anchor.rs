//! Document anchor sampling.
//!
//! Every document contributes its best-scoring chunks plus a few evenly
//! spaced ones, so a document whose chunks never rank globally is still in
//! the candidate pool.

use std::collections::HashSet;

use crate::config::AnchorConfig;
use crate::corpus::CorpusSnapshot;
use crate::rag::intent::QueryProfile;
use crate::search::{QueryTerms, RelevanceScorer};
use crate::types::Chunk;

/// Anchor chunks for every document of `snapshot`, scored against `terms`.
///
/// Per document: the top `top_per_document` chunks by score (ties go to the
/// lower index), then `spread_per_document` chunks at evenly spaced indices.
/// Broad queries use the larger `_broad` counts. Output is grouped by
/// document in corpus order and holds no duplicates.
pub fn sample_anchors(
    snapshot: &CorpusSnapshot,
    terms: &QueryTerms,
    scorer: &dyn RelevanceScorer,
    profile: &QueryProfile,
    config: &AnchorConfig,
) -> Vec<Chunk> {
    let (top_n, spread_n) = if profile.broad_coverage {
        (config.top_per_document_broad, config.spread_per_document_broad)
    } else {
        (config.top_per_document, config.spread_per_document)
    };

    let mut anchors = Vec::new();
    for document in snapshot.documents() {
        let chunks: Vec<&Chunk> = snapshot.document_chunks(document).collect();
        if chunks.is_empty() {
            continue;
        }
        let scores: Vec<f32> = chunks.iter().map(|c| scorer.score(c, terms)).collect();

        let mut by_score: Vec<usize> = (0..chunks.len()).collect();
        by_score.sort_by(|&a, &b| {
            scores[b]
                .partial_cmp(&scores[a])
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });

        let mut picked = HashSet::new();
        let selected = by_score
            .into_iter()
            .take(top_n)
            .chain(spread_positions(chunks.len(), spread_n));
        for pos in selected {
            if picked.insert(pos) {
                anchors.push(chunks[pos].scored(scores[pos]));
            }
        }
    }

    anchors
}

/// `count` indices spread evenly over `0..len`, first and last included.
fn spread_positions(len: usize, count: usize) -> Vec<usize> {
    match (len, count) {
        (0, _) | (_, 0) => Vec::new(),
        (_, 1) => vec![0],
        _ if count >= len => (0..len).collect(),
        _ => (0..count)
            .map(|k| ((k * (len - 1)) as f32 / (count - 1) as f32).round() as usize)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::LexicalScorer;
    use crate::text::SimpleTextAnalyzer;

    fn corpus() -> CorpusSnapshot {
        let mut chunks: Vec<Chunk> = (0..9)
            .map(|i| {
                let text = if i == 2 { "quarterly revenue grew" } else { "filler paragraph" };
                Chunk::new(format!("a{}", i), "a.md", i, text)
            })
            .collect();
        chunks.push(Chunk::new("b0", "b.md", 0, "unrelated notes"));
        chunks.push(Chunk::new("c0", "c.md", 0, "more unrelated notes"));
        chunks.push(Chunk::new("c1", "c.md", 1, "revenue projections"));
        CorpusSnapshot::build(1, chunks)
    }

    fn ids(chunks: &[Chunk]) -> Vec<&str> {
        chunks.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn test_spread_positions() {
        assert_eq!(spread_positions(5, 2), vec![0, 4]);
        assert_eq!(spread_positions(5, 3), vec![0, 2, 4]);
        assert_eq!(spread_positions(2, 3), vec![0, 1]);
        assert_eq!(spread_positions(7, 1), vec![0]);
        assert!(spread_positions(0, 3).is_empty());
    }

    #[test]
    fn test_every_document_is_anchored() {
        let snapshot = corpus();
        let terms = QueryTerms::build("quarterly revenue", &SimpleTextAnalyzer::new());
        let anchors = sample_anchors(
            &snapshot,
            &terms,
            &LexicalScorer::new(),
            &QueryProfile::default(),
            &AnchorConfig::default(),
        );

        // a.md: best chunk first, then the two ends
        assert_eq!(ids(&anchors), vec!["a2", "a0", "a8", "b0", "c1", "c0"]);
        assert!(anchors[0].score > 0.0);
    }

    #[test]
    fn test_broad_profile_samples_more() {
        let snapshot = corpus();
        let terms = QueryTerms::build("quarterly revenue", &SimpleTextAnalyzer::new());
        let profile = QueryProfile {
            broad_coverage: true,
            ..Default::default()
        };
        let anchors = sample_anchors(&snapshot, &terms, &LexicalScorer::new(), &profile, &AnchorConfig::default());

        let from_a = anchors.iter().filter(|c| c.filename == "a.md").count();
        assert_eq!(from_a, 4);
        let unique: HashSet<&str> = anchors.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(unique.len(), anchors.len());
    }

    #[test]
    fn test_empty_corpus_has_no_anchors() {
        let snapshot = CorpusSnapshot::default();
        let terms = QueryTerms::build("anything", &SimpleTextAnalyzer::new());
        let anchors = sample_anchors(
            &snapshot,
            &terms,
            &LexicalScorer::new(),
            &QueryProfile::default(),
            &AnchorConfig::default(),
        );
        assert!(anchors.is_empty());
    }
}
