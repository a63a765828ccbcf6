use std::collections::{HashMap, HashSet};

use super::merge::distinct_documents;
use crate::corpus::CorpusSnapshot;
use crate::types::{ActivationReport, BridgeConcept, Chunk};

/// Bridge concepts reported per retrieval.
pub const MAX_REPORTED_BRIDGES: usize = 10;

/// Summarize what a retrieval selected relative to the whole corpus.
pub fn build_activation_report(
    snapshot: &CorpusSnapshot,
    selected: &[Chunk],
    pass_count: usize,
    stabilized: bool,
    adversarial_count: usize,
) -> ActivationReport {
    let total_documents = snapshot.document_count();
    let activated_documents = distinct_documents(selected);
    let coverage_pct = if total_documents == 0 {
        0.0
    } else {
        activated_documents as f32 / total_documents as f32 * 100.0
    };

    ActivationReport {
        total_documents,
        total_chunks: snapshot.chunk_count(),
        activated_documents,
        activated_chunks: selected.len(),
        coverage_pct,
        pass_count,
        stabilized,
        adversarial_count,
        bridge_concepts: cross_document_concepts(snapshot, selected),
        generation: snapshot.generation(),
    }
}

/// Concepts shared by selected chunks of more than one document, widest
/// spread first, then alphabetical.
fn cross_document_concepts(snapshot: &CorpusSnapshot, selected: &[Chunk]) -> Vec<BridgeConcept> {
    let index = snapshot.concepts();
    let mut spread: HashMap<String, HashSet<&str>> = HashMap::new();
    for chunk in selected {
        for concept in index.concepts_for_chunk(chunk) {
            spread.entry(concept).or_default().insert(chunk.filename.as_str());
        }
    }

    let mut concepts: Vec<BridgeConcept> = spread
        .into_iter()
        .filter(|(_, documents)| documents.len() > 1)
        .map(|(concept, documents)| BridgeConcept {
            concept,
            document_count: documents.len(),
        })
        .collect();
    concepts.sort_by(|a, b| {
        b.document_count
            .cmp(&a.document_count)
            .then_with(|| a.concept.cmp(&b.concept))
    });
    concepts.truncate(MAX_REPORTED_BRIDGES);
    concepts
}
