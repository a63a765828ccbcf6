//! Ranking and document-coverage enforcement.

use std::collections::HashSet;

use crate::corpus::CorpusSnapshot;
use crate::rag::intent::QueryProfile;
use crate::reranking::{Diversifier, Reranker};
use crate::types::Chunk;

/// Corpus size above which broad and decision queries need three documents.
const SMALL_CORPUS_DOCUMENTS: usize = 5;

/// Distinct documents a query's evidence has to span.
///
/// Narrow queries need one; comparative queries two; broad or decision
/// queries two on a corpus of up to five documents and three beyond. Never
/// more than the corpus has, never less than one.
pub fn required_docs(profile: &QueryProfile, corpus_docs: usize) -> usize {
    let required = if profile.broad_coverage || profile.decision_mode {
        if corpus_docs <= SMALL_CORPUS_DOCUMENTS {
            2
        } else {
            3
        }
    } else if profile.comparative {
        2
    } else {
        1
    };
    required.clamp(1, corpus_docs.max(1))
}

/// Sort by score (corpus order on ties), rerank, then diversify to `top_k`.
pub fn rank_candidates(
    snapshot: &CorpusSnapshot,
    query: &str,
    mut candidates: Vec<Chunk>,
    reranker: &dyn Reranker,
    diversifier: &dyn Diversifier,
    top_k: usize,
) -> Vec<Chunk> {
    sort_by_score(snapshot, &mut candidates);
    let reranked = reranker.rerank(query, candidates);
    diversifier.diversify(reranked, top_k)
}

pub(crate) fn sort_by_score(snapshot: &CorpusSnapshot, chunks: &mut [Chunk]) {
    chunks.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                let pa = snapshot.position(&a.id).unwrap_or(usize::MAX);
                let pb = snapshot.position(&b.id).unwrap_or(usize::MAX);
                pa.cmp(&pb)
            })
    });
}

/// Make `top` span at least `required` documents, drawing from `pool`.
///
/// `pool` is expected best-first. While short, the best pool chunk of each
/// missing document is appended when `top` has room, or otherwise replaces
/// the lowest-ranked chunk of a document that appears more than once. Stops
/// when no such swap is possible.
pub fn enforce_document_coverage(mut top: Vec<Chunk>, pool: &[Chunk], required: usize, top_k: usize) -> Vec<Chunk> {
    let mut present: HashSet<String> = top.iter().map(|c| c.filename.clone()).collect();
    if present.len() >= required {
        return top;
    }

    let mut replacements: Vec<&Chunk> = Vec::new();
    let mut offered: HashSet<&str> = HashSet::new();
    for chunk in pool {
        if !present.contains(&chunk.filename) && offered.insert(chunk.filename.as_str()) {
            replacements.push(chunk);
        }
    }

    let before = present.len();
    for candidate in replacements {
        if present.len() >= required {
            break;
        }
        if top.len() < top_k {
            present.insert(candidate.filename.clone());
            top.push(candidate.clone());
            continue;
        }
        let Some(victim) = lowest_duplicate(&top) else {
            break;
        };
        top.remove(victim);
        present.insert(candidate.filename.clone());
        top.push(candidate.clone());
    }

    tracing::debug!(
        required,
        before,
        after = present.len(),
        "Enforced document coverage"
    );
    top
}

/// Position of the lowest-ranked chunk whose document has another chunk in `top`.
fn lowest_duplicate(top: &[Chunk]) -> Option<usize> {
    (0..top.len()).rev().find(|&pos| {
        top.iter()
            .enumerate()
            .any(|(other, c)| other != pos && c.filename == top[pos].filename)
    })
}
