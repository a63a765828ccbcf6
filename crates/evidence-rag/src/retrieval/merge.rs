//! Chunk set merging.
//!
//! Every stage that combines result sets goes through [`merge_chunks`], so
//! the no-duplicate and first-seen-order guarantees hold in one place.

use std::collections::{HashMap, HashSet};

use crate::types::Chunk;

/// Merge `incoming` into `base` by chunk id.
///
/// Order is first-seen. A repeated id keeps the higher score and picks up any
/// pass tag the earlier copy lacked.
pub fn merge_chunks<I>(base: Vec<Chunk>, incoming: I) -> Vec<Chunk>
where
    I: IntoIterator<Item = Chunk>,
{
    let mut merged: Vec<Chunk> = Vec::with_capacity(base.len());
    let mut positions: HashMap<String, usize> = HashMap::new();

    for chunk in base.into_iter().chain(incoming) {
        absorb(&mut merged, &mut positions, chunk);
    }

    merged
}

fn absorb(merged: &mut Vec<Chunk>, positions: &mut HashMap<String, usize>, chunk: Chunk) {
    if let Some(&pos) = positions.get(&chunk.id) {
        let existing = &mut merged[pos];
        if chunk.score > existing.score {
            existing.score = chunk.score;
        }
        if existing.bridge_concept.is_none() {
            existing.bridge_concept = chunk.bridge_concept;
        }
        if existing.adversarial_signal.is_none() {
            existing.adversarial_signal = chunk.adversarial_signal;
        }
        return;
    }

    positions.insert(chunk.id.clone(), merged.len());
    merged.push(chunk);
}

/// Trim `chunks` to the `cap` best by score, keeping first-seen order.
///
/// The best chunk of every document in `protected` survives regardless of
/// score, so the result may exceed `cap` when more documents are protected
/// than there are slots. Ties go to the earlier chunk.
pub fn cap_by_score(chunks: Vec<Chunk>, cap: usize, protected: &HashSet<String>) -> Vec<Chunk> {
    if chunks.len() <= cap {
        return chunks;
    }

    let mut ranked: Vec<usize> = (0..chunks.len()).collect();
    ranked.sort_by(|&a, &b| {
        chunks[b]
            .score
            .partial_cmp(&chunks[a].score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });

    let mut keep = vec![false; chunks.len()];
    let mut kept = 0usize;
    let mut represented: HashSet<&str> = HashSet::new();
    for &i in &ranked {
        let filename = chunks[i].filename.as_str();
        if protected.contains(filename) && represented.insert(filename) {
            keep[i] = true;
            kept += 1;
        }
    }
    for &i in &ranked {
        if kept >= cap {
            break;
        }
        if !keep[i] {
            keep[i] = true;
            kept += 1;
        }
    }

    chunks
        .into_iter()
        .zip(keep)
        .filter_map(|(chunk, keep)| keep.then_some(chunk))
        .collect()
}

/// Drop repeated ids, keeping the first occurrence (with merged score/tags).
pub fn dedupe_chunks(chunks: Vec<Chunk>) -> Vec<Chunk> {
    merge_chunks(chunks, std::iter::empty())
}

/// Distinct source documents represented in `chunks`.
pub fn distinct_documents(chunks: &[Chunk]) -> usize {
    chunks
        .iter()
        .map(|c| c.filename.as_str())
        .collect::<HashSet<_>>()
        .len()
}
