//! Post-retrieval capability interfaces.
//!
//! Both are selected once when the retriever is constructed; the defaults are
//! cheap and deterministic.

use std::collections::HashMap;

use crate::types::Chunk;

/// Reorders a ranked candidate list for the original query.
pub trait Reranker: Send + Sync {
    fn rerank(&self, query: &str, chunks: Vec<Chunk>) -> Vec<Chunk>;
}

/// Picks `limit` chunks from a ranked list, trading rank for spread.
pub trait Diversifier: Send + Sync {
    fn diversify(&self, chunks: Vec<Chunk>, limit: usize) -> Vec<Chunk>;
}

/// Keeps the incoming order.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReranker;

impl Reranker for NoopReranker {
    fn rerank(&self, _query: &str, chunks: Vec<Chunk>) -> Vec<Chunk> {
        chunks
    }
}

/// Plain truncation to `limit`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDiversifier;

impl Diversifier for NoopDiversifier {
    fn diversify(&self, mut chunks: Vec<Chunk>, limit: usize) -> Vec<Chunk> {
        chunks.truncate(limit);
        chunks
    }
}

/// Caps how much of the result a single document may take.
///
/// First pass walks the ranking and admits a chunk only while its document is
/// under `ceil(limit × max_share)`; a second pass back-fills in rank order if
/// that left room. Output keeps rank order.
#[derive(Debug, Clone, Copy)]
pub struct DocumentCapDiversifier {
    pub max_share: f32,
}

impl DocumentCapDiversifier {
    pub fn new(max_share: f32) -> Self {
        Self {
            max_share: max_share.clamp(f32::EPSILON, 1.0),
        }
    }
}

impl Default for DocumentCapDiversifier {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl Diversifier for DocumentCapDiversifier {
    fn diversify(&self, chunks: Vec<Chunk>, limit: usize) -> Vec<Chunk> {
        if chunks.len() <= 1 || limit == 0 {
            let mut chunks = chunks;
            chunks.truncate(limit);
            return chunks;
        }

        let per_document = ((limit as f32 * self.max_share).ceil() as usize).max(1);
        let mut taken = vec![false; chunks.len()];
        let mut per_doc_counts: HashMap<&str, usize> = HashMap::new();
        let mut picked = 0usize;

        for (pos, chunk) in chunks.iter().enumerate() {
            if picked >= limit {
                break;
            }
            let count = per_doc_counts.entry(chunk.filename.as_str()).or_insert(0);
            if *count < per_document {
                *count += 1;
                taken[pos] = true;
                picked += 1;
            }
        }

        for slot in taken.iter_mut() {
            if picked >= limit {
                break;
            }
            if !*slot {
                *slot = true;
                picked += 1;
            }
        }

        chunks
            .into_iter()
            .zip(taken)
            .filter_map(|(chunk, keep)| keep.then_some(chunk))
            .collect()
    }
}
