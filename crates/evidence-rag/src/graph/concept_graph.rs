use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use rayon::prelude::*;
use std::collections::HashMap;

use super::concepts::extract_concepts;
use crate::types::Chunk;

/// Concepts per chunk that take part in co-occurrence edges.
pub const GRAPH_CONCEPTS_PER_CHUNK: usize = 18;

/// Weighted concept co-occurrence graph.
///
/// Undirected, so every edge is symmetric by construction. The weight of an
/// edge is the sum over chunks of `1 / (distance + 1)` where distance is the
/// gap between the two concepts in extraction order.
#[derive(Debug, Clone, Default)]
pub struct ConceptGraph {
    graph: UnGraph<String, f32>,
    name_to_node: HashMap<String, NodeIndex>,
}

impl ConceptGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_node(&mut self, concept: &str) -> NodeIndex {
        if let Some(&idx) = self.name_to_node.get(concept) {
            return idx;
        }
        let idx = self.graph.add_node(concept.to_string());
        self.name_to_node.insert(concept.to_string(), idx);
        idx
    }

    /// Accumulate `weight` on the edge between `a` and `b`.
    pub fn add_cooccurrence(&mut self, a: &str, b: &str, weight: f32) {
        if a == b {
            return;
        }
        let a_idx = self.ensure_node(a);
        let b_idx = self.ensure_node(b);

        match self.graph.find_edge(a_idx, b_idx) {
            Some(edge) => {
                if let Some(w) = self.graph.edge_weight_mut(edge) {
                    *w += weight;
                }
            }
            None => {
                self.graph.add_edge(a_idx, b_idx, weight);
            }
        }
    }

    /// Accumulated weight between two concepts, 0 when unconnected.
    pub fn weight(&self, a: &str, b: &str) -> f32 {
        let (Some(&a_idx), Some(&b_idx)) = (self.name_to_node.get(a), self.name_to_node.get(b)) else {
            return 0.0;
        };
        self.graph
            .find_edge(a_idx, b_idx)
            .and_then(|e| self.graph.edge_weight(e))
            .copied()
            .unwrap_or(0.0)
    }

    /// The `limit` highest-weight neighbors of `concept`.
    ///
    /// Ties are broken by concept name so the walk is deterministic.
    pub fn top_neighbors(&self, concept: &str, limit: usize) -> Vec<(String, f32)> {
        let Some(&idx) = self.name_to_node.get(concept) else {
            return Vec::new();
        };

        let mut neighbors: Vec<(String, f32)> = self
            .graph
            .edges(idx)
            .filter_map(|edge| {
                let other = if edge.source() == idx { edge.target() } else { edge.source() };
                self.graph
                    .node_weight(other)
                    .map(|name| (name.clone(), *edge.weight()))
            })
            .collect();

        neighbors.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        neighbors.truncate(limit);
        neighbors
    }

    pub fn contains(&self, concept: &str) -> bool {
        self.name_to_node.contains_key(concept)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }
}

/// Everything derived from concept extraction over a corpus generation.
///
/// Built wholesale by [`ConceptIndex::build`]; never patched incrementally.
#[derive(Debug, Clone, Default)]
pub struct ConceptIndex {
    graph: ConceptGraph,
    concept_chunks: HashMap<String, Vec<String>>,
    chunk_concepts: HashMap<String, Vec<String>>,
    chunk_document: HashMap<String, String>,
}

impl ConceptIndex {
    /// Build graph, concept→chunk index, per-chunk concept cache and
    /// chunk→document map in one pass over `chunks`.
    pub fn build(chunks: &[Chunk]) -> Self {
        // Extraction is independent per chunk; accumulation below stays
        // sequential in corpus order so edge weights are reproducible.
        let extracted: Vec<Vec<String>> = chunks
            .par_iter()
            .map(|chunk| extract_concepts(&chunk.text))
            .collect();

        let mut index = Self::default();

        for (chunk, concepts) in chunks.iter().zip(extracted) {
            let linked = &concepts[..concepts.len().min(GRAPH_CONCEPTS_PER_CHUNK)];
            for i in 0..linked.len() {
                for j in (i + 1)..linked.len() {
                    let weight = 1.0 / ((j - i) as f32 + 1.0);
                    index.graph.add_cooccurrence(&linked[i], &linked[j], weight);
                }
            }

            for concept in &concepts {
                index
                    .concept_chunks
                    .entry(concept.clone())
                    .or_default()
                    .push(chunk.id.clone());
            }
            index
                .chunk_document
                .insert(chunk.id.clone(), chunk.filename.clone());
            index.chunk_concepts.insert(chunk.id.clone(), concepts);
        }

        index
    }

    pub fn graph(&self) -> &ConceptGraph {
        &self.graph
    }

    /// Chunk ids containing `concept`, in corpus order.
    pub fn chunks_for(&self, concept: &str) -> &[String] {
        self.concept_chunks
            .get(concept)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Cached concepts of a corpus chunk, in extraction order.
    pub fn concepts_of(&self, chunk_id: &str) -> Option<&[String]> {
        self.chunk_concepts.get(chunk_id).map(Vec::as_slice)
    }

    /// Concepts of `chunk`, from the cache when it belongs to this corpus.
    pub fn concepts_for_chunk(&self, chunk: &Chunk) -> Vec<String> {
        match self.concepts_of(&chunk.id) {
            Some(cached) => cached.to_vec(),
            None => extract_concepts(&chunk.text),
        }
    }

    pub fn document_of(&self, chunk_id: &str) -> Option<&str> {
        self.chunk_document.get(chunk_id).map(String::as_str)
    }

    pub fn concept_count(&self) -> usize {
        self.concept_chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concept_chunks.is_empty()
    }
}
