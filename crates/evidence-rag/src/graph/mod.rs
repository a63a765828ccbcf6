//! Concept graph: extraction, co-occurrence weighting, and the inverted
//! concept→chunk index used to bridge documents.

pub mod concept_graph;
pub mod concepts;

pub use concept_graph::{ConceptGraph, ConceptIndex, GRAPH_CONCEPTS_PER_CHUNK};
pub use concepts::{extract_concepts, normalize_concept, MAX_CONCEPTS};
