//! In-memory corpus state.
//!
//! A [`CorpusSnapshot`] is an immutable generation of the chunk set plus the
//! concept index derived from it. [`CorpusStore`] publishes the current
//! snapshot: queries clone the `Arc` once and keep working against that
//! generation while a reload builds the next one off-lock and swaps it in.

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::graph::ConceptIndex;
use crate::types::{Chunk, Document};

#[derive(Debug, Default)]
pub struct CorpusSnapshot {
    generation: u64,
    chunks: Vec<Chunk>,
    by_id: HashMap<String, usize>,
    documents: Vec<Document>,
    by_document: HashMap<String, usize>,
    concepts: ConceptIndex,
}

impl CorpusSnapshot {
    /// Build a snapshot from ingested chunks.
    ///
    /// Chunk ids must be unique within a generation; later duplicates are
    /// dropped. Documents are ordered by first appearance, their chunk ids by
    /// chunk index.
    pub fn build(generation: u64, chunks: Vec<Chunk>) -> Self {
        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(chunks.len());
        let mut dropped = 0usize;
        for chunk in chunks {
            if seen.insert(chunk.id.clone()) {
                unique.push(chunk);
            } else {
                dropped += 1;
            }
        }
        if dropped > 0 {
            tracing::warn!(dropped, "Dropped chunks with duplicate ids");
        }

        let by_id: HashMap<String, usize> = unique
            .iter()
            .enumerate()
            .map(|(pos, chunk)| (chunk.id.clone(), pos))
            .collect();

        let mut documents: Vec<Document> = Vec::new();
        let mut by_document: HashMap<String, usize> = HashMap::new();
        for chunk in &unique {
            let slot = *by_document.entry(chunk.filename.clone()).or_insert_with(|| {
                documents.push(Document {
                    filename: chunk.filename.clone(),
                    chunk_ids: Vec::new(),
                });
                documents.len() - 1
            });
            documents[slot].chunk_ids.push(chunk.id.clone());
        }
        for document in &mut documents {
            document
                .chunk_ids
                .sort_by_key(|id| by_id.get(id).map(|&pos| (unique[pos].index, pos)));
        }

        let concepts = ConceptIndex::build(&unique);

        tracing::info!(
            generation,
            chunks = unique.len(),
            documents = documents.len(),
            concepts = concepts.concept_count(),
            edges = concepts.graph().edge_count(),
            "Built corpus snapshot"
        );

        Self {
            generation,
            chunks: unique,
            by_id,
            documents,
            by_document,
            concepts,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn chunk(&self, id: &str) -> Option<&Chunk> {
        self.by_id.get(id).map(|&pos| &self.chunks[pos])
    }

    /// Position of a chunk in corpus order, used as a stable tie-breaker.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn document(&self, filename: &str) -> Option<&Document> {
        self.by_document.get(filename).map(|&pos| &self.documents[pos])
    }

    /// Chunks of a document in index order.
    pub fn document_chunks<'a>(&'a self, document: &'a Document) -> impl Iterator<Item = &'a Chunk> + 'a {
        document.chunk_ids.iter().filter_map(move |id| self.chunk(id))
    }

    pub fn concepts(&self) -> &ConceptIndex {
        &self.concepts
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Publishes corpus generations to concurrent readers.
#[derive(Debug)]
pub struct CorpusStore {
    current: RwLock<Arc<CorpusSnapshot>>,
    next_generation: AtomicU64,
}

impl CorpusStore {
    /// An empty store (generation 0).
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(CorpusSnapshot::default())),
            next_generation: AtomicU64::new(1),
        }
    }

    pub fn from_chunks(chunks: Vec<Chunk>) -> Self {
        let store = Self::new();
        store.reload(chunks);
        store
    }

    /// The snapshot queries should run against.
    pub fn snapshot(&self) -> Arc<CorpusSnapshot> {
        self.current.read().clone()
    }

    /// Replace the corpus wholesale and return the new generation.
    ///
    /// The concept index is rebuilt before the write lock is taken, so
    /// readers are only blocked for the pointer swap.
    pub fn reload(&self, chunks: Vec<Chunk>) -> u64 {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let snapshot = Arc::new(CorpusSnapshot::build(generation, chunks));

        let mut current = self.current.write();
        // Two racing reloads: never replace a newer generation with an older one
        if current.generation() < generation {
            *current = snapshot;
        }
        current.generation()
    }

    pub fn generation(&self) -> u64 {
        self.current.read().generation()
    }
}

impl Default for CorpusStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_documents_grouped_and_ordered_by_index() {
        let snapshot = CorpusSnapshot::build(
            1,
            vec![
                Chunk::new("b1", "b.md", 1, "second"),
                Chunk::new("a0", "a.md", 0, "first"),
                Chunk::new("b0", "b.md", 0, "first"),
            ],
        );

        assert_eq!(snapshot.document_count(), 2);
        assert_eq!(snapshot.documents()[0].filename, "b.md");
        assert_eq!(snapshot.documents()[0].chunk_ids, vec!["b0", "b1"]);
        assert_eq!(snapshot.document("a.md").map(|d| d.chunk_ids.len()), Some(1));
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let snapshot = CorpusSnapshot::build(
            1,
            vec![
                Chunk::new("c1", "a.md", 0, "original"),
                Chunk::new("c1", "b.md", 0, "duplicate"),
            ],
        );

        assert_eq!(snapshot.chunk_count(), 1);
        assert_eq!(snapshot.chunk("c1").map(|c| c.text.as_str()), Some("original"));
        assert_eq!(snapshot.document_count(), 1);
    }

    #[test]
    fn test_reload_publishes_new_generation_without_touching_old_readers() {
        let store = CorpusStore::from_chunks(vec![Chunk::new("c1", "a.md", 0, "alpha")]);
        let before = store.snapshot();
        let first_generation = before.generation();

        let generation = store.reload(vec![
            Chunk::new("c1", "a.md", 0, "alpha"),
            Chunk::new("c2", "b.md", 0, "beta"),
        ]);

        assert!(generation > first_generation);
        assert_eq!(before.chunk_count(), 1);
        assert_eq!(store.snapshot().chunk_count(), 2);
        assert_eq!(store.generation(), generation);
    }

    #[test]
    fn test_empty_store() {
        let store = CorpusStore::new();
        let snapshot = store.snapshot();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.generation(), 0);
    }
}
