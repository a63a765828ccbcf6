use serde::{Deserialize, Serialize};

/// A contiguous span of a source document, the atomic retrieval unit.
///
/// Corpus chunks are read-only; per-query annotations (`score`, the bridge and
/// adversarial tags) are only ever set on copies handed out by retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub filename: String,
    pub index: usize,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default)]
    pub score: f32,
    /// Concept that pulled this chunk in during bridge expansion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bridge_concept: Option<String>,
    /// Contradiction-marker count assigned by the adversarial pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adversarial_signal: Option<u32>,
}

impl Chunk {
    pub fn new(
        id: impl Into<String>,
        filename: impl Into<String>,
        index: usize,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            filename: filename.into(),
            index,
            text: text.into(),
            page: None,
            score: 0.0,
            bridge_concept: None,
            adversarial_signal: None,
        }
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    /// Copy of this chunk carrying a per-query score and no pass tags.
    pub fn scored(&self, score: f32) -> Self {
        Self {
            score,
            bridge_concept: None,
            adversarial_signal: None,
            ..self.clone()
        }
    }
}

/// A source document: its filename and chunk ids in index order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub filename: String,
    pub chunk_ids: Vec<String>,
}

/// A concept shared by selected chunks from more than one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConcept {
    pub concept: String,
    pub document_count: usize,
}

/// Per-query summary of how much of the corpus a retrieval touched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivationReport {
    pub total_documents: usize,
    pub total_chunks: usize,
    pub activated_documents: usize,
    pub activated_chunks: usize,
    /// Activated documents as a percentage of corpus documents (0-100).
    pub coverage_pct: f32,
    pub pass_count: usize,
    pub stabilized: bool,
    pub adversarial_count: usize,
    pub bridge_concepts: Vec<BridgeConcept>,
    /// Corpus generation the retrieval ran against.
    pub generation: u64,
}

/// Outcome of the evidence-completeness assessment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceVerdict {
    pub needs_more_evidence: bool,
    pub source_count: usize,
    pub document_count: usize,
    pub required_documents: usize,
    pub coverage_pct: f32,
    pub unresolved_gaps: usize,
    /// Human-readable reasons, most severe first.
    pub reasons: Vec<String>,
    /// Topics of documents that would close the shortfall.
    pub requested_topics: Vec<String>,
}

impl EvidenceVerdict {
    pub fn is_sufficient(&self) -> bool {
        !self.needs_more_evidence
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scored_copy_clears_pass_tags() {
        let mut original = Chunk::new("c1", "a.md", 3, "text").with_page(2);
        original.bridge_concept = Some("latency".to_string());

        let copy = original.scored(0.7);
        assert_eq!(copy.score, 0.7);
        assert_eq!(copy.page, Some(2));
        assert!(copy.bridge_concept.is_none());
        // The source chunk is untouched
        assert_eq!(original.score, 0.0);
        assert_eq!(original.bridge_concept.as_deref(), Some("latency"));
    }

    #[test]
    fn test_chunk_deserializes_without_annotations() {
        let json = r#"{"id":"c1","filename":"a.md","index":0,"text":"hello"}"#;
        let chunk: Chunk = serde_json::from_str(json).expect("valid chunk json");
        assert_eq!(chunk.score, 0.0);
        assert!(chunk.page.is_none());
        assert!(chunk.adversarial_signal.is_none());
    }
}
