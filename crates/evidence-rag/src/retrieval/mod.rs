//! Retrieval refinement engine.
//!
//! Turns a single base top-K retrieval into a broader, cross-document
//! evidence set: anchors per document, concept bridges, iterative probe
//! refinement, coverage enforcement and an adversarial pass. Stages are
//! plain functions over a [`StageContext`]; [`EvidenceRetriever`] composes
//! them.

pub mod activation;
pub mod adversarial;
pub mod anchor;
pub mod bridge;
pub mod coverage;
pub mod engine;
pub mod merge;
pub mod probes;
pub mod refinement;

use anyhow::Result;
use std::time::Duration;

use crate::config::EngineConfig;
use crate::corpus::CorpusSnapshot;
use crate::rag::intent::QueryProfile;
use crate::search::{BaseRetriever, QueryTerms, RelevanceScorer, RetrieveOptions};
use crate::text::TextAnalyzer;
use crate::types::Chunk;

pub use activation::build_activation_report;
pub use adversarial::adversarial_pass;
pub use anchor::sample_anchors;
pub use bridge::expand_bridges;
pub use coverage::{enforce_document_coverage, rank_candidates, required_docs};
pub use engine::{EvidenceRetriever, RetrievalOutcome};
pub use merge::{cap_by_score, dedupe_chunks, distinct_documents, merge_chunks};
pub use probes::{build_adversarial_probes, build_refinement_probes};
pub use refinement::{refine, RefinementOutcome};

/// Read-only view shared by every stage of one retrieval call.
#[derive(Clone, Copy)]
pub struct StageContext<'a> {
    pub snapshot: &'a CorpusSnapshot,
    pub base: &'a dyn BaseRetriever,
    pub analyzer: &'a dyn TextAnalyzer,
    pub scorer: &'a dyn RelevanceScorer,
    /// Terms of the original (sanitized) query.
    pub terms: &'a QueryTerms,
    pub profile: &'a QueryProfile,
    pub options: &'a RetrieveOptions,
    pub config: &'a EngineConfig,
}

/// One base retrieval under the probe timeout. A timeout is an error like
/// any other retriever failure.
pub(crate) async fn retrieve_probe(ctx: &StageContext<'_>, query: &str, top_k: usize) -> Result<Vec<Chunk>> {
    let timeout = Duration::from_millis(ctx.config.concurrency.probe_timeout_ms);
    match tokio::time::timeout(timeout, ctx.base.retrieve(query, top_k, ctx.options)).await {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!(
            "retrieval timed out after {}ms",
            timeout.as_millis()
        )),
    }
}
