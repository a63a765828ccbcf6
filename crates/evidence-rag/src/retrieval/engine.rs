use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::activation::build_activation_report;
use super::adversarial::adversarial_pass;
use super::anchor::sample_anchors;
use super::bridge::{expand_bridges, seed_concept_votes};
use super::coverage::{enforce_document_coverage, rank_candidates, required_docs, sort_by_score};
use super::merge::{distinct_documents, merge_chunks};
use super::probes::{build_adversarial_probes, build_refinement_probes};
use super::refinement::{refine, RefinementOutcome};
use super::{retrieve_probe, StageContext};
use crate::cancel::{run_until_cancelled, CancellationToken};
use crate::config::EngineConfig;
use crate::corpus::{CorpusSnapshot, CorpusStore};
use crate::error::EngineResult;
use crate::rag::intent::{IntentGraph, QueryProfile};
use crate::rag::query::sanitize_query;
use crate::reranking::{Diversifier, DocumentCapDiversifier, NoopReranker, Reranker};
use crate::search::{BaseRetriever, LexicalScorer, QueryTerms, RelevanceScorer, RetrieveOptions};
use crate::text::{SimpleTextAnalyzer, TextAnalyzer};
use crate::types::{ActivationReport, Chunk};

/// Seed concepts used to qualify adversarial probes.
const ADVERSARIAL_SEED_CONCEPTS: usize = 3;

/// Everything one retrieval produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalOutcome {
    /// The sanitized query the engine ran.
    pub query: String,
    /// Final evidence set: coverage-enforced top-K plus adversarial chunks.
    pub chunks: Vec<Chunk>,
    /// The adversarial subset, also present in `chunks`.
    pub adversarial: Vec<Chunk>,
    pub report: ActivationReport,
    pub profile: QueryProfile,
}

/// Retrieval refinement engine over a [`CorpusStore`].
///
/// Collaborators are fixed at construction; every call reads one corpus
/// snapshot and carries all per-query state in local values.
pub struct EvidenceRetriever {
    store: Arc<CorpusStore>,
    base: Arc<dyn BaseRetriever>,
    analyzer: Arc<dyn TextAnalyzer>,
    scorer: Arc<dyn RelevanceScorer>,
    reranker: Arc<dyn Reranker>,
    diversifier: Arc<dyn Diversifier>,
    config: EngineConfig,
}

impl EvidenceRetriever {
    pub fn new(store: Arc<CorpusStore>, base: Arc<dyn BaseRetriever>, config: EngineConfig) -> Self {
        let diversifier = DocumentCapDiversifier::new(config.retrieval.max_document_share);
        Self {
            store,
            base,
            analyzer: Arc::new(SimpleTextAnalyzer::new()),
            scorer: Arc::new(LexicalScorer::new()),
            reranker: Arc::new(NoopReranker),
            diversifier: Arc::new(diversifier),
            config,
        }
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn TextAnalyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn RelevanceScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = reranker;
        self
    }

    pub fn with_diversifier(mut self, diversifier: Arc<dyn Diversifier>) -> Self {
        self.diversifier = diversifier;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<CorpusStore> {
        &self.store
    }

    pub fn analyzer(&self) -> &dyn TextAnalyzer {
        self.analyzer.as_ref()
    }

    /// Retrieve a broad, cross-document evidence set for `query`.
    ///
    /// Never fails: collaborator errors shrink the result instead. An empty
    /// corpus, an empty query or `top_k == 0` yield an empty outcome.
    pub async fn retrieve(&self, query: &str, top_k: usize, options: &RetrieveOptions) -> RetrievalOutcome {
        let query = sanitize_query(query, self.config.retrieval.max_query_chars);
        let snapshot = self.store.snapshot();
        let profile = QueryProfile::from_query(&query).with_options(options);

        if snapshot.is_empty() || query.is_empty() || top_k == 0 {
            return RetrievalOutcome {
                report: build_activation_report(&snapshot, &[], 0, false, 0),
                query,
                profile,
                ..Default::default()
            };
        }

        let terms = QueryTerms::build(&query, self.analyzer.as_ref());
        let ctx = StageContext {
            snapshot: &snapshot,
            base: self.base.as_ref(),
            analyzer: self.analyzer.as_ref(),
            scorer: self.scorer.as_ref(),
            terms: &terms,
            profile: &profile,
            options,
            config: &self.config,
        };

        let initial = self.initial_pool(&ctx, &query, top_k).await;

        let refined = if !options.skip_refinement && profile.needs_refinement() {
            let intent = IntentGraph::build(&query, self.analyzer.as_ref());
            let probes = build_refinement_probes(&query, &intent, &profile, &terms, self.config.refinement.max_probes);
            refine(&ctx, initial, probes, top_k).await
        } else {
            RefinementOutcome {
                chunks: initial,
                ..Default::default()
            }
        };

        let mut pool = refined.chunks;
        sort_by_score(&snapshot, &mut pool);
        let ranked = rank_candidates(
            &snapshot,
            &query,
            pool.clone(),
            self.reranker.as_ref(),
            self.diversifier.as_ref(),
            top_k,
        );
        let required = required_docs(&profile, snapshot.document_count());
        let top = enforce_document_coverage(ranked, &pool, required, top_k);

        let adversarial = if options.skip_adversarial {
            Vec::new()
        } else {
            let seed_concepts = self.adversarial_seed_concepts(&snapshot, &top);
            let probes = build_adversarial_probes(&terms, &seed_concepts, self.config.adversarial.max_passes);
            adversarial_pass(&ctx, probes).await
        };

        let chunks = merge_chunks(top, adversarial.clone());
        let report = build_activation_report(
            &snapshot,
            &chunks,
            refined.passes,
            refined.stabilized,
            adversarial.len(),
        );

        tracing::info!(
            generation = report.generation,
            chunks = chunks.len(),
            documents = report.activated_documents,
            required_documents = required,
            coverage_pct = format_args!("{:.1}", report.coverage_pct),
            passes = report.pass_count,
            stabilized = report.stabilized,
            adversarial = adversarial.len(),
            "Retrieval complete"
        );

        RetrievalOutcome {
            query,
            chunks,
            adversarial,
            report,
            profile,
        }
    }

    /// [`Self::retrieve`], abandoned as soon as `cancel` fires.
    ///
    /// Outstanding probe retrievals are dropped with the retrieval future;
    /// partial results are discarded.
    pub async fn retrieve_with_cancel(
        &self,
        query: &str,
        top_k: usize,
        options: &RetrieveOptions,
        cancel: &CancellationToken,
    ) -> EngineResult<RetrievalOutcome> {
        let outcome = run_until_cancelled(cancel, self.retrieve(query, top_k, options)).await;
        if outcome.is_err() {
            tracing::info!("Retrieval cancelled");
        }
        outcome
    }

    /// Base hits, every document's anchors, and the concept bridges leading
    /// out of the relevant part of that pool.
    async fn initial_pool(&self, ctx: &StageContext<'_>, query: &str, top_k: usize) -> Vec<Chunk> {
        let hits = match retrieve_probe(ctx, query, top_k).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(error = %e, "Base retrieval failed, continuing with anchors only");
                Vec::new()
            }
        };
        let base_documents = distinct_documents(&hits);

        let anchors = sample_anchors(ctx.snapshot, ctx.terms, ctx.scorer, ctx.profile, &self.config.anchor);
        let pool = merge_chunks(hits, anchors);

        let seeds: Vec<Chunk> = pool.iter().filter(|c| c.score > 0.0).cloned().collect();
        let bridges = expand_bridges(
            ctx.snapshot,
            &seeds,
            ctx.terms,
            ctx.scorer,
            &self.config.bridge,
            self.config.bridge.max_results,
        );

        tracing::debug!(
            base_documents,
            pool = pool.len(),
            bridges = bridges.len(),
            "Initial retrieval pool"
        );
        merge_chunks(pool, bridges)
    }

    fn adversarial_seed_concepts(&self, snapshot: &CorpusSnapshot, top: &[Chunk]) -> Vec<String> {
        seed_concept_votes(snapshot, top, &self.config.bridge)
            .into_iter()
            .take(ADVERSARIAL_SEED_CONCEPTS)
            .map(|(concept, _)| concept)
            .collect()
    }
}
