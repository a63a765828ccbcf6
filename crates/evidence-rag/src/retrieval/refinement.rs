//! Iterative retrieval refinement.
//!
//! Runs refinement probes through the base retriever (a bounded number in
//! flight), expands each probe result with anchors and concept bridges, and
//! merges it into the accumulated set until growth stabilizes or the pass
//! budget is spent. Results are consumed in probe order, so the output does
//! not depend on which retrieval finished first.

use std::collections::HashSet;

use futures::stream::{self, StreamExt};

use super::anchor::sample_anchors;
use super::bridge::expand_bridges;
use super::merge::{cap_by_score, distinct_documents, merge_chunks};
use super::{retrieve_probe, StageContext};
use crate::search::QueryTerms;
use crate::types::Chunk;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefinementOutcome {
    pub chunks: Vec<Chunk>,
    /// Probes consumed, failed ones included.
    pub passes: usize,
    pub stabilized: bool,
}

/// Refine `initial` with up to `refinement.max_passes` of `probes`.
///
/// A probe whose retrieval errors or times out still counts as a pass but
/// leaves the accumulated set and the stability counter untouched.
///
/// The accumulated set is held to `accumulated_multiplier × top_k` chunks by
/// score, so a strong probe hit displaces a weaker chunk. Every document
/// already accumulated keeps its best chunk. Stability is judged on what a
/// pass found before the cap, so a pass whose finds were turned away by the
/// cap still resets the counter.
pub async fn refine(ctx: &StageContext<'_>, initial: Vec<Chunk>, probes: Vec<String>, top_k: usize) -> RefinementOutcome {
    let config = &ctx.config.refinement;
    let probe_k = ((top_k as f32 * config.probe_k_ratio).ceil() as usize).max(1);
    let cap = top_k.max(1) * config.accumulated_multiplier;

    let mut accumulated = initial;
    let mut passes = 0usize;
    let mut stable_count = 0usize;
    let mut stabilized = false;

    let mut results = stream::iter(probes.into_iter().take(config.max_passes))
        .map(|probe| async move {
            let result = retrieve_probe(ctx, &probe, probe_k).await;
            (probe, result)
        })
        .buffered(ctx.config.concurrency.probe_concurrency.max(1));

    while let Some((probe, result)) = results.next().await {
        passes += 1;
        let hits = match result {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(probe = %probe, pass = passes, error = %e, "Refinement probe failed, skipping");
                continue;
            }
        };

        let previous_ids: HashSet<String> = accumulated.iter().map(|c| c.id.clone()).collect();
        let previous_documents: HashSet<String> = accumulated.iter().map(|c| c.filename.clone()).collect();

        let incoming = expand_probe(ctx, &probe, hits);
        let merged = merge_chunks(accumulated, incoming);

        // Growth is what the pass found, measured before the cap trims it
        let found = merged.iter().filter(|c| !previous_ids.contains(&c.id)).count();
        let document_delta = distinct_documents(&merged) as isize - previous_documents.len() as isize;
        accumulated = cap_by_score(merged, cap, &previous_documents);
        let kept = accumulated.iter().filter(|c| !previous_ids.contains(&c.id)).count();

        if document_delta <= 0 && found < config.stability_chunk_delta {
            stable_count += 1;
        } else {
            stable_count = 0;
        }

        tracing::debug!(
            probe = %probe,
            pass = passes,
            document_delta,
            found,
            kept,
            stable_count,
            accumulated = accumulated.len(),
            "Refinement pass"
        );

        if stable_count >= config.stable_passes_required {
            stabilized = true;
            break;
        }
    }

    RefinementOutcome {
        chunks: accumulated,
        passes,
        stabilized,
    }
}

/// Probe hits plus the anchors and concept bridges they lead to, best first.
///
/// Only anchors that score above zero for the probe are kept; the
/// zero-score spread anchors were already contributed by the initial pass.
fn expand_probe(ctx: &StageContext<'_>, probe: &str, hits: Vec<Chunk>) -> Vec<Chunk> {
    let probe_terms = QueryTerms::build(probe, ctx.analyzer);
    let anchors = sample_anchors(ctx.snapshot, &probe_terms, ctx.scorer, ctx.profile, &ctx.config.anchor)
        .into_iter()
        .filter(|c| c.score > 0.0);

    let pool = merge_chunks(hits, anchors);
    let bridges = expand_bridges(
        ctx.snapshot,
        &pool,
        &probe_terms,
        ctx.scorer,
        &ctx.config.bridge,
        ctx.config.bridge.max_results,
    );

    let mut incoming = merge_chunks(pool, bridges);
    incoming.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    incoming
}
