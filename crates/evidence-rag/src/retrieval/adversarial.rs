//! Adversarial retrieval pass.
//!
//! Retrieves with contradiction-seeking probes and keeps the chunks most
//! likely to limit or contradict the expected answer.

use futures::stream::{self, StreamExt};

use super::merge::merge_chunks;
use super::{retrieve_probe, StageContext};
use crate::rag::signals::contradiction_signal;
use crate::types::Chunk;

/// Disconfirming-evidence chunks for the query in `ctx`, tagged with their
/// contradiction signal.
///
/// Candidates score `lexical_weight × relevance + signal_weight ×
/// min(signal, signal_cap)` against the original query. Chunks with a signal
/// are preferred (up to `max_results`); when none has one, the best
/// `fallback_results` by relevance are returned instead, so the pass is only
/// empty when no probe returned anything.
pub async fn adversarial_pass(ctx: &StageContext<'_>, probes: Vec<String>) -> Vec<Chunk> {
    let config = &ctx.config.adversarial;

    let mut results = stream::iter(probes.into_iter().take(config.max_passes))
        .map(|probe| async move {
            let result = retrieve_probe(ctx, &probe, config.max_results).await;
            (probe, result)
        })
        .buffered(ctx.config.concurrency.probe_concurrency.max(1));

    let mut candidates: Vec<Chunk> = Vec::new();
    let mut passes = 0usize;
    while let Some((probe, result)) = results.next().await {
        passes += 1;
        match result {
            Ok(hits) => candidates = merge_chunks(candidates, hits),
            Err(e) => {
                tracing::warn!(probe = %probe, error = %e, "Adversarial probe failed, skipping");
            }
        }
    }

    let mut scored: Vec<(f32, f32, usize, Chunk)> = candidates
        .into_iter()
        .enumerate()
        .map(|(order, chunk)| {
            let relevance = ctx.scorer.score(&chunk, ctx.terms);
            let signal = contradiction_signal(&chunk.text).min(config.signal_cap);
            let score = config.lexical_weight * relevance + config.signal_weight * signal as f32;
            let position = ctx.snapshot.position(&chunk.id).unwrap_or(usize::MAX - order);
            let mut tagged = chunk.scored(score);
            tagged.adversarial_signal = Some(signal);
            (score, relevance, position, tagged)
        })
        .collect();

    let any_signal = scored.iter().any(|(_, _, _, c)| c.adversarial_signal.unwrap_or(0) > 0);
    let selected: Vec<Chunk> = if any_signal {
        scored.retain(|(_, _, _, c)| c.adversarial_signal.unwrap_or(0) > 0);
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.2.cmp(&b.2))
        });
        scored.into_iter().take(config.max_results).map(|(_, _, _, c)| c).collect()
    } else {
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.2.cmp(&b.2))
        });
        scored.into_iter().take(config.fallback_results).map(|(_, _, _, c)| c).collect()
    };

    tracing::info!(
        passes,
        selected = selected.len(),
        with_signal = any_signal,
        "Adversarial retrieval pass complete"
    );

    selected
}
