//! Evidence Completeness Assessment
//!
//! Decides, before any answer is generated, whether the retrieved sources can
//! support a grounded answer for the query's scope. Each rule below is an
//! independent trigger; any one of them asks for more evidence.
//!
//! 1. No sources at all.
//! 2. Fewer distinct documents than the scope requires (see [`required_docs`]).
//! 3. A broad query over a sizeable corpus whose retrieval touched too small a
//!    share of the documents.
//! 4. Several unresolved gaps while document coverage is still low.
//!
//! The assessment is a pure function of its inputs.

use std::collections::{HashMap, HashSet};

use crate::config::CompletenessConfig;
use crate::rag::evidence_model::EvidenceModel;
use crate::rag::intent::QueryProfile;
use crate::retrieval::required_docs;
use crate::types::{ActivationReport, Chunk, EvidenceVerdict};

/// A concept backed by fewer documents than this is poorly covered.
const WELL_COVERED_DOCUMENTS: usize = 2;

pub fn assess_completeness(
    query: &str,
    sources: &[Chunk],
    model: &EvidenceModel,
    report: &ActivationReport,
    profile: &QueryProfile,
    config: &CompletenessConfig,
) -> EvidenceVerdict {
    let mut seen_ids = HashSet::new();
    let sources: Vec<&Chunk> = sources.iter().filter(|c| seen_ids.insert(c.id.as_str())).collect();
    let documents: HashSet<&str> = sources.iter().map(|c| c.filename.as_str()).collect();

    let required = required_docs(profile, report.total_documents);
    let coverage_pct = report.coverage_pct;
    let unresolved_gaps = model.gaps.len();

    let mut reasons = Vec::new();
    let mut coverage_shortfall = false;

    if sources.is_empty() {
        reasons.push("No sources were retrieved for this question.".to_string());
    }
    if !sources.is_empty() && documents.len() < required {
        coverage_shortfall = true;
        reasons.push(format!(
            "Only {} distinct document(s) support the answer; {} are required for this question's scope.",
            documents.len(),
            required
        ));
    }
    if profile.broad_coverage
        && report.total_documents >= config.coverage_floor_min_documents
        && coverage_pct < config.coverage_floor_pct
    {
        coverage_shortfall = true;
        reasons.push(format!(
            "Retrieval reached {:.0}% of the corpus documents; broad questions need at least {:.0}%.",
            coverage_pct, config.coverage_floor_pct
        ));
    }
    if unresolved_gaps >= config.gap_threshold && coverage_pct < config.gap_low_coverage_pct {
        reasons.push(format!(
            "{} parts of the question have no supporting source: {}.",
            unresolved_gaps,
            model.gaps.join(", ")
        ));
    }

    let needs_more_evidence = !reasons.is_empty();
    let requested_topics = if needs_more_evidence {
        requested_topics(query, &sources, model, coverage_shortfall, config.max_requested_topics)
    } else {
        Vec::new()
    };

    let verdict = EvidenceVerdict {
        needs_more_evidence,
        source_count: sources.len(),
        document_count: documents.len(),
        required_documents: required,
        coverage_pct,
        unresolved_gaps,
        reasons,
        requested_topics,
    };

    tracing::debug!(
        needs_more_evidence = verdict.needs_more_evidence,
        sources = verdict.source_count,
        documents = verdict.document_count,
        required = verdict.required_documents,
        coverage_pct = format_args!("{:.1}", verdict.coverage_pct),
        gaps = verdict.unresolved_gaps,
        reasons = ?verdict.reasons,
        "Evidence completeness assessed"
    );

    verdict
}

/// Gaps first, then (on a coverage shortfall) model concepts backed by too few
/// documents, then the query itself when nothing more specific is known.
fn requested_topics(
    query: &str,
    sources: &[&Chunk],
    model: &EvidenceModel,
    coverage_shortfall: bool,
    max: usize,
) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut topics = Vec::new();

    for gap in &model.gaps {
        push_topic(&mut topics, &mut seen, gap, max);
    }

    if coverage_shortfall {
        let texts: Vec<(String, &str)> = sources
            .iter()
            .map(|c| (c.text.to_lowercase(), c.filename.as_str()))
            .collect();
        let mut backing: HashMap<&str, HashSet<&str>> = HashMap::new();
        for concept in model.concepts.iter().chain(model.entities.iter()) {
            let needle = concept.to_lowercase();
            let documents = backing.entry(concept.as_str()).or_default();
            for (text, filename) in &texts {
                if text.contains(&needle) {
                    documents.insert(filename);
                }
            }
        }
        for concept in model.concepts.iter().chain(model.entities.iter()) {
            if backing.get(concept.as_str()).map_or(0, |d| d.len()) < WELL_COVERED_DOCUMENTS {
                push_topic(&mut topics, &mut seen, concept, max);
            }
        }
    }

    if topics.is_empty() {
        push_topic(&mut topics, &mut seen, query, max);
    }
    topics
}

/// Append `topic` unless it is blank, already requested (case-insensitive)
/// or the list is full.
fn push_topic(topics: &mut Vec<String>, seen: &mut HashSet<String>, topic: &str, max: usize) {
    let topic = topic.trim();
    if !topic.is_empty() && topics.len() < max && seen.insert(topic.to_lowercase()) {
        topics.push(topic.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(total_documents: usize, activated_documents: usize) -> ActivationReport {
        let coverage_pct = if total_documents == 0 {
            0.0
        } else {
            activated_documents as f32 / total_documents as f32 * 100.0
        };
        ActivationReport {
            total_documents,
            activated_documents,
            coverage_pct,
            ..Default::default()
        }
    }

    fn chunk(id: &str, filename: &str, text: &str) -> Chunk {
        Chunk::new(id, filename, 0, text)
    }

    fn broad() -> QueryProfile {
        QueryProfile {
            broad_coverage: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_no_sources() {
        let verdict = assess_completeness(
            "what failed",
            &[],
            &EvidenceModel::default(),
            &report(4, 0),
            &QueryProfile::default(),
            &CompletenessConfig::default(),
        );
        assert!(verdict.needs_more_evidence);
        assert_eq!(verdict.reasons.len(), 1);
        assert_eq!(verdict.requested_topics, vec!["what failed"]);
    }

    #[test]
    fn test_narrow_query_with_one_document_is_sufficient() {
        let sources = vec![chunk("a0", "a.md", "rollback takes five minutes")];
        let verdict = assess_completeness(
            "how long does rollback take",
            &sources,
            &EvidenceModel::default(),
            &report(4, 1),
            &QueryProfile::default(),
            &CompletenessConfig::default(),
        );
        assert!(verdict.is_sufficient());
        assert!(verdict.reasons.is_empty());
        assert!(verdict.requested_topics.is_empty());
        assert_eq!(verdict.required_documents, 1);
    }

    #[test]
    fn test_single_document_corpus_never_short_on_documents() {
        let sources = vec![
            chunk("a0", "a.md", "overview of the platform"),
            chunk("a1", "a.md", "summary of incidents"),
        ];
        let verdict = assess_completeness(
            "summarize everything",
            &sources,
            &EvidenceModel::default(),
            &report(1, 1),
            &broad(),
            &CompletenessConfig::default(),
        );
        assert_eq!(verdict.required_documents, 1);
        assert!(verdict.is_sufficient());
    }

    #[test]
    fn test_broad_query_document_and_coverage_shortfall() {
        let sources = vec![
            chunk("a0", "a.md", "rollback drills happen quarterly"),
            chunk("a1", "a.md", "rollback takes five minutes"),
        ];
        let model = EvidenceModel {
            concepts: vec!["rollback".to_string(), "budget".to_string()],
            ..Default::default()
        };
        let verdict = assess_completeness(
            "summarize all rollback findings",
            &sources,
            &model,
            &report(10, 1),
            &broad(),
            &CompletenessConfig::default(),
        );

        assert!(verdict.needs_more_evidence);
        assert_eq!(verdict.required_documents, 3);
        assert_eq!(verdict.reasons.len(), 2);
        assert!(verdict.reasons[0].contains("distinct document"));
        assert!(verdict.reasons[1].contains("10%"));
        assert_eq!(verdict.requested_topics, vec!["rollback", "budget"]);
    }

    #[test]
    fn test_gaps_trigger_only_with_low_coverage() {
        let sources = vec![chunk("a0", "a.md", "text"), chunk("b0", "b.md", "text")];
        let model = EvidenceModel {
            gaps: vec!["pricing".to_string(), "sla".to_string(), "renewal".to_string()],
            ..Default::default()
        };
        let config = CompletenessConfig::default();

        let low = assess_completeness("q", &sources, &model, &report(10, 2), &QueryProfile::default(), &config);
        assert!(low.needs_more_evidence);
        assert_eq!(low.unresolved_gaps, 3);
        assert_eq!(low.requested_topics, vec!["pricing", "sla", "renewal"]);

        let high = assess_completeness("q", &sources, &model, &report(3, 2), &QueryProfile::default(), &config);
        assert!(high.is_sufficient());
    }

    #[test]
    fn test_requested_topics_are_capped_and_distinct() {
        let sources = vec![chunk("a0", "a.md", "text")];
        let gaps: Vec<String> = (0..12).map(|i| format!("topic {}", i % 10)).collect();
        let model = EvidenceModel {
            gaps,
            ..Default::default()
        };
        let verdict = assess_completeness(
            "q",
            &sources,
            &model,
            &report(10, 1),
            &QueryProfile::default(),
            &CompletenessConfig::default(),
        );
        assert_eq!(verdict.requested_topics.len(), 8);
        let unique: HashSet<&String> = verdict.requested_topics.iter().collect();
        assert_eq!(unique.len(), 8);
    }

    #[test]
    fn test_requested_topics_skip_well_covered_concepts() {
        let a = chunk("a0", "a.md", "Rollback drills and the budget review.");
        let b = chunk("b0", "b.md", "Rollback takes five minutes.");
        let sources = vec![&a, &b];
        let model = EvidenceModel {
            concepts: vec!["rollback".to_string(), "Pricing".to_string()],
            gaps: vec!["pricing".to_string()],
            ..Default::default()
        };

        // "rollback" is backed by two documents; "Pricing" repeats a gap
        let topics = requested_topics("rollback cost", &sources, &model, true, 8);
        assert_eq!(topics, vec!["pricing"]);

        let covered = EvidenceModel {
            concepts: vec!["rollback".to_string()],
            ..Default::default()
        };
        let topics = requested_topics("  rollback cost ", &sources, &covered, true, 8);
        assert_eq!(topics, vec!["rollback cost"]);

        assert!(requested_topics("rollback cost", &sources, &covered, true, 0).is_empty());
    }

    #[test]
    fn test_duplicate_sources_counted_once() {
        let a = chunk("a0", "a.md", "text");
        let verdict = assess_completeness(
            "q",
            &[a.clone(), a],
            &EvidenceModel::default(),
            &report(1, 1),
            &QueryProfile::default(),
            &CompletenessConfig::default(),
        );
        assert_eq!(verdict.source_count, 1);
    }
}
