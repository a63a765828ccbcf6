//! Citation/Structure Quality Gate
//!
//! Validates a generated answer against grounding and structure requirements
//! and explains every failure in terms a repair prompt can act on. Thresholds
//! tighten for broad and decision queries. Evaluation is deterministic: the
//! same answer, diagnostics and profile always give the same result.

use serde::{Deserialize, Serialize};

use crate::config::GateConfig;
use crate::rag::citation::ClaimDiagnostics;
use crate::rag::intent::QueryProfile;
use crate::rag::signals::{missing_sections, reasoning_signal_count};

/// Number of independent checks behind [`GateResult::score`].
const GATE_CHECKS: usize = 7;

/// Raw measurements the gate decided on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GateMetrics {
    pub missing_sections: Vec<String>,
    pub reasoning_signals: usize,
    pub citation_coverage: f32,
    pub citation_precision: f32,
    pub claim_support: f32,
    /// The citation analyzer asked for a repair.
    pub analyzer_flagged: bool,
    pub cited_documents: usize,
    pub required_cited_documents: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GateResult {
    pub passed: bool,
    /// Actionable failure reasons in check order; empty when passed.
    pub reasons: Vec<String>,
    /// Share of checks passed (0.0 - 1.0).
    pub score: f32,
    /// The sources, not the answer, are what keeps this answer from passing.
    pub evidence_limited: bool,
    pub metrics: GateMetrics,
}

#[derive(Debug, Clone, Default)]
pub struct QualityGate {
    config: GateConfig,
}

impl QualityGate {
    pub fn new(config: GateConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn evaluate(
        &self,
        query: &str,
        answer: &str,
        diagnostics: &ClaimDiagnostics,
        profile: &QueryProfile,
    ) -> GateResult {
        let config = &self.config;
        let mut reasons = Vec::new();
        let mut failed_checks = 0usize;

        if answer.trim().is_empty() {
            return GateResult {
                passed: false,
                reasons: vec!["The answer is empty; write a complete answer from the sources.".to_string()],
                score: 0.0,
                evidence_limited: false,
                metrics: GateMetrics::default(),
            };
        }

        // Structure
        let missing = missing_sections(answer, profile);
        if !missing.is_empty() {
            failed_checks += 1;
            for section in &missing {
                reasons.push(format!("Add a \"## {}\" section.", section.heading()));
            }
        }

        // Reasoning density
        let reasoning_signals = reasoning_signal_count(answer);
        if reasoning_signals < config.min_reasoning_signals {
            failed_checks += 1;
            reasons.push(format!(
                "Connect the evidence with explicit reasoning (because, therefore, however): found {} reasoning link(s), need {}.",
                reasoning_signals, config.min_reasoning_signals
            ));
        }

        // Citation coverage and precision
        let (min_coverage, min_precision) = if profile.is_strict() {
            (config.strict_citation_coverage, config.strict_citation_precision)
        } else {
            (config.min_citation_coverage, config.min_citation_precision)
        };
        if diagnostics.coverage < min_coverage {
            failed_checks += 1;
            reasons.push(format!(
                "Cite a source for every factual claim: {:.0}% of {} claim(s) are cited, need {:.0}%.",
                diagnostics.coverage * 100.0,
                diagnostics.claim_count,
                min_coverage * 100.0
            ));
        }
        if diagnostics.precision < min_precision {
            failed_checks += 1;
            let invalid: Vec<&str> = diagnostics
                .invalid_citations
                .iter()
                .map(|c| c.citation_text.as_str())
                .collect();
            reasons.push(format!(
                "Only cite numbers from the provided source list: {:.0}% of citations are valid, need {:.0}% (invalid: {}).",
                diagnostics.precision * 100.0,
                min_precision * 100.0,
                if invalid.is_empty() { "none listed".to_string() } else { invalid.join(", ") }
            ));
        }

        // Analyzer verdict
        if diagnostics.needs_repair {
            failed_checks += 1;
            reasons.push(format!(
                "Citations were flagged for repair: cite a listed source for each uncited claim and remove invalid citations ({} of {} valid).",
                diagnostics.valid_citations, diagnostics.total_citations
            ));
        }

        // Cross-source grounding
        let required_cited_documents = if profile.expects_cross_source() {
            config.min_cited_documents.min(diagnostics.source_documents.max(1))
        } else {
            1.min(diagnostics.source_documents)
        };
        if diagnostics.cited_documents < required_cited_documents {
            failed_checks += 1;
            reasons.push(format!(
                "Draw on more documents: {} distinct document(s) cited, need {}.",
                diagnostics.cited_documents, required_cited_documents
            ));
        }

        // Claim support
        let support_failed = diagnostics.cited_claims > 0 && diagnostics.support < config.min_claim_support;
        if support_failed {
            failed_checks += 1;
            reasons.push(format!(
                "Only {:.0}% of cited claims are backed by the cited source; restate claims using the sources' own facts.",
                diagnostics.support * 100.0
            ));
        }

        let evidence_limited = support_failed
            || (profile.expects_cross_source() && diagnostics.source_documents < config.min_cited_documents);
        let passed = reasons.is_empty();
        let score = (GATE_CHECKS - failed_checks) as f32 / GATE_CHECKS as f32;

        if !passed {
            tracing::info!(
                query_len = query.len(),
                failed_checks,
                evidence_limited,
                score = format_args!("{:.2}", score),
                "Quality gate failed"
            );
        }

        GateResult {
            passed,
            reasons,
            score,
            evidence_limited,
            metrics: GateMetrics {
                missing_sections: missing.iter().map(|s| s.heading().to_string()).collect(),
                reasoning_signals,
                citation_coverage: diagnostics.coverage,
                citation_precision: diagnostics.precision,
                claim_support: diagnostics.support,
                analyzer_flagged: diagnostics.needs_repair,
                cited_documents: diagnostics.cited_documents,
                required_cited_documents,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::citation::InvalidCitation;

    const GOOD_ANSWER: &str = "## Evidence\nRollback failed because the migration was irreversible [S1]. However, drills were added [S2].\n\n## Uncertainty & Gaps\nThe sources do not cover vendor pricing.";

    fn diagnostics() -> ClaimDiagnostics {
        ClaimDiagnostics {
            claim_count: 3,
            cited_claims: 3,
            coverage: 1.0,
            support: 1.0,
            precision: 1.0,
            total_citations: 3,
            valid_citations: 3,
            invalid_citations: Vec::new(),
            cited_documents: 2,
            source_documents: 3,
            needs_repair: false,
        }
    }

    fn decision() -> QueryProfile {
        QueryProfile {
            decision_mode: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_good_answer_passes() {
        let gate = QualityGate::default();
        let result = gate.evaluate("q", GOOD_ANSWER, &diagnostics(), &QueryProfile::default());
        assert!(result.passed, "unexpected reasons: {:?}", result.reasons);
        assert_eq!(result.score, 1.0);
        assert!(!result.evidence_limited);
    }

    #[test]
    fn test_empty_answer_fails() {
        let result = QualityGate::default().evaluate("q", "   ", &diagnostics(), &QueryProfile::default());
        assert!(!result.passed);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.reasons.len(), 1);
    }

    #[test]
    fn test_missing_sections_reported_individually() {
        let gate = QualityGate::default();
        let result = gate.evaluate("q", GOOD_ANSWER, &diagnostics(), &decision());

        assert!(!result.passed);
        assert_eq!(
            result.metrics.missing_sections,
            vec!["Options & Trade-offs", "Recommendation", "Risks"]
        );
        assert!(result.reasons[0].contains("Options & Trade-offs"));
        assert!(result.reasons[2].contains("Risks"));
    }

    #[test]
    fn test_thresholds_tighten_for_strict_profiles() {
        let gate = QualityGate::default();
        let mut diag = diagnostics();
        diag.coverage = 0.7;

        let narrow = gate.evaluate("q", GOOD_ANSWER, &diag, &QueryProfile::default());
        assert!(narrow.passed);

        let broad = QueryProfile {
            broad_coverage: true,
            ..Default::default()
        };
        let result = gate.evaluate("q", GOOD_ANSWER, &diag, &broad);
        assert!(!result.passed);
        assert!(result.reasons.iter().any(|r| r.contains("70%")));
    }

    #[test]
    fn test_invalid_citations_listed() {
        let mut diag = diagnostics();
        diag.precision = 0.5;
        diag.invalid_citations = vec![InvalidCitation {
            citation_text: "[S9]".to_string(),
            reason: "Source 9 does not exist".to_string(),
        }];

        let result = QualityGate::default().evaluate("q", GOOD_ANSWER, &diag, &QueryProfile::default());
        assert!(!result.passed);
        assert!(result.reasons.iter().any(|r| r.contains("[S9]")));
    }

    #[test]
    fn test_cross_source_requirement_clamped_to_sources() {
        let mut diag = diagnostics();
        diag.cited_documents = 1;
        diag.source_documents = 1;
        let comparative = QueryProfile {
            comparative: true,
            ..Default::default()
        };

        let result = QualityGate::default().evaluate("q", GOOD_ANSWER, &diag, &comparative);
        assert!(result.passed);
        assert_eq!(result.metrics.required_cited_documents, 1);
        assert!(result.evidence_limited);
    }

    #[test]
    fn test_weak_support_is_evidence_limited() {
        let mut diag = diagnostics();
        diag.support = 0.2;

        let result = QualityGate::default().evaluate("q", GOOD_ANSWER, &diag, &QueryProfile::default());
        assert!(!result.passed);
        assert!(result.evidence_limited);
    }

    #[test]
    fn test_analyzer_repair_flag_fails_otherwise_passing_answer() {
        let mut diag = diagnostics();
        diag.needs_repair = true;

        let result = QualityGate::default().evaluate("q", GOOD_ANSWER, &diag, &QueryProfile::default());
        assert!(!result.passed);
        assert_eq!(result.reasons.len(), 1);
        assert!(result.reasons[0].contains("flagged for repair"));
        assert!(result.metrics.analyzer_flagged);
        assert!(result.score < 1.0);
        assert!(!result.evidence_limited);
    }

    #[test]
    fn test_deterministic() {
        let gate = QualityGate::default();
        let mut diag = diagnostics();
        diag.coverage = 0.1;
        let a = gate.evaluate("q", "No structure at all here.", &diag, &decision());
        let b = gate.evaluate("q", "No structure at all here.", &diag, &decision());
        assert_eq!(a, b);
    }
}
