//! Evidence Pipeline
//!
//! Composes retrieval, completeness assessment, drafting and the quality gate
//! into one answering call:
//!
//! ```text
//! Retrieve -> Assess --insufficient--> MissingEvidence
//!               |
//!             Draft -> Gate --pass--> Final
//!                       |
//!                    Repair -> Gate (at most gate.max_repairs times)
//!                       |
//!          still failing: MissingEvidence when the sources are the
//!          limiting factor, otherwise Degraded
//! ```
//!
//! The pipeline owns the conversation history and hands read-only views of
//! it to query resolution.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::cancel::{run_until_cancelled, CancellationToken};
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::llm::{complete_with_timeout, CompletionProvider, GenerationParams};
use crate::rag::citation::{BracketCitationAnalyzer, CitationAnalyzer, ClaimDiagnostics};
use crate::rag::completeness::assess_completeness;
use crate::rag::evidence_model::EvidenceModel;
use crate::rag::gate::{GateResult, QualityGate};
use crate::rag::intent::IntentGraph;
use crate::rag::prompt::{build_answer_messages, build_repair_messages};
use crate::rag::query::{resolve_query, sanitize_query, ConversationHistory, TurnRole};
use crate::retrieval::{EvidenceRetriever, RetrievalOutcome};
use crate::search::RetrieveOptions;
use crate::types::EvidenceVerdict;

/// A drafted answer with everything that was decided along the way.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnswerReport {
    /// The resolved query retrieval ran with.
    pub query: String,
    pub answer: String,
    pub retrieval: RetrievalOutcome,
    pub model: EvidenceModel,
    pub verdict: EvidenceVerdict,
    pub diagnostics: ClaimDiagnostics,
    pub gate: GateResult,
    /// Repair attempts spent, failed ones included.
    pub repairs: usize,
    /// Why the answer is not final; empty for a final answer.
    pub degraded_reasons: Vec<String>,
}

/// Explicit "insufficient evidence" response, returned instead of guessing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MissingEvidenceResponse {
    pub query: String,
    pub reasons: Vec<String>,
    /// Topics of documents that would make the question answerable.
    pub requested_topics: Vec<String>,
    /// Human-readable rendering of the reasons and topics.
    pub message: String,
    pub verdict: EvidenceVerdict,
    pub retrieval: RetrievalOutcome,
}

impl MissingEvidenceResponse {
    fn new(query: &str, reasons: Vec<String>, requested_topics: Vec<String>, verdict: EvidenceVerdict, retrieval: RetrievalOutcome) -> Self {
        let message = render_missing_evidence(&reasons, &requested_topics);
        Self {
            query: query.to_string(),
            reasons,
            requested_topics,
            message,
            verdict,
            retrieval,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnswerOutcome {
    /// Passed the quality gate.
    Final(AnswerReport),
    /// Still failing the gate after the repair budget; never presented as confident.
    Degraded(AnswerReport),
    MissingEvidence(MissingEvidenceResponse),
}

impl AnswerOutcome {
    pub fn is_final(&self) -> bool {
        matches!(self, AnswerOutcome::Final(_))
    }

    /// Text to show the user.
    pub fn text(&self) -> &str {
        match self {
            AnswerOutcome::Final(report) | AnswerOutcome::Degraded(report) => &report.answer,
            AnswerOutcome::MissingEvidence(response) => &response.message,
        }
    }
}

pub struct EvidencePipeline {
    retriever: EvidenceRetriever,
    provider: Arc<dyn CompletionProvider>,
    citations: Arc<dyn CitationAnalyzer>,
    gate: QualityGate,
    params: GenerationParams,
    history: RwLock<ConversationHistory>,
}

impl EvidencePipeline {
    /// Build a pipeline around `retriever`, validating its configuration.
    pub fn new(retriever: EvidenceRetriever, provider: Arc<dyn CompletionProvider>) -> EngineResult<Self> {
        retriever.config().validate()?;
        let gate = QualityGate::new(retriever.config().gate.clone());
        Ok(Self {
            retriever,
            provider,
            citations: Arc::new(BracketCitationAnalyzer::new()),
            gate,
            params: GenerationParams::default(),
            history: RwLock::new(ConversationHistory::default()),
        })
    }

    pub fn with_citation_analyzer(mut self, citations: Arc<dyn CitationAnalyzer>) -> Self {
        self.citations = citations;
        self
    }

    pub fn with_generation_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_history(self, history: ConversationHistory) -> Self {
        *self.history.write() = history;
        self
    }

    pub fn retriever(&self) -> &EvidenceRetriever {
        &self.retriever
    }

    fn config(&self) -> &EngineConfig {
        self.retriever.config()
    }

    pub fn history_len(&self) -> usize {
        self.history.read().len()
    }

    pub fn clear_history(&self) {
        self.history.write().clear();
    }

    /// Answer `query` from the corpus, or explain what evidence is missing.
    pub async fn answer(&self, query: &str, options: &RetrieveOptions) -> AnswerOutcome {
        let config = self.config();
        let sanitized = sanitize_query(query, config.retrieval.max_query_chars);
        let resolved = {
            let history = self.history.read();
            resolve_query(&sanitized, &history, self.retriever.analyzer())
        };
        if resolved != sanitized {
            tracing::debug!(original = %sanitized, resolved = %resolved, "Resolved follow-up query");
        }

        let outcome = self.run(&resolved, options).await;

        let mut history = self.history.write();
        history.push(TurnRole::User, resolved);
        history.push(TurnRole::Assistant, outcome.text());
        outcome
    }

    /// [`Self::answer`], abandoned as soon as `cancel` fires. A cancelled
    /// query leaves the conversation history untouched.
    pub async fn answer_with_cancel(
        &self,
        query: &str,
        options: &RetrieveOptions,
        cancel: &CancellationToken,
    ) -> EngineResult<AnswerOutcome> {
        let outcome = run_until_cancelled(cancel, self.answer(query, options)).await;
        if outcome.is_err() {
            tracing::info!("Answer cancelled");
        }
        outcome
    }

    async fn run(&self, query: &str, options: &RetrieveOptions) -> AnswerOutcome {
        let config = self.config();
        let timeout = Duration::from_millis(config.concurrency.generation_timeout_ms);

        // Retrieve
        let retrieval = self
            .retriever
            .retrieve(query, config.retrieval.default_k, options)
            .await;

        // Assess
        let intent = IntentGraph::build(&retrieval.query, self.retriever.analyzer());
        let mut model = EvidenceModel::from_sources(&intent, &retrieval.chunks);
        if config.completeness.llm_model_extraction && !retrieval.chunks.is_empty() {
            model = EvidenceModel::extract(self.provider.as_ref(), &retrieval.query, &retrieval.chunks, model, timeout).await;
        }
        let verdict = assess_completeness(
            &retrieval.query,
            &retrieval.chunks,
            &model,
            &retrieval.report,
            &retrieval.profile,
            &config.completeness,
        );
        if verdict.needs_more_evidence {
            tracing::info!(reasons = verdict.reasons.len(), "Insufficient evidence, not drafting");
            return AnswerOutcome::MissingEvidence(MissingEvidenceResponse::new(
                query,
                verdict.reasons.clone(),
                verdict.requested_topics.clone(),
                verdict,
                retrieval,
            ));
        }

        // Draft
        let messages = build_answer_messages(&retrieval.query, &retrieval);
        let mut answer = match complete_with_timeout(self.provider.as_ref(), &messages, &self.params, timeout).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "Answer generation failed");
                return AnswerOutcome::Degraded(AnswerReport {
                    query: query.to_string(),
                    retrieval,
                    model,
                    verdict,
                    degraded_reasons: vec![format!("Answer generation failed: {}", e)],
                    ..Default::default()
                });
            }
        };

        // Gate, then repair while budget remains
        let (mut diagnostics, mut gate) = self.review(&answer, &retrieval);
        let mut repairs = 0;
        while !gate.passed && repairs < config.gate.max_repairs {
            repairs += 1;
            tracing::info!(attempt = repairs, reasons = gate.reasons.len(), "Requesting answer repair");

            let messages = build_repair_messages(&retrieval.query, &retrieval, &answer, &gate.reasons);
            match complete_with_timeout(self.provider.as_ref(), &messages, &self.params, timeout).await {
                Ok(text) => {
                    answer = text;
                    (diagnostics, gate) = self.review(&answer, &retrieval);
                }
                Err(e) => tracing::warn!(attempt = repairs, error = %e, "Answer repair failed"),
            }
        }

        let mut report = AnswerReport {
            query: query.to_string(),
            answer,
            retrieval,
            model,
            verdict,
            diagnostics,
            gate,
            repairs,
            degraded_reasons: Vec::new(),
        };

        if report.gate.passed {
            return AnswerOutcome::Final(report);
        }

        if report.gate.evidence_limited {
            let mut reasons = vec![format!(
                "The answer could not be grounded in the available sources after {} repair attempt(s).",
                report.repairs
            )];
            reasons.extend(report.gate.reasons.iter().cloned());
            let topics = topics_from_model(query, &report.model, config.completeness.max_requested_topics);
            return AnswerOutcome::MissingEvidence(MissingEvidenceResponse::new(
                query,
                reasons,
                topics,
                report.verdict,
                report.retrieval,
            ));
        }

        report.degraded_reasons = report.gate.reasons.clone();
        AnswerOutcome::Degraded(report)
    }

    fn review(&self, answer: &str, retrieval: &RetrievalOutcome) -> (ClaimDiagnostics, GateResult) {
        let diagnostics = self.citations.build_claim_diagnostics(answer, &retrieval.chunks);
        let gate = self.gate.evaluate(&retrieval.query, answer, &diagnostics, &retrieval.profile);
        (diagnostics, gate)
    }
}

/// Gaps, then concepts, then entities; the query when the model is empty.
fn topics_from_model(query: &str, model: &EvidenceModel, max: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut topics: Vec<String> = model
        .gaps
        .iter()
        .chain(model.concepts.iter())
        .chain(model.entities.iter())
        .filter(|t| seen.insert(t.to_lowercase()))
        .take(max)
        .cloned()
        .collect();
    if topics.is_empty() && !query.is_empty() {
        topics.push(query.to_string());
    }
    topics
}

fn render_missing_evidence(reasons: &[String], topics: &[String]) -> String {
    let mut message = String::from("I can't give a reliable answer from the documents available.\n");
    if !reasons.is_empty() {
        message.push_str("\nWhy:\n");
        for reason in reasons {
            message.push_str(&format!("- {}\n", reason));
        }
    }
    if !topics.is_empty() {
        message.push_str("\nDocuments that would help, covering:\n");
        for topic in topics {
            message.push_str(&format!("- {}\n", topic));
        }
    }
    message
}
