//! RAG-side stages: query handling, intent profiling, evidence assessment,
//! citation analysis and the answer quality gate.

pub mod citation;
pub mod completeness;
pub mod evidence_model;
pub mod gate;
pub mod intent;
pub mod prompt;
pub mod query;
pub mod signals;

// Re-export commonly used types
pub use citation::{BracketCitationAnalyzer, CitationAnalyzer, ClaimDiagnostics, InvalidCitation};
pub use completeness::assess_completeness;
pub use evidence_model::EvidenceModel;
pub use gate::{GateMetrics, GateResult, QualityGate};
pub use intent::{IntentGraph, QueryProfile};
pub use prompt::{build_answer_messages, build_repair_messages, format_sources};
pub use query::{resolve_query, sanitize_query, ConversationHistory, Turn, TurnRole};
pub use signals::{contradiction_signal, missing_sections, reasoning_signal_count, required_sections, Section};
