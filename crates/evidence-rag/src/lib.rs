pub mod cancel;
pub mod config;
pub mod corpus;
pub mod error;
pub mod graph;
pub mod llm;
pub mod pipeline;
pub mod rag;
pub mod reranking;
pub mod retrieval;
pub mod search;
pub mod text;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export primary types for convenience
pub use cancel::CancellationToken;
pub use config::EngineConfig;
pub use corpus::{CorpusSnapshot, CorpusStore};
pub use error::{ConfigError, EngineError, EngineResult};
pub use pipeline::{AnswerOutcome, AnswerReport, EvidencePipeline, MissingEvidenceResponse};
pub use retrieval::{EvidenceRetriever, RetrievalOutcome};
pub use types::{ActivationReport, BridgeConcept, Chunk, Document, EvidenceVerdict};

// Re-export collaborator seams
pub use llm::{ChatMessage, ChatRole, CompletionProvider, GenerationParams};
pub use rag::{CitationAnalyzer, ClaimDiagnostics, GateResult, QualityGate, QueryProfile};
pub use reranking::{Diversifier, DocumentCapDiversifier, NoopDiversifier, NoopReranker, Reranker};
pub use search::{BaseRetriever, InMemoryRetriever, LexicalScorer, QueryTerms, RelevanceScorer, RetrieveOptions};
pub use text::{SimpleTextAnalyzer, TextAnalyzer};

// Re-export common types
pub use anyhow::{Error, Result};
