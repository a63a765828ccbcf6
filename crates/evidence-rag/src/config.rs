//! Engine configuration.
//!
//! Every threshold the retrieval and gating heuristics use lives here as a
//! named default. The defaults were tuned by hand on small mixed corpora; they
//! are starting points to validate against a real corpus, not derived optima.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub retrieval: RetrievalConfig,
    pub anchor: AnchorConfig,
    pub bridge: BridgeConfig,
    pub refinement: RefinementConfig,
    pub adversarial: AdversarialConfig,
    pub completeness: CompletenessConfig,
    pub gate: GateConfig,
    pub concurrency: ConcurrencyConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub default_k: usize,
    /// Largest share of the top-K a single document may take before other
    /// documents are preferred.
    pub max_document_share: f32,
    /// Sanitized queries are truncated to this many characters.
    pub max_query_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_k: 10,
            max_document_share: 0.5,
            max_query_chars: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorConfig {
    /// Highest-scoring chunks kept per document.
    pub top_per_document: usize,
    pub top_per_document_broad: usize,
    /// Evenly spaced chunks kept per document regardless of score.
    pub spread_per_document: usize,
    pub spread_per_document_broad: usize,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            top_per_document: 1,
            top_per_document_broad: 2,
            spread_per_document: 2,
            spread_per_document_broad: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub max_seed_concepts: usize,
    pub neighbors_per_concept: usize,
    /// Share of a candidate concept's score taken from the seed vote; the
    /// remainder comes from the edge weight.
    pub seed_share: f32,
    /// Added to each seed chunk's score when it votes for its concepts.
    pub seed_vote_base: f32,
    pub lexical_weight: f32,
    pub bridge_weight: f32,
    pub bridge_weight_cap: f32,
    pub max_results: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            max_seed_concepts: 14,
            neighbors_per_concept: 5,
            seed_share: 0.65,
            seed_vote_base: 0.25,
            lexical_weight: 0.72,
            bridge_weight: 0.08,
            bridge_weight_cap: 5.0,
            max_results: 12,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefinementConfig {
    pub max_passes: usize,
    pub max_probes: usize,
    /// Probe retrievals ask for this fraction of the target size.
    pub probe_k_ratio: f32,
    /// Accumulated set is capped at this multiple of the target size.
    pub accumulated_multiplier: usize,
    /// Consecutive stable passes needed to stop early.
    pub stable_passes_required: usize,
    /// A pass adding fewer new chunks than this (and no new documents) is stable.
    pub stability_chunk_delta: usize,
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            max_passes: 4,
            max_probes: 8,
            probe_k_ratio: 0.8,
            accumulated_multiplier: 4,
            stable_passes_required: 2,
            stability_chunk_delta: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdversarialConfig {
    pub max_passes: usize,
    pub max_results: usize,
    /// Cap used when no candidate carries a contradiction signal.
    pub fallback_results: usize,
    pub lexical_weight: f32,
    pub signal_weight: f32,
    pub signal_cap: u32,
}

impl Default for AdversarialConfig {
    fn default() -> Self {
        Self {
            max_passes: 3,
            max_results: 16,
            fallback_results: 6,
            lexical_weight: 0.72,
            signal_weight: 0.09,
            signal_cap: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletenessConfig {
    /// Broad queries over a sizeable corpus need at least this coverage (0-100).
    pub coverage_floor_pct: f32,
    /// Corpus size at which the coverage floor starts to apply.
    pub coverage_floor_min_documents: usize,
    /// Unresolved gaps at or above this count trigger a shortfall...
    pub gap_threshold: usize,
    /// ...while document coverage is below this percentage.
    pub gap_low_coverage_pct: f32,
    pub max_requested_topics: usize,
    /// Ask the completion provider to refine the evidence model.
    pub llm_model_extraction: bool,
}

impl Default for CompletenessConfig {
    fn default() -> Self {
        Self {
            coverage_floor_pct: 22.0,
            coverage_floor_min_documents: 5,
            gap_threshold: 3,
            gap_low_coverage_pct: 50.0,
            max_requested_topics: 8,
            llm_model_extraction: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub max_repairs: usize,
    pub min_reasoning_signals: usize,
    pub min_citation_coverage: f32,
    /// Coverage required for broad or decision queries.
    pub strict_citation_coverage: f32,
    pub min_citation_precision: f32,
    pub strict_citation_precision: f32,
    /// Distinct cited documents required when cross-source reasoning is expected.
    pub min_cited_documents: usize,
    /// Below this claim support the sources, not the answer, are the problem.
    pub min_claim_support: f32,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            max_repairs: 2,
            min_reasoning_signals: 2,
            min_citation_coverage: 0.6,
            strict_citation_coverage: 0.75,
            min_citation_precision: 0.8,
            strict_citation_precision: 0.9,
            min_cited_documents: 2,
            min_claim_support: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Probe retrievals in flight at once.
    pub probe_concurrency: usize,
    pub probe_timeout_ms: u64,
    pub generation_timeout_ms: u64,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            probe_concurrency: 3,
            probe_timeout_ms: 8_000,
            generation_timeout_ms: 60_000,
        }
    }
}

impl EngineConfig {
    /// Validate config values, returning errors for clearly broken configurations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.retrieval.default_k == 0 {
            return invalid("retrieval.default_k must be > 0");
        }
        if !(0.0..=1.0).contains(&self.retrieval.max_document_share)
            || self.retrieval.max_document_share == 0.0
        {
            return invalid("retrieval.max_document_share must be in (0.0, 1.0]");
        }
        if self.anchor.top_per_document == 0 && self.anchor.spread_per_document == 0 {
            return invalid("anchor must keep at least one chunk per document");
        }
        if !(0.0..=1.0).contains(&self.bridge.seed_share) {
            return invalid("bridge.seed_share must be in [0.0, 1.0]");
        }
        if self.refinement.max_passes == 0 {
            return invalid("refinement.max_passes must be > 0");
        }
        if self.refinement.stable_passes_required == 0 {
            return invalid("refinement.stable_passes_required must be > 0");
        }
        if !(0.0..=1.0).contains(&self.refinement.probe_k_ratio) || self.refinement.probe_k_ratio == 0.0 {
            return invalid("refinement.probe_k_ratio must be in (0.0, 1.0]");
        }
        if self.refinement.accumulated_multiplier == 0 {
            return invalid("refinement.accumulated_multiplier must be > 0");
        }
        if self.adversarial.max_results == 0 {
            return invalid("adversarial.max_results must be > 0");
        }
        if !(0.0..=100.0).contains(&self.completeness.coverage_floor_pct)
            || !(0.0..=100.0).contains(&self.completeness.gap_low_coverage_pct)
        {
            return invalid("completeness percentages must be in [0, 100]");
        }
        for (name, value) in [
            ("gate.min_citation_coverage", self.gate.min_citation_coverage),
            ("gate.strict_citation_coverage", self.gate.strict_citation_coverage),
            ("gate.min_citation_precision", self.gate.min_citation_precision),
            ("gate.strict_citation_precision", self.gate.strict_citation_precision),
            ("gate.min_claim_support", self.gate.min_claim_support),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!("{} must be in [0.0, 1.0]", name)));
            }
        }
        if self.concurrency.probe_concurrency == 0 {
            return invalid("concurrency.probe_concurrency must be > 0");
        }
        Ok(())
    }

    /// Load config from a JSON file, falling back to defaults for missing fields.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Default location: `<config dir>/evidence-rag/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("evidence-rag").join("config.json"))
    }

    /// Load from [`Self::default_path`] when that file exists, else defaults.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => {
                tracing::info!(path = %path.display(), "Loading engine config");
                Self::from_file(&path)
            }
            _ => Ok(Self::default()),
        }
    }
}
