//! Text signal predicates.
//!
//! Named, regex-backed checks over answer and chunk text: contradiction
//! markers, reasoning connectives and the structural sections an answer is
//! expected to carry.

use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use super::intent::QueryProfile;

static CONTRADICTION_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?i)\b(?:however|but|except|unless|despite|limit\w*|constraint\w*|risk\w*|contradict\w*|fail\w*)\b")
        .expect("contradiction regex is valid")
});

static REASONING_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(
        r"(?i)\b(?:because|therefore|thus|hence|however|whereas|although|consequently|as a result|due to|in contrast|on the other hand|which means|so that|but|since|unless)\b",
    )
    .expect("reasoning regex is valid")
});

static EVIDENCE_HEADING_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?i)^(?:key\s+|supporting\s+)?evidence\b").expect("evidence heading regex is valid")
});

static UNCERTAINTY_HEADING_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?i)^(?:uncertaint(?:y|ies)|gaps?|open questions|unknowns|limitations)\b")
        .expect("uncertainty heading regex is valid")
});

static OPTIONS_HEADING_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?i)^(?:options|alternatives|trade-?offs)\b").expect("options heading regex is valid")
});

static RECOMMENDATION_HEADING_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?i)^recommend(?:ation|ations|ed)?\b").expect("recommendation heading regex is valid")
});

static RISK_HEADING_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?i)^(?:key\s+)?risks?\b").expect("risk heading regex is valid")
});

/// Plain lines longer than this are prose, not headings.
const MAX_HEADING_WORDS: usize = 6;

/// Contrast and limitation markers in `text`.
pub fn contradiction_signal(text: &str) -> u32 {
    CONTRADICTION_RE.find_iter(text).count() as u32
}

/// Causal and contrastive connectives in `text`.
pub fn reasoning_signal_count(text: &str) -> usize {
    REASONING_RE.find_iter(text).count()
}

/// A structural section an answer may be required to contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Section {
    Evidence,
    Uncertainty,
    Options,
    Recommendation,
    Risks,
}

impl Section {
    /// Heading used when asking the model for this section.
    pub fn heading(&self) -> &'static str {
        match self {
            Section::Evidence => "Evidence",
            Section::Uncertainty => "Uncertainty & Gaps",
            Section::Options => "Options & Trade-offs",
            Section::Recommendation => "Recommendation",
            Section::Risks => "Risks",
        }
    }

    fn heading_re(&self) -> &'static regex::Regex {
        match self {
            Section::Evidence => &*EVIDENCE_HEADING_RE,
            Section::Uncertainty => &*UNCERTAINTY_HEADING_RE,
            Section::Options => &*OPTIONS_HEADING_RE,
            Section::Recommendation => &*RECOMMENDATION_HEADING_RE,
            Section::Risks => &*RISK_HEADING_RE,
        }
    }

    /// Whether `text` has a heading-like line naming this section.
    ///
    /// Markdown headings (`#`), bold lines and short standalone lines count;
    /// a keyword in the middle of a sentence does not.
    pub fn is_present(&self, text: &str) -> bool {
        text.lines().any(|line| {
            let line = line.trim();
            let marked = line.starts_with('#') || line.starts_with("**");
            let stripped = line
                .trim_start_matches(|c: char| c == '#' || c == '*' || c.is_whitespace())
                .trim_end_matches(|c: char| c == '*' || c == ':' || c.is_whitespace());
            if stripped.is_empty() {
                return false;
            }
            let short = stripped.split_whitespace().count() <= MAX_HEADING_WORDS;
            (marked || short) && self.heading_re().is_match(stripped)
        })
    }
}

/// Sections an answer to a query with `profile` must contain, in order.
pub fn required_sections(profile: &QueryProfile) -> Vec<Section> {
    let mut sections = vec![Section::Evidence, Section::Uncertainty];
    if profile.decision_mode {
        sections.extend([Section::Options, Section::Recommendation, Section::Risks]);
    }
    sections
}

/// Required sections missing from `text`, in requirement order.
pub fn missing_sections(text: &str, profile: &QueryProfile) -> Vec<Section> {
    required_sections(profile)
        .into_iter()
        .filter(|section| !section.is_present(text))
        .collect()
}
