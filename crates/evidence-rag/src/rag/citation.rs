//! Citation Analysis
//!
//! Parses source citations out of generated answers and measures how well
//! the answer's claims are grounded in the numbered source list it was given.
//! Sources are cited by 1-based position: `[1]`, `[S2]`, `[Source 3]`, or
//! several at once as `[S1, S4]`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::text::{is_stopword, word_tokens};
use crate::types::Chunk;

static CITATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[\s*((?:s|source\s*)?\d{1,3}(?:\s*[,;]\s*(?:s|source\s*)?\d{1,3})*)\s*\]")
        .expect("citation regex is valid")
});

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{1,3}").expect("number regex is valid")
});

static SENTENCE_END_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[.!?](?:\s*\[[^\]\n]{1,40}\])*\s+").expect("sentence end regex is valid")
});

/// Sentences shorter than this are connective tissue, not claims.
const MIN_CLAIM_WORDS: usize = 4;
/// Share of a claim's content tokens that must appear in a cited source.
const SUPPORT_OVERLAP: f32 = 0.3;
/// Below this coverage the answer needs repair regardless of gate settings.
const REPAIR_COVERAGE: f32 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedCitation {
    pub full_text: String,
    /// 1-based position in the source list.
    pub source_index: usize,
    pub start_pos: usize,
    pub end_pos: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvalidCitation {
    pub citation_text: String,
    pub reason: String,
}

/// Claim-level grounding metrics for one answer against its sources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClaimDiagnostics {
    pub claim_count: usize,
    pub cited_claims: usize,
    /// Cited claims over all claims.
    pub coverage: f32,
    /// Cited claims whose wording is backed by a cited source, over cited claims.
    pub support: f32,
    /// Valid citations over all citations; 1.0 when there are none.
    pub precision: f32,
    pub total_citations: usize,
    pub valid_citations: usize,
    pub invalid_citations: Vec<InvalidCitation>,
    /// Distinct documents behind the valid citations.
    pub cited_documents: usize,
    /// Distinct documents in the source list.
    pub source_documents: usize,
    pub needs_repair: bool,
}

/// Citation-analysis capability used by the quality gate.
pub trait CitationAnalyzer: Send + Sync {
    fn count_citations(&self, text: &str) -> usize;
    fn build_claim_diagnostics(&self, text: &str, sources: &[Chunk]) -> ClaimDiagnostics;
}

/// Analyzer for bracketed numeric citations.
#[derive(Debug, Clone, Default)]
pub struct BracketCitationAnalyzer {
    /// Enable debug logging
    pub debug: bool,
}

impl BracketCitationAnalyzer {
    pub fn new() -> Self {
        Self { debug: false }
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Extract citations in order of appearance. A bracket followed by `(`
    /// is a markdown link, not a citation.
    pub fn extract_citations(&self, text: &str) -> Vec<ExtractedCitation> {
        let mut citations = Vec::new();
        for cap in CITATION_RE.captures_iter(text) {
            let (Some(whole), Some(inner)) = (cap.get(0), cap.get(1)) else {
                continue;
            };
            if text[whole.end()..].starts_with('(') {
                continue;
            }
            for number in NUMBER_RE.find_iter(inner.as_str()) {
                if let Ok(source_index) = number.as_str().parse::<usize>() {
                    citations.push(ExtractedCitation {
                        full_text: whole.as_str().to_string(),
                        source_index,
                        start_pos: whole.start(),
                        end_pos: whole.end(),
                    });
                }
            }
        }

        if self.debug {
            tracing::debug!(count = citations.len(), "[CitationAnalyzer] Extracted citations");
        }
        citations
    }
}

impl CitationAnalyzer for BracketCitationAnalyzer {
    fn count_citations(&self, text: &str) -> usize {
        self.extract_citations(text).len()
    }

    fn build_claim_diagnostics(&self, text: &str, sources: &[Chunk]) -> ClaimDiagnostics {
        let source_documents = sources
            .iter()
            .map(|s| s.filename.as_str())
            .collect::<HashSet<_>>()
            .len();

        let mut total_citations = 0usize;
        let mut valid_citations = 0usize;
        let mut invalid_citations = Vec::new();
        let mut cited_files: HashSet<&str> = HashSet::new();
        let mut claim_count = 0usize;
        let mut cited_claims = 0usize;
        let mut supported_claims = 0usize;

        for claim in split_claims(text) {
            let citations = self.extract_citations(claim);
            total_citations += citations.len();

            let mut cited_sources: Vec<&Chunk> = Vec::new();
            for citation in &citations {
                match citation.source_index.checked_sub(1).and_then(|i| sources.get(i)) {
                    Some(source) => {
                        valid_citations += 1;
                        cited_files.insert(source.filename.as_str());
                        cited_sources.push(source);
                    }
                    None => invalid_citations.push(InvalidCitation {
                        citation_text: citation.full_text.clone(),
                        reason: format!(
                            "Source {} does not exist (only {} provided)",
                            citation.source_index,
                            sources.len()
                        ),
                    }),
                }
            }

            let prose = CITATION_RE.replace_all(claim, "");
            if prose.split_whitespace().count() < MIN_CLAIM_WORDS {
                continue;
            }
            claim_count += 1;
            if citations.is_empty() {
                continue;
            }
            cited_claims += 1;
            if cited_sources.iter().any(|source| supports(&prose, &source.text)) {
                supported_claims += 1;
            }
        }

        let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f32 / den as f32 };
        let coverage = ratio(cited_claims, claim_count);
        let support = ratio(supported_claims, cited_claims);
        let precision = if total_citations == 0 {
            1.0
        } else {
            valid_citations as f32 / total_citations as f32
        };

        let diagnostics = ClaimDiagnostics {
            claim_count,
            cited_claims,
            coverage,
            support,
            precision,
            total_citations,
            valid_citations,
            invalid_citations,
            cited_documents: cited_files.len(),
            source_documents,
            needs_repair: coverage < REPAIR_COVERAGE || valid_citations < total_citations,
        };

        if self.debug {
            tracing::debug!(
                claims = claim_count,
                cited = cited_claims,
                coverage_pct = format_args!("{:.0}", coverage * 100.0),
                precision_pct = format_args!("{:.0}", precision * 100.0),
                "[CitationAnalyzer] Claim diagnostics"
            );
        }
        diagnostics
    }
}

/// Sentences and bullet items of `text`, headings excluded.
fn split_claims(text: &str) -> Vec<&str> {
    let mut claims = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || is_bold_heading(line) || line.ends_with(':') {
            continue;
        }
        let line = line.trim_start_matches(|c: char| c == '-' || c == '*' || c == '•' || c.is_whitespace());

        let mut start = 0;
        for m in SENTENCE_END_RE.find_iter(line) {
            push_claim(&mut claims, &line[start..m.end()]);
            start = m.end();
        }
        push_claim(&mut claims, &line[start..]);
    }
    claims
}

fn push_claim<'a>(claims: &mut Vec<&'a str>, sentence: &'a str) {
    let sentence = sentence.trim();
    if !sentence.is_empty() {
        claims.push(sentence);
    }
}

fn is_bold_heading(line: &str) -> bool {
    line.starts_with("**") && line.trim_end_matches(':').ends_with("**")
}

fn content_tokens(text: &str) -> HashSet<String> {
    word_tokens(text)
        .into_iter()
        .filter(|t| t.chars().count() >= 3 && !is_stopword(t))
        .collect()
}

/// Whether enough of `claim`'s content words occur in `source`.
fn supports(claim: &str, source: &str) -> bool {
    let claim_tokens = content_tokens(claim);
    if claim_tokens.is_empty() {
        return false;
    }
    let source_tokens = content_tokens(source);
    let shared = claim_tokens.iter().filter(|t| source_tokens.contains(*t)).count();
    shared as f32 / claim_tokens.len() as f32 >= SUPPORT_OVERLAP
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources() -> Vec<Chunk> {
        vec![
            Chunk::new("d0", "deploy.md", 0, "Rollback takes five minutes from the release dashboard."),
            Chunk::new("i1", "incidents.md", 1, "The rollback failed because the migration was irreversible."),
        ]
    }

    #[test]
    fn test_extract_bracket_formats() {
        let analyzer = BracketCitationAnalyzer::new();
        let citations = analyzer.extract_citations("See [1], [S2] and [Source 3]; also [S1, S2].");

        let indices: Vec<usize> = citations.iter().map(|c| c.source_index).collect();
        assert_eq!(indices, vec![1, 2, 3, 1, 2]);
        assert_eq!(analyzer.count_citations("no citations here"), 0);
    }

    #[test]
    fn test_markdown_links_are_not_citations() {
        let analyzer = BracketCitationAnalyzer::new();
        assert_eq!(analyzer.count_citations("Read [1](https://example.com) first."), 0);
    }

    #[test]
    fn test_fully_grounded_answer() {
        let analyzer = BracketCitationAnalyzer::new();
        let answer = "## Evidence\n- Rollback takes five minutes from the dashboard [S1].\n- The rollback failed because the migration was irreversible [S2].";

        let diagnostics = analyzer.build_claim_diagnostics(answer, &sources());
        assert_eq!(diagnostics.claim_count, 2);
        assert_eq!(diagnostics.coverage, 1.0);
        assert_eq!(diagnostics.precision, 1.0);
        assert_eq!(diagnostics.support, 1.0);
        assert_eq!(diagnostics.cited_documents, 2);
        assert_eq!(diagnostics.source_documents, 2);
        assert!(!diagnostics.needs_repair);
    }

    #[test]
    fn test_invalid_and_missing_citations() {
        let analyzer = BracketCitationAnalyzer::new();
        let answer = "Rollback takes five minutes on the dashboard [S7]. The team also hired four new engineers last spring.";

        let diagnostics = analyzer.build_claim_diagnostics(answer, &sources());
        assert_eq!(diagnostics.claim_count, 2);
        assert_eq!(diagnostics.cited_claims, 1);
        assert_eq!(diagnostics.valid_citations, 0);
        assert_eq!(diagnostics.precision, 0.0);
        assert_eq!(diagnostics.invalid_citations.len(), 1);
        assert!(diagnostics.needs_repair);
    }

    #[test]
    fn test_unsupported_claim() {
        let analyzer = BracketCitationAnalyzer::new();
        let answer = "Quarterly hiring doubled across every regional office [S1].";

        let diagnostics = analyzer.build_claim_diagnostics(answer, &sources());
        assert_eq!(diagnostics.coverage, 1.0);
        assert_eq!(diagnostics.support, 0.0);
    }

    #[test]
    fn test_split_claims_skips_headings() {
        let claims = split_claims("# Evidence\n**Risks**\nFirst claim is here now. Second claim is here too.\nNotes:");
        assert_eq!(claims, vec!["First claim is here now.", "Second claim is here too."]);
    }
}
