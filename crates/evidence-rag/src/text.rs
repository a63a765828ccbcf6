//! Text Analysis Primitives
//!
//! Tokenization and entity extraction used to build query terms and relevance
//! scores. The engine only talks to the [`TextAnalyzer`] trait, so callers with
//! a proper NLP stack can plug it in; [`SimpleTextAnalyzer`] is the built-in
//! heuristic fallback.

use std::collections::HashSet;
use std::sync::LazyLock;

static WORD_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"[A-Za-z0-9][A-Za-z0-9_\-']*").expect("word regex is valid")
});

static ENTITY_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"\b[A-Z][A-Za-z0-9&\-]*(?:\s+(?:of\s+|the\s+|and\s+)?[A-Z][A-Za-z0-9&\-]*){0,3}")
        .expect("entity regex is valid")
});

static ACRONYM_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"\b[A-Z]{2,}[0-9]*\b").expect("acronym regex is valid")
});

const STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few",
    "for", "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers", "him",
    "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just", "me", "more",
    "most", "my", "no", "nor", "not", "now", "of", "off", "on", "once", "only", "or", "other",
    "our", "ours", "out", "over", "own", "same", "she", "should", "so", "some", "such", "than",
    "that", "the", "their", "theirs", "them", "then", "there", "these", "they", "this", "those",
    "through", "to", "too", "under", "until", "up", "very", "was", "we", "were", "what", "when",
    "where", "which", "while", "who", "whom", "why", "will", "with", "would", "you", "your",
    "yours", "shall", "may", "might", "must", "tell", "show", "give", "explain", "describe",
    "please", "does", "within", "upon", "across", "using", "used", "like", "well", "many", "much",
];

/// Returns true for common function words that carry no retrieval signal.
pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(&word)
}

/// Lowercase word tokens in order of appearance, punctuation trimmed.
///
/// Keeps stopwords and short words; callers filter as they need.
pub fn word_tokens(text: &str) -> Vec<String> {
    WORD_RE
        .find_iter(text)
        .map(|m| {
            m.as_str()
                .trim_matches(|c: char| c == '-' || c == '\'' || c == '_')
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

/// Text-analysis capability consumed by the retrieval engine.
pub trait TextAnalyzer: Send + Sync {
    /// Content-bearing tokens of `text`, lowercase, in order of first appearance.
    fn tokenize(&self, text: &str) -> Vec<String>;

    /// Named entities (proper-noun phrases, acronyms) mentioned in `text`.
    fn extract_entities(&self, text: &str) -> Vec<String>;
}

/// Heuristic analyzer: stopword-filtered word tokens and capitalized phrases.
#[derive(Debug, Clone)]
pub struct SimpleTextAnalyzer {
    pub min_token_len: usize,
    pub max_entities: usize,
}

impl SimpleTextAnalyzer {
    pub fn new() -> Self {
        Self {
            min_token_len: 3,
            max_entities: 12,
        }
    }
}

impl Default for SimpleTextAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextAnalyzer for SimpleTextAnalyzer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        word_tokens(text)
            .into_iter()
            .filter(|w| w.chars().count() >= self.min_token_len && !is_stopword(w))
            .filter(|w| seen.insert(w.clone()))
            .collect()
    }

    fn extract_entities(&self, text: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut entities = Vec::new();

        for m in ENTITY_RE.find_iter(text).chain(ACRONYM_RE.find_iter(text)) {
            let phrase = m.as_str().trim();
            let lower = phrase.to_lowercase();

            // Sentence-initial function words ("The", "What") are not entities
            let words: Vec<&str> = lower.split_whitespace().collect();
            if words.len() == 1 && (is_stopword(words[0]) || words[0].len() < 3) {
                continue;
            }
            let phrase = if words.first().is_some_and(|w| is_stopword(w)) {
                phrase
                    .split_once(char::is_whitespace)
                    .map(|(_, rest)| rest.trim())
                    .unwrap_or(phrase)
            } else {
                phrase
            };

            if seen.insert(phrase.to_lowercase()) {
                entities.push(phrase.to_string());
            }
            if entities.len() >= self.max_entities {
                break;
            }
        }

        entities
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_tokens_lowercase_and_trimmed() {
        let tokens = word_tokens("The Rate-Limiter's budget, (per second).");
        assert_eq!(tokens, vec!["the", "rate-limiter's", "budget", "per", "second"]);
    }

    #[test]
    fn test_tokenize_drops_stopwords_and_duplicates() {
        let analyzer = SimpleTextAnalyzer::new();
        let tokens = analyzer.tokenize("What is the budget and what is the budget timeline?");
        assert_eq!(tokens, vec!["budget", "timeline"]);
    }

    #[test]
    fn test_extract_entities_skips_sentence_initial_stopwords() {
        let analyzer = SimpleTextAnalyzer::new();
        let entities = analyzer.extract_entities("What did Acme Corp report to the FDA in March?");
        assert!(entities.iter().any(|e| e == "Acme Corp"));
        assert!(entities.iter().any(|e| e == "FDA"));
        assert!(!entities.iter().any(|e| e == "What"));
    }

    #[test]
    fn test_empty_text_has_no_entities() {
        let analyzer = SimpleTextAnalyzer::new();
        assert!(analyzer.extract_entities("").is_empty());
        assert!(analyzer.tokenize("").is_empty());
    }
}
