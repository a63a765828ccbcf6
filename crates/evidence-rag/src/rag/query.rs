//! Query Sanitization and Resolution
//!
//! Cleans raw user input and resolves short follow-ups ("what about its
//! limits?") against the previous user turn, so retrieval sees a standalone
//! question. The conversation history is owned by the pipeline and passed in
//! read-only.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::LazyLock;

use crate::graph::extract_concepts;
use crate::text::TextAnalyzer;

static REFERENCE_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?i)\b(it|its|that|this|they|them|their|those|these|the same)\b")
        .expect("reference regex is valid")
});

/// Follow-ups longer than this are treated as standalone questions.
const MAX_FOLLOW_UP_WORDS: usize = 8;
const MAX_CARRIED_TERMS: usize = 3;
const DEFAULT_MAX_TURNS: usize = 20;

/// Strip control characters, collapse whitespace, trim, and cap the length.
pub fn sanitize_query(raw: &str, max_chars: usize) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(max_chars).collect::<String>().trim().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub text: String,
}

/// Bounded conversation history, oldest turns evicted first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationHistory {
    turns: VecDeque<Turn>,
    max_turns: usize,
}

impl ConversationHistory {
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: VecDeque::new(),
            max_turns: max_turns.max(1),
        }
    }

    pub fn push(&mut self, role: TurnRole, text: impl Into<String>) {
        self.turns.push_back(Turn {
            role,
            text: text.into(),
        });
        while self.turns.len() > self.max_turns {
            self.turns.pop_front();
        }
    }

    pub fn last_user_turn(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == TurnRole::User)
            .map(|t| t.text.as_str())
    }

    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TURNS)
    }
}

/// Make a short follow-up standalone by carrying over the subject of the
/// previous user turn.
///
/// Only applies when the query is short and contains a dangling reference;
/// the carried terms are the previous turn's entities, or its leading
/// concepts when it had none.
pub fn resolve_query(query: &str, history: &ConversationHistory, analyzer: &dyn TextAnalyzer) -> String {
    let word_count = query.split_whitespace().count();
    if word_count == 0 || word_count > MAX_FOLLOW_UP_WORDS || !REFERENCE_RE.is_match(query) {
        return query.to_string();
    }
    let Some(previous) = history.last_user_turn() else {
        return query.to_string();
    };

    let mut carried = analyzer.extract_entities(previous);
    if carried.is_empty() {
        carried = extract_concepts(previous);
    }

    let lower = query.to_lowercase();
    let carried: Vec<String> = carried
        .into_iter()
        .filter(|term| !lower.contains(&term.to_lowercase()))
        .take(MAX_CARRIED_TERMS)
        .collect();

    if carried.is_empty() {
        return query.to_string();
    }

    let resolved = format!("{} ({})", query, carried.join(", "));
    tracing::debug!(original = %query, resolved = %resolved, "Resolved follow-up query");
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::SimpleTextAnalyzer;

    #[test]
    fn test_sanitize_strips_controls_and_collapses() {
        assert_eq!(
            sanitize_query("  what\tis\u{0007} the\n\nplan?  ", 100),
            "what is the plan?"
        );
    }

    #[test]
    fn test_sanitize_caps_length() {
        let long = "word ".repeat(100);
        assert_eq!(sanitize_query(&long, 9), "word word");
    }

    #[test]
    fn test_history_evicts_oldest() {
        let mut history = ConversationHistory::new(2);
        history.push(TurnRole::User, "first");
        history.push(TurnRole::Assistant, "answer");
        history.push(TurnRole::User, "second");

        assert_eq!(history.len(), 2);
        assert_eq!(history.last_user_turn(), Some("second"));
    }

    #[test]
    fn test_resolve_carries_previous_entities() {
        let mut history = ConversationHistory::default();
        history.push(TurnRole::User, "How does Project Atlas handle failover?");
        let analyzer = SimpleTextAnalyzer::new();

        let resolved = resolve_query("what are its limits?", &history, &analyzer);
        assert_eq!(resolved, "what are its limits? (Project Atlas)");
    }

    #[test]
    fn test_standalone_query_untouched() {
        let mut history = ConversationHistory::default();
        history.push(TurnRole::User, "How does Project Atlas handle failover?");
        let analyzer = SimpleTextAnalyzer::new();

        let query = "How is the billing service deployed?";
        assert_eq!(resolve_query(query, &history, &analyzer), query);
    }

    #[test]
    fn test_no_history_no_resolution() {
        let analyzer = SimpleTextAnalyzer::new();
        let resolved = resolve_query("what about it?", &ConversationHistory::default(), &analyzer);
        assert_eq!(resolved, "what about it?");
    }
}
