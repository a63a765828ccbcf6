//! Shared test doubles: a ten-document fixture corpus, a scripted base
//! retriever and a scripted completion provider.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::config::EngineConfig;
use crate::corpus::CorpusSnapshot;
use crate::llm::{ChatMessage, CompletionProvider, GenerationParams};
use crate::rag::intent::QueryProfile;
use crate::retrieval::StageContext;
use crate::search::{BaseRetriever, LexicalScorer, QueryTerms, RelevanceScorer, RetrieveOptions};
use crate::text::SimpleTextAnalyzer;
use crate::types::Chunk;

const FIXTURE: &[(&str, [&str; 3])] = &[
    (
        "deploy.md",
        [
            "The deployment pipeline promotes builds from staging to production. Canary releases run for thirty minutes.",
            "Rollback procedure: the on-call engineer triggers a rollback from the release dashboard. A rollback takes five minutes.",
            "Deployment incidents in March were caused by a missing database migration.",
        ],
    ),
    (
        "incidents.md",
        [
            "Incident postmortem for the March outage. The outage lasted two hours and affected checkout.",
            "However, the rollback failed because the database migration was irreversible.",
            "Action items include migration review and quarterly rollback drills.",
        ],
    ),
    (
        "capacity.md",
        [
            "Capacity planning forecasts traffic growth of forty percent next year.",
            "Autoscaling limits constrain peak capacity during product launches.",
            "Capacity reviews happen every quarter with the platform team.",
        ],
    ),
    (
        "vendor.md",
        [
            "The vendor contract covers hosting and premium support.",
            "Vendor support responds within four hours, except on weekends.",
            "Contract renewal is due in June and pricing may increase.",
        ],
    ),
    (
        "security.md",
        [
            "Security review requires threat modeling before every launch.",
            "Secrets rotation runs monthly across all production services.",
            "Risk: unpatched dependencies remain in older deployment images.",
        ],
    ),
    (
        "budget.md",
        [
            "The infrastructure budget for the year is fixed by finance.",
            "Budget overruns came from unplanned capacity purchases.",
            "Reserved instances are expected to reduce hosting cost.",
        ],
    ),
    (
        "onboarding.md",
        [
            "New engineers complete onboarding within two weeks.",
            "Onboarding includes a deployment walkthrough with a mentor.",
            "Mentors pair with new engineers for the first month.",
        ],
    ),
    (
        "monitoring.md",
        [
            "Monitoring alerts page the on-call engineer directly.",
            "Alert fatigue is a risk when thresholds are set too low.",
            "Dashboards track latency and error rates for checkout.",
        ],
    ),
    (
        "roadmap.md",
        [
            "The roadmap prioritizes deployment automation this year.",
            "Roadmap items depend on budget approval from finance.",
            "The platform team owns the roadmap and reviews it monthly.",
        ],
    ),
    (
        "retro.md",
        [
            "The team retrospective praised faster deployments.",
            "But deployment frequency dropped sharply during the outage.",
            "Retrospectives happen at the end of every sprint.",
        ],
    ),
];

/// `documents` handbooks of `chunks_per_document` routine chunks each, except
/// `hb13-1`, the only chunk about rollback drills.
pub(crate) fn handbook_chunks(documents: usize, chunks_per_document: usize) -> Vec<Chunk> {
    (0..documents)
        .flat_map(|doc| {
            (0..chunks_per_document).map(move |index| {
                let text = if doc == 13 && index == 1 {
                    "Rollback drills failed because the migration was irreversible.".to_string()
                } else {
                    format!("Handbook {} section {} lists routine release steps for team {}.", doc, index, doc)
                };
                Chunk::new(format!("hb{}-{}", doc, index), format!("handbook-{}.md", doc), index, text)
            })
        })
        .collect()
}

/// Thirty chunks over ten documents about running a deployment platform.
pub(crate) fn fixture_chunks() -> Vec<Chunk> {
    FIXTURE
        .iter()
        .flat_map(|(filename, texts)| {
            let stem = filename.trim_end_matches(".md");
            texts
                .iter()
                .enumerate()
                .map(move |(index, text)| Chunk::new(format!("{}-{}", stem, index), *filename, index, *text))
        })
        .collect()
}

pub(crate) fn fixture_snapshot() -> CorpusSnapshot {
    CorpusSnapshot::build(1, fixture_chunks())
}

/// Lexical base retriever with scripted failures, delays and a document
/// allow-list.
pub(crate) struct ScriptedRetriever {
    chunks: Vec<Chunk>,
    failing: Vec<String>,
    allowed: Option<HashSet<String>>,
    delays: Vec<(String, Duration)>,
    calls: AtomicUsize,
}

impl ScriptedRetriever {
    pub(crate) fn new(chunks: Vec<Chunk>) -> Self {
        Self {
            chunks,
            failing: Vec::new(),
            allowed: None,
            delays: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Fail every query containing `needle` (`""` fails everything).
    pub(crate) fn failing_on(mut self, needle: &str) -> Self {
        self.failing.push(needle.to_string());
        self
    }

    /// Only ever return chunks from these documents.
    pub(crate) fn restricted_to(mut self, filenames: &[&str]) -> Self {
        self.allowed = Some(filenames.iter().map(|f| f.to_string()).collect());
        self
    }

    pub(crate) fn with_delay(self, delay: Duration) -> Self {
        self.delayed_on("", delay)
    }

    /// Hold every query containing `needle` back by `delay` (first match wins).
    pub(crate) fn delayed_on(mut self, needle: &str, delay: Duration) -> Self {
        self.delays.push((needle.to_string(), delay));
        self
    }

    /// Base retrievals started so far.
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BaseRetriever for ScriptedRetriever {
    async fn retrieve(&self, query: &str, top_k: usize, _options: &RetrieveOptions) -> Result<Vec<Chunk>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some((_, delay)) = self.delays.iter().find(|(needle, _)| query.contains(needle.as_str())) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.iter().any(|needle| query.contains(needle.as_str())) {
            anyhow::bail!("scripted failure for '{}'", query);
        }

        let terms = QueryTerms::build(query, &SimpleTextAnalyzer::new());
        let scorer = LexicalScorer::new();
        let mut scored: Vec<(usize, Chunk)> = self
            .chunks
            .iter()
            .filter(|c| self.allowed.as_ref().map_or(true, |allowed| allowed.contains(&c.filename)))
            .map(|c| c.scored(scorer.score(c, &terms)))
            .filter(|c| c.score > 0.0)
            .enumerate()
            .collect();
        scored.sort_by(|a, b| {
            b.1.score
                .partial_cmp(&a.1.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        Ok(scored.into_iter().take(top_k).map(|(_, c)| c).collect())
    }
}

/// Owns everything a [`StageContext`] borrows besides the corpus and retriever.
pub(crate) struct StageFixture<'a> {
    snapshot: &'a CorpusSnapshot,
    retriever: &'a dyn BaseRetriever,
    analyzer: SimpleTextAnalyzer,
    scorer: LexicalScorer,
    terms: QueryTerms,
    profile: QueryProfile,
    options: RetrieveOptions,
    config: EngineConfig,
}

impl<'a> StageFixture<'a> {
    pub(crate) fn new(snapshot: &'a CorpusSnapshot, retriever: &'a dyn BaseRetriever, query: &str) -> Self {
        let analyzer = SimpleTextAnalyzer::new();
        Self {
            snapshot,
            retriever,
            terms: QueryTerms::build(query, &analyzer),
            profile: QueryProfile::from_query(query),
            analyzer,
            scorer: LexicalScorer::new(),
            options: RetrieveOptions::default(),
            config: EngineConfig::default(),
        }
    }

    pub(crate) fn context(&self) -> StageContext<'_> {
        StageContext {
            snapshot: self.snapshot,
            base: self.retriever,
            analyzer: &self.analyzer,
            scorer: &self.scorer,
            terms: &self.terms,
            profile: &self.profile,
            options: &self.options,
            config: &self.config,
        }
    }
}

/// Completion provider replaying queued responses; errors when exhausted.
pub(crate) struct ScriptedProvider {
    responses: Mutex<VecDeque<Result<String, String>>>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedProvider {
    pub(crate) fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn reply(self, text: impl Into<String>) -> Self {
        self.responses.lock().push_back(Ok(text.into()));
        self
    }

    pub(crate) fn fail(self, message: impl Into<String>) -> Self {
        self.responses.lock().push_back(Err(message.into()));
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub(crate) fn request(&self, index: usize) -> Option<Vec<ChatMessage>> {
        self.requests.lock().get(index).cloned()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(&self, messages: &[ChatMessage], _params: &GenerationParams) -> Result<String> {
        self.requests.lock().push(messages.to_vec());
        match self.responses.lock().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(anyhow::anyhow!(message)),
            None => Err(anyhow::anyhow!("no scripted response left")),
        }
    }
}
