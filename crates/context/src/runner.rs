//! Mode Runner - one question through one retrieval strategy
//!
//! Each run walks `RECEIVED → RETRIEVING → GENERATING → CITING → DONE`.
//! Retrieval and generation failures end in `FAILED` and surface as a
//! [`ModeError`] naming the mode and the stage.

use crate::assembler::{ContextAssembler, BLOCK_SEPARATOR};
use crate::citations::select_citations;
use crate::errors::ModeError;
use navigator_common::cache::{keys, ContextCache, ContextPayload};
use navigator_common::config::{AppConfig, AssemblyStrategy, ContextBudget, ContextProfile};
use navigator_common::corpus::CorpusSnapshot;
use navigator_common::errors::{AppError, Result};
use navigator_common::generation::{AnswerClient, GeneratedAnswer};
use navigator_common::metrics;
use navigator_common::models::{
    estimate_tokens, AnswerResult, AnswerSource, Chunk, Mode, RunStage,
};
use navigator_search::LexicalRetriever;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Answer returned when the corpus is empty
pub const NO_DOCUMENTS_ANSWER: &str = "No documents are loaded.";

/// Runner settings resolved from configuration
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub profile: ContextProfile,
    pub strategy: AssemblyStrategy,
    pub budget: ContextBudget,
    pub default_top_k: usize,
    pub max_top_k: usize,
    /// Upper bound on one generation call, retries included
    pub generation_timeout: Duration,
}

impl From<&AppConfig> for RunnerSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            profile: config.context.profile,
            strategy: config.context.strategy,
            budget: config.context.budget(),
            default_top_k: config.retrieval.top_k,
            max_top_k: config.retrieval.max_top_k,
            generation_timeout: Duration::from_secs(config.generation.deadline_secs),
        }
    }
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

/// Stage bookkeeping for one run
struct Progress {
    mode: Mode,
    stage: RunStage,
}

impl Progress {
    fn new(mode: Mode) -> Self {
        Self { mode, stage: RunStage::Received }
    }

    fn advance(&mut self, next: RunStage) {
        debug!(mode = %self.mode, from = %self.stage, to = %next, "Mode stage transition");
        self.stage = next;
    }

    fn fail(&mut self, error: AppError) -> ModeError {
        let stage = self.stage;
        self.stage = RunStage::Failed;
        warn!(mode = %self.mode, %stage, error = %error, "Mode run failed");
        ModeError::new(self.mode, stage, error)
    }
}

/// Runs RAG and long-context questions against corpus snapshots
pub struct ModeRunner {
    settings: RunnerSettings,
    retriever: Arc<LexicalRetriever>,
    cache: Arc<ContextCache>,
    client: AnswerClient,
}

impl ModeRunner {
    pub fn new(settings: RunnerSettings, client: AnswerClient, cache: Arc<ContextCache>) -> Self {
        Self::with_retriever(settings, client, cache, Arc::new(LexicalRetriever::new()))
    }

    /// Runner sharing an existing lexical index cache
    pub fn with_retriever(
        settings: RunnerSettings,
        client: AnswerClient,
        cache: Arc<ContextCache>,
        retriever: Arc<LexicalRetriever>,
    ) -> Self {
        info!(
            profile = settings.profile.as_str(),
            strategy = settings.strategy.as_str(),
            max_chars = settings.budget.max_chars,
            max_tokens = settings.budget.max_tokens,
            backend = client.is_configured(),
            cache = cache.is_enabled(),
            "Mode runner ready"
        );
        Self {
            settings,
            retriever,
            cache,
            client,
        }
    }

    /// Runner with the HTTP backend (or fallback) and the configured cache
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let client = AnswerClient::from_config(&config.generation)?;
        let cache = Arc::new(ContextCache::from_config(config.cache.clone()));
        Ok(Self::new(RunnerSettings::from(config), client, cache))
    }

    pub fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    pub fn cache(&self) -> &Arc<ContextCache> {
        &self.cache
    }

    pub fn retriever(&self) -> &Arc<LexicalRetriever> {
        &self.retriever
    }

    pub fn backend_configured(&self) -> bool {
        self.client.is_configured()
    }

    /// Answer `question` with `mode` against `snapshot`.
    ///
    /// `top_k` defaults to the configured value and must lie in
    /// `1..=max_top_k`.
    #[instrument(skip(self, question, snapshot), fields(version = snapshot.version()))]
    pub async fn run(
        &self,
        mode: Mode,
        question: &str,
        top_k: Option<usize>,
        snapshot: &CorpusSnapshot,
    ) -> std::result::Result<AnswerResult, ModeError> {
        let start = Instant::now();
        let outcome = match mode {
            Mode::Rag => self.run_rag(question, top_k, snapshot, start).await,
            Mode::LongContext => self.run_long_context(question, top_k, snapshot, start).await,
        };

        let elapsed = start.elapsed().as_secs_f64();
        match &outcome {
            Ok(result) => {
                metrics::record_mode_run(mode.as_str(), elapsed, result.context_chars, true);
                info!(
                    latency_ms = result.latency_ms,
                    context_chunks = result.context_chunks,
                    context_chars = result.context_chars,
                    citations = result.citations.len(),
                    source = ?result.source,
                    "Mode run complete"
                );
            }
            Err(_) => metrics::record_mode_run(mode.as_str(), elapsed, 0, false),
        }
        outcome
    }

    async fn run_rag(
        &self,
        question: &str,
        top_k: Option<usize>,
        snapshot: &CorpusSnapshot,
        start: Instant,
    ) -> std::result::Result<AnswerResult, ModeError> {
        let mut progress = Progress::new(Mode::Rag);
        if snapshot.is_empty() {
            return Ok(no_documents(Mode::Rag, start));
        }

        progress.advance(RunStage::Retrieving);
        let top_k = self.resolve_top_k(top_k).map_err(|e| progress.fail(e))?;
        let retrieved = self
            .retriever
            .retrieve(snapshot, question, top_k)
            .map_err(|e| progress.fail(e))?;
        let selected: Vec<&Chunk> = retrieved.iter().map(|r| &r.chunk).collect();

        let context = selected
            .iter()
            .map(|chunk| chunk.context_block())
            .collect::<Vec<_>>()
            .join(BLOCK_SEPARATOR);
        let context_chars = context.chars().count();

        progress.advance(RunStage::Generating);
        let generated = self
            .generate(Mode::Rag, question, &context, &selected)
            .await
            .map_err(|e| progress.fail(e))?;
        let latency_ms = start.elapsed().as_millis() as u64;

        progress.advance(RunStage::Citing);
        let citations = select_citations(&generated.text, &selected, &selected);

        progress.advance(RunStage::Done);
        Ok(AnswerResult {
            mode: Mode::Rag,
            answer: generated.text,
            citations,
            latency_ms,
            context_chunks: selected.len(),
            context_chars,
            context_tokens: estimate_tokens(&context),
            source: generated.source,
            cache_hit: None,
        })
    }

    async fn run_long_context(
        &self,
        question: &str,
        top_k: Option<usize>,
        snapshot: &CorpusSnapshot,
        start: Instant,
    ) -> std::result::Result<AnswerResult, ModeError> {
        let mut progress = Progress::new(Mode::LongContext);
        if snapshot.is_empty() {
            return Ok(no_documents(Mode::LongContext, start));
        }

        progress.advance(RunStage::Retrieving);
        let top_k = self.resolve_top_k(top_k).map_err(|e| progress.fail(e))?;
        let lookup = self
            .cache
            .get_or_build(&self.cache_key(snapshot, question), || async {
                Ok(self.assemble(snapshot, question))
            })
            .await
            .map_err(|e| progress.fail(e))?;
        let payload = lookup.payload;

        let contributing: Vec<&Chunk> = payload
            .chunk_ids
            .iter()
            .filter_map(|id| snapshot.find_chunk(id))
            .collect();
        if contributing.is_empty() {
            warn!(
                max_chars = self.settings.budget.max_chars,
                max_tokens = self.settings.budget.max_tokens,
                "No chunk fits the context budget"
            );
        }

        // Fallback answers need evidence up front; otherwise rank while citing
        let evidence = (!self.client.is_configured())
            .then(|| self.rank_contributing(snapshot, question, &contributing, top_k));

        progress.advance(RunStage::Generating);
        let generated = self
            .generate(
                Mode::LongContext,
                question,
                &payload.text,
                evidence.as_deref().unwrap_or_default(),
            )
            .await
            .map_err(|e| progress.fail(e))?;
        let latency_ms = start.elapsed().as_millis() as u64;

        progress.advance(RunStage::Citing);
        let relevant = match evidence {
            Some(relevant) => relevant,
            None => self.rank_contributing(snapshot, question, &contributing, top_k),
        };
        let citations = select_citations(&generated.text, &contributing, &relevant);

        progress.advance(RunStage::Done);
        Ok(AnswerResult {
            mode: Mode::LongContext,
            answer: generated.text,
            citations,
            latency_ms,
            context_chunks: payload.chunk_count(),
            context_chars: payload.char_count,
            context_tokens: payload.token_count,
            source: generated.source,
            cache_hit: Some(lookup.hit),
        })
    }

    /// Assemble the long-context payload for `snapshot`
    pub fn assemble(&self, snapshot: &CorpusSnapshot, question: &str) -> ContextPayload {
        let assembler = ContextAssembler::new(self.settings.budget, self.settings.strategy);
        match self.settings.strategy {
            AssemblyStrategy::Relevance => {
                let index = self.retriever.index_for(snapshot);
                assembler.assemble(snapshot, question, Some(&index))
            }
            AssemblyStrategy::Sequential => assembler.assemble(snapshot, question, None),
        }
    }

    /// Contributing chunks re-ranked against the question, best first
    fn rank_contributing<'a>(
        &self,
        snapshot: &'a CorpusSnapshot,
        question: &str,
        contributing: &[&Chunk],
        top_k: usize,
    ) -> Vec<&'a Chunk> {
        let index = self.retriever.index_for(snapshot);
        let ids: Vec<&str> = contributing.iter().map(|c| c.chunk_id.as_str()).collect();
        index
            .rank_subset(question, &ids, top_k)
            .iter()
            .filter_map(|r| snapshot.find_chunk(&r.chunk_id))
            .collect()
    }

    fn cache_key(&self, snapshot: &CorpusSnapshot, question: &str) -> String {
        keys::context_payload(
            snapshot.fingerprint(),
            Mode::LongContext,
            self.settings.strategy,
            self.settings.profile,
            self.settings.budget,
            question,
        )
    }

    fn resolve_top_k(&self, top_k: Option<usize>) -> Result<usize> {
        let top_k = top_k.unwrap_or(self.settings.default_top_k);
        if top_k == 0 || top_k > self.settings.max_top_k {
            return Err(AppError::validation(
                "top_k",
                format!("top_k must be between 1 and {}", self.settings.max_top_k),
            ));
        }
        Ok(top_k)
    }

    async fn generate(
        &self,
        mode: Mode,
        question: &str,
        context: &str,
        evidence: &[&Chunk],
    ) -> Result<GeneratedAnswer> {
        let timeout = self.settings.generation_timeout;
        match tokio::time::timeout(timeout, self.client.answer(mode, question, context, evidence)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(AppError::GenerationTimeout {
                mode: mode.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }
}

fn no_documents(mode: Mode, start: Instant) -> AnswerResult {
    debug!(%mode, "Corpus is empty");
    AnswerResult {
        mode,
        answer: NO_DOCUMENTS_ANSWER.to_string(),
        citations: Vec::new(),
        latency_ms: start.elapsed().as_millis() as u64,
        context_chunks: 0,
        context_chars: 0,
        context_tokens: 0,
        source: AnswerSource::NoDocuments,
        cache_hit: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{memory_cache, protocol_snapshot, runner_sharing, runner_with, StubBackend};
    use navigator_common::errors::ErrorCode;
    use navigator_common::generation::{GenerationError, FALLBACK_PREFIX};
    use navigator_common::models::Document;

    fn fallback_runner(settings: RunnerSettings) -> ModeRunner {
        runner_with(None, settings, memory_cache(60))
    }

    #[tokio::test]
    async fn test_rag_returns_only_overlapping_chunk() {
        let snap = protocol_snapshot();
        let runner = fallback_runner(RunnerSettings::default());

        let result = runner
            .run(Mode::Rag, "When is lactate measured?", Some(1), &snap)
            .await
            .unwrap();

        assert_eq!(result.context_chunks, 1);
        assert_eq!(result.source, AnswerSource::Fallback);
        assert!(result.answer.starts_with(FALLBACK_PREFIX));
        assert_eq!(result.citations.len(), 1);
        assert_eq!(result.citations[0].paragraph_start, Some(2));
        assert!(result.citations[0].snippet.starts_with("Serum lactate"));
        assert_eq!(result.cache_hit, None);
    }

    #[tokio::test]
    async fn test_empty_corpus_answers_without_context() {
        let snap = CorpusSnapshot::empty();
        let backend = Arc::new(StubBackend::default());
        let runner = runner_with(Some(backend.clone()), RunnerSettings::default(), memory_cache(60));

        for mode in [Mode::Rag, Mode::LongContext] {
            let result = runner.run(mode, "Anything?", None, &snap).await.unwrap();
            assert_eq!(result.answer, NO_DOCUMENTS_ANSWER);
            assert_eq!(result.source, AnswerSource::NoDocuments);
            assert_eq!(result.context_chunks, 0);
            assert_eq!(result.context_chars, 0);
            assert_eq!(result.context_tokens, 0);
            assert!(result.citations.is_empty());
        }
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_long_context_respects_token_budget() {
        let snap = protocol_snapshot();
        let full = fallback_runner(RunnerSettings::default())
            .run(Mode::LongContext, "lactate", None, &snap)
            .await
            .unwrap();
        assert_eq!(full.context_chunks, snap.chunk_count());

        let settings = RunnerSettings {
            budget: ContextBudget {
                max_chars: 500_000,
                max_tokens: full.context_tokens - 1,
            },
            ..RunnerSettings::default()
        };
        let truncated = fallback_runner(settings)
            .run(Mode::LongContext, "lactate", None, &snap)
            .await
            .unwrap();

        assert!(truncated.context_chunks < snap.chunk_count());
        assert!(truncated.context_tokens < full.context_tokens);
    }

    #[tokio::test]
    async fn test_long_context_second_run_hits_cache() {
        let snap = protocol_snapshot();
        let runner = fallback_runner(RunnerSettings::default());

        let first = runner.run(Mode::LongContext, "lactate?", None, &snap).await.unwrap();
        let second = runner.run(Mode::LongContext, "lactate?", None, &snap).await.unwrap();

        assert_eq!(first.cache_hit, Some(false));
        assert_eq!(second.cache_hit, Some(true));
        assert_eq!(first.context_chars, second.context_chars);
        assert_eq!(runner.cache().len().await, 1);
    }

    #[tokio::test]
    async fn test_zero_ttl_always_misses() {
        let snap = protocol_snapshot();
        let runner = runner_with(None, RunnerSettings::default(), memory_cache(0));

        for _ in 0..3 {
            let result = runner.run(Mode::LongContext, "lactate?", None, &snap).await.unwrap();
            assert_eq!(result.cache_hit, Some(false));
        }
        assert!(runner.cache().is_empty().await);
    }

    #[tokio::test]
    async fn test_generation_timeout_fails_generating_stage() {
        let snap = protocol_snapshot();
        let backend = Arc::new(StubBackend::stalling(Duration::from_secs(5)));
        let settings = RunnerSettings {
            generation_timeout: Duration::from_millis(50),
            ..RunnerSettings::default()
        };
        let runner = runner_with(Some(backend), settings, memory_cache(60));

        let err = runner.run(Mode::LongContext, "lactate?", None, &snap).await.unwrap_err();
        assert_eq!(err.mode, Mode::LongContext);
        assert_eq!(err.stage, RunStage::Generating);
        assert_eq!(err.error.code(), ErrorCode::GenerationTimeout);
    }

    #[tokio::test]
    async fn test_retryable_error_then_generated_answer() {
        let snap = protocol_snapshot();
        let backend = Arc::new(StubBackend::replying(vec![
            Err(GenerationError::Retryable { message: "429 rate limit".into() }),
            Ok("Measure lactate within one hour.".into()),
        ]));
        let runner = runner_with(Some(backend.clone()), RunnerSettings::default(), memory_cache(60));

        let result = runner.run(Mode::Rag, "lactate?", None, &snap).await.unwrap();
        assert_eq!(result.source, AnswerSource::Generated);
        assert_eq!(result.answer, "Measure lactate within one hour.");
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn test_fatal_error_fails_with_mode_and_stage() {
        let snap = protocol_snapshot();
        let backend = Arc::new(StubBackend::failing(Mode::Rag));
        let runner = runner_with(Some(backend.clone()), RunnerSettings::default(), memory_cache(60));

        let err = runner.run(Mode::Rag, "lactate?", None, &snap).await.unwrap_err();
        assert_eq!(err.stage, RunStage::Generating);
        assert!(matches!(err.error, AppError::GenerationFailed { attempts: 1, .. }));
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_invalid_top_k_fails_retrieving_stage() {
        let snap = protocol_snapshot();
        let runner = fallback_runner(RunnerSettings::default());

        for top_k in [0, 21] {
            let err = runner.run(Mode::Rag, "lactate?", Some(top_k), &snap).await.unwrap_err();
            assert_eq!(err.stage, RunStage::Retrieving);
            assert_eq!(err.error.code(), ErrorCode::ValidationError);
        }
    }

    #[tokio::test]
    async fn test_referenced_chunks_are_cited_first() {
        let snap = protocol_snapshot();
        let backend = Arc::new(StubBackend::replying(vec![Ok(
            "Discharge paperwork [sepsis_protocol.pdf|1|¶3-3] and hygiene [sepsis_protocol.pdf|1|¶1-1].".into(),
        )]));
        let runner = runner_with(Some(backend), RunnerSettings::default(), memory_cache(60));

        let result = runner.run(Mode::LongContext, "lactate?", None, &snap).await.unwrap();
        let paragraphs: Vec<_> = result.citations.iter().map(|c| c.paragraph_start).collect();
        assert_eq!(paragraphs, vec![Some(3), Some(1)]);
    }

    #[tokio::test]
    async fn test_long_context_cites_relevant_chunks_when_unreferenced() {
        let snap = protocol_snapshot();
        let backend = Arc::new(StubBackend::replying(vec![Ok("No markers here.".into())]));
        let runner = runner_with(Some(backend), RunnerSettings::default(), memory_cache(60));

        let result = runner
            .run(Mode::LongContext, "lactate measured", Some(2), &snap)
            .await
            .unwrap();
        assert_eq!(result.context_chunks, 3);
        assert_eq!(result.citations.len(), 2);
        assert_eq!(result.citations[0].paragraph_start, Some(2));
    }

    #[tokio::test]
    async fn test_concurrent_long_context_runs_share_one_payload() {
        let mut docs = Vec::new();
        for i in 0..4 {
            let mut doc = Document::new(format!("policy_{}.md", i), 1);
            doc.push_chunk(format!("Section {} on escalation pathways.", i), 1, None);
            docs.push(doc);
        }
        let snap = Arc::new(CorpusSnapshot::from_documents(7, docs));
        let runner = Arc::new(fallback_runner(RunnerSettings::default()));

        let tasks: Vec<_> = (0..6)
            .map(|_| {
                let runner = runner.clone();
                let snap = snap.clone();
                tokio::spawn(async move {
                    runner.run(Mode::LongContext, "escalation", None, &snap).await.unwrap()
                })
            })
            .collect();

        let results: Vec<AnswerResult> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert!(results.iter().all(|r| r.context_chars == results[0].context_chars));
        assert_eq!(results.iter().filter(|r| r.cache_hit == Some(false)).count(), 1);
    }

    fn policy_on_page(page: u32) -> CorpusSnapshot {
        let mut doc = Document::new("policy.pdf", 3);
        doc.push_chunk("Escalate sepsis alerts to the rapid response team.".into(), page, Some((1, 1)));
        CorpusSnapshot::from_documents(u64::from(page), vec![doc])
    }

    #[tokio::test]
    async fn test_repaginated_document_misses_cache() {
        let backend = Arc::new(StubBackend::default());
        let runner = runner_with(Some(backend.clone()), RunnerSettings::default(), memory_cache(60));

        let before = runner
            .run(Mode::LongContext, "Who handles sepsis alerts?", None, &policy_on_page(1))
            .await
            .unwrap();
        let after = runner
            .run(Mode::LongContext, "Who handles sepsis alerts?", None, &policy_on_page(3))
            .await
            .unwrap();

        assert_eq!(before.cache_hit, Some(false));
        assert_eq!(after.cache_hit, Some(false));
        assert_eq!(after.citations[0].page, 3);

        let contexts = backend.contexts();
        assert!(contexts[0].starts_with("[policy.pdf|1|"));
        assert!(contexts[1].starts_with("[policy.pdf|3|"));
    }

    #[tokio::test]
    async fn test_cache_hit_generates_before_ranking_citations() {
        let snap = protocol_snapshot();
        let retriever = Arc::new(LexicalRetriever::new());
        let backend = Arc::new(StubBackend::observing(retriever.clone()));
        let runner = runner_sharing(
            backend.clone(),
            RunnerSettings::default(),
            memory_cache(60),
            retriever.clone(),
        );

        let first = runner.run(Mode::LongContext, "lactate", None, &snap).await.unwrap();
        assert_eq!(retriever.indexed_version(), Some(snap.version()));

        let fresh = CorpusSnapshot::from_documents(2, vec![snap.documents()[0].as_ref().clone()]);
        let second = runner.run(Mode::LongContext, "lactate", None, &fresh).await.unwrap();

        assert_eq!(first.cache_hit, Some(false));
        assert_eq!(second.cache_hit, Some(true));
        assert_eq!(backend.index_versions(), vec![None, Some(1)]);
        assert_eq!(retriever.indexed_version(), Some(2));
        assert_eq!(second.citations[0].paragraph_start, Some(2));
    }
}
