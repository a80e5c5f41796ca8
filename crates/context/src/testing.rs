//! Shared fixtures for runner and benchmark tests

use crate::runner::{ModeRunner, RunnerSettings};
use async_trait::async_trait;
use navigator_common::cache::{ContextCache, MemoryStore};
use navigator_common::config::{CacheConfig, RetryConfig};
use navigator_common::corpus::CorpusSnapshot;
use navigator_common::generation::{AnswerBackend, AnswerClient, GenerationError};
use navigator_common::models::{Document, Mode};
use navigator_search::LexicalRetriever;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Backend replaying a script, optionally failing one mode or stalling
#[derive(Default)]
pub(crate) struct StubBackend {
    script: Mutex<VecDeque<Result<String, GenerationError>>>,
    failing_mode: Option<Mode>,
    delay: Duration,
    calls: AtomicU32,
    contexts: Mutex<Vec<String>>,
    observed: Option<Arc<LexicalRetriever>>,
    index_versions: Mutex<Vec<Option<u64>>>,
}

impl StubBackend {
    pub(crate) fn replying(script: Vec<Result<String, GenerationError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        }
    }

    pub(crate) fn failing(mode: Mode) -> Self {
        Self {
            failing_mode: Some(mode),
            ..Self::default()
        }
    }

    pub(crate) fn stalling(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Records which index version `retriever` holds at each call
    pub(crate) fn observing(retriever: Arc<LexicalRetriever>) -> Self {
        Self {
            observed: Some(retriever),
            ..Self::default()
        }
    }

    pub(crate) fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Context text received by each call, in order
    pub(crate) fn contexts(&self) -> Vec<String> {
        self.contexts.lock().unwrap().clone()
    }

    pub(crate) fn index_versions(&self) -> Vec<Option<u64>> {
        self.index_versions.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnswerBackend for StubBackend {
    fn name(&self) -> &str {
        "stub"
    }

    async fn generate(
        &self,
        mode: Mode,
        _question: &str,
        context: &str,
    ) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.contexts.lock().unwrap().push(context.to_string());
        if let Some(retriever) = &self.observed {
            self.index_versions.lock().unwrap().push(retriever.indexed_version());
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing_mode == Some(mode) {
            return Err(GenerationError::Fatal { message: "401 Unauthorized".into() });
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(format!("Answer for {}", mode)))
    }
}

pub(crate) fn immediate_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        initial_delay_secs: 0.0,
        multiplier: 2.0,
        max_delay_secs: 0.0,
    }
}

/// In-memory cache that stores payloads of any size
pub(crate) fn memory_cache(ttl_minutes: u64) -> Arc<ContextCache> {
    let config = CacheConfig {
        enabled: true,
        ttl_minutes,
        min_chars: 0,
        index_path: None,
    };
    Arc::new(ContextCache::new(config, Arc::new(MemoryStore::new())))
}

pub(crate) fn runner_with(
    backend: Option<Arc<StubBackend>>,
    settings: RunnerSettings,
    cache: Arc<ContextCache>,
) -> ModeRunner {
    let backend = backend.map(|b| b as Arc<dyn AnswerBackend>);
    ModeRunner::new(settings, AnswerClient::new(backend, immediate_retry()), cache)
}

pub(crate) fn runner_sharing(
    backend: Arc<StubBackend>,
    settings: RunnerSettings,
    cache: Arc<ContextCache>,
    retriever: Arc<LexicalRetriever>,
) -> ModeRunner {
    let backend = Some(backend as Arc<dyn AnswerBackend>);
    ModeRunner::with_retriever(
        settings,
        AnswerClient::new(backend, immediate_retry()),
        cache,
        retriever,
    )
}

/// One document, three chunks on page 1
pub(crate) fn protocol_snapshot() -> CorpusSnapshot {
    let mut doc = Document::new("sepsis_protocol.pdf", 1);
    doc.push_chunk("Hand hygiene is required before every patient contact.".into(), 1, Some((1, 1)));
    doc.push_chunk("Serum lactate must be measured within one hour of recognition.".into(), 1, Some((2, 2)));
    doc.push_chunk("Discharge summaries are completed within two days.".into(), 1, Some((3, 3)));
    CorpusSnapshot::from_documents(1, vec![doc])
}
