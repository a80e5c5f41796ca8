//! Benchmark Comparator - RAG and long-context side by side
//!
//! Both legs run against the same snapshot and question. A failed leg is
//! reported in place; it never takes the other leg down with it.

use crate::runner::ModeRunner;
use navigator_common::config::AppConfig;
use navigator_common::corpus::CorpusSnapshot;
use navigator_common::models::{BenchmarkResult, LegResult, Mode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

pub struct BenchmarkComparator {
    runner: Arc<ModeRunner>,
    inter_mode_delay: Duration,
}

impl BenchmarkComparator {
    pub fn new(runner: Arc<ModeRunner>, inter_mode_delay: Duration) -> Self {
        Self { runner, inter_mode_delay }
    }

    pub fn from_config(runner: Arc<ModeRunner>, config: &AppConfig) -> Self {
        Self::new(runner, config.inter_mode_delay())
    }

    pub fn runner(&self) -> &Arc<ModeRunner> {
        &self.runner
    }

    /// Run RAG, then long-context, on `snapshot`
    #[instrument(skip(self, question, snapshot), fields(version = snapshot.version()))]
    pub async fn compare(
        &self,
        question: &str,
        top_k: Option<usize>,
        snapshot: &CorpusSnapshot,
    ) -> BenchmarkResult {
        let rag = self.leg(Mode::Rag, question, top_k, snapshot).await;

        if !self.inter_mode_delay.is_zero() {
            tokio::time::sleep(self.inter_mode_delay).await;
        }

        let long_context = self.leg(Mode::LongContext, question, top_k, snapshot).await;

        info!(
            rag_ok = rag.is_ok(),
            long_context_ok = long_context.is_ok(),
            "Benchmark complete"
        );

        BenchmarkResult {
            question: question.to_string(),
            snapshot_version: snapshot.version(),
            inter_mode_delay_ms: self.inter_mode_delay.as_millis() as u64,
            rag,
            long_context,
        }
    }

    async fn leg(
        &self,
        mode: Mode,
        question: &str,
        top_k: Option<usize>,
        snapshot: &CorpusSnapshot,
    ) -> LegResult {
        match self.runner.run(mode, question, top_k, snapshot).await {
            Ok(answer) => LegResult::Answer(answer),
            Err(e) => {
                warn!(%mode, stage = %e.stage, error = %e.error, "Benchmark leg failed");
                LegResult::Failed { error: e.failure() }
            }
        }
    }
}
