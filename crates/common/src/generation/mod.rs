//! Answer generation
//!
//! Provides:
//! - The [`AnswerBackend`] seam for text-completion services
//! - An OpenAI-compatible HTTP backend
//! - Retry with exponential backoff for transient failures
//! - A deterministic fallback when no backend is configured

pub mod fallback;
pub mod http;
pub mod retry;

pub use fallback::{fallback_answer, FALLBACK_PREFIX};
pub use http::HttpBackend;
pub use retry::RetrySchedule;

use crate::config::{GenerationConfig, RetryConfig};
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::models::{AnswerSource, Chunk, Mode};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

const RETRYABLE_SIGNALS: &[&str] = &[
    "429",
    "resource_exhausted",
    "rate limit",
    "rate-limit",
    "quota",
    "too many requests",
    "temporarily unavailable",
    "deadline exceeded",
];

/// Failure reported by a generation backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// Transient; worth another attempt
    #[error("{message}")]
    Retryable { message: String },

    /// Final; retrying cannot help
    #[error("{message}")]
    Fatal { message: String },
}

impl GenerationError {
    /// Classify free-form error text by rate-limit and availability wording
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lowered = message.to_lowercase();
        if RETRYABLE_SIGNALS.iter().any(|signal| lowered.contains(signal)) {
            GenerationError::Retryable { message }
        } else {
            GenerationError::Fatal { message }
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, GenerationError::Retryable { .. })
    }
}

/// A text-completion service
#[async_trait]
pub trait AnswerBackend: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Answer `question` from `context`
    async fn generate(
        &self,
        mode: Mode,
        question: &str,
        context: &str,
    ) -> std::result::Result<String, GenerationError>;
}

/// Answer text and where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedAnswer {
    pub text: String,
    pub source: AnswerSource,
    /// Backend calls made; 0 for fallback answers
    pub attempts: u32,
}

/// Backend plus retry policy, falling back to deterministic text when no
/// backend is configured
#[derive(Clone)]
pub struct AnswerClient {
    backend: Option<Arc<dyn AnswerBackend>>,
    retry: RetryConfig,
}

impl AnswerClient {
    pub fn new(backend: Option<Arc<dyn AnswerBackend>>, retry: RetryConfig) -> Self {
        Self { backend, retry }
    }

    /// HTTP backend when an API key is set, fallback otherwise
    pub fn from_config(config: &GenerationConfig) -> Result<Self> {
        let backend: Option<Arc<dyn AnswerBackend>> = match config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
        {
            Some(key) => {
                info!(model = %config.model, api_base = %config.api_base, "Generation backend configured");
                Some(Arc::new(HttpBackend::new(config, key)?))
            }
            None => {
                warn!("No generation API key set, answers will use the deterministic fallback");
                None
            }
        };

        Ok(Self::new(backend, config.retry.clone()))
    }

    pub fn is_configured(&self) -> bool {
        self.backend.is_some()
    }

    /// Generate an answer, retrying transient failures.
    ///
    /// `evidence` feeds the fallback when no backend is configured.
    pub async fn answer(
        &self,
        mode: Mode,
        question: &str,
        context: &str,
        evidence: &[&Chunk],
    ) -> Result<GeneratedAnswer> {
        let Some(backend) = &self.backend else {
            metrics::record_generation_fallback();
            return Ok(GeneratedAnswer {
                text: fallback_answer(question, evidence),
                source: AnswerSource::Fallback,
                attempts: 0,
            });
        };

        let mut schedule = RetrySchedule::new(&self.retry);
        loop {
            let attempt = schedule.begin_attempt();
            match backend.generate(mode, question, context).await {
                Ok(text) => {
                    metrics::record_generation_attempt("success");
                    debug!(backend = backend.name(), %mode, attempt, "Generation succeeded");
                    return Ok(GeneratedAnswer {
                        text,
                        source: AnswerSource::Generated,
                        attempts: attempt,
                    });
                }
                Err(error) => {
                    let outcome = if error.is_retryable() { "retryable" } else { "fatal" };
                    metrics::record_generation_attempt(outcome);

                    let Some(delay) = schedule.next_delay(&error) else {
                        warn!(
                            backend = backend.name(),
                            %mode,
                            attempt,
                            error = %error,
                            "Generation failed"
                        );
                        return Err(AppError::GenerationFailed {
                            mode: mode.to_string(),
                            attempts: attempt,
                            message: error.to_string(),
                        });
                    };

                    warn!(
                        backend = backend.name(),
                        %mode,
                        attempt,
                        max_attempts = schedule.max_attempts(),
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Generation request failed, retrying"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }
}
