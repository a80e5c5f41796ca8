//! Configuration management for Protocol Navigator services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Slack added on top of the benchmark worst case for retrieval, assembly
/// and response writing
pub const REQUEST_HEADROOM_SECS: u64 = 30;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Answer generation backend configuration
    #[serde(default)]
    pub generation: GenerationConfig,

    /// RAG retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Long-context assembly configuration
    #[serde(default)]
    pub context: ContextConfig,

    /// Context cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Ingestion configuration
    #[serde(default)]
    pub ingestion: IngestionConfig,

    /// Benchmark configuration
    #[serde(default)]
    pub benchmark: BenchmarkConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    /// API key for the completion service; empty selects the deterministic fallback
    pub api_key: Option<String>,

    /// API base URL (OpenAI-compatible)
    #[serde(default = "default_generation_base")]
    pub api_base: String,

    /// Model to use
    #[serde(default = "default_generation_model")]
    pub model: String,

    /// Per-request HTTP timeout in seconds
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,

    /// Overall timeout for one generation call including retries
    #[serde(default = "default_generation_deadline")]
    pub deadline_secs: u64,

    /// Maximum output tokens
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Sampling temperature
    #[serde(default)]
    pub temperature: f32,

    /// Retry policy
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Maximum attempts including the first call
    #[serde(default = "default_retry_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry, in seconds
    #[serde(default = "default_retry_initial_delay")]
    pub initial_delay_secs: f64,

    /// Multiplier applied to the delay after each retry
    #[serde(default = "default_retry_multiplier")]
    pub multiplier: f64,

    /// Cap on the delay between retries, in seconds
    #[serde(default = "default_retry_max_delay")]
    pub max_delay_secs: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    /// Default number of chunks retrieved in RAG mode
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Upper bound accepted from callers
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,
}

/// Budget profile for long-context assembly
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContextProfile {
    #[default]
    Balanced,
    Stress,
}

impl ContextProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextProfile::Balanced => "balanced",
            ContextProfile::Stress => "stress",
        }
    }
}

/// Document ordering used before the greedy budget fill
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AssemblyStrategy {
    /// Ingestion order
    #[default]
    Sequential,
    /// Documents ranked by lexical relevance to the question
    Relevance,
}

impl AssemblyStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssemblyStrategy::Sequential => "sequential",
            AssemblyStrategy::Relevance => "relevance",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContextConfig {
    /// Active budget profile
    #[serde(default)]
    pub profile: ContextProfile,

    /// Assembly strategy
    #[serde(default)]
    pub strategy: AssemblyStrategy,

    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,

    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,

    #[serde(default = "default_max_context_chars_stress")]
    pub max_context_chars_stress: usize,

    #[serde(default = "default_max_context_tokens_stress")]
    pub max_context_tokens_stress: usize,
}

/// The budget pair selected by a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextBudget {
    pub max_chars: usize,
    pub max_tokens: usize,
}

impl ContextConfig {
    /// Budget pair for the active profile
    pub fn budget(&self) -> ContextBudget {
        match self.profile {
            ContextProfile::Balanced => ContextBudget {
                max_chars: self.max_context_chars,
                max_tokens: self.max_context_tokens,
            },
            ContextProfile::Stress => ContextBudget {
                max_chars: self.max_context_chars_stress,
                max_tokens: self.max_context_tokens_stress,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Enable long-context payload caching
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Entry lifetime in minutes
    #[serde(default = "default_cache_ttl")]
    pub ttl_minutes: u64,

    /// Minimum assembled context size (chars) worth caching
    #[serde(default = "default_cache_min_chars")]
    pub min_chars: usize,

    /// Flat-file index location; unset keeps the cache in memory only
    #[serde(default = "default_cache_index_path")]
    pub index_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestionConfig {
    /// Target chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Pseudo-page size for plain text files
    #[serde(default = "default_page_chars")]
    pub page_chars: usize,

    /// Folder scanned at startup and by folder sync
    pub monitored_dir: Option<PathBuf>,

    /// Extensions accepted by folder sync (lowercase, with leading dot)
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

impl IngestionConfig {
    /// Normalized extension allow-list; entries without a leading dot are dropped
    pub fn extensions(&self) -> Vec<String> {
        self.allowed_extensions
            .iter()
            .map(|ext| ext.trim().to_lowercase())
            .filter(|ext| ext.starts_with('.'))
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BenchmarkConfig {
    /// Pause between the RAG and long-context legs
    #[serde(default)]
    pub inter_mode_delay_secs: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for logs
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8000 }
fn default_request_timeout() -> u64 { 600 }
fn default_max_body_bytes() -> usize { 64 * 1024 * 1024 }
fn default_generation_base() -> String { "https://api.openai.com/v1".to_string() }
fn default_generation_model() -> String { "gpt-4o-mini".to_string() }
fn default_generation_timeout() -> u64 { 120 }
fn default_generation_deadline() -> u64 { 240 }
fn default_max_output_tokens() -> u32 { 1200 }
fn default_retry_attempts() -> u32 { 3 }
fn default_retry_initial_delay() -> f64 { 20.0 }
fn default_retry_multiplier() -> f64 { 2.0 }
fn default_retry_max_delay() -> f64 { 75.0 }
fn default_top_k() -> usize { 8 }
fn default_max_top_k() -> usize { 20 }
fn default_max_context_chars() -> usize { 500_000 }
fn default_max_context_tokens() -> usize { 120_000 }
fn default_max_context_chars_stress() -> usize { 8_000_000 }
fn default_max_context_tokens_stress() -> usize { 1_800_000 }
fn default_enabled() -> bool { true }
fn default_cache_ttl() -> u64 { 1440 }
fn default_cache_min_chars() -> usize { 120_000 }
fn default_cache_index_path() -> Option<PathBuf> { Some(PathBuf::from("data/context_cache_index.json")) }
fn default_chunk_size() -> usize { 1400 }
fn default_page_chars() -> usize { 3500 }
fn default_allowed_extensions() -> Vec<String> {
    vec![".pdf".to_string(), ".txt".to_string(), ".md".to_string()]
}
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "protocol-navigator".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: default_generation_base(),
            model: default_generation_model(),
            timeout_secs: default_generation_timeout(),
            deadline_secs: default_generation_deadline(),
            max_output_tokens: default_max_output_tokens(),
            temperature: 0.0,
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_retry_attempts(),
            initial_delay_secs: default_retry_initial_delay(),
            multiplier: default_retry_multiplier(),
            max_delay_secs: default_retry_max_delay(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            max_top_k: default_max_top_k(),
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            profile: ContextProfile::default(),
            strategy: AssemblyStrategy::default(),
            max_context_chars: default_max_context_chars(),
            max_context_tokens: default_max_context_tokens(),
            max_context_chars_stress: default_max_context_chars_stress(),
            max_context_tokens_stress: default_max_context_tokens_stress(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            ttl_minutes: default_cache_ttl(),
            min_chars: default_cache_min_chars(),
            index_path: default_cache_index_path(),
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            page_chars: default_page_chars(),
            monitored_dir: None,
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            inter_mode_delay_secs: 0.0,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__CONTEXT__PROFILE=stress
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("ingestion.allowed_extensions")
            )

            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        config.try_deserialize()
    }

    /// Whole-request deadline.
    ///
    /// Never shorter than a full benchmark plus [`REQUEST_HEADROOM_SECS`], so
    /// a slow leg is reported by the comparator instead of cut off mid-run.
    pub fn request_timeout(&self) -> Duration {
        let configured = Duration::from_secs(self.server.request_timeout_secs);
        let floor = self.benchmark_deadline() + Duration::from_secs(REQUEST_HEADROOM_SECS);
        configured.max(floor)
    }

    /// Worst case for one benchmark: both generation deadlines and the pause
    pub fn benchmark_deadline(&self) -> Duration {
        Duration::from_secs(self.generation.deadline_secs.saturating_mul(2)) + self.inter_mode_delay()
    }

    /// Pause between benchmark legs
    pub fn inter_mode_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.benchmark.inter_mode_delay_secs.max(0.0)).unwrap_or_default()
    }

    /// Whether a live generation backend is configured
    pub fn generation_configured(&self) -> bool {
        self.generation
            .api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }
}
