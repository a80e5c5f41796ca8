//! Metrics and observability utilities
//!
//! Prometheus metrics for mode runs, generation attempts, the context
//! cache and ingestion. Names share the `navigator_` prefix.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all navigator metrics
pub const METRICS_PREFIX: &str = "navigator";

/// Histogram buckets for mode latency (in seconds).
/// Generation dominates, so the range runs well past a minute.
pub const MODE_LATENCY_BUCKETS: &[f64] = &[
    0.010,  // 10ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
    60.00,  // 1m
    120.0,  // 2m
    240.0,  // 4m
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Mode runs
    describe_counter!(
        format!("{}_mode_runs_total", METRICS_PREFIX),
        Unit::Count,
        "Mode runs by mode and outcome"
    );

    describe_histogram!(
        format!("{}_mode_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "End-to-end mode latency in seconds"
    );

    describe_gauge!(
        format!("{}_context_chars", METRICS_PREFIX),
        Unit::Count,
        "Characters sent as context on the last run"
    );

    // Generation
    describe_counter!(
        format!("{}_generation_attempts_total", METRICS_PREFIX),
        Unit::Count,
        "Generation backend calls by outcome"
    );

    describe_counter!(
        format!("{}_generation_fallbacks_total", METRICS_PREFIX),
        Unit::Count,
        "Answers produced without a generation backend"
    );

    // Ingestion
    describe_counter!(
        format!("{}_documents_ingested_total", METRICS_PREFIX),
        Unit::Count,
        "Total documents ingested"
    );

    describe_counter!(
        format!("{}_chunks_created_total", METRICS_PREFIX),
        Unit::Count,
        "Total chunks created"
    );

    describe_histogram!(
        format!("{}_ingestion_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Document ingestion latency in seconds"
    );

    describe_gauge!(
        format!("{}_corpus_version", METRICS_PREFIX),
        Unit::Count,
        "Version of the published corpus snapshot"
    );

    // Cache metrics
    describe_counter!(
        format!("{}_cache_hits_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache hits"
    );

    describe_counter!(
        format!("{}_cache_misses_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache misses"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Record a finished mode run
pub fn record_mode_run(mode: &str, duration_secs: f64, context_chars: usize, success: bool) {
    let outcome = if success { "success" } else { "error" };

    counter!(
        format!("{}_mode_runs_total", METRICS_PREFIX),
        "mode" => mode.to_string(),
        "outcome" => outcome
    )
    .increment(1);

    histogram!(
        format!("{}_mode_duration_seconds", METRICS_PREFIX),
        "mode" => mode.to_string()
    )
    .record(duration_secs);

    if success {
        gauge!(
            format!("{}_context_chars", METRICS_PREFIX),
            "mode" => mode.to_string()
        )
        .set(context_chars as f64);
    }
}

/// Record one call to the generation backend
pub fn record_generation_attempt(outcome: &str) {
    counter!(
        format!("{}_generation_attempts_total", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record an answer produced by the deterministic fallback
pub fn record_generation_fallback() {
    counter!(format!("{}_generation_fallbacks_total", METRICS_PREFIX)).increment(1);
}

/// Helper to record cache metrics
pub fn record_cache(hit: bool, cache_name: &str) {
    if hit {
        counter!(
            format!("{}_cache_hits_total", METRICS_PREFIX),
            "cache" => cache_name.to_string()
        )
        .increment(1);
    } else {
        counter!(
            format!("{}_cache_misses_total", METRICS_PREFIX),
            "cache" => cache_name.to_string()
        )
        .increment(1);
    }
}

/// Helper to record ingestion metrics
pub fn record_ingestion(duration_secs: f64, chunks_created: usize, source_kind: &str) {
    counter!(
        format!("{}_documents_ingested_total", METRICS_PREFIX),
        "kind" => source_kind.to_string()
    )
    .increment(1);

    counter!(
        format!("{}_chunks_created_total", METRICS_PREFIX),
        "kind" => source_kind.to_string()
    )
    .increment(chunks_created as u64);

    histogram!(format!("{}_ingestion_duration_seconds", METRICS_PREFIX)).record(duration_secs);
}

/// Record the version of a newly published corpus snapshot
pub fn record_corpus_version(version: u64) {
    gauge!(format!("{}_corpus_version", METRICS_PREFIX)).set(version as f64);
}
