//! Protocol Navigator API Gateway
//!
//! HTTP surface over the question answering core.
//! Handles:
//! - Document ingestion (text documents and folder sync)
//! - RAG and long-context questions
//! - RAG vs long-context benchmarks
//! - Observability (logging, metrics, request ids)

mod error;
mod handlers;
mod middleware;

use axum::{
    error_handling::HandleErrorLayer,
    extract::DefaultBodyLimit,
    http::StatusCode,
    routing::{get, post},
    BoxError, Router,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use navigator_common::{
    config::AppConfig,
    errors::AppError,
    metrics::{self, MODE_LATENCY_BUCKETS},
    CorpusStore,
};
use navigator_context::{BenchmarkComparator, ModeRunner};
use navigator_ingestion::IngestionProcessor;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub corpus: Arc<CorpusStore>,
    pub processor: IngestionProcessor,
    pub comparator: Arc<BenchmarkComparator>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, runner: ModeRunner) -> Self {
        let comparator = BenchmarkComparator::from_config(Arc::new(runner), &config);
        Self {
            processor: IngestionProcessor::new(&config.ingestion),
            corpus: Arc::new(CorpusStore::new()),
            comparator: Arc::new(comparator),
            config,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;
    let config = Arc::new(config);

    // Initialize tracing
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.observability.log_level))
        .with_target(true);
    if config.observability.json_logging {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!("Starting Protocol Navigator API Gateway v{}", navigator_common::VERSION);

    if config.request_timeout().as_secs() > config.server.request_timeout_secs {
        warn!(
            configured_secs = config.server.request_timeout_secs,
            effective_secs = config.request_timeout().as_secs(),
            "Request timeout raised to cover a full benchmark"
        );
    }

    // Initialize metrics
    init_metrics(config.observability.metrics_port)?;
    metrics::register_metrics();

    // Build the core
    let runner = ModeRunner::from_config(&config)?;
    let state = AppState::new(config.clone(), runner);

    // Load the monitored folder, if any
    if let Some(dir) = &config.ingestion.monitored_dir {
        if dir.is_dir() {
            match state.processor.sync_folder(dir).await {
                Ok(report) => {
                    for failure in &report.failures {
                        warn!(path = %failure.path, error = %failure.error, "Skipped file");
                    }
                    state.corpus.publish(report.documents).await;
                }
                Err(e) => error!(dir = %dir.display(), error = %e, "Initial folder sync failed"),
            }
        } else {
            warn!(dir = %dir.display(), "Monitored folder does not exist, starting empty");
        }
    }

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| AppError::Configuration {
            message: format!("invalid listen address: {}", e),
        })?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Install the Prometheus exporter on its own port; 0 disables it
fn init_metrics(port: u16) -> anyhow::Result<()> {
    if port == 0 {
        info!("Metrics exporter disabled");
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from(([0, 0, 0, 0], port)))
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_mode_duration_seconds", metrics::METRICS_PREFIX)),
            MODE_LATENCY_BUCKETS,
        )?
        .install()?;

    info!(port, "Metrics exporter listening");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // Whole-request deadline
    let timeout = ServiceBuilder::new()
        .layer(HandleErrorLayer::new(handle_timeout))
        .timeout(state.config.request_timeout());

    let body_limit = DefaultBodyLimit::max(state.config.server.max_body_bytes);

    // API routes
    let api_routes = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/status", get(handlers::health::status))

        // Document endpoints
        .route(
            "/documents",
            get(handlers::documents::list_documents).post(handlers::documents::create_documents),
        )
        .route("/documents/sync", post(handlers::documents::sync_folder))
        .route("/documents/reset", post(handlers::documents::reset_documents))

        // Question endpoints
        .route("/ask", post(handlers::ask::ask))
        .route("/benchmark", post(handlers::ask::benchmark))

        .route_layer(axum::middleware::from_fn(middleware::metrics::track_requests));

    // Compose the app
    Router::new()
        .nest("/api", api_routes)
        .layer(body_limit)
        .layer(timeout)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

async fn handle_timeout(err: BoxError) -> (StatusCode, String) {
    if err.is::<tower::timeout::error::Elapsed>() {
        (StatusCode::REQUEST_TIMEOUT, "Request timed out".to_string())
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, format!("Unhandled error: {}", err))
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
