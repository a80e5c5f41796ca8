//! Protocol Navigator batch benchmark
//!
//! Runs a list of questions through both modes against a folder corpus:
//! 1. Loads configuration
//! 2. Ingests every allowed file in the folder into one snapshot
//! 3. Compares RAG and long-context for each question
//! 4. Prints one JSON line per question
//!
//! Usage: `benchmark <folder> <questions-file> [top_k]`. The questions file
//! holds one question per line; blank lines and `#` comments are skipped.

use navigator_common::{config::AppConfig, CorpusStore, VERSION};
use navigator_context::{BenchmarkComparator, ModeRunner};
use navigator_ingestion::IngestionProcessor;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;

    // Initialize tracing; logs go to stderr, results to stdout
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.observability.log_level))
        .with_target(true)
        .with_writer(std::io::stderr);
    if config.observability.json_logging {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!("Starting Protocol Navigator benchmark v{}", VERSION);

    let mut args = std::env::args().skip(1);
    let usage = "usage: benchmark <folder> <questions-file> [top_k]";
    let folder = PathBuf::from(args.next().ok_or_else(|| anyhow::anyhow!(usage))?);
    let questions_path = PathBuf::from(args.next().ok_or_else(|| anyhow::anyhow!(usage))?);
    let top_k = args.next().map(|v| v.parse::<usize>()).transpose()?;

    let questions: Vec<String> = tokio::fs::read_to_string(&questions_path)
        .await?
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect();

    // Ingest the corpus
    let processor = IngestionProcessor::new(&config.ingestion);
    let report = processor.sync_folder(&folder).await?;
    for failure in &report.failures {
        warn!(path = %failure.path, error = %failure.error, "Skipped file");
    }

    let store = CorpusStore::new();
    let snapshot = store.publish(report.documents).await;
    info!(
        documents = snapshot.documents().len(),
        chunks = snapshot.chunk_count(),
        questions = questions.len(),
        "Corpus loaded"
    );

    let runner = Arc::new(ModeRunner::from_config(&config)?);
    let comparator = BenchmarkComparator::from_config(runner, &config);

    let stdout = std::io::stdout();
    for question in &questions {
        let result = comparator.compare(question, top_k, &snapshot).await;
        let mut out = stdout.lock();
        writeln!(out, "{}", serde_json::to_string(&result)?)?;
        out.flush()?;
    }

    info!(questions = questions.len(), "Benchmark finished");
    Ok(())
}
