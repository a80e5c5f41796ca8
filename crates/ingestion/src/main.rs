//! Protocol Navigator folder ingestion
//!
//! Syncs a folder of policy documents and prints the resulting document
//! summaries as JSON:
//! 1. Loads configuration
//! 2. Reads every allowed file in the folder
//! 3. Chunks each document
//! 4. Reports documents and per-file failures

use navigator_common::{config::AppConfig, VERSION};
use navigator_ingestion::IngestionProcessor;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;

    // Initialize tracing; logs go to stderr so stdout stays machine-readable
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.observability.log_level))
        .with_target(true)
        .with_writer(std::io::stderr);
    if config.observability.json_logging {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!("Starting Protocol Navigator ingestion v{}", VERSION);

    let folder = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| config.ingestion.monitored_dir.clone())
        .ok_or_else(|| anyhow::anyhow!("usage: ingest <folder> (or set APP__INGESTION__MONITORED_DIR)"))?;

    let processor = IngestionProcessor::new(&config.ingestion);
    let report = processor.sync_folder(&folder).await?;

    let output = serde_json::json!({
        "folder": folder.display().to_string(),
        "documents": report.documents.iter().map(|d| d.summary()).collect::<Vec<_>>(),
        "failures": report.failures,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    info!(documents = report.documents.len(), "Ingestion finished");
    Ok(())
}
