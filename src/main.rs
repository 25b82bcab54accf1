use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use photo_ingest::api::schemas::{envelope, parse_inbound};
use photo_ingest::config::{IngestConfig, LocatorConfig, S3Config};
use photo_ingest::infrastructure::{locator, storage};
use photo_ingest::services::orchestrator::BatchOrchestrator;
use std::io::Read;
use std::path::{Path, PathBuf};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "photo-ingest", version, about = "Concurrent photo ingestion into object storage")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process one upload request and print the resulting message as JSON
    Run {
        /// Path to a v1 or v2 request payload, or `-` for stdin
        #[arg(short, long)]
        request: PathBuf,
    },
    /// Verify the configured bucket is reachable
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "photo_ingest=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let config = IngestConfig::from_env();
    let s3_config = S3Config::from_env()?;
    info!(
        "🛡️  Ingest Config: Max Size={}MB, Concurrency={}, Batch Limit={}, Timeout={:?}",
        config.max_file_size / 1024 / 1024,
        config.max_concurrent_downloads,
        config.max_batch_size,
        config.download_timeout
    );

    let store = storage::setup_storage(&s3_config).await;

    match args.command {
        Command::Check => {
            if !storage::check_bucket(store.as_ref(), &s3_config.bucket).await {
                anyhow::bail!("bucket '{}' is not accessible", s3_config.bucket);
            }
            Ok(())
        }
        Command::Run { request } => {
            let payload = read_payload(&request)?;
            let batch = parse_inbound(&payload).context("failed to parse upload request")?;

            let locator_config = LocatorConfig::from_env()?;
            let http = locator::setup_http_client(config.download_timeout)?;
            let content_locator = locator::setup_locator(&locator_config, http.clone());

            // Non-fatal: a missing bucket surfaces per item as a storage error
            storage::check_bucket(store.as_ref(), &s3_config.bucket).await;

            let orchestrator = BatchOrchestrator::new(config, content_locator, store, http);

            let cancel = CancellationToken::new();
            let trigger = cancel.clone();
            tokio::spawn(async move {
                shutdown_signal().await;
                trigger.cancel();
            });

            let outcome = orchestrator.process_with_cancel(batch, cancel).await;
            let message = envelope(&outcome)?;
            println!("{}", serde_json::to_string_pretty(&message)?);

            if outcome.is_err() {
                warn!("🛑 Batch ended with a critical error");
            }
            Ok(())
        }
    }
}

fn read_payload(path: &Path) -> anyhow::Result<Vec<u8>> {
    if path.as_os_str() == "-" {
        let mut buf = Vec::new();
        std::io::stdin().read_to_end(&mut buf)?;
        return Ok(buf);
    }
    std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, cancelling outstanding items...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, cancelling outstanding items...");
        },
    }
}
