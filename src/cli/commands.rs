//! CLI command definitions and dispatch.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::warn;

use crate::clients::{CancelSource, FileQueue, FsObjectStore, ReqwestClient};
use crate::config::AppConfig;
use crate::coordinator::Coordinator;

#[derive(Parser)]
#[command(name = "geoharvest", version, about = "Geospatial metadata catalogue harvester")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, env = "GEOHARVEST_CONFIG", default_value = "geoharvest.toml", global = true)]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Perform one harvest cycle and exit
    Run {
        /// Restrict the run to a single configured source
        #[arg(long)]
        source: Option<String>,
    },
    /// List configured sources
    Sources,
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    // logging was already configured from argv in main; the flag only needs
    // to be accepted here
    let _ = cli.verbose;
    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Command::Run { source } => run_harvest(config, source).await,
        Command::Sources => list_sources(&config),
    }
}

async fn run_harvest(config: AppConfig, only: Option<String>) -> anyhow::Result<()> {
    let selected: Vec<_> = match &only {
        Some(name) => {
            let source = config
                .source(name)
                .with_context(|| format!("source {name} is not configured"))?;
            vec![source.clone()]
        }
        None => config.sources.clone(),
    };
    if selected.is_empty() {
        anyhow::bail!("no sources configured");
    }

    let http = Arc::new(ReqwestClient::new(Duration::from_secs(
        config.request_timeout_secs,
    ))?);
    let store = Arc::new(FsObjectStore::new(config.storage.data_dir.clone()));
    let queue = Arc::new(FileQueue::new(config.storage.queue_dir.clone()));

    let cancel_source = CancelSource::new();
    let token = cancel_source.token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling run");
            cancel_source.cancel();
        }
    });

    let coordinator = Coordinator::new(config, http, store, queue);
    for source in &selected {
        // fatal harvest errors fail the whole invocation; per-item failures
        // only show up in the summary
        coordinator
            .run_source(source, &token)
            .await
            .with_context(|| format!("harvest run failed for source {}", source.name))?;
    }
    Ok(())
}

fn list_sources(config: &AppConfig) -> anyhow::Result<()> {
    if config.sources.is_empty() {
        println!("no sources configured");
        return Ok(());
    }
    for source in &config.sources {
        println!(
            "{:<16} {:<18} {}{}",
            source.name,
            source.kind.as_str(),
            source.endpoint_url(),
            source
                .schedule
                .as_deref()
                .map(|s| format!("  [{s}]"))
                .unwrap_or_default()
        );
    }
    Ok(())
}
