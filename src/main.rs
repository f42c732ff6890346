//! Catalog-Harvest main entry point
//!
//! This is the command-line interface for the Catalog-Harvest crawler.

use anyhow::Context;
use catalog_harvest::config::{load_config_with_hash, Config, ExportFormat};
use catalog_harvest::output::{
    export_records, print_run_summary, print_statistics, ProgressStatistics,
};
use catalog_harvest::run_harvest;
use catalog_harvest::storage::{open_store, CheckpointStore};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Catalog-Harvest: a resumable catalog crawler
///
/// Walks the list pages of a paginated catalog, extracts every item's detail
/// page and exports the results as a table. Interrupted runs resume where
/// they stopped.
#[derive(Parser, Debug)]
#[command(name = "catalog-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A resumable catalog crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG", default_value = "harvest.toml")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl the catalog, resuming from the last checkpoint
    Run {
        /// Number of concurrent workers
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=64))]
        concurrency: Option<u32>,

        /// Maximum attempts per page or item
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        max_retries: Option<u32>,

        /// Resume an interrupted crawl (default behavior)
        #[arg(long, conflicts_with = "fresh")]
        resume: bool,

        /// Start a fresh crawl, discarding saved progress and records
        #[arg(long, conflicts_with = "resume")]
        fresh: bool,
    },

    /// Export the stored records without crawling
    Export {
        /// Output format (defaults to the configured one)
        #[arg(long, value_enum)]
        format: Option<ExportFormat>,

        /// Output path (defaults to the configured one)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Show statistics from the checkpoint store and exit
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::debug!("Configuration hash: {}", config_hash);

    match cli.command {
        Command::Run {
            concurrency,
            max_retries,
            resume: _,
            fresh,
        } => {
            if let Some(concurrency) = concurrency {
                config.crawler.concurrency = concurrency;
            }
            if let Some(max_retries) = max_retries {
                config.crawler.max_retries = max_retries;
            }
            handle_run(config, &config_hash, fresh, cli.quiet).await
        }
        Command::Export { format, output } => handle_export(&config, &config_hash, format, output),
        Command::Stats => handle_stats(&config, &config_hash),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_harvest=info,warn"),
            1 => EnvFilter::new("catalog_harvest=debug,info"),
            2 => EnvFilter::new("catalog_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the `run` command
async fn handle_run(
    config: Config,
    config_hash: &str,
    fresh: bool,
    quiet: bool,
) -> anyhow::Result<()> {
    if fresh {
        tracing::info!("Starting fresh crawl (ignoring previous state)");
    } else {
        tracing::info!("Starting crawl (will resume from the last checkpoint)");
    }
    tracing::info!(
        "Catalog: {} ({} worker(s), {} attempt(s) per unit)",
        config.catalog.list_url,
        config.crawler.concurrency,
        config.crawler.max_retries
    );

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; finishing in-flight units");
            on_signal.cancel();
        }
    });

    let summary = run_harvest(config, config_hash, fresh, cancel)
        .await
        .context("Harvest failed")?;

    if !quiet {
        print_run_summary(&summary);
    }
    Ok(())
}

/// Handles the `export` command: renders stored records without crawling
fn handle_export(
    config: &Config,
    config_hash: &str,
    format: Option<ExportFormat>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let format = format.unwrap_or(config.output.export_format);
    let output = output.unwrap_or_else(|| PathBuf::from(&config.output.export_path));

    let store = open_store(Path::new(&config.output.state_dir), config_hash)
        .context("Failed to open checkpoint store")?;
    let progress = store.load()?;
    let records = progress.in_discovery_order(store.load_records()?);

    export_records(&records, &output, format, &config.output.sheet_name)
        .with_context(|| format!("Failed to export to {}", output.display()))?;

    println!("✓ {} record(s) exported to: {}", records.len(), output.display());
    Ok(())
}

/// Handles the `stats` command: shows statistics from the checkpoint store
fn handle_stats(config: &Config, config_hash: &str) -> anyhow::Result<()> {
    println!("State directory: {}\n", config.output.state_dir);

    let store = open_store(Path::new(&config.output.state_dir), config_hash)
        .context("Failed to open checkpoint store")?;
    let progress = store.load()?;
    let records = store.load_records()?;

    print_statistics(&ProgressStatistics::collect(&progress, &records));
    Ok(())
}
