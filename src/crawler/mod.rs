//! Crawler module for catalog fetching and extraction
//!
//! This module contains the core crawling logic, including:
//! - Single-attempt HTTP fetching with failure classification
//! - Bounded retry with linear backoff
//! - HTML extraction of item references and item records
//! - The worker pool and the two-phase coordinator

mod coordinator;
mod extractor;
mod fetcher;
mod retry;
mod scheduler;

pub use coordinator::Coordinator;
pub use extractor::{split_status_markers, Extractor};
pub use fetcher::{
    build_http_client, parse_retry_after, FailureClass, FetchError, FetchedPage, Fetcher,
    HttpFetcher,
};
pub use retry::{RetryDecision, RetryPolicy};
pub use scheduler::{ItemQueue, JobSource, PageCursor, PageOrder, PoolHandle, WorkerPool};

use crate::config::Config;
use crate::output::{export_records, RunSummary};
use crate::storage::{open_store, CheckpointStore};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Runs a complete harvest against the configured state directory
///
/// This is the main entry point for a crawl. It will:
/// 1. Open and lock the checkpoint store (wiping it when `fresh` is set)
/// 2. Build the HTTP fetcher
/// 3. Run discovery and detail extraction
/// 4. Export every stored record, unless the run was cancelled
///
/// # Arguments
///
/// * `config` - The validated configuration
/// * `config_hash` - Hash of the configuration file, stored with the progress
/// * `fresh` - Discard saved progress and records before starting
/// * `cancel` - Cancelling stops the run between units
///
/// # Returns
///
/// * `Ok(RunSummary)` - The run ended, possibly with units left for later
/// * `Err(HarvestError)` - Setup, storage or export failed
pub async fn run_harvest(
    config: Config,
    config_hash: &str,
    fresh: bool,
    cancel: CancellationToken,
) -> crate::Result<RunSummary> {
    let mut store = open_store(Path::new(&config.output.state_dir), config_hash)?;
    if fresh {
        tracing::info!("Discarding saved progress in {}", config.output.state_dir);
        store.reset()?;
    }

    let fetcher = HttpFetcher::from_config(&config.fetch, &config.crawler)?;
    let output = config.output.clone();

    let mut coordinator = Coordinator::new(config, store, Arc::new(fetcher), cancel)?;
    let summary = coordinator.run().await?;

    if summary.cancelled {
        tracing::info!("Run was cancelled; export skipped");
    } else {
        let records = coordinator.store().load_records()?;
        let records = coordinator.progress().in_discovery_order(records);
        export_records(
            &records,
            Path::new(&output.export_path),
            output.export_format,
            &output.sheet_name,
        )?;
    }

    Ok(summary)
}
