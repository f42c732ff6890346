//! Crawl coordinator - two-phase harvest orchestration
//!
//! This module drives a harvest from the saved checkpoint to the end:
//! - Phase 1 walks the list pages and collects item references
//! - Phase 2 fetches each discovered item and extracts its record
//!
//! Workers fetch and extract concurrently, but only the coordinator touches
//! [`CrawlProgress`] and the checkpoint store. Every finished unit is
//! committed before the next result is looked at, and list pages are
//! committed in page order so discovery order does not depend on timing.

use crate::config::Config;
use crate::crawler::extractor::Extractor;
use crate::crawler::fetcher::{FailureClass, FetchError, Fetcher};
use crate::crawler::retry::RetryPolicy;
use crate::crawler::scheduler::{ItemQueue, PageCursor, PageOrder, WorkerPool};
use crate::output::{PhaseSummary, RunSummary};
use crate::state::{CrawlProgress, ItemRecord, ItemReference};
use crate::storage::CheckpointStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// How often (in committed units) progress is logged at info level
const PROGRESS_LOG_INTERVAL: usize = 10;

/// Owns the crawl state and the checkpoint store for one run
pub struct Coordinator<S: CheckpointStore> {
    config: Arc<Config>,
    store: S,
    progress: CrawlProgress,
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<Extractor>,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl<S: CheckpointStore> Coordinator<S> {
    /// Creates a coordinator, loading saved progress from `store`
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration
    /// * `store` - Checkpoint store, exclusively owned for the run
    /// * `fetcher` - Single-attempt page fetcher
    /// * `cancel` - Stops dispatching new units once cancelled
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(HarvestError)` - A selector is invalid or the checkpoint is unreadable
    pub fn new(
        config: Config,
        store: S,
        fetcher: Arc<dyn Fetcher>,
        cancel: CancellationToken,
    ) -> crate::Result<Self> {
        let extractor = Extractor::new(&config.catalog.origin, &config.selectors)?;
        let progress = store.load()?;
        let retry = RetryPolicy::from_config(&config.crawler);

        tracing::info!(
            "Loaded checkpoint: {} list page(s) done, {} item(s) discovered, {} extracted",
            progress.completed_list_pages().len(),
            progress.discovered_items().len(),
            progress.completed_item_urls().len()
        );

        Ok(Self {
            config: Arc::new(config),
            store,
            progress,
            fetcher,
            extractor: Arc::new(extractor),
            retry,
            cancel,
        })
    }

    /// Current crawl progress
    pub fn progress(&self) -> &CrawlProgress {
        &self.progress
    }

    /// The checkpoint store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Runs discovery then detail extraction
    ///
    /// Network failures are contained per unit and show up in the summary.
    /// Storage failures abort the run.
    pub async fn run(&mut self) -> crate::Result<RunSummary> {
        let start_time = std::time::Instant::now();
        let mut summary = RunSummary::default();

        self.discover(&mut summary).await?;

        if self.cancel.is_cancelled() {
            tracing::warn!("Run cancelled after discovery; skipping item details");
        } else {
            self.reconcile(&mut summary)?;
            self.extract_details(&mut summary).await?;
        }

        summary.end_of_catalog = self.progress.end_of_catalog();
        summary.cancelled = self.cancel.is_cancelled();

        tracing::info!(
            "Run finished in {:?}: {} page(s) and {} item(s) completed",
            start_time.elapsed(),
            summary.discovery.completed,
            summary.details.completed
        );

        Ok(summary)
    }

    /// Phase 1: walks the list pages and merges their references
    async fn discover(&mut self, summary: &mut RunSummary) -> crate::Result<()> {
        let catalog = self.config.catalog.clone();
        let open_ended = catalog.total_pages.is_none();

        summary.discovery.already_done = self.progress.completed_list_pages().len();

        let cursor = Arc::new(PageCursor::new(
            catalog.last_page(),
            self.progress.end_of_catalog(),
            self.progress.completed_list_pages().clone(),
        ));

        tracing::info!(
            "Discovery: up to {} list page(s), {} already done",
            catalog.last_page(),
            summary.discovery.already_done
        );

        let fetcher = Arc::clone(&self.fetcher);
        let extractor = Arc::clone(&self.extractor);
        let retry = self.retry;
        let worker_cursor = Arc::clone(&cursor);

        let mut handle = self.pool().spawn(Arc::clone(&cursor), move |page: u32| {
            let fetcher = Arc::clone(&fetcher);
            let extractor = Arc::clone(&extractor);
            let cursor = Arc::clone(&worker_cursor);
            let url = catalog.list_page_url(page);
            async move {
                let label = format!("List page {}", page);
                let result = retry
                    .run(&label, || fetcher.fetch(&url))
                    .await
                    .map(|fetched| extractor.extract_list_page(&fetched.body));
                // Stop handing out later pages before this result is committed
                if open_ended && is_end_of_catalog(&result) {
                    cursor.mark_end(page);
                }
                (page, result)
            }
        });

        // Pages are merged in index order, whichever worker finishes first
        let mut order = PageOrder::new(self.progress.completed_list_pages().clone());
        while let Some((page, result)) = handle.next().await {
            order.push(page, result);
            while let Some((page, result)) = order.pop_ready() {
                self.commit_list_page(page, result, open_ended, summary)?;
            }
        }
        handle.join().await;

        if !order.is_empty() {
            tracing::warn!(
                "{} list page result(s) committed after a missing earlier page",
                order.len()
            );
        }
        for (page, result) in order.drain() {
            self.commit_list_page(page, result, open_ended, summary)?;
        }

        tracing::info!(
            "Discovery done: {} page(s) completed, {} new item(s), {} item(s) known",
            summary.discovery.completed,
            summary.new_items,
            self.progress.discovered_items().len()
        );
        Ok(())
    }

    /// Merges one list page's references and checkpoints the page
    fn commit_list_page(
        &mut self,
        page: u32,
        result: Result<Vec<ItemReference>, FetchError>,
        open_ended: bool,
        summary: &mut RunSummary,
    ) -> crate::Result<()> {
        if self.progress.end_of_catalog().is_some_and(|end| page >= end) {
            tracing::debug!("Ignoring list page {} past the end of the catalog", page);
            return Ok(());
        }

        if open_ended && is_end_of_catalog(&result) {
            return self.mark_end_of_catalog(page);
        }

        match result {
            Ok(references) => {
                let found = references.len();
                let added = self.progress.merge_references(references);
                self.progress.mark_page_complete(page);
                self.store.save(&self.progress)?;

                summary.new_items += added;
                summary.discovery.completed += 1;
                tracing::debug!(
                    "List page {}: {} reference(s), {} new",
                    page,
                    found,
                    added
                );
                self.log_progress("Discovery", summary.discovery.completed);
            }
            Err(e) => record_failure(&mut summary.discovery, &format!("list page {}", page), &e),
        }
        Ok(())
    }

    /// Remembers the end of the catalog across runs
    fn mark_end_of_catalog(&mut self, page: u32) -> crate::Result<()> {
        if self.progress.set_end_of_catalog(page) {
            self.store.save(&self.progress)?;
            tracing::info!("List page {} is empty; end of catalog reached", page);
        }
        Ok(())
    }

    /// Marks items whose record made it to the log but not into the snapshot
    fn reconcile(&mut self, summary: &mut RunSummary) -> crate::Result<()> {
        let records = self.store.load_records()?;
        let recovered = self
            .progress
            .reconcile_with_records(records.iter().map(|record| record.url.as_str()));

        if recovered > 0 {
            tracing::warn!(
                "Recovered {} completed item(s) from the record log",
                recovered
            );
            self.store.save(&self.progress)?;
        }
        summary.records_recovered = recovered;
        Ok(())
    }

    /// Phase 2: fetches every pending item and commits its record
    async fn extract_details(&mut self, summary: &mut RunSummary) -> crate::Result<()> {
        let queue = Arc::new(ItemQueue::new(self.progress.pending_items()));
        summary.details.already_done = self.progress.completed_item_urls().len();

        tracing::info!(
            "Details: {} item(s) pending, {} already extracted",
            queue.len(),
            summary.details.already_done
        );
        if queue.is_empty() {
            return Ok(());
        }

        let fetcher = Arc::clone(&self.fetcher);
        let extractor = Arc::clone(&self.extractor);
        let retry = self.retry;

        let mut handle = self.pool().spawn(queue, move |item: ItemReference| {
            let fetcher = Arc::clone(&fetcher);
            let extractor = Arc::clone(&extractor);
            async move {
                let result = retry
                    .run(&item.url, || fetcher.fetch(&item.url))
                    .await
                    .map(|fetched| extractor.extract_detail_page(&item, &fetched.body));
                (item, result)
            }
        });

        while let Some((item, result)) = handle.next().await {
            match result {
                Ok(record) => {
                    self.commit_record(&record)?;
                    summary.details.completed += 1;
                    tracing::debug!("Extracted {} ({})", item.title, item.url);
                    self.log_progress("Details", summary.details.completed);
                }
                Err(e) => record_failure(&mut summary.details, &item.url, &e),
            }
        }
        handle.join().await;

        tracing::info!(
            "Details done: {} extracted, {} skipped, {} pending",
            summary.details.completed,
            summary.details.skipped,
            summary.details.pending
        );
        Ok(())
    }

    /// Appends the record durably, then marks its item complete
    fn commit_record(&mut self, record: &ItemRecord) -> crate::Result<()> {
        self.store.append_record(record)?;
        self.progress.mark_item_complete(&record.url);
        self.store.save(&self.progress)?;
        Ok(())
    }

    fn pool(&self) -> WorkerPool {
        WorkerPool::new(
            self.config.crawler.concurrency as usize,
            self.config.crawler.request_delay(),
            self.cancel.clone(),
        )
    }

    fn log_progress(&self, phase: &str, completed: usize) {
        if completed % PROGRESS_LOG_INTERVAL == 0 {
            tracing::info!(
                "{} progress: {} completed, {} of {} item(s) extracted",
                phase,
                completed,
                self.progress.completed_item_urls().len(),
                self.progress.discovered_items().len()
            );
        }
    }
}

/// An empty list page, or a missing one, means there are no further pages
fn is_end_of_catalog(result: &Result<Vec<ItemReference>, FetchError>) -> bool {
    match result {
        Ok(references) => references.is_empty(),
        Err(FetchError::HttpStatus(404)) => true,
        Err(_) => false,
    }
}

/// Counts a unit whose retries ran out
fn record_failure(phase: &mut PhaseSummary, unit: &str, error: &FetchError) {
    match error.class() {
        FailureClass::PermanentRequest => {
            phase.skipped += 1;
            tracing::warn!("Skipping {}: {}", unit, error);
        }
        FailureClass::TransientNetwork => {
            phase.pending += 1;
            tracing::warn!("Giving up on {} for this run: {}", unit, error);
        }
    }
}
