//! Worker pool and job sources for the crawl phases
//!
//! This module handles:
//! - Handing out units of work (list page indices, item references)
//! - A bounded pool of worker tasks executing those units
//! - The per-worker minimum delay between requests
//! - Stopping dispatch when the run is cancelled
//!
//! Workers only fetch and extract. Their results travel over a channel to
//! the coordinator, which is the single writer of crawl progress.

use crate::state::ItemReference;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Something workers can pull units of work from
pub trait JobSource<J>: Send + Sync {
    /// Returns the next unit, or None when the phase has nothing left
    fn next_job(&self) -> Option<J>;
}

/// Hands out list page indices from 1 upward
///
/// Pages already completed are skipped. Dispatch stops after `last`, or at
/// the first page known to be empty, whichever comes first.
#[derive(Debug)]
pub struct PageCursor {
    next: AtomicU32,
    last: u32,
    end_of_catalog: AtomicU32,
    completed: BTreeSet<u32>,
}

impl PageCursor {
    pub fn new(last: u32, end_of_catalog: Option<u32>, completed: BTreeSet<u32>) -> Self {
        Self {
            next: AtomicU32::new(1),
            last,
            end_of_catalog: AtomicU32::new(end_of_catalog.unwrap_or(u32::MAX)),
            completed,
        }
    }

    /// Stops dispatching `page` and everything after it
    pub fn mark_end(&self, page: u32) {
        self.end_of_catalog.fetch_min(page, Ordering::SeqCst);
    }
}

impl JobSource<u32> for PageCursor {
    fn next_job(&self) -> Option<u32> {
        loop {
            let page = self.next.fetch_add(1, Ordering::SeqCst);
            if page > self.last || page >= self.end_of_catalog.load(Ordering::SeqCst) {
                return None;
            }
            if !self.completed.contains(&page) {
                return Some(page);
            }
        }
    }
}

/// Puts list page results back into page order
///
/// [`PageCursor`] hands pages out in increasing order, so once page `n` has
/// a result every earlier page still to do is in flight. A result waits here
/// until all of those earlier pages have been released, whatever their
/// outcome.
#[derive(Debug)]
pub struct PageOrder<T> {
    next: u32,
    completed: BTreeSet<u32>,
    waiting: BTreeMap<u32, T>,
}

impl<T> PageOrder<T> {
    /// Starts at page 1, passing over pages completed by earlier runs
    pub fn new(completed: BTreeSet<u32>) -> Self {
        let mut order = Self {
            next: 1,
            completed,
            waiting: BTreeMap::new(),
        };
        order.skip_completed();
        order
    }

    /// Holds the result for `page` until its turn comes
    pub fn push(&mut self, page: u32, result: T) {
        self.waiting.insert(page, result);
    }

    /// Releases the next result in page order, if it has arrived
    pub fn pop_ready(&mut self) -> Option<(u32, T)> {
        let page = self.next;
        let result = self.waiting.remove(&page)?;
        self.next = page.saturating_add(1);
        self.skip_completed();
        Some((page, result))
    }

    /// Releases everything still held, lowest page first
    ///
    /// Only needed when an earlier page never produced a result.
    pub fn drain(&mut self) -> impl Iterator<Item = (u32, T)> {
        std::mem::take(&mut self.waiting).into_iter()
    }

    /// Number of results held back
    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }

    fn skip_completed(&mut self) {
        while self.completed.contains(&self.next) {
            self.next += 1;
        }
    }
}

/// Hands out item references in discovery order
#[derive(Debug, Default)]
pub struct ItemQueue {
    items: Mutex<VecDeque<ItemReference>>,
}

impl ItemQueue {
    pub fn new(items: impl IntoIterator<Item = ItemReference>) -> Self {
        Self {
            items: Mutex::new(items.into_iter().collect()),
        }
    }

    pub fn len(&self) -> usize {
        self.items.lock().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl JobSource<ItemReference> for ItemQueue {
    fn next_job(&self) -> Option<ItemReference> {
        self.items.lock().ok()?.pop_front()
    }
}

/// Bounded pool of worker tasks
#[derive(Debug, Clone)]
pub struct WorkerPool {
    concurrency: usize,
    request_delay: Duration,
    cancel: CancellationToken,
}

/// Running workers and the stream of their results
pub struct PoolHandle<R> {
    results: mpsc::Receiver<R>,
    workers: JoinSet<()>,
}

impl WorkerPool {
    /// Creates a pool of `concurrency` workers (at least one)
    ///
    /// # Arguments
    ///
    /// * `concurrency` - Number of workers
    /// * `request_delay` - Minimum pause between two units of one worker
    /// * `cancel` - Once cancelled, workers take no new units
    pub fn new(concurrency: usize, request_delay: Duration, cancel: CancellationToken) -> Self {
        Self {
            concurrency: concurrency.max(1),
            request_delay,
            cancel,
        }
    }

    /// Starts the workers on `source`, running `work` for every unit
    ///
    /// Results are buffered one per worker, so a slow consumer holds the
    /// workers back instead of queueing unbounded results.
    pub fn spawn<J, R, S, F, Fut>(&self, source: Arc<S>, work: F) -> PoolHandle<R>
    where
        J: Send + 'static,
        R: Send + 'static,
        S: JobSource<J> + 'static,
        F: Fn(J) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(self.concurrency);
        let work = Arc::new(work);
        let mut workers = JoinSet::new();

        for worker_id in 0..self.concurrency {
            let source = Arc::clone(&source);
            let work = Arc::clone(&work);
            let tx = tx.clone();
            let cancel = self.cancel.clone();
            let request_delay = self.request_delay;

            workers.spawn(async move {
                let mut first = true;
                loop {
                    if !first && !request_delay.is_zero() {
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            _ = tokio::time::sleep(request_delay) => {}
                        }
                    }
                    if cancel.is_cancelled() {
                        break;
                    }

                    let Some(job) = source.next_job() else {
                        break;
                    };
                    first = false;

                    let result = work(job).await;
                    if tx.send(result).await.is_err() {
                        // Coordinator stopped listening
                        break;
                    }
                }
                tracing::trace!("Worker {} finished", worker_id);
            });
        }

        PoolHandle {
            results: rx,
            workers,
        }
    }
}

impl<R> PoolHandle<R> {
    /// Next finished unit, or None once every worker has stopped
    pub async fn next(&mut self) -> Option<R> {
        self.results.recv().await
    }

    /// Waits for the workers to exit, reporting any that panicked
    pub async fn join(mut self) {
        self.results.close();
        while let Some(joined) = self.workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Crawl worker failed: {}", e);
            }
        }
    }
}
