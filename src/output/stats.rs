//! Run summaries and checkpoint statistics
//!
//! This module provides the counters reported at the end of a run and the
//! statistics shown by the `stats` command.

use crate::state::{CrawlProgress, ItemRecord};
use std::collections::HashSet;

/// Unit counts for one crawl phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseSummary {
    /// Units finished during this run
    pub completed: usize,

    /// Units already checkpointed by an earlier run
    pub already_done: usize,

    /// Units that failed permanently (4xx); retried by the next run
    pub skipped: usize,

    /// Units whose transient retries ran out; retried by the next run
    pub pending: usize,
}

impl PhaseSummary {
    /// Units that still need work after this run
    pub fn remaining(&self) -> usize {
        self.skipped + self.pending
    }
}

/// What a run did, reported when it ends
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// List page counts
    pub discovery: PhaseSummary,

    /// Detail page counts
    pub details: PhaseSummary,

    /// References newly added to the discovered set
    pub new_items: usize,

    /// Items marked complete from the record log after an interrupted save
    pub records_recovered: usize,

    /// First empty list page, if discovery reached the end of the catalog
    pub end_of_catalog: Option<u32>,

    /// The run stopped early on request
    pub cancelled: bool,
}

impl RunSummary {
    /// True when nothing is left for a later run
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.discovery.remaining() == 0 && self.details.remaining() == 0
    }
}

/// Checkpoint statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressStatistics {
    /// List pages fully processed
    pub completed_list_pages: usize,

    /// First empty list page, if known
    pub end_of_catalog: Option<u32>,

    /// Unique item references discovered
    pub discovered_items: usize,

    /// Items with an extracted record
    pub completed_items: usize,

    /// Records in the append-only log
    pub stored_records: usize,

    /// Records whose url was never discovered
    pub orphan_records: usize,
}

impl ProgressStatistics {
    /// Collects statistics from a loaded checkpoint
    ///
    /// # Arguments
    ///
    /// * `progress` - The saved progress snapshot
    /// * `records` - The records loaded from the log
    pub fn collect(progress: &CrawlProgress, records: &[ItemRecord]) -> Self {
        let discovered: HashSet<&str> = progress
            .discovered_items()
            .iter()
            .map(|item| item.url.as_str())
            .collect();

        Self {
            completed_list_pages: progress.completed_list_pages().len(),
            end_of_catalog: progress.end_of_catalog(),
            discovered_items: progress.discovered_items().len(),
            completed_items: progress.completed_item_urls().len(),
            stored_records: records.len(),
            orphan_records: records
                .iter()
                .filter(|record| !discovered.contains(record.url.as_str()))
                .count(),
        }
    }

    /// Items still waiting for their detail page
    pub fn pending_items(&self) -> usize {
        self.discovered_items - self.completed_items
    }
}

/// Prints a run summary to stdout
pub fn print_run_summary(summary: &RunSummary) {
    println!("=== Harvest Summary ===\n");

    print_phase("List pages", &summary.discovery);
    println!("  New items discovered: {}", summary.new_items);
    if let Some(page) = summary.end_of_catalog {
        println!("  End of catalog: page {}", page);
    }
    println!();

    print_phase("Item details", &summary.details);
    if summary.records_recovered > 0 {
        println!("  Recovered from record log: {}", summary.records_recovered);
    }
    println!();

    if summary.cancelled {
        println!("Run was cancelled; rerun to continue where it stopped.");
    } else if summary.is_complete() {
        println!("Harvest complete.");
    } else {
        println!(
            "Harvest finished with {} unit(s) left for the next run.",
            summary.discovery.remaining() + summary.details.remaining()
        );
    }
}

fn print_phase(label: &str, phase: &PhaseSummary) {
    println!("{}:", label);
    println!("  Completed: {}", phase.completed);
    println!("  Already done: {}", phase.already_done);
    println!("  Skipped (permanent failure): {}", phase.skipped);
    println!("  Pending (retry next run): {}", phase.pending);
}

/// Prints checkpoint statistics to stdout
pub fn print_statistics(stats: &ProgressStatistics) {
    println!("=== Checkpoint Statistics ===\n");

    println!("Discovery:");
    println!("  List pages completed: {}", stats.completed_list_pages);
    match stats.end_of_catalog {
        Some(page) => println!("  End of catalog: page {}", page),
        None => println!("  End of catalog: not reached"),
    }
    println!("  Items discovered: {}", stats.discovered_items);
    println!();

    println!("Details:");
    println!("  Items completed: {}", stats.completed_items);
    println!("  Items pending: {}", stats.pending_items());
    println!("  Records stored: {}", stats.stored_records);
    if stats.orphan_records > 0 {
        println!("  Records without a discovered item: {}", stats.orphan_records);
    }
    println!();

    let completion = if stats.discovered_items > 0 {
        (stats.completed_items as f64 / stats.discovered_items as f64) * 100.0
    } else {
        0.0
    };
    println!(
        "Completion: {:.1}% ({} / {} items extracted)",
        completion, stats.completed_items, stats.discovered_items
    );
}
