//! Crawl progress: the single piece of mutable state threaded through a run
//! and persisted after every unit of work.

use crate::state::{ItemRecord, ItemReference};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Which list pages are done, which items were discovered, and which of
/// those already have an extracted record
///
/// Invariants held by every mutator:
/// - `discovered_items` has no two entries with the same `url`
/// - `completed_item_urls` only names discovered urls
/// - completed pages and urls only grow
/// - the end of the catalog, once seen, only moves earlier
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ProgressSnapshot")]
pub struct CrawlProgress {
    completed_list_pages: BTreeSet<u32>,
    discovered_items: Vec<ItemReference>,
    completed_item_urls: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_of_catalog: Option<u32>,
    #[serde(skip)]
    known_urls: HashSet<String>,
}

/// Wire shape of [`CrawlProgress`]; checked before it becomes one
#[derive(Deserialize)]
struct ProgressSnapshot {
    #[serde(default)]
    completed_list_pages: BTreeSet<u32>,
    #[serde(default)]
    discovered_items: Vec<ItemReference>,
    #[serde(default)]
    completed_item_urls: BTreeSet<String>,
    #[serde(default)]
    end_of_catalog: Option<u32>,
}

impl TryFrom<ProgressSnapshot> for CrawlProgress {
    type Error = String;

    fn try_from(snapshot: ProgressSnapshot) -> Result<Self, Self::Error> {
        let mut known_urls = HashSet::with_capacity(snapshot.discovered_items.len());
        for item in &snapshot.discovered_items {
            if !known_urls.insert(item.url.clone()) {
                return Err(format!("duplicate discovered item {}", item.url));
            }
        }

        if let Some(orphan) = snapshot
            .completed_item_urls
            .iter()
            .find(|url| !known_urls.contains(url.as_str()))
        {
            return Err(format!("completed item {} was never discovered", orphan));
        }

        if snapshot.completed_list_pages.contains(&0) {
            return Err("list page indices start at 1".to_string());
        }

        Ok(Self {
            completed_list_pages: snapshot.completed_list_pages,
            discovered_items: snapshot.discovered_items,
            completed_item_urls: snapshot.completed_item_urls,
            end_of_catalog: snapshot.end_of_catalog,
            known_urls,
        })
    }
}

impl CrawlProgress {
    /// Creates empty progress for a fresh crawl
    pub fn new() -> Self {
        Self::default()
    }

    // ===== List pages =====

    pub fn is_page_complete(&self, page: u32) -> bool {
        self.completed_list_pages.contains(&page)
    }

    /// Marks a list page as fully processed. Returns false if it already was.
    pub fn mark_page_complete(&mut self, page: u32) -> bool {
        self.completed_list_pages.insert(page)
    }

    pub fn completed_list_pages(&self) -> &BTreeSet<u32> {
        &self.completed_list_pages
    }

    /// First list page known to be empty, if discovery ever reached one
    pub fn end_of_catalog(&self) -> Option<u32> {
        self.end_of_catalog
    }

    /// Records an empty list page. Returns true if the end moved earlier.
    pub fn set_end_of_catalog(&mut self, page: u32) -> bool {
        match self.end_of_catalog {
            Some(end) if end <= page => false,
            _ => {
                self.end_of_catalog = Some(page);
                true
            }
        }
    }

    // ===== Discovered items =====

    /// Appends references not seen before, keeping discovery order
    ///
    /// A url that is already known keeps its first title. Returns how many
    /// references were new.
    pub fn merge_references<I>(&mut self, references: I) -> usize
    where
        I: IntoIterator<Item = ItemReference>,
    {
        let mut added = 0;
        for reference in references {
            if self.known_urls.insert(reference.url.clone()) {
                self.discovered_items.push(reference);
                added += 1;
            }
        }
        added
    }

    pub fn is_discovered(&self, url: &str) -> bool {
        self.known_urls.contains(url)
    }

    pub fn discovered_items(&self) -> &[ItemReference] {
        &self.discovered_items
    }

    // ===== Completed items =====

    pub fn is_item_complete(&self, url: &str) -> bool {
        self.completed_item_urls.contains(url)
    }

    /// Marks an item's detail as extracted
    ///
    /// Returns false when the url was already complete or was never
    /// discovered; unknown urls are not recorded.
    pub fn mark_item_complete(&mut self, url: &str) -> bool {
        if !self.known_urls.contains(url) {
            return false;
        }
        self.completed_item_urls.insert(url.to_string())
    }

    pub fn completed_item_urls(&self) -> &BTreeSet<String> {
        &self.completed_item_urls
    }

    /// Discovered items without a record yet, in discovery order
    pub fn pending_items(&self) -> Vec<ItemReference> {
        self.discovered_items
            .iter()
            .filter(|item| !self.completed_item_urls.contains(&item.url))
            .cloned()
            .collect()
    }

    /// Sorts records into discovery order
    ///
    /// Records are appended as workers finish, so the log order depends on
    /// scheduling. Records for urls that were never discovered go last, in
    /// their original order.
    pub fn in_discovery_order(&self, mut records: Vec<ItemRecord>) -> Vec<ItemRecord> {
        let position: HashMap<&str, usize> = self
            .discovered_items
            .iter()
            .enumerate()
            .map(|(index, item)| (item.url.as_str(), index))
            .collect();
        records.sort_by_key(|record| {
            position
                .get(record.url.as_str())
                .copied()
                .unwrap_or(usize::MAX)
        });
        records
    }

    /// Marks every discovered url that already has a persisted record
    ///
    /// The record log is written before the progress snapshot, so after a
    /// crash between the two it may know about completions the snapshot
    /// lost. Returns how many items were newly marked.
    pub fn reconcile_with_records<'a, I>(&mut self, record_urls: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        record_urls
            .into_iter()
            .filter(|url| self.mark_item_complete(url))
            .count()
    }
}
