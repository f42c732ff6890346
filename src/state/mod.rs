//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `ItemReference`: a link to one catalog item found on a list page
//! - `ItemRecord`: the fields extracted from an item's detail page
//! - `CrawlProgress`: completed list pages, discovered items and completed
//!   items; the unit of checkpointing

mod item;
mod progress;

// Re-export main types
pub use item::{ItemRecord, ItemReference, NO_ALTERNATE_NAME};
pub use progress::CrawlProgress;
