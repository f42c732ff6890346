//! Storage module for persisting crawl progress
//!
//! This module handles durable checkpointing for the crawler:
//! - Atomic replacement of the progress snapshot
//! - Append-only persistence of extracted records
//! - Crash repair of a torn record log
//! - Exclusive ownership of a state directory

mod file_store;
mod lock;
mod traits;

pub use file_store::{FileCheckpointStore, PROGRESS_FILE, RECORDS_FILE};
pub use lock::{StoreLock, LOCK_FILE};
pub use traits::{CheckpointStore, StorageError, StorageResult};

use std::path::Path;

/// Opens the checkpoint store in `dir`
///
/// # Arguments
///
/// * `dir` - Directory holding the checkpoint files
/// * `config_hash` - Hash of the configuration driving the crawl
///
/// # Returns
///
/// * `Ok(FileCheckpointStore)` - Store locked for this process
/// * `Err(StorageError)` - Failed to open or lock the store
pub fn open_store(dir: &Path, config_hash: &str) -> StorageResult<FileCheckpointStore> {
    Ok(FileCheckpointStore::open(dir)?.with_config_hash(config_hash))
}
