//! Storage traits and error types
//!
//! This module defines the trait interface for checkpoint backends and
//! associated error types.

use crate::state::{CrawlProgress, ItemRecord};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during storage operations
///
/// Every storage error is fatal to a run: continuing without durable
/// progress risks duplicated work or lost records.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt checkpoint file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("Checkpoint store {path} is locked by another run")]
    Locked { path: PathBuf },
}

impl StorageError {
    /// Wraps an IO error with the path it happened on
    pub(crate) fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for checkpoint backends
///
/// A store keeps two things: a coarse progress snapshot that is replaced
/// atomically on every `save`, and an append-only log of extracted records
/// that survives even if a snapshot is lost.
pub trait CheckpointStore: Send {
    /// Loads the last saved progress, or empty progress if none exists
    fn load(&self) -> StorageResult<CrawlProgress>;

    /// Replaces the saved progress
    ///
    /// After a crash either the previous or the new snapshot is observable,
    /// never a mix of both.
    fn save(&mut self, progress: &CrawlProgress) -> StorageResult<()>;

    /// Durably appends one extracted record
    fn append_record(&mut self, record: &ItemRecord) -> StorageResult<()>;

    /// Loads every persisted record in append order, one per url
    fn load_records(&self) -> StorageResult<Vec<ItemRecord>>;

    /// Discards all saved progress and records
    fn reset(&mut self) -> StorageResult<()>;
}
