//! File-backed checkpoint store
//!
//! Layout of a state directory:
//!
//! - `progress.json`: pretty-printed progress snapshot, replaced atomically
//!   (temp file, fsync, rename)
//! - `records.jsonl`: one extracted record per line, fsynced on append
//! - `harvest.lock`: exclusive lock held while the store is open

use crate::state::{CrawlProgress, ItemRecord};
use crate::storage::lock::StoreLock;
use crate::storage::traits::{CheckpointStore, StorageError, StorageResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

pub const PROGRESS_FILE: &str = "progress.json";
pub const RECORDS_FILE: &str = "records.jsonl";

const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct ProgressFileRef<'a> {
    version: u32,
    config_hash: Option<&'a str>,
    updated_at: DateTime<Utc>,
    progress: &'a CrawlProgress,
}

#[derive(Deserialize)]
struct ProgressFile {
    version: u32,
    #[serde(default)]
    config_hash: Option<String>,
    #[allow(dead_code)]
    updated_at: DateTime<Utc>,
    progress: CrawlProgress,
}

/// Checkpoint store over a directory of human-readable files
#[derive(Debug)]
pub struct FileCheckpointStore {
    dir: PathBuf,
    config_hash: Option<String>,
    records: File,
    _lock: StoreLock,
}

impl FileCheckpointStore {
    /// Opens (creating if needed) the store in `dir`
    ///
    /// Takes the directory lock first, then cuts away a torn trailing line
    /// left in the record log by an abrupt termination.
    ///
    /// # Returns
    ///
    /// * `Ok(FileCheckpointStore)` - Store ready for use
    /// * `Err(StorageError::Locked)` - Another run owns the directory
    /// * `Err(StorageError)` - The directory or its files are unusable
    pub fn open(dir: &Path) -> StorageResult<Self> {
        std::fs::create_dir_all(dir).map_err(StorageError::io(dir))?;
        let lock = StoreLock::acquire(dir)?;

        let records_path = dir.join(RECORDS_FILE);
        repair_torn_tail(&records_path)?;

        let records = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&records_path)
            .map_err(StorageError::io(&records_path))?;

        Ok(Self {
            dir: dir.to_path_buf(),
            config_hash: None,
            records,
            _lock: lock,
        })
    }

    /// Records the hash of the configuration driving this crawl
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn progress_path(&self) -> PathBuf {
        self.dir.join(PROGRESS_FILE)
    }

    pub fn records_path(&self) -> PathBuf {
        self.dir.join(RECORDS_FILE)
    }

    fn sync_dir(&self) -> StorageResult<()> {
        #[cfg(unix)]
        {
            File::open(&self.dir)
                .and_then(|dir| dir.sync_all())
                .map_err(StorageError::io(&self.dir))?;
        }
        Ok(())
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn load(&self) -> StorageResult<CrawlProgress> {
        let path = self.progress_path();
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("No progress file at {}, starting empty", path.display());
                return Ok(CrawlProgress::new());
            }
            Err(e) => return Err(StorageError::io(&path)(e)),
        };

        let file: ProgressFile =
            serde_json::from_slice(&bytes).map_err(|e| StorageError::Corrupt {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        if file.version != FORMAT_VERSION {
            return Err(StorageError::Corrupt {
                path,
                reason: format!(
                    "unsupported format version {} (expected {})",
                    file.version, FORMAT_VERSION
                ),
            });
        }

        if let (Some(saved), Some(current)) = (&file.config_hash, &self.config_hash) {
            if saved != current {
                tracing::warn!(
                    "Configuration changed since the checkpoint was written (was {}, now {}); resuming anyway",
                    saved,
                    current
                );
            }
        }

        Ok(file.progress)
    }

    fn save(&mut self, progress: &CrawlProgress) -> StorageResult<()> {
        let path = self.progress_path();
        let snapshot = ProgressFileRef {
            version: FORMAT_VERSION,
            config_hash: self.config_hash.as_deref(),
            updated_at: Utc::now(),
            progress,
        };

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(StorageError::io(&self.dir))?;
        serde_json::to_writer_pretty(tmp.as_file_mut(), &snapshot)?;
        tmp.as_file_mut()
            .write_all(b"\n")
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(StorageError::io(tmp.path()))?;
        tmp.persist(&path)
            .map_err(|e| StorageError::io(&path)(e.error))?;
        self.sync_dir()?;

        tracing::trace!("Saved progress to {}", path.display());
        Ok(())
    }

    fn append_record(&mut self, record: &ItemRecord) -> StorageResult<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let path = self.records_path();
        self.records
            .write_all(line.as_bytes())
            .and_then(|_| self.records.sync_data())
            .map_err(StorageError::io(&path))?;
        Ok(())
    }

    fn load_records(&self) -> StorageResult<Vec<ItemRecord>> {
        let path = self.records_path();
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::io(&path)(e)),
        };

        let mut seen = HashSet::new();
        let mut records = Vec::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: ItemRecord =
                serde_json::from_str(line).map_err(|e| StorageError::Corrupt {
                    path: path.clone(),
                    reason: format!("line {}: {}", index + 1, e),
                })?;

            if seen.insert(record.url.clone()) {
                records.push(record);
            } else {
                tracing::warn!("Ignoring duplicate record for {}", record.url);
            }
        }

        Ok(records)
    }

    fn reset(&mut self) -> StorageResult<()> {
        let progress_path = self.progress_path();
        match std::fs::remove_file(&progress_path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(StorageError::io(&progress_path)(e)),
        }

        let records_path = self.records_path();
        self.records
            .set_len(0)
            .and_then(|_| self.records.sync_all())
            .map_err(StorageError::io(&records_path))?;
        self.sync_dir()?;

        tracing::info!("Cleared checkpoint state in {}", self.dir.display());
        Ok(())
    }
}

/// Truncates the record log back to its last complete line
///
/// Records are appended whole and newline-terminated, so bytes after the
/// last newline can only be a write cut short by a crash.
fn repair_torn_tail(path: &Path) -> StorageResult<()> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(StorageError::io(path)(e)),
    };

    if bytes.is_empty() || bytes.ends_with(b"\n") {
        return Ok(());
    }

    let keep = bytes
        .iter()
        .rposition(|&b| b == b'\n')
        .map(|pos| pos + 1)
        .unwrap_or(0);

    tracing::warn!(
        "Dropping {} bytes of a torn record at the end of {}",
        bytes.len() - keep,
        path.display()
    );

    let file = OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(StorageError::io(path))?;
    file.set_len(keep as u64)
        .and_then(|_| file.sync_all())
        .map_err(StorageError::io(path))?;
    Ok(())
}
