//! Exclusive lock guarding a checkpoint directory

use crate::storage::traits::{StorageError, StorageResult};
use std::fs::{File, OpenOptions, TryLockError};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const LOCK_FILE: &str = "harvest.lock";

/// Advisory lock held for as long as a store is open
///
/// The operating system drops the lock when the holder exits, so a killed
/// run never leaves the directory locked.
#[derive(Debug)]
pub struct StoreLock {
    file: File,
    path: PathBuf,
}

impl StoreLock {
    /// Takes the lock on `dir`, failing fast if another run holds it
    pub fn acquire(dir: &Path) -> StorageResult<Self> {
        let path = dir.join(LOCK_FILE);
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(StorageError::io(&path))?;

        match file.try_lock() {
            Ok(()) => {}
            Err(TryLockError::WouldBlock) => {
                return Err(StorageError::Locked {
                    path: dir.to_path_buf(),
                })
            }
            Err(TryLockError::Error(e)) => return Err(StorageError::io(&path)(e)),
        }

        // Holder pid, for whoever inspects the directory
        file.set_len(0).map_err(StorageError::io(&path))?;
        writeln!(file, "{}", std::process::id()).map_err(StorageError::io(&path))?;

        tracing::debug!("Acquired checkpoint lock {}", path.display());
        Ok(Self { file, path })
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!("Failed to release lock {}: {}", self.path.display(), e);
        }
    }
}
