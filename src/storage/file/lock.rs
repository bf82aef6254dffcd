//! Cross-process scope locks.
//!
//! Uses file locks (flock) so that two workers sharing a data directory never
//! run overlap checks for the same scope at the same time.
//! Note: File locks may not work correctly on all network filesystems.

use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;

use fs2::FileExt;
use tokio::time::sleep;

use crate::error::{StorageError, StorageResult};

const MAX_ATTEMPTS: u32 = 100;
const RETRY_DELAY: Duration = Duration::from_millis(50);

/// File-based lock manager.
#[derive(Debug)]
pub struct FileLock {
    /// Directory for lock files.
    locks_dir: PathBuf,
}

/// Held lock. Released on drop.
#[derive(Debug)]
pub struct LockGuard {
    key: String,
    file: File,
}

impl LockGuard {
    /// Get the lock key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(key = %self.key, error = %e, "Failed to release scope lock");
        }
    }
}

impl FileLock {
    /// Create a new file lock manager.
    pub const fn new(locks_dir: PathBuf) -> Self {
        Self { locks_dir }
    }

    /// Get the lock file path for a key.
    fn lock_path(&self, key: &str) -> PathBuf {
        self.locks_dir.join(format!("{}.lock", sanitize_name(key)))
    }

    fn try_lock(&self, key: &str) -> StorageResult<Option<LockGuard>> {
        std::fs::create_dir_all(&self.locks_dir)?;

        // The lock file is never removed; deleting it would let a waiter lock a stale inode.
        let file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.lock_path(key))?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(LockGuard {
                key: key.to_string(),
                file,
            })),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(StorageError::LockFailed(e.to_string())),
        }
    }

    /// Acquire the lock for `key`, polling until it is free.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::LockFailed`] if the lock stays busy for about five seconds.
    pub async fn acquire(&self, key: &str) -> StorageResult<LockGuard> {
        for attempt in 0..MAX_ATTEMPTS {
            if let Some(guard) = self.try_lock(key)? {
                return Ok(guard);
            }
            if attempt < MAX_ATTEMPTS - 1 {
                sleep(RETRY_DELAY).await;
            }
        }

        Err(StorageError::LockFailed(format!(
            "lock '{key}' still busy after {MAX_ATTEMPTS} attempts"
        )))
    }
}

/// Sanitize a name for use as a filename.
pub(super) fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
