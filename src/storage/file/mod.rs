//! File-based storage backend.
//!
//! This backend stores data as JSON files with file locking for atomic operations.
//! Suitable for single-node deployments; several workers may share one data
//! directory on a local filesystem.
//!
//! Directory structure:
//! ```text
//! data/
//! ├── ranges/
//! │   └── {id}.json
//! └── locks/
//!     └── {owner}_{tax_id}_{type}.lock
//! ```

mod lock;
mod ranges;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::FileStorageConfig;
use crate::domain::{RangeOutcome, RangeUpdate, SequenceRange};
use crate::error::{StorageError, StorageResult};
use crate::storage::traits::{Consumed, RangeStorage, Storage};
use crate::storage::{check_insert, checked_update};

pub use lock::{FileLock, LockGuard};
use ranges::RangeFiles;

/// File-based storage implementation.
#[derive(Debug)]
pub struct FileStorage {
    /// Base data directory.
    base_dir: PathBuf,
    /// Range documents.
    ranges: RangeFiles,
    /// Scope lock manager.
    lock_manager: FileLock,
    /// Serializes operations within this process.
    lock: Mutex<()>,
}

fn scope_key(range: &SequenceRange) -> String {
    format!(
        "{}_{}_{}",
        range.owner_id,
        range.tax_id,
        range.document_type.code()
    )
}

impl FileStorage {
    /// Create a new file storage instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directories cannot be created.
    pub fn new(config: &FileStorageConfig) -> StorageResult<Self> {
        let base_dir = config.data_dir.clone();

        // Create directory structure
        Self::ensure_directories(&base_dir)?;

        Ok(Self {
            ranges: RangeFiles::new(base_dir.join("ranges")),
            lock_manager: FileLock::new(base_dir.join("locks")),
            base_dir,
            lock: Mutex::new(()),
        })
    }

    /// Ensure all required directories exist.
    fn ensure_directories(base_dir: &Path) -> StorageResult<()> {
        let dirs = [
            base_dir.to_path_buf(),
            base_dir.join("ranges"),
            base_dir.join("locks"),
        ];

        for dir in &dirs {
            std::fs::create_dir_all(dir).map_err(|e| {
                StorageError::FileIO(format!("Failed to create directory {}: {e}", dir.display()))
            })?;
        }

        Ok(())
    }
}

#[async_trait]
impl RangeStorage for FileStorage {
    async fn insert_range(
        &self,
        range: &SequenceRange,
        now: DateTime<Utc>,
        alert_percent: u8,
    ) -> StorageResult<RangeOutcome<()>> {
        let _guard = self.lock.lock().await;
        let _scope = self.lock_manager.acquire(&scope_key(range)).await?;

        let existing = self.ranges.read_all()?;
        if let Err(rejection) = check_insert(range, &existing, now, alert_percent) {
            return Ok(Err(rejection));
        }
        self.ranges.create(range)?;
        Ok(Ok(()))
    }

    async fn get_range(&self, id: Uuid) -> StorageResult<Option<SequenceRange>> {
        self.ranges.read(id)
    }

    async fn list_ranges(&self) -> StorageResult<Vec<SequenceRange>> {
        self.ranges.read_all()
    }

    async fn consume_one(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        alert_percent: u8,
    ) -> StorageResult<RangeOutcome<Consumed>> {
        let _guard = self.lock.lock().await;

        self.ranges.modify(id, |range| {
            range
                .try_consume(now, alert_percent)
                .map(|number| Consumed {
                    number,
                    range: range.clone(),
                })
        })
    }

    async fn update_range(
        &self,
        id: Uuid,
        update: &RangeUpdate,
        now: DateTime<Utc>,
        alert_percent: u8,
    ) -> StorageResult<RangeOutcome<SequenceRange>> {
        let _guard = self.lock.lock().await;

        let current = self
            .ranges
            .read(id)?
            .ok_or_else(|| StorageError::NotFound(format!("range {id}")))?;
        let _scope = self.lock_manager.acquire(&scope_key(&current)).await?;

        let others = self.ranges.read_all()?;
        self.ranges.modify(id, |range| {
            checked_update(range, update, &others, now, alert_percent)
        })
    }

    async fn delete_range(&self, id: Uuid) -> StorageResult<RangeOutcome<bool>> {
        let _guard = self.lock.lock().await;
        self.ranges.remove_if(id, SequenceRange::ensure_deletable)
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn health_check(&self) -> StorageResult<()> {
        // Check if base directory is accessible
        if !self.base_dir.exists() {
            return Err(StorageError::Unavailable);
        }

        // Try to create a test file
        let test_file = self.base_dir.join(".health_check");
        tokio::fs::write(&test_file, b"ok")
            .await
            .map_err(|e| StorageError::FileIO(format!("Health check failed: {e}")))?;
        tokio::fs::remove_file(&test_file)
            .await
            .map_err(|e| StorageError::FileIO(format!("Health check cleanup failed: {e}")))?;

        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{NaiveDate, TimeZone};
    use tempfile::TempDir;

    use super::*;
    use crate::domain::{DocumentType, NewRange, RangeRejection, RangeState};

    fn create_test_storage() -> (FileStorage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = FileStorageConfig {
            data_dir: temp_dir.path().to_path_buf(),
        };
        let storage = FileStorage::new(&config).unwrap();
        (storage, temp_dir)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 15, 12, 0, 0).unwrap()
    }

    fn range(start: u64, quantity: u64) -> SequenceRange {
        SequenceRange::new(
            NewRange {
                owner_id: "owner-1".to_string(),
                tax_id: "130000001".to_string(),
                document_type: DocumentType::TaxCreditInvoice,
                prefix: "E".to_string(),
                start_number: start,
                quantity,
                expiration_date: NaiveDate::from_ymd_opt(2026, 12, 31),
                alert_threshold: None,
                notes: None,
            },
            now(),
        )
    }

    #[tokio::test]
    async fn test_health_check() {
        let (storage, _temp) = create_test_storage();
        assert!(storage.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn test_ranges_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let config = FileStorageConfig {
            data_dir: temp_dir.path().to_path_buf(),
        };
        let r = range(1, 10);
        {
            let storage = FileStorage::new(&config).unwrap();
            storage.insert_range(&r, now(), 10).await.unwrap().unwrap();
            storage.consume_one(r.id, now(), 10).await.unwrap().unwrap();
        }

        let storage = FileStorage::new(&config).unwrap();
        let loaded = storage.get_range(r.id).await.unwrap().unwrap();
        assert_eq!(loaded.consumed_count, 1);
        assert_eq!(loaded.expiration_date, r.expiration_date);

        let next = storage.consume_one(r.id, now(), 10).await.unwrap().unwrap();
        assert_eq!(next.number, 2);
    }

    #[tokio::test]
    async fn test_overlap_and_delete() {
        let (storage, _temp) = create_test_storage();
        let first = range(1, 100);
        storage.insert_range(&first, now(), 10).await.unwrap().unwrap();

        let outcome = storage.insert_range(&range(100, 5), now(), 10).await.unwrap();
        assert_eq!(outcome, Err(RangeRejection::Overlap { existing: first.id }));

        assert_eq!(storage.delete_range(first.id).await.unwrap(), Ok(true));
        assert!(storage.get_range(first.id).await.unwrap().is_none());
        assert_eq!(storage.delete_range(first.id).await.unwrap(), Ok(false));
    }

    #[tokio::test]
    async fn test_expired_state_is_persisted_on_rejection() {
        let (storage, _temp) = create_test_storage();
        let r = range(1, 10);
        storage.insert_range(&r, now(), 10).await.unwrap().unwrap();

        let later = Utc.with_ymd_and_hms(2027, 1, 5, 12, 0, 0).unwrap();
        let outcome = storage.consume_one(r.id, later, 10).await.unwrap();
        assert_eq!(
            outcome,
            Err(RangeRejection::NotUsable {
                id: r.id,
                state: RangeState::Expired
            })
        );
        let stored = storage.get_range(r.id).await.unwrap().unwrap();
        assert_eq!(stored.state, RangeState::Expired);
        assert_eq!(stored.consumed_count, 0);
    }

    #[tokio::test]
    async fn test_update_missing_range() {
        let (storage, _temp) = create_test_storage();
        let err = storage
            .update_range(Uuid::new_v4(), &RangeUpdate::default(), now(), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_consumers_get_distinct_numbers() {
        let (storage, _temp) = create_test_storage();
        let storage = Arc::new(storage);
        let r = range(1, 50);
        storage.insert_range(&r, now(), 10).await.unwrap().unwrap();
        let id = r.id;

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let storage = Arc::clone(&storage);
                tokio::spawn(async move { storage.consume_one(id, now(), 10).await.unwrap() })
            })
            .collect();

        let mut numbers = Vec::new();
        for handle in handles {
            numbers.push(handle.await.unwrap().unwrap().number);
        }
        numbers.sort_unstable();
        assert_eq!(numbers, (1..=50).collect::<Vec<_>>());

        let stored = storage.get_range(id).await.unwrap().unwrap();
        assert_eq!(stored.state, RangeState::Exhausted);
    }
}
