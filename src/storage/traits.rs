//! Storage trait definitions.
//!
//! These traits define the interface for storage backends, enabling swapping
//! between different implementations without changing business logic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{RangeOutcome, RangeUpdate, SequenceRange};
use crate::error::StorageResult;

/// A number handed out together with the range state right after.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Consumed {
    /// The sequence number.
    pub number: u64,
    /// Range after consumption.
    pub range: SequenceRange,
}

/// Sequence range persistence.
///
/// Every mutating method is atomic with respect to concurrent callers, including
/// other processes sharing the same backend. State-guard failures come back as
/// the inner [`RangeOutcome`]; the outer result is reserved for backend faults.
#[async_trait]
pub trait RangeStorage: Send + Sync {
    /// Store a new range unless a usable range of the same scope overlaps it.
    async fn insert_range(
        &self,
        range: &SequenceRange,
        now: DateTime<Utc>,
        alert_percent: u8,
    ) -> StorageResult<RangeOutcome<()>>;

    /// Fetch a range by id.
    async fn get_range(&self, id: Uuid) -> StorageResult<Option<SequenceRange>>;

    /// All stored ranges, oldest first.
    async fn list_ranges(&self) -> StorageResult<Vec<SequenceRange>>;

    /// Hand out the next number of a range.
    ///
    /// A missing range is [`crate::error::StorageError::NotFound`]. State changes
    /// discovered on the way (expiry, exhaustion) are persisted even when the
    /// consumption is rejected.
    async fn consume_one(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        alert_percent: u8,
    ) -> StorageResult<RangeOutcome<Consumed>>;

    /// Apply an administrative update.
    ///
    /// Reactivating a range re-runs the overlap check against its scope.
    async fn update_range(
        &self,
        id: Uuid,
        update: &RangeUpdate,
        now: DateTime<Utc>,
        alert_percent: u8,
    ) -> StorageResult<RangeOutcome<SequenceRange>>;

    /// Delete an untouched range. Returns `false` when it does not exist.
    async fn delete_range(&self, id: Uuid) -> StorageResult<RangeOutcome<bool>>;
}

/// Combined storage trait.
#[async_trait]
pub trait Storage: RangeStorage {
    /// Check if the storage backend is healthy and reachable.
    async fn health_check(&self) -> StorageResult<()>;

    /// Get the storage backend name.
    fn backend_name(&self) -> &'static str;
}

/// Trait object alias for Storage.
pub type DynStorage = dyn Storage;
