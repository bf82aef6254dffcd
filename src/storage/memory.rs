//! In-process storage backend.
//!
//! Ranges live in a map behind a single lock, so every operation is trivially
//! atomic. Nothing survives a restart.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::domain::{RangeOutcome, RangeUpdate, SequenceRange};
use crate::error::{StorageError, StorageResult};
use crate::storage::traits::{Consumed, RangeStorage, Storage};
use crate::storage::{check_insert, checked_update};

/// In-memory storage implementation.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    ranges: RwLock<HashMap<Uuid, SequenceRange>>,
}

impl MemoryStorage {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RangeStorage for MemoryStorage {
    async fn insert_range(
        &self,
        range: &SequenceRange,
        now: DateTime<Utc>,
        alert_percent: u8,
    ) -> StorageResult<RangeOutcome<()>> {
        let mut ranges = self.ranges.write();
        if let Err(rejection) = check_insert(range, ranges.values(), now, alert_percent) {
            return Ok(Err(rejection));
        }
        ranges.insert(range.id, range.clone());
        Ok(Ok(()))
    }

    async fn get_range(&self, id: Uuid) -> StorageResult<Option<SequenceRange>> {
        Ok(self.ranges.read().get(&id).cloned())
    }

    async fn list_ranges(&self) -> StorageResult<Vec<SequenceRange>> {
        let mut ranges: Vec<_> = self.ranges.read().values().cloned().collect();
        ranges.sort_by_key(|range| (range.created_at, range.id));
        Ok(ranges)
    }

    async fn consume_one(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        alert_percent: u8,
    ) -> StorageResult<RangeOutcome<Consumed>> {
        let mut ranges = self.ranges.write();
        let range = ranges
            .get_mut(&id)
            .ok_or_else(|| StorageError::NotFound(format!("range {id}")))?;

        Ok(range.try_consume(now, alert_percent).map(|number| Consumed {
            number,
            range: range.clone(),
        }))
    }

    async fn update_range(
        &self,
        id: Uuid,
        update: &RangeUpdate,
        now: DateTime<Utc>,
        alert_percent: u8,
    ) -> StorageResult<RangeOutcome<SequenceRange>> {
        let mut ranges = self.ranges.write();
        let mut range = ranges
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("range {id}")))?;

        let outcome = checked_update(&mut range, update, ranges.values(), now, alert_percent);
        if outcome.is_ok() {
            ranges.insert(id, range);
        }
        Ok(outcome)
    }

    async fn delete_range(&self, id: Uuid) -> StorageResult<RangeOutcome<bool>> {
        let mut ranges = self.ranges.write();
        let Some(range) = ranges.get(&id) else {
            return Ok(Ok(false));
        };
        if let Err(rejection) = range.ensure_deletable() {
            return Ok(Err(rejection));
        }
        ranges.remove(&id);
        Ok(Ok(true))
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::TimeZone;

    use super::*;
    use crate::domain::{DocumentType, NewRange, RangeRejection, RangeState};

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
                expiration_date: None,
                alert_threshold: None,
                notes: None,
            },
            now(),
        )
    }

    #[tokio::test]
    async fn test_insert_rejects_overlap() {
        let storage = MemoryStorage::new();
        let first = range(1, 100);
        storage.insert_range(&first, now(), 10).await.unwrap().unwrap();

        let outcome = storage.insert_range(&range(50, 10), now(), 10).await.unwrap();
        assert_eq!(outcome, Err(RangeRejection::Overlap { existing: first.id }));

        storage.insert_range(&range(101, 10), now(), 10).await.unwrap().unwrap();
        assert_eq!(storage.list_ranges().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_consume_until_exhausted() {
        let storage = MemoryStorage::new();
        let r = range(5, 2);
        storage.insert_range(&r, now(), 10).await.unwrap().unwrap();

        let first = storage.consume_one(r.id, now(), 10).await.unwrap().unwrap();
        assert_eq!(first.number, 5);
        let second = storage.consume_one(r.id, now(), 10).await.unwrap().unwrap();
        assert_eq!(second.number, 6);
        assert_eq!(second.range.state, RangeState::Exhausted);

        let third = storage.consume_one(r.id, now(), 10).await.unwrap();
        assert_eq!(third, Err(RangeRejection::Exhausted { id: r.id }));
    }

    #[tokio::test]
    async fn test_consume_missing_range_is_not_found() {
        let storage = MemoryStorage::new();
        let err = storage.consume_one(Uuid::new_v4(), now(), 10).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_reactivation_checks_overlap() {
        let storage = MemoryStorage::new();
        let old = range(1, 100);
        storage.insert_range(&old, now(), 10).await.unwrap().unwrap();
        let deactivate = RangeUpdate {
            state: Some(crate::domain::AdminState::Inactive),
            ..Default::default()
        };
        storage
            .update_range(old.id, &deactivate, now(), 10)
            .await
            .unwrap()
            .unwrap();

        let replacement = range(1, 100);
        storage.insert_range(&replacement, now(), 10).await.unwrap().unwrap();

        let reactivate = RangeUpdate {
            state: Some(crate::domain::AdminState::Active),
            ..Default::default()
        };
        let outcome = storage.update_range(old.id, &reactivate, now(), 10).await.unwrap();
        assert_eq!(
            outcome,
            Err(RangeRejection::Overlap {
                existing: replacement.id
            })
        );
        let stored = storage.get_range(old.id).await.unwrap().unwrap();
        assert_eq!(stored.state, RangeState::Inactive);
    }

    #[tokio::test]
    async fn test_delete_only_untouched() {
        let storage = MemoryStorage::new();
        let r = range(1, 10);
        storage.insert_range(&r, now(), 10).await.unwrap().unwrap();
        storage.consume_one(r.id, now(), 10).await.unwrap().unwrap();

        let outcome = storage.delete_range(r.id).await.unwrap();
        assert!(matches!(outcome, Err(RangeRejection::InUse { consumed: 1, .. })));
        assert_eq!(storage.delete_range(Uuid::new_v4()).await.unwrap(), Ok(false));
    }

    #[tokio::test]
    async fn test_concurrent_consumers_get_distinct_numbers() {
        let storage = Arc::new(MemoryStorage::new());
        let r = range(1, 40);
        storage.insert_range(&r, now(), 10).await.unwrap().unwrap();
        let id = r.id;

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let storage = Arc::clone(&storage);
                tokio::spawn(async move { storage.consume_one(id, now(), 10).await.unwrap() })
            })
            .collect();

        let mut numbers = Vec::new();
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(consumed) => numbers.push(consumed.number),
                Err(_) => rejected += 1,
            }
        }
        numbers.sort_unstable();
        assert_eq!(numbers, (1..=40).collect::<Vec<_>>());
        assert_eq!(rejected, 10);
    }
}
