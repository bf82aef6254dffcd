//! Storage layer module.
//!
//! This module provides trait-based storage abstraction allowing different backends
//! to be used without changing business logic.

pub mod factory;
pub mod file;
pub mod memory;
pub mod traits;

use chrono::{DateTime, Utc};

pub use factory::create_storage;
pub use traits::{Consumed, DynStorage, RangeStorage, Storage};

use crate::domain::sequence::find_conflict;
use crate::domain::{RangeOutcome, RangeRejection, RangeUpdate, SequenceRange};

/// Apply `update` to `range` unless the result would overlap a usable range.
///
/// `range` is left untouched on rejection.
pub(crate) fn checked_update<'a>(
    range: &mut SequenceRange,
    update: &RangeUpdate,
    others: impl IntoIterator<Item = &'a SequenceRange>,
    now: DateTime<Utc>,
    alert_percent: u8,
) -> RangeOutcome<SequenceRange> {
    let mut next = range.clone();
    next.apply_update(update, now, alert_percent)?;

    let reactivated = !range.state.is_usable() && next.state.is_usable();
    let conflict = if reactivated {
        find_conflict(&next, others, now, alert_percent)
    } else {
        None
    };
    if let Some(existing) = conflict {
        return Err(RangeRejection::Overlap { existing });
    }

    *range = next.clone();
    Ok(next)
}

/// Reject `candidate` if it overlaps a usable range of its scope.
pub(crate) fn check_insert<'a>(
    candidate: &SequenceRange,
    existing: impl IntoIterator<Item = &'a SequenceRange>,
    now: DateTime<Utc>,
    alert_percent: u8,
) -> RangeOutcome<()> {
    match find_conflict(candidate, existing, now, alert_percent) {
        Some(existing) => Err(RangeRejection::Overlap { existing }),
        None => Ok(()),
    }
}
