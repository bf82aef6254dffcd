//! Sequence ranges: pre-authorized blocks of document numbers.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::dates::local_today;
use super::document_type::DocumentType;

/// Default document number prefix.
pub const DEFAULT_PREFIX: &str = "E";

/// Largest sequence that fits the ten-digit number field.
pub const MAX_SEQUENCE: u64 = 9_999_999_999;

/// Render a document number: prefix, two-digit type, ten-digit sequence.
///
/// `format_number("E", 31, 1)` yields `E310000000001`.
#[must_use]
pub fn format_number(prefix: &str, document_type: DocumentType, sequence: u64) -> String {
    format!("{prefix}{:02}{sequence:010}", document_type.code())
}

/// Lifecycle state of a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeState {
    /// Handing out numbers.
    #[serde(alias = "activo")]
    Active,
    /// Handing out numbers, running low.
    #[serde(alias = "alerta")]
    Alert,
    /// Every number has been used.
    #[serde(alias = "agotado")]
    Exhausted,
    /// Past its expiration date.
    #[serde(alias = "vencido")]
    Expired,
    /// Disabled by an administrator.
    #[serde(alias = "inactivo")]
    Inactive,
}

impl RangeState {
    /// Whether numbers can be handed out in this state.
    #[must_use]
    pub const fn is_usable(self) -> bool {
        matches!(self, Self::Active | Self::Alert)
    }
}

impl fmt::Display for RangeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Active => "active",
            Self::Alert => "alert",
            Self::Exhausted => "exhausted",
            Self::Expired => "expired",
            Self::Inactive => "inactive",
        };
        f.write_str(name)
    }
}

/// Why a range refused an operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeRejection {
    /// No numbers left.
    #[error("range {id} is exhausted")]
    Exhausted {
        /// Range identifier.
        id: Uuid,
    },
    /// State does not allow handing out numbers.
    #[error("range {id} is {state}")]
    NotUsable {
        /// Range identifier.
        id: Uuid,
        /// Current state.
        state: RangeState,
    },
    /// Window overlaps another active range of the same scope.
    #[error("window overlaps active range {existing}")]
    Overlap {
        /// The range already covering part of the window.
        existing: Uuid,
    },
    /// Numbers were already handed out.
    #[error("range {id} already handed out {consumed} numbers")]
    InUse {
        /// Range identifier.
        id: Uuid,
        /// Numbers consumed so far.
        consumed: u64,
    },
    /// Administrative transition not allowed.
    #[error("range {id} cannot move from {from} to {to}")]
    InvalidTransition {
        /// Range identifier.
        id: Uuid,
        /// Current state.
        from: RangeState,
        /// Requested state.
        to: RangeState,
    },
}

/// Result of a state-guarded range operation.
pub type RangeOutcome<T> = Result<T, RangeRejection>;

/// States an administrator may request explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminState {
    /// Reactivate; the effective state is recomputed.
    #[serde(alias = "activo")]
    Active,
    /// Disable.
    #[serde(alias = "inactivo")]
    Inactive,
}

/// Administrative changes to a range. Counters are never touched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RangeUpdate {
    /// Requested state.
    #[serde(default)]
    pub state: Option<AdminState>,
    /// New expiration date.
    #[serde(default)]
    pub expiration_date: Option<NaiveDate>,
    /// New absolute alert threshold.
    #[serde(default)]
    pub alert_threshold: Option<u64>,
    /// New notes.
    #[serde(default)]
    pub notes: Option<String>,
}

/// Validated input for a new range.
#[derive(Debug, Clone)]
pub struct NewRange {
    /// Owning account.
    pub owner_id: String,
    /// Issuer tax ID (digits only).
    pub tax_id: String,
    /// Document type.
    pub document_type: DocumentType,
    /// Number prefix.
    pub prefix: String,
    /// First sequence number.
    pub start_number: u64,
    /// Amount of numbers in the window.
    pub quantity: u64,
    /// Expiration date, if any.
    pub expiration_date: Option<NaiveDate>,
    /// Absolute alert threshold override.
    pub alert_threshold: Option<u64>,
    /// Free-form notes.
    pub notes: Option<String>,
}

/// A contiguous block of authorized numbers for one owner, tax ID and type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceRange {
    /// Range identifier.
    pub id: Uuid,
    /// Owning account.
    pub owner_id: String,
    /// Issuer tax ID.
    pub tax_id: String,
    /// Document type.
    pub document_type: DocumentType,
    /// Number prefix.
    pub prefix: String,
    /// First sequence number.
    pub start_number: u64,
    /// Amount of numbers in the window.
    pub quantity: u64,
    /// Numbers handed out so far.
    pub consumed_count: u64,
    /// Stored lifecycle state.
    pub state: RangeState,
    /// Expiration date.
    #[serde(default)]
    pub expiration_date: Option<NaiveDate>,
    /// Absolute alert threshold override.
    #[serde(default)]
    pub alert_threshold: Option<u64>,
    /// Free-form notes.
    #[serde(default)]
    pub notes: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl SequenceRange {
    /// Create a fresh range in the active state.
    #[must_use]
    pub fn new(input: NewRange, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id: input.owner_id,
            tax_id: input.tax_id,
            document_type: input.document_type,
            prefix: input.prefix,
            start_number: input.start_number,
            quantity: input.quantity,
            consumed_count: 0,
            state: RangeState::Active,
            expiration_date: input.expiration_date,
            alert_threshold: input.alert_threshold,
            notes: input.notes,
            created_at: now,
            updated_at: now,
        }
    }

    /// Last number of the window (inclusive).
    #[must_use]
    pub const fn end_number(&self) -> u64 {
        self.start_number + self.quantity.saturating_sub(1)
    }

    /// Numbers still available.
    #[must_use]
    pub const fn available(&self) -> u64 {
        self.quantity.saturating_sub(self.consumed_count)
    }

    /// The number the next consumption would hand out.
    #[must_use]
    pub const fn next_number(&self) -> Option<u64> {
        if self.available() == 0 {
            None
        } else {
            Some(self.start_number + self.consumed_count)
        }
    }

    /// Render a sequence number of this range.
    #[must_use]
    pub fn formatted_number(&self, sequence: u64) -> String {
        format_number(&self.prefix, self.document_type, sequence)
    }

    /// Available count at or below which the range is in alert.
    #[must_use]
    pub fn low_water_mark(&self, alert_percent: u8) -> u64 {
        self.alert_threshold
            .unwrap_or_else(|| self.quantity * u64::from(alert_percent) / 100)
    }

    /// Whether the expiration date has passed for a type that expires.
    #[must_use]
    pub fn is_past_expiration(&self, today: NaiveDate) -> bool {
        self.document_type.requires_expiration()
            && self.expiration_date.is_some_and(|date| date < today)
    }

    /// Expiration date falls within `days` of `today` (inclusive).
    #[must_use]
    pub fn expires_within(&self, today: NaiveDate, days: i64) -> bool {
        self.expiration_date.is_some_and(|date| {
            let remaining = (date - today).num_days();
            (0..=days).contains(&remaining)
        })
    }

    /// State derived from counters and dates.
    ///
    /// Inactive and expired are sticky and only change through administrative action.
    #[must_use]
    pub fn derived_state(&self, today: NaiveDate, alert_percent: u8) -> RangeState {
        match self.state {
            RangeState::Inactive | RangeState::Expired => self.state,
            _ if self.is_past_expiration(today) => RangeState::Expired,
            _ if self.available() == 0 => RangeState::Exhausted,
            _ if self.available() <= self.low_water_mark(alert_percent) => RangeState::Alert,
            _ => RangeState::Active,
        }
    }

    /// Recompute the stored state. Returns whether it changed.
    pub fn refresh(&mut self, now: DateTime<Utc>, alert_percent: u8) -> bool {
        let derived = self.derived_state(local_today(now), alert_percent);
        let changed = derived != self.state;
        self.state = derived;
        changed
    }

    /// Same owner, tax ID and document type.
    #[must_use]
    pub fn same_scope(&self, other: &Self) -> bool {
        self.owner_id == other.owner_id
            && self.tax_id == other.tax_id
            && self.document_type == other.document_type
    }

    /// Windows intersect.
    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.start_number <= other.end_number() && other.start_number <= self.end_number()
    }

    /// Hand out the next number.
    ///
    /// # Errors
    ///
    /// Rejects when the range is exhausted or its state does not allow consumption.
    pub fn try_consume(&mut self, now: DateTime<Utc>, alert_percent: u8) -> RangeOutcome<u64> {
        self.refresh(now, alert_percent);
        match self.state {
            RangeState::Active | RangeState::Alert => {}
            RangeState::Exhausted => return Err(RangeRejection::Exhausted { id: self.id }),
            state => return Err(RangeRejection::NotUsable { id: self.id, state }),
        }

        let number = self
            .next_number()
            .ok_or(RangeRejection::Exhausted { id: self.id })?;
        self.consumed_count += 1;
        self.refresh(now, alert_percent);
        self.updated_at = now;
        Ok(number)
    }

    /// Apply an administrative update.
    ///
    /// # Errors
    ///
    /// Rejects transitions out of the expired state.
    pub fn apply_update(
        &mut self,
        update: &RangeUpdate,
        now: DateTime<Utc>,
        alert_percent: u8,
    ) -> RangeOutcome<()> {
        if let Some(requested) = update.state {
            let target = match requested {
                AdminState::Active => RangeState::Active,
                AdminState::Inactive => RangeState::Inactive,
            };
            if self.state == RangeState::Expired {
                return Err(RangeRejection::InvalidTransition {
                    id: self.id,
                    from: self.state,
                    to: target,
                });
            }
            self.state = match (self.state, requested) {
                (RangeState::Inactive, AdminState::Active) => RangeState::Active,
                (_, AdminState::Inactive) => RangeState::Inactive,
                (current, AdminState::Active) => current,
            };
        }
        if let Some(date) = update.expiration_date {
            self.expiration_date = Some(date);
        }
        if let Some(threshold) = update.alert_threshold {
            self.alert_threshold = Some(threshold);
        }
        if let Some(notes) = &update.notes {
            self.notes = Some(notes.clone());
        }
        self.refresh(now, alert_percent);
        self.updated_at = now;
        Ok(())
    }

    /// Only untouched ranges may be deleted.
    ///
    /// # Errors
    ///
    /// Rejects once any number was consumed.
    pub const fn ensure_deletable(&self) -> RangeOutcome<()> {
        if self.consumed_count > 0 {
            return Err(RangeRejection::InUse {
                id: self.id,
                consumed: self.consumed_count,
            });
        }
        Ok(())
    }

    /// Warning shown to the caller after consuming from a low or empty range.
    #[must_use]
    pub fn alert_message(&self) -> Option<String> {
        match self.state {
            RangeState::Exhausted => {
                Some("ÚLTIMO COMPROBANTE USADO - Solicitar nuevo rango urgente".to_string())
            }
            RangeState::Alert => Some(format!(
                "Quedan {} comprobantes - Solicitar nuevo rango pronto",
                self.available()
            )),
            _ => None,
        }
    }
}

/// First usable range of the same scope whose window overlaps `candidate`.
///
/// Stored states may be stale, so each existing range is re-derived against `now`.
pub fn find_conflict<'a>(
    candidate: &SequenceRange,
    existing: impl IntoIterator<Item = &'a SequenceRange>,
    now: DateTime<Utc>,
    alert_percent: u8,
) -> Option<Uuid> {
    let today = local_today(now);
    existing
        .into_iter()
        .filter(|other| other.id != candidate.id)
        .filter(|other| other.same_scope(candidate) && other.overlaps(candidate))
        .find(|other| other.derived_state(today, alert_percent).is_usable())
        .map(|other| other.id)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 15, 12, 0, 0).unwrap()
    }

    fn range(document_type: DocumentType, start: u64, quantity: u64) -> SequenceRange {
        SequenceRange::new(
            NewRange {
                owner_id: "owner-1".to_string(),
                tax_id: "130000001".to_string(),
                document_type,
                prefix: DEFAULT_PREFIX.to_string(),
                start_number: start,
                quantity,
                expiration_date: None,
                alert_threshold: None,
                notes: None,
            },
            now(),
        )
    }

    #[test]
    fn test_format_number() {
        assert_eq!(
            format_number("E", DocumentType::TaxCreditInvoice, 1),
            "E310000000001"
        );
        assert_eq!(
            format_number("E", DocumentType::Government, MAX_SEQUENCE),
            "E459999999999"
        );
    }

    #[test]
    fn test_consume_three_from_consumer_range() {
        let mut r = range(DocumentType::ConsumerInvoice, 1, 3);

        assert_eq!(r.try_consume(now(), 10), Ok(1));
        assert_eq!(r.state, RangeState::Active);
        assert_eq!(r.try_consume(now(), 10), Ok(2));
        assert_eq!(r.state, RangeState::Active);
        assert_eq!(r.try_consume(now(), 10), Ok(3));
        assert_eq!(r.state, RangeState::Exhausted);
        assert_eq!(
            r.alert_message().as_deref(),
            Some("ÚLTIMO COMPROBANTE USADO - Solicitar nuevo rango urgente")
        );

        assert_eq!(
            r.try_consume(now(), 10),
            Err(RangeRejection::Exhausted { id: r.id })
        );
        assert_eq!(r.consumed_count, 3);
    }

    #[test]
    fn test_alert_threshold() {
        let mut r = range(DocumentType::TaxCreditInvoice, 100, 20);
        // 10% of 20 -> alert at two or fewer left
        for _ in 0..17 {
            r.try_consume(now(), 10).unwrap();
        }
        assert_eq!(r.state, RangeState::Active);
        r.try_consume(now(), 10).unwrap();
        assert_eq!(r.state, RangeState::Alert);
        assert_eq!(
            r.alert_message().as_deref(),
            Some("Quedan 2 comprobantes - Solicitar nuevo rango pronto")
        );

        let mut custom = range(DocumentType::TaxCreditInvoice, 1, 20);
        custom.alert_threshold = Some(19);
        custom.try_consume(now(), 10).unwrap();
        assert_eq!(custom.state, RangeState::Alert);
    }

    #[test]
    fn test_expiration_only_for_types_that_expire() {
        let yesterday = NaiveDate::from_ymd_opt(2026, 6, 14).unwrap();

        let mut invoice = range(DocumentType::TaxCreditInvoice, 1, 5);
        invoice.expiration_date = Some(yesterday);
        assert_eq!(
            invoice.try_consume(now(), 10),
            Err(RangeRejection::NotUsable {
                id: invoice.id,
                state: RangeState::Expired
            })
        );

        let mut credit_note = range(DocumentType::CreditNote, 1, 5);
        credit_note.expiration_date = Some(yesterday);
        assert_eq!(credit_note.try_consume(now(), 10), Ok(1));
    }

    #[test]
    fn test_admin_transitions() {
        let mut r = range(DocumentType::TaxCreditInvoice, 1, 5);
        let deactivate = RangeUpdate {
            state: Some(AdminState::Inactive),
            ..RangeUpdate::default()
        };
        r.apply_update(&deactivate, now(), 10).unwrap();
        assert_eq!(r.state, RangeState::Inactive);
        assert!(matches!(
            r.try_consume(now(), 10),
            Err(RangeRejection::NotUsable { .. })
        ));

        let reactivate = RangeUpdate {
            state: Some(AdminState::Active),
            ..RangeUpdate::default()
        };
        r.apply_update(&reactivate, now(), 10).unwrap();
        assert_eq!(r.state, RangeState::Active);

        r.state = RangeState::Expired;
        assert!(matches!(
            r.apply_update(&reactivate, now(), 10),
            Err(RangeRejection::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_find_conflict_ignores_unusable_and_other_scopes() {
        let existing = range(DocumentType::TaxCreditInvoice, 1, 100);
        let other_type = range(DocumentType::ConsumerInvoice, 1, 100);
        let mut inactive = range(DocumentType::TaxCreditInvoice, 150, 100);
        inactive.state = RangeState::Inactive;

        let candidate = range(DocumentType::TaxCreditInvoice, 50, 150);
        let all = [existing.clone(), other_type, inactive];
        assert_eq!(find_conflict(&candidate, &all, now(), 10), Some(existing.id));

        let disjoint = range(DocumentType::TaxCreditInvoice, 101, 10);
        assert_eq!(find_conflict(&disjoint, &all, now(), 10), None);
    }

    #[test]
    fn test_delete_guard() {
        let mut r = range(DocumentType::TaxCreditInvoice, 1, 5);
        assert!(r.ensure_deletable().is_ok());
        r.try_consume(now(), 10).unwrap();
        assert_eq!(
            r.ensure_deletable(),
            Err(RangeRejection::InUse { id: r.id, consumed: 1 })
        );
    }

    proptest::proptest! {
        #[test]
        fn prop_format_number_is_injective(
            a in 1u64..=9_999_999_999,
            b in 1u64..=9_999_999_999,
            ta in 0usize..8,
            tb in 0usize..8,
        ) {
            let (type_a, type_b) = (DocumentType::ALL[ta], DocumentType::ALL[tb]);
            let first = format_number("E", type_a, a);
            proptest::prop_assert_eq!(first.len(), 13);
            proptest::prop_assert_eq!(&first, &format_number("E", type_a, a));
            if (type_a, a) != (type_b, b) {
                proptest::prop_assert_ne!(first, format_number("E", type_b, b));
            }
        }
    }
}
