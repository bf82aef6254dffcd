//! Sequence range allocation.
//!
//! Creates and administers ranges and hands out document numbers from them.
//! Every consumption goes through [`RangeStorage::consume_one`], which is the
//! only place counters change.
//!
//! [`RangeStorage::consume_one`]: crate::storage::RangeStorage::consume_one

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SequenceConfig;
use crate::domain::dates::{format_dmy, local_today, parse_date};
use crate::domain::dto::{NumberRequest, NumberResponse, StateStats};
use crate::domain::sequence::MAX_SEQUENCE;
use crate::domain::{
    AdminState, ConsumeResponse, CreateRangeRequest, DocumentType, NewRange, Page,
    PreviewResponse, RangeListQuery, RangeRejection, RangeState, RangeStats, RangeUpdate,
    RangeView, Scalar, SequenceRange,
};
use crate::error::{AppError, FieldIssue, Result, StorageError};
use crate::service::clock::Clock;
use crate::storage::Storage;

/// Ranges expiring within this many days are reported as expiring soon.
const EXPIRY_WINDOW_DAYS: i64 = 30;

/// Attempts at picking a range when a concurrent caller drains the first pick.
const PICK_ATTEMPTS: usize = 3;

/// Largest page size for range listings.
const MAX_PAGE_SIZE: u32 = 100;

/// Strip everything but digits and check the length of a tax ID.
#[must_use]
pub fn normalize_tax_id(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    (9..=11).contains(&digits.len()).then_some(digits)
}

/// Document type from a number or a string such as `"31"` or `"E31"`.
#[must_use]
pub fn parse_document_type(raw: &Scalar) -> Option<DocumentType> {
    raw.as_text()?.trim().parse().ok()
}

fn is_valid_prefix(prefix: &str) -> bool {
    let mut chars = prefix.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c.is_ascii_uppercase())
}

fn missing_as_not_found(err: StorageError) -> AppError {
    match err {
        StorageError::NotFound(what) => AppError::NotFound(what),
        other => AppError::Storage(other),
    }
}

/// Service for sequence range administration and number allocation.
pub struct AllocatorService {
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
    alert_percent: u8,
    default_prefix: String,
}

impl AllocatorService {
    /// Create a new allocator.
    pub fn new(storage: Arc<dyn Storage>, clock: Arc<dyn Clock>, config: &SequenceConfig) -> Self {
        Self {
            storage,
            clock,
            alert_percent: config.alert_threshold_percent,
            default_prefix: config.default_prefix.clone(),
        }
    }

    /// Register a new range.
    ///
    /// # Errors
    ///
    /// Returns a validation error listing every bad field, or an overlap error if a
    /// usable range of the same scope intersects the new window.
    pub async fn create(&self, request: CreateRangeRequest) -> Result<RangeView> {
        let now = self.clock.now();
        let input = self.validate_new(request, now)?;

        let mut range = SequenceRange::new(input, now);
        range.refresh(now, self.alert_percent);
        self.storage
            .insert_range(&range, now, self.alert_percent)
            .await??;

        info!(
            range_id = %range.id,
            owner_id = %range.owner_id,
            tax_id = %range.tax_id,
            document_type = %range.document_type,
            start = range.start_number,
            end = range.end_number(),
            "Range created"
        );
        Ok(range.into())
    }

    fn validate_new(&self, request: CreateRangeRequest, now: DateTime<Utc>) -> Result<NewRange> {
        let mut issues = Vec::new();

        let owner_id = request
            .owner_id
            .map(|owner| owner.trim().to_string())
            .filter(|owner| !owner.is_empty());
        if owner_id.is_none() {
            issues.push(FieldIssue::new("owner_id", "is required"));
        }

        let tax_id = match request.tax_id.as_ref().and_then(Scalar::as_text) {
            None => {
                issues.push(FieldIssue::new("tax_id", "is required"));
                None
            }
            Some(raw) => {
                let normalized = normalize_tax_id(&raw);
                if normalized.is_none() {
                    issues.push(FieldIssue::new("tax_id", "must have 9 to 11 digits"));
                }
                normalized
            }
        };

        let document_type = match request.document_type.as_ref() {
            None => {
                issues.push(FieldIssue::new("document_type", "is required"));
                None
            }
            Some(raw) => {
                let parsed = parse_document_type(raw);
                if parsed.is_none() {
                    issues.push(FieldIssue::new(
                        "document_type",
                        "must be one of 31, 32, 33, 34, 41, 43, 44, 45",
                    ));
                }
                parsed
            }
        };

        let prefix = request
            .prefix
            .map(|prefix| prefix.trim().to_string())
            .filter(|prefix| !prefix.is_empty())
            .unwrap_or_else(|| self.default_prefix.clone());
        if !is_valid_prefix(&prefix) {
            issues.push(FieldIssue::new("prefix", "must be one uppercase letter"));
        }

        let start = match request.start_number {
            None => {
                issues.push(FieldIssue::new("start_number", "is required"));
                None
            }
            Some(0) => {
                issues.push(FieldIssue::new("start_number", "must be at least 1"));
                None
            }
            Some(start) => Some(start),
        };
        let quantity = match request.quantity {
            None => {
                issues.push(FieldIssue::new("quantity", "is required"));
                None
            }
            Some(0) => {
                issues.push(FieldIssue::new("quantity", "must be at least 1"));
                None
            }
            Some(quantity) => Some(quantity),
        };
        if let (Some(start), Some(quantity)) = (start, quantity) {
            let fits = start
                .checked_add(quantity - 1)
                .is_some_and(|end| end <= MAX_SEQUENCE);
            if !fits {
                issues.push(FieldIssue::new(
                    "quantity",
                    "range runs past the largest ten-digit sequence",
                ));
            }
        }

        let expires = document_type.is_none_or(DocumentType::requires_expiration);
        let expiration_date = match request
            .expiration_date
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
        {
            Some(text) if expires => match parse_date(text) {
                None => {
                    issues.push(FieldIssue::new(
                        "expiration_date",
                        "must be DD-MM-YYYY or YYYY-MM-DD",
                    ));
                    None
                }
                Some(date) if date < local_today(now) => {
                    issues.push(FieldIssue::new("expiration_date", "is in the past"));
                    None
                }
                Some(date) => Some(date),
            },
            _ => None,
        };

        match (owner_id, tax_id, document_type, start, quantity) {
            (Some(owner_id), Some(tax_id), Some(document_type), Some(start_number), Some(quantity))
                if issues.is_empty() =>
            {
                Ok(NewRange {
                    owner_id,
                    tax_id,
                    document_type,
                    prefix,
                    start_number,
                    quantity,
                    expiration_date,
                    alert_threshold: request.alert_threshold,
                    notes: request.notes,
                })
            }
            _ => Err(AppError::Validation(issues)),
        }
    }

    /// Stored range with its state re-derived for the current instant.
    async fn load(&self, id: Uuid, now: DateTime<Utc>) -> Result<SequenceRange> {
        let mut range = self
            .storage
            .get_range(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("range {id}")))?;
        range.refresh(now, self.alert_percent);
        Ok(range)
    }

    /// Fetch one range.
    ///
    /// # Errors
    ///
    /// Returns an error if the range does not exist or storage fails.
    pub async fn get(&self, id: Uuid) -> Result<RangeView> {
        self.load(id, self.clock.now()).await.map(RangeView::from)
    }

    /// List ranges matching `query`, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub async fn list(&self, query: &RangeListQuery) -> Result<Page<RangeView>> {
        let now = self.clock.now();
        let today = local_today(now);

        let mut ranges: Vec<SequenceRange> = self
            .storage
            .list_ranges()
            .await?
            .into_iter()
            .map(|mut range| {
                range.refresh(now, self.alert_percent);
                range
            })
            .filter(|range| {
                query
                    .owner_id
                    .as_deref()
                    .is_none_or(|owner| range.owner_id == owner)
            })
            .filter(|range| query.state.is_none_or(|state| range.state == state))
            .filter(|range| {
                query
                    .document_type
                    .is_none_or(|document_type| range.document_type == document_type)
            })
            .filter(|range| {
                query
                    .tax_id
                    .as_deref()
                    .is_none_or(|needle| range.tax_id.contains(needle.trim()))
            })
            .filter(|range| {
                !query.expiring_soon
                    || (range.state.is_usable() && range.expires_within(today, EXPIRY_WINDOW_DAYS))
            })
            .collect();
        ranges.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let page = query.page.max(1);
        let limit = query.limit.clamp(1, MAX_PAGE_SIZE);
        let total = ranges.len();
        let skip = (page as usize - 1) * limit as usize;
        let items = ranges
            .into_iter()
            .skip(skip)
            .take(limit as usize)
            .map(RangeView::from)
            .collect();

        Ok(Page {
            items,
            page,
            limit,
            total,
            total_pages: total.div_ceil(limit as usize),
        })
    }

    /// The number the next consumption would hand out. Changes nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the range is missing, exhausted or not usable.
    pub async fn preview_next(&self, id: Uuid) -> Result<PreviewResponse> {
        let range = self.load(id, self.clock.now()).await?;
        let next_number = Self::next_usable(&range)?;

        Ok(PreviewResponse {
            next_number,
            formatted_number: range.formatted_number(next_number),
            available_count: range.available(),
            state: range.state,
        })
    }

    fn next_usable(range: &SequenceRange) -> Result<u64> {
        match range.state {
            RangeState::Active | RangeState::Alert => range
                .next_number()
                .ok_or(AppError::RangeExhausted(range.id)),
            RangeState::Exhausted => Err(AppError::RangeExhausted(range.id)),
            state => Err(AppError::InvalidRangeState {
                id: range.id,
                state,
            }),
        }
    }

    /// Hand out the next number of a range.
    ///
    /// # Errors
    ///
    /// Returns an error if the range is missing, exhausted or not usable.
    pub async fn consume_one(&self, id: Uuid) -> Result<ConsumeResponse> {
        let now = self.clock.now();
        let consumed = self
            .storage
            .consume_one(id, now, self.alert_percent)
            .await
            .map_err(missing_as_not_found)??;

        let range = consumed.range;
        record_consumption(&range, consumed.number);

        Ok(ConsumeResponse {
            range_id: range.id,
            consumed_number: consumed.number,
            formatted_number: range.formatted_number(consumed.number),
            state: range.state,
            available_count: range.available(),
            alert_message: range.alert_message(),
        })
    }

    /// Hand out (or preview) a number for an owner's tax ID and document type.
    ///
    /// Picks the oldest usable range of the scope. If a concurrent caller drains
    /// it first, the pick is repeated.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a malformed tax ID or type, and not found when
    /// the scope has no usable range.
    pub async fn consume_for_tax_id(
        &self,
        owner_id: &str,
        request: &NumberRequest,
    ) -> Result<NumberResponse> {
        let mut issues = Vec::new();
        let tax_id = request
            .rnc
            .as_ref()
            .and_then(Scalar::as_text)
            .and_then(|raw| normalize_tax_id(&raw));
        if tax_id.is_none() {
            issues.push(FieldIssue::new("rnc", "must have 9 to 11 digits"));
        }
        let document_type = request.tipo_comprobante.as_ref().and_then(parse_document_type);
        if document_type.is_none() {
            issues.push(FieldIssue::new(
                "tipo_comprobante",
                "must be one of 31, 32, 33, 34, 41, 43, 44, 45",
            ));
        }
        let (Some(tax_id), Some(document_type)) = (tax_id, document_type) else {
            return Err(AppError::Validation(issues));
        };

        for attempt in 1..=PICK_ATTEMPTS {
            let now = self.clock.now();
            let Some(range) = self
                .pick_range(owner_id, &tax_id, document_type, now)
                .await?
            else {
                break;
            };

            if request.solo_preview {
                let number = Self::next_usable(&range)?;
                return Ok(self.number_response(&range, number, true));
            }

            match self
                .storage
                .consume_one(range.id, now, self.alert_percent)
                .await
                .map_err(missing_as_not_found)?
            {
                Ok(consumed) => {
                    record_consumption(&consumed.range, consumed.number);
                    return Ok(self.number_response(&consumed.range, consumed.number, false));
                }
                Err(RangeRejection::Exhausted { id } | RangeRejection::NotUsable { id, .. }) => {
                    debug!(range_id = %id, attempt, "Picked range drained concurrently, retrying");
                }
                Err(rejection) => return Err(rejection.into()),
            }
        }

        warn!(owner_id, tax_id = %tax_id, document_type = %document_type, "No usable range");
        Err(AppError::NotFound(format!(
            "no usable range for tax ID {tax_id} and document type {document_type}"
        )))
    }

    async fn pick_range(
        &self,
        owner_id: &str,
        tax_id: &str,
        document_type: DocumentType,
        now: DateTime<Utc>,
    ) -> Result<Option<SequenceRange>> {
        let ranges = self.storage.list_ranges().await?;
        Ok(ranges
            .into_iter()
            .filter(|range| {
                range.owner_id == owner_id
                    && range.tax_id == tax_id
                    && range.document_type == document_type
            })
            .map(|mut range| {
                range.refresh(now, self.alert_percent);
                range
            })
            .filter(|range| range.state.is_usable() && range.available() > 0)
            .min_by_key(|range| (range.created_at, range.start_number)))
    }

    fn number_response(&self, range: &SequenceRange, number: u64, preview: bool) -> NumberResponse {
        NumberResponse {
            number,
            formatted_number: range.formatted_number(number),
            preview,
            available_count: range.available(),
            state: range.state,
            expiration_date: range.expiration_date.map(format_dmy),
            low_stock: range.available() <= range.low_water_mark(self.alert_percent),
            alert_message: range.alert_message(),
            tax_id: range.tax_id.clone(),
            document_type: range.document_type,
            prefix: range.prefix.clone(),
        }
    }

    /// Change notes, expiration, alert threshold or administrative state.
    ///
    /// # Errors
    ///
    /// Returns an error if the range is missing, the transition is not allowed, or
    /// a reactivation would overlap another usable range.
    pub async fn update(&self, id: Uuid, update: &RangeUpdate) -> Result<RangeView> {
        let now = self.clock.now();
        let range = self
            .storage
            .update_range(id, update, now, self.alert_percent)
            .await
            .map_err(missing_as_not_found)??;

        info!(range_id = %id, state = %range.state, "Range updated");
        Ok(range.into())
    }

    /// Activate or deactivate a range.
    ///
    /// # Errors
    ///
    /// See [`Self::update`].
    pub async fn set_state(&self, id: Uuid, state: AdminState) -> Result<RangeView> {
        let update = RangeUpdate {
            state: Some(state),
            ..RangeUpdate::default()
        };
        self.update(id, &update).await
    }

    /// Delete a range that never handed out a number.
    ///
    /// # Errors
    ///
    /// Returns an error if the range is missing or already in use.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        if self.storage.delete_range(id).await?? {
            info!(range_id = %id, "Range deleted");
            Ok(())
        } else {
            Err(AppError::NotFound(format!("range {id}")))
        }
    }

    /// Per-state totals, optionally for one owner.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub async fn stats(&self, owner_id: Option<&str>) -> Result<RangeStats> {
        let now = self.clock.now();
        let today = local_today(now);
        let ranges: Vec<SequenceRange> = self
            .storage
            .list_ranges()
            .await?
            .into_iter()
            .filter(|range| owner_id.is_none_or(|owner| range.owner_id == owner))
            .map(|mut range| {
                range.refresh(now, self.alert_percent);
                range
            })
            .collect();

        let by_state = [
            RangeState::Active,
            RangeState::Alert,
            RangeState::Exhausted,
            RangeState::Expired,
            RangeState::Inactive,
        ]
        .into_iter()
        .filter_map(|state| {
            let matching: Vec<&SequenceRange> =
                ranges.iter().filter(|range| range.state == state).collect();
            (!matching.is_empty()).then(|| StateStats {
                state,
                count: matching.len(),
                total_numbers: matching.iter().map(|range| range.quantity).sum(),
                consumed: matching.iter().map(|range| range.consumed_count).sum(),
                available: matching.iter().map(|range| range.available()).sum(),
            })
        })
        .collect();

        Ok(RangeStats {
            total_ranges: ranges.len(),
            expiring_soon: ranges
                .iter()
                .filter(|range| {
                    range.state.is_usable() && range.expires_within(today, EXPIRY_WINDOW_DAYS)
                })
                .count(),
            in_alert: ranges
                .iter()
                .filter(|range| range.state == RangeState::Alert)
                .count(),
            by_state,
        })
    }
}

fn record_consumption(range: &SequenceRange, number: u64) {
    metrics::counter!(
        "ecf_numbers_consumed_total",
        "document_type" => range.document_type.as_code_str()
    )
    .increment(1);

    info!(
        range_id = %range.id,
        number,
        available = range.available(),
        state = %range.state,
        "Number consumed"
    );
    if let Some(message) = range.alert_message() {
        warn!(range_id = %range.id, tax_id = %range.tax_id, "{message}");
    }
}
