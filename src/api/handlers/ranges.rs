//! Sequence range administration handlers.

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::extractors::extract_json;
use crate::api::state::AppState;
use crate::domain::{
    ApiResponse, ConsumeResponse, CreateRangeRequest, Page, PreviewResponse, RangeListQuery,
    RangeStats, RangeUpdate, RangeView, SetStateRequest,
};
use crate::error::{AppError, Result};

/// Query parameters for range statistics.
#[derive(Debug, Default, Deserialize)]
pub struct StatsQuery {
    /// Restrict to one owner.
    #[serde(default)]
    pub owner_id: Option<String>,
}

/// Register a new range.
///
/// # Errors
///
/// Returns a validation error listing every bad field, or an overlap error.
pub async fn create_range(
    State(state): State<AppState>,
    body: std::result::Result<Json<CreateRangeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<RangeView>>)> {
    let request = extract_json(body)?;
    let range = state.allocator.create(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(range, "range created")),
    ))
}

/// List ranges with filters and pagination.
///
/// # Errors
///
/// Returns an error if the page size is out of bounds or storage fails.
pub async fn list_ranges(
    State(state): State<AppState>,
    Query(query): Query<RangeListQuery>,
) -> Result<Json<ApiResponse<Page<RangeView>>>> {
    if query.page == 0 {
        return Err(AppError::BadRequest("page must be at least 1".to_string()));
    }
    if query.limit == 0 || query.limit > 100 {
        return Err(AppError::BadRequest(
            "limit must be between 1 and 100".to_string(),
        ));
    }

    let page = state.allocator.list(&query).await?;
    Ok(Json(ApiResponse::success(page)))
}

/// Per-state totals.
///
/// # Errors
///
/// Returns an error if storage fails.
pub async fn range_stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<ApiResponse<RangeStats>>> {
    let stats = state.allocator.stats(query.owner_id.as_deref()).await?;
    Ok(Json(ApiResponse::success(stats)))
}

/// Get one range.
///
/// # Errors
///
/// Returns `NotFound` for an unknown id.
pub async fn get_range(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<RangeView>>> {
    let range = state.allocator.get(id).await?;
    Ok(Json(ApiResponse::success(range)))
}

/// Change notes, expiration, alert threshold or state.
///
/// # Errors
///
/// Returns an error for an unknown id, a forbidden transition or an overlap.
pub async fn update_range(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: std::result::Result<Json<RangeUpdate>, JsonRejection>,
) -> Result<Json<ApiResponse<RangeView>>> {
    let update = extract_json(body)?;
    let range = state.allocator.update(id, &update).await?;
    Ok(Json(ApiResponse::with_message(range, "range updated")))
}

/// Activate or deactivate a range.
///
/// # Errors
///
/// See [`update_range`].
pub async fn set_range_state(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: std::result::Result<Json<SetStateRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<RangeView>>> {
    let request = extract_json(body)?;
    let range = state.allocator.set_state(id, request.state).await?;
    Ok(Json(ApiResponse::success(range)))
}

/// Delete a range that never handed out a number.
///
/// # Errors
///
/// Returns an error for an unknown id or a range already in use.
pub async fn delete_range(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>> {
    state.allocator.delete(id).await?;
    Ok(Json(ApiResponse::ok()))
}

/// Next number without consuming it.
///
/// # Errors
///
/// Returns an error if the range is missing, exhausted or not usable.
pub async fn preview_next(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<PreviewResponse>>> {
    let preview = state.allocator.preview_next(id).await?;
    Ok(Json(ApiResponse::success(preview)))
}

/// Hand out the next number of a range.
///
/// # Errors
///
/// Returns an error if the range is missing, exhausted or not usable.
pub async fn consume_number(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ConsumeResponse>>> {
    let consumed = state.allocator.consume_one(id).await?;
    let message = consumed
        .alert_message
        .clone()
        .unwrap_or_else(|| "success".to_string());
    Ok(Json(ApiResponse::with_message(consumed, message)))
}
