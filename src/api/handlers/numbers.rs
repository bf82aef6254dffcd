//! Number requests from invoicing clients.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};

use crate::api::extractors::{AuthContext, extract_json};
use crate::api::state::AppState;
use crate::domain::{ApiResponse, NumberRequest, NumberResponse};
use crate::error::Result;

/// Next number of the caller's oldest usable range for a tax ID and type.
///
/// # Errors
///
/// Returns `Forbidden` for tokens without an owner, a validation error for a
/// malformed request, or an allocation error.
pub async fn request_number(
    State(state): State<AppState>,
    auth: AuthContext,
    body: std::result::Result<Json<NumberRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<NumberResponse>>> {
    let owner_id = auth.require_owner()?;
    let request = extract_json(body)?;
    let number = state
        .allocator
        .consume_for_tax_id(owner_id, &request)
        .await?;
    let message = number
        .alert_message
        .clone()
        .unwrap_or_else(|| "success".to_string());
    Ok(Json(ApiResponse::with_message(number, message)))
}
