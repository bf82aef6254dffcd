//! Invoice operations against the certification service.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::header,
    response::{IntoResponse, Response},
};
use serde_json::Value;

use crate::api::extractors::extract_json;
use crate::api::state::AppState;
use crate::domain::{
    AnnulmentRequest, ApiResponse, DownloadRequest, QrLinkRequest, QrLinkResponse,
    StatusQueryRequest, StatusReport,
};
use crate::error::Result;
use crate::service::gateway::{AnnulmentResult, SubmissionResult};
use crate::service::QrLinkBuilder;

/// Transform and certify an invoice.
///
/// # Errors
///
/// Validation problems, token and transport failures, or a business rejection.
pub async fn submit_invoice(
    State(state): State<AppState>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<ApiResponse<SubmissionResult>>> {
    let invoice = extract_json(body)?;
    let result = state.gateway.submit(invoice).await?;
    Ok(Json(ApiResponse::with_message(
        result,
        "factura enviada exitosamente",
    )))
}

/// Normalized status of a submitted document.
///
/// # Errors
///
/// A blank number, token and transport failures.
pub async fn invoice_status(
    State(state): State<AppState>,
    body: std::result::Result<Json<StatusQueryRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<StatusReport>>> {
    let request = extract_json(body)?;
    let report = state.gateway.status_report(&request.ncf).await?;
    Ok(Json(ApiResponse::success(report)))
}

/// Annul spans of unused numbers.
///
/// # Errors
///
/// Validation problems, token and transport failures, or a rejection.
pub async fn annul_numbers(
    State(state): State<AppState>,
    body: std::result::Result<Json<AnnulmentRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<AnnulmentResult>>> {
    let request = extract_json(body)?;
    let result = state.gateway.annul(&request).await?;
    Ok(Json(ApiResponse::with_message(result, "anulación procesada")))
}

/// Certified XML or PDF, returned as the raw file.
///
/// # Errors
///
/// Token and transport failures, a rejection, or an undecodable file.
pub async fn download_document(
    State(state): State<AppState>,
    body: std::result::Result<Json<DownloadRequest>, JsonRejection>,
) -> Result<Response> {
    let request = extract_json(body)?;
    let file = state.gateway.download(&request).await?;
    let name: String = file
        .ncf
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect();
    let disposition = format!(
        "attachment; filename=\"{name}.{}\"",
        file.format.extension()
    );
    Ok((
        [
            (header::CONTENT_TYPE, file.format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        file.contents,
    )
        .into_response())
}

/// Verification URL from individual values.
///
/// # Errors
///
/// Returns a validation error naming every missing value.
pub async fn qr_link(
    body: std::result::Result<Json<QrLinkRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<QrLinkResponse>>> {
    let request = extract_json(body)?;
    let url = QrLinkBuilder::build_from_parts(&request)?;
    Ok(Json(ApiResponse::success(QrLinkResponse { url })))
}
