//! JSON bodies with rejections rendered in the error envelope.

use axum::Json;
use axum::extract::rejection::JsonRejection;

use crate::error::AppError;

/// Unwrap a JSON body, mapping deserialization failures to `BadRequest`.
///
/// Handlers take `Result<Json<T>, JsonRejection>` and call this first so a
/// malformed body gets the same `{code, message, data}` shape as any other
/// error.
///
/// # Errors
///
/// Returns `BadRequest` with axum's description of the rejection.
pub fn extract_json<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}
