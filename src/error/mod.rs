//! Error handling module.
//!
//! This module provides unified error handling with proper HTTP status code mapping
//! and standardized API error responses.

pub mod codes;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::client::TransportError;
use crate::domain::{RangeRejection, RangeState};

pub use codes::ErrorCode;

/// A single field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    /// Dotted path of the offending field.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl FieldIssue {
    /// Create a new field issue.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

fn join_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(|issue| format!("{}: {}", issue.field, issue.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Application-level error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// One or more input fields are invalid.
    #[error("Validation failed: {}", join_issues(.0))]
    Validation(Vec<FieldIssue>),

    /// Invalid request parameters.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// New range overlaps an active range of the same scope.
    #[error("Range overlaps active range {0}")]
    RangeOverlap(Uuid),

    /// Range has no numbers left.
    #[error("Range {0} is exhausted")]
    RangeExhausted(Uuid),

    /// Range state does not allow the operation.
    #[error("Range {id} is {state}")]
    InvalidRangeState {
        /// Range identifier.
        id: Uuid,
        /// Current state.
        state: RangeState,
    },

    /// Range cannot be deleted after handing out numbers.
    #[error("Range {id} already handed out {consumed} numbers")]
    RangeInUse {
        /// Range identifier.
        id: Uuid,
        /// Numbers consumed so far.
        consumed: u64,
    },

    /// Authentication failed.
    #[error("Authentication failed")]
    Unauthorized,

    /// Insufficient permissions.
    #[error("Insufficient permissions")]
    Forbidden,

    /// Resource not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The certification token was rejected; the cache has been cleared.
    #[error("Certification token expired or invalid")]
    TokenExpired,

    /// The certification service refused our credentials.
    #[error("Certification service authentication failed: {0}")]
    AuthenticationRejected(String),

    /// The certification service rejected the request on business grounds.
    #[error("Certification service rejected the request ({code}): {message}")]
    Business {
        /// Upstream result code.
        code: i64,
        /// Upstream or mapped message.
        message: String,
    },

    /// The certification service could not be reached.
    #[error("Certification service unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The certification service did not answer in time; the outcome is unknown.
    #[error("Certification service timed out: {0}")]
    UpstreamTimeout(String),

    /// Unexpected answer from the certification service.
    #[error("Certification service error: {0}")]
    Upstream(String),

    /// Storage backend error.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get the error code for this error.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) => ErrorCode::VALIDATION_FAILED,
            Self::BadRequest(_) => ErrorCode::BAD_REQUEST,
            Self::RangeOverlap(_) => ErrorCode::RANGE_OVERLAP,
            Self::RangeExhausted(_) => ErrorCode::RANGE_EXHAUSTED,
            Self::InvalidRangeState { .. } => ErrorCode::INVALID_RANGE_STATE,
            Self::RangeInUse { .. } => ErrorCode::RANGE_IN_USE,
            Self::Unauthorized => ErrorCode::UNAUTHORIZED,
            Self::Forbidden => ErrorCode::FORBIDDEN,
            Self::NotFound(_) => ErrorCode::NOT_FOUND,
            Self::TokenExpired => ErrorCode::TOKEN_EXPIRED,
            Self::AuthenticationRejected(_) => ErrorCode::UPSTREAM_AUTH_FAILED,
            Self::Business { .. } => ErrorCode::UPSTREAM_REJECTED,
            Self::UpstreamUnavailable(_) => ErrorCode::UPSTREAM_UNAVAILABLE,
            Self::UpstreamTimeout(_) => ErrorCode::UPSTREAM_TIMEOUT,
            Self::Upstream(_) => ErrorCode::UPSTREAM_ERROR,
            Self::Storage(_) => ErrorCode::STORAGE_ERROR,
            Self::Internal(_) => ErrorCode::INTERNAL_ERROR,
        }
    }

    /// Get the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::RangeOverlap(_)
            | Self::RangeExhausted(_)
            | Self::InvalidRangeState { .. }
            | Self::RangeInUse { .. } => StatusCode::CONFLICT,
            Self::Unauthorized | Self::TokenExpired => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Business { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::AuthenticationRejected(_) | Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::UpstreamTimeout(_) => StatusCode::REQUEST_TIMEOUT,
            Self::Storage(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the caller can simply retry the same request.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::TokenExpired | Self::UpstreamUnavailable(_))
    }

    /// Operator-facing hint attached to the error response.
    #[must_use]
    pub const fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::TokenExpired => {
                Some("Retry the request; a fresh certification token will be requested")
            }
            Self::UpstreamUnavailable(_) => {
                Some("Verify the certification service status and retry later")
            }
            Self::UpstreamTimeout(_) => Some(
                "The document may have been processed; query its status before resubmitting",
            ),
            Self::RangeExhausted(_) => Some("Request a new number range from the tax authority"),
            Self::AuthenticationRejected(_) => {
                Some("Check the certification service credentials in the configuration")
            }
            _ => None,
        }
    }
}

impl From<RangeRejection> for AppError {
    fn from(rejection: RangeRejection) -> Self {
        match rejection {
            RangeRejection::Exhausted { id } => Self::RangeExhausted(id),
            RangeRejection::NotUsable { id, state } => Self::InvalidRangeState { id, state },
            RangeRejection::Overlap { existing } => Self::RangeOverlap(existing),
            RangeRejection::InUse { id, consumed } => Self::RangeInUse { id, consumed },
            RangeRejection::InvalidTransition { id, from, .. } => {
                Self::InvalidRangeState { id, state: from }
            }
        }
    }
}

impl From<TransportError> for AppError {
    fn from(err: TransportError) -> Self {
        if err.is_auth_rejection() {
            Self::TokenExpired
        } else if err.is_unavailable() {
            Self::UpstreamUnavailable(err.to_string())
        } else if err.is_ambiguous() {
            Self::UpstreamTimeout(err.to_string())
        } else {
            Self::Upstream(err.to_string())
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code().as_i32();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(
                error_code = code,
                status = %status,
                message = %message,
                "Request failed"
            );
        } else {
            tracing::warn!(
                error_code = code,
                status = %status,
                message = %message,
                "Request rejected"
            );
        }

        let mut body = json!({
            "code": code,
            "message": message,
            "data": null
        });

        if let Some(suggestion) = self.suggestion() {
            body["suggestion"] = json!(suggestion);
        }
        if self.is_retryable() {
            body["retryable"] = json!(true);
        }
        if let Self::Validation(issues) = &self {
            body["errors"] = json!(issues);
        }

        (status, Json(body)).into_response()
    }
}

/// Storage-specific error type.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Lock acquisition failed.
    #[error("Failed to acquire lock: {0}")]
    LockFailed(String),

    /// File I/O error.
    #[error("File I/O error: {0}")]
    FileIO(String),

    /// Data not found.
    #[error("Data not found: {0}")]
    NotFound(String),

    /// Backend not available.
    #[error("Storage backend unavailable")]
    Unavailable,
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::FileIO(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type alias using `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Result type alias using `StorageError`.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
