//! Health check handlers.

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::api::state::AppState;
use crate::domain::{ApiResponse, HealthResponse, ReadyComponents, ReadyResponse};
use crate::error::ErrorCode;

/// Liveness probe - always returns 200 if the service is running.
pub async fn health() -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::success(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

/// Readiness probe - checks if the service can serve requests.
///
/// Only local dependencies are checked; the certification service has its
/// own probe under `/v1/certification/health`.
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ApiResponse<ReadyResponse>>) {
    let storage_ok = match state.storage.health_check().await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(error = %err, backend = state.storage.backend_name(), "Storage health check failed");
            false
        }
    };

    let data = ReadyResponse {
        ready: storage_ok,
        components: ReadyComponents {
            storage: storage_ok,
        },
    };

    if storage_ok {
        (StatusCode::OK, Json(ApiResponse::success(data)))
    } else {
        let mut body = ApiResponse::with_message(data, "service unavailable");
        body.code = ErrorCode::SERVICE_UNAVAILABLE.as_i32();
        (StatusCode::SERVICE_UNAVAILABLE, Json(body))
    }
}

/// Prometheus metrics endpoint.
pub async fn metrics(State(state): State<AppState>) -> Response {
    state.metrics.as_ref().map_or_else(
        || StatusCode::NOT_FOUND.into_response(),
        |handle| {
            (
                [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
                handle.render(),
            )
                .into_response()
        },
    )
}
