//! Certification session administration.

use axum::{Json, extract::State};
use serde::Serialize;

use crate::api::state::AppState;
use crate::domain::ApiResponse;
use crate::service::gateway::UpstreamProbe;

/// Result of a token reset.
#[derive(Debug, Serialize)]
pub struct TokenResetResponse {
    /// Whether a token was cached before the reset.
    pub had_token: bool,
}

/// Drop the cached certification token.
pub async fn reset_token(State(state): State<AppState>) -> Json<ApiResponse<TokenResetResponse>> {
    let had_token = state.gateway.token_expires_at().is_some();
    state.gateway.reset_token();
    Json(ApiResponse::with_message(
        TokenResetResponse { had_token },
        "token cache cleared",
    ))
}

/// Probe the certification service with a fresh authentication.
pub async fn upstream_health(State(state): State<AppState>) -> Json<ApiResponse<UpstreamProbe>> {
    let probe = state.gateway.probe_upstream().await;
    Json(ApiResponse::success(probe))
}
