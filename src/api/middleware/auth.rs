//! Authentication middleware.
//!
//! Two kinds of bearer tokens are accepted: the operator's admin token and
//! per-owner API keys from `auth.api_keys`.

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{Request, StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::debug;

use crate::api::extractors::{AuthContext, TokenType};
use crate::api::state::AppState;
use crate::config::AuthConfig;
use crate::error::ErrorCode;

/// Extract bearer token from Authorization header.
fn extract_bearer_token(req: &Request<Body>) -> Option<String> {
    let auth_header = req.headers().get(AUTHORIZATION)?.to_str().ok()?;

    auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(ToString::to_string)
}

/// Compare without short-circuiting on the first differing byte.
fn tokens_match(presented: &str, expected: &str) -> bool {
    presented.len() == expected.len()
        && presented
            .bytes()
            .zip(expected.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

/// Resolve a bearer token to its context.
fn resolve(auth: &AuthConfig, token: &str) -> Option<AuthContext> {
    if tokens_match(token, &auth.admin_token) {
        return Some(AuthContext::admin());
    }
    auth.api_keys
        .iter()
        .find(|entry| tokens_match(token, &entry.key))
        .map(|entry| AuthContext::key(entry.owner_id.clone()))
}

/// Create an unauthorized response.
fn unauthorized_response(message: &str) -> Response {
    let body = Json(json!({
        "code": ErrorCode::UNAUTHORIZED.as_i32(),
        "message": message,
        "data": null
    }));

    (StatusCode::UNAUTHORIZED, body).into_response()
}

/// Create a forbidden response.
fn forbidden_response(message: &str) -> Response {
    let body = Json(json!({
        "code": ErrorCode::FORBIDDEN.as_i32(),
        "message": message,
        "data": null
    }));

    (StatusCode::FORBIDDEN, body).into_response()
}

/// Middleware that requires the admin token.
pub async fn require_admin(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = extract_bearer_token(&req) else {
        return unauthorized_response("Missing or invalid Authorization header");
    };

    let Some(context) = resolve(&state.config.auth, &token) else {
        return unauthorized_response("Invalid token");
    };

    if context.token_type != TokenType::Admin {
        return forbidden_response("Admin token required");
    }

    req.extensions_mut().insert(context);
    next.run(req).await
}

/// Middleware that requires an API key (the admin token is accepted too).
///
/// Handlers that act on an owner's ranges call
/// [`AuthContext::require_owner`] themselves.
pub async fn require_key(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = extract_bearer_token(&req) else {
        return unauthorized_response("Missing or invalid Authorization header");
    };

    let Some(context) = resolve(&state.config.auth, &token) else {
        return unauthorized_response("Invalid token");
    };

    debug!(owner = context.owner_id.as_deref().unwrap_or("admin"), "Request authenticated");
    req.extensions_mut().insert(context);
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiKeyEntry;

    fn auth() -> AuthConfig {
        AuthConfig {
            admin_token: "admin-secret".to_string(),
            api_keys: vec![ApiKeyEntry {
                owner_id: "clinic-01".to_string(),
                key: "key-clinic-01".to_string(),
            }],
        }
    }

    #[test]
    fn test_resolve() {
        let auth = auth();
        assert!(resolve(&auth, "admin-secret").unwrap().is_admin());
        assert_eq!(
            resolve(&auth, "key-clinic-01").unwrap().owner_id.as_deref(),
            Some("clinic-01")
        );
        assert!(resolve(&auth, "key-clinic-02").is_none());
        assert!(resolve(&auth, "admin-secre").is_none());
    }

    #[test]
    fn test_extract_bearer_token() {
        let req = Request::builder()
            .header(AUTHORIZATION, "Bearer  abc ")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_bearer_token(&req).as_deref(), Some("abc"));

        let req = Request::builder()
            .header(AUTHORIZATION, "Basic abc")
            .body(Body::empty())
            .unwrap();
        assert!(extract_bearer_token(&req).is_none());
    }
}
