//! Authentication context extractor.

use axum::{extract::FromRequestParts, http::request::Parts};
use std::future::Future;

use crate::error::AppError;

/// Kind of bearer token presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    /// Operator token; manages ranges and the certification session.
    Admin,
    /// API key issued to one owner.
    Key,
}

/// Authentication context extracted from request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Token type (Admin or Key).
    pub token_type: TokenType,
    /// Owner the API key belongs to; `None` for the admin token.
    pub owner_id: Option<String>,
}

impl AuthContext {
    /// Context for the admin token.
    #[must_use]
    pub const fn admin() -> Self {
        Self {
            token_type: TokenType::Admin,
            owner_id: None,
        }
    }

    /// Context for an owner's API key.
    #[must_use]
    pub const fn key(owner_id: String) -> Self {
        Self {
            token_type: TokenType::Key,
            owner_id: Some(owner_id),
        }
    }

    /// Check if this is an admin token.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.token_type == TokenType::Admin
    }

    /// Owner of the key, or `Forbidden` for tokens without one.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` when the token is not tied to an owner.
    pub fn require_owner(&self) -> Result<&str, AppError> {
        self.owner_id.as_deref().ok_or(AppError::Forbidden)
    }
}

impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        // Set by the auth middleware
        let result = parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or(AppError::Unauthorized);
        std::future::ready(result)
    }
}
