//! Request extractors.

mod auth;
mod json;

pub use auth::{AuthContext, TokenType};
pub use json::extract_json;
