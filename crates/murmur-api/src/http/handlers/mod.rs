//! HTTP route handlers.

pub mod chat;
pub mod conversation;

use axum::http::HeaderMap;

/// Owner used when no identity header is present (single-user deployments).
pub const DEFAULT_OWNER: &str = "local";

/// Resolve the request's owner from the `x-user-id` header.
///
/// Authentication is an upstream concern; this only scopes conversations.
pub fn owner_from_headers(headers: &HeaderMap) -> String {
    headers
        .get("x-user-id")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_OWNER.to_string())
}
