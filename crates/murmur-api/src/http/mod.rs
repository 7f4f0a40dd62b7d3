//! HTTP/REST API layer for Murmur.
//!
//! Axum-based API at `/api/` with the SSE chat endpoint, conversation
//! management routes, and CORS support.

pub mod error;
pub mod handlers;
pub mod router;
