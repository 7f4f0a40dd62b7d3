//! Shared domain types for Murmur.
//!
//! This crate contains the core domain types used across the Murmur backend:
//! conversation turns, wire frames, generation config, and their associated
//! error types.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod engine;
pub mod error;
