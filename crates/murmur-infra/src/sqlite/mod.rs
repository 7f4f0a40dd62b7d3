//! SQLite persistence for Murmur.
//!
//! `DatabasePool` provides split reader/writer pools in WAL mode;
//! `SqliteTurnStore` implements the `TurnStore` port from `murmur-core`.

pub mod pool;
pub mod turn;
