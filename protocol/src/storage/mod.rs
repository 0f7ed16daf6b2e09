//! # Storage Module
//!
//! Persistent storage for a Levy token. One embedded sled database per
//! token instance, holding the latest state snapshot and the append-only
//! notification history.
//!
//! ## Design Decisions
//!
//! 1. **Snapshots, not per-account rows.** Every committed operation
//!    rewrites the token snapshot in a single transaction with its events.
//!    Ledgers of this size fit comfortably in one value, and it keeps the
//!    on-disk state trivially consistent with `Σ balances == total supply`.
//!
//! 2. **Bincode for on-disk serialization.** Compact, fast, deterministic.
//!    JSON is for APIs and debugging; bincode is for storage.

pub mod db;

pub use db::{DbError, DbResult, LevyDB};
