// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Levy Protocol: Shared Primitives
//!
//! Everything the taxed-transfer contracts and the node agree on before any
//! business logic runs:
//!
//! - **types**: `Address` and the 256-bit `Amount`.
//! - **config**: Supply, fee, and node constants. One home for magic numbers.
//! - **storage**: sled-backed persistence for token snapshots and events.
//!
//! ## Design Philosophy
//!
//! 1. Money is 256 bits wide and every operation on it is checked.
//! 2. This crate knows nothing about fees or owners; that is contract logic.
//! 3. If it touches money, it has tests. Plural.

pub mod config;
pub mod storage;
pub mod types;

pub use types::{Address, Amount};
