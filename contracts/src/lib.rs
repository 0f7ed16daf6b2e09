// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Levy Token Contracts
//!
//! A fungible token whose transfers divert a fee to a treasury account,
//! administered by a single owner.
//!
//! - **Balance Ledger**: balances and total supply, multi-leg staged moves.
//! - **Allowance Store**: delegated spending limits.
//! - **Fee Policy**: rate, exemptions, and the fee split for both fee
//!   formulations.
//! - **Ownership Gate** and **Pause Switch**: administrative control.
//! - **Taxed Token**: the transfer engine composing all of the above.
//!
//! ## Design Principles
//!
//! 1. All arithmetic is checked 256-bit arithmetic. Overflow is an error,
//!    never a wrap.
//! 2. Operations validate everything first and commit last. A returned
//!    error means nothing changed.
//! 3. Notifications are appended only for committed operations.
//! 4. Every persisted type is serializable (serde) for storage and the API.

pub mod allowance;
pub mod error;
pub mod events;
pub mod fee_policy;
pub mod ledger;
pub mod ownership;
pub mod pause;
pub mod taxed_token;

pub use error::{ErrorCategory, TokenError, TokenResult};
pub use events::{EventLog, Notification, SequencedNotification};
pub use fee_policy::{FeePolicy, FeeSplit, FeeVariant};
pub use taxed_token::{
    Checkpoint, TaxedToken, TokenConfig, TokenMetadata, TokenState, TransferReceipt,
};
