//! # Token Errors
//!
//! Every failure of a token operation is one of these variants, returned to
//! the caller as a value. A returned error always means the operation left
//! no trace: no balance, allowance, policy, or pause-state change and no
//! notification.

use levy_protocol::{Address, Amount};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias used throughout the contracts crate.
pub type TokenResult<T> = Result<T, TokenError>;

/// Errors that can occur during token operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// A privileged operation was invoked by someone other than the owner.
    #[error("unauthorized: {caller} is not the owner")]
    Unauthorized {
        /// The identity that attempted the call.
        caller: Address,
    },

    /// An address argument was rejected by a validating code path.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The fee rate exceeds the configured cap.
    #[error("invalid fee rate: {rate} exceeds maximum {max}")]
    InvalidFeeRate {
        /// Rate the caller tried to set.
        rate: Amount,
        /// The cap in force.
        max: Amount,
    },

    /// The sender does not hold enough tokens for the requested move.
    #[error("insufficient balance: {account} has {have}, needs {need}")]
    InsufficientBalance {
        /// Account being debited.
        account: Address,
        /// Its balance at the time of the check (including earlier legs of
        /// the same operation).
        have: Amount,
        /// Amount the move required.
        need: Amount,
    },

    /// The spender's approved amount is smaller than the transfer.
    #[error("insufficient allowance: {spender} may move {have} for {owner}, needs {need}")]
    InsufficientAllowance {
        /// Account whose tokens would move.
        owner: Address,
        /// Account spending the allowance.
        spender: Address,
        /// Remaining approved amount.
        have: Amount,
        /// Amount the transfer required.
        need: Amount,
    },

    /// The computed fee is larger than the amount being transferred, so the
    /// net amount would underflow.
    #[error("fee {fee} exceeds transfer amount {amount}")]
    FeeExceedsAmount {
        /// The computed fee.
        fee: Amount,
        /// The requested transfer amount.
        amount: Amount,
    },

    /// A 256-bit checked operation overflowed.
    #[error("arithmetic overflow")]
    Overflow,

    /// A value-moving operation was attempted while the system is paused.
    #[error("system is paused")]
    SystemPaused,

    /// A restored state does not satisfy `Σ balances == total supply`.
    #[error("conservation violated: total supply {total_supply}, sum of balances {sum}")]
    ConservationViolated {
        /// Recorded total supply.
        total_supply: Amount,
        /// Recomputed sum of balances (saturated at `U256::MAX`).
        sum: Amount,
    },

    /// Restored notifications do not form a contiguous sequence from 0.
    #[error("event log is not contiguous")]
    CorruptEventLog,
}

/// The failure classes a caller can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Non-owner invoked a privileged operation.
    Authorization,
    /// Invalid configuration input.
    Validation,
    /// Balance or allowance too small.
    Insufficiency,
    /// Fee underflow or 256-bit overflow.
    Arithmetic,
    /// Value movement while paused.
    Halted,
    /// Persisted state failed an invariant check on restore.
    Integrity,
}

impl TokenError {
    /// Classifies this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            TokenError::Unauthorized { .. } => ErrorCategory::Authorization,
            TokenError::InvalidAddress(_) | TokenError::InvalidFeeRate { .. } => {
                ErrorCategory::Validation
            }
            TokenError::InsufficientBalance { .. } | TokenError::InsufficientAllowance { .. } => {
                ErrorCategory::Insufficiency
            }
            TokenError::FeeExceedsAmount { .. } | TokenError::Overflow => ErrorCategory::Arithmetic,
            TokenError::SystemPaused => ErrorCategory::Halted,
            TokenError::ConservationViolated { .. } | TokenError::CorruptEventLog => {
                ErrorCategory::Integrity
            }
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Authorization => write!(f, "authorization"),
            ErrorCategory::Validation => write!(f, "validation"),
            ErrorCategory::Insufficiency => write!(f, "insufficiency"),
            ErrorCategory::Arithmetic => write!(f, "arithmetic"),
            ErrorCategory::Halted => write!(f, "halted"),
            ErrorCategory::Integrity => write!(f, "integrity"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_cover_the_taxonomy() {
        let who = Address::new([9u8; 20]);
        let one = Amount::one();
        assert_eq!(
            TokenError::Unauthorized { caller: who }.category(),
            ErrorCategory::Authorization
        );
        assert_eq!(
            TokenError::InvalidFeeRate { rate: one, max: one }.category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            TokenError::InvalidAddress("null treasury".into()).category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            TokenError::InsufficientBalance {
                account: who,
                have: one,
                need: one
            }
            .category(),
            ErrorCategory::Insufficiency
        );
        assert_eq!(
            TokenError::FeeExceedsAmount { fee: one, amount: one }.category(),
            ErrorCategory::Arithmetic
        );
        assert_eq!(TokenError::SystemPaused.category(), ErrorCategory::Halted);
    }

    #[test]
    fn error_messages_carry_values() {
        let err = TokenError::FeeExceedsAmount {
            fee: Amount::from(4999u64),
            amount: Amount::from(100u64),
        };
        assert_eq!(err.to_string(), "fee 4999 exceeds transfer amount 100");
    }
}
