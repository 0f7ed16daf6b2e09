//! # Allowance Store
//!
//! Per-(owner, spender) approved amounts consumed by delegated transfers.
//!
//! Approvals replace, they never accumulate. An allowance of `U256::MAX` is
//! unlimited: consuming it never writes back a decremented value.

use levy_protocol::{Address, Amount};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{TokenError, TokenResult};

/// A validated allowance consumption, applied by [`AllowanceStore::commit`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "an allowance debit has no effect until committed"]
pub struct AllowanceDebit {
    owner: Address,
    spender: Address,
    /// New stored value, or `None` when the allowance is unlimited.
    remaining: Option<Amount>,
}

impl AllowanceDebit {
    /// Allowance left after commit; `None` means unlimited and untouched.
    pub fn remaining(&self) -> Option<Amount> {
        self.remaining
    }
}

/// Holds `owner -> spender -> approved amount`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowanceStore {
    allowances: HashMap<Address, HashMap<Address, Amount>>,
}

impl AllowanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Amount `spender` may still move on behalf of `owner`.
    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.allowances
            .get(owner)
            .and_then(|m| m.get(spender))
            .copied()
            .unwrap_or_default()
    }

    /// Sets the allowance to exactly `amount`, replacing any previous value.
    pub fn approve(&mut self, owner: &Address, spender: &Address, amount: Amount) {
        self.allowances
            .entry(*owner)
            .or_default()
            .insert(*spender, amount);
    }

    /// Checks that `spender` may move `amount` for `owner` and returns the
    /// pending debit. The store is not modified.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::InsufficientAllowance`] when the stored value is
    /// less than `amount`.
    pub fn stage_consume(
        &self,
        owner: &Address,
        spender: &Address,
        amount: Amount,
    ) -> TokenResult<AllowanceDebit> {
        let current = self.allowance(owner, spender);
        if current == Amount::MAX {
            return Ok(AllowanceDebit {
                owner: *owner,
                spender: *spender,
                remaining: None,
            });
        }

        let remaining = current
            .checked_sub(amount)
            .ok_or(TokenError::InsufficientAllowance {
                owner: *owner,
                spender: *spender,
                have: current,
                need: amount,
            })?;

        Ok(AllowanceDebit {
            owner: *owner,
            spender: *spender,
            remaining: Some(remaining),
        })
    }

    /// Applies a debit produced by [`stage_consume`](Self::stage_consume).
    pub fn commit(&mut self, debit: AllowanceDebit) {
        if let Some(remaining) = debit.remaining {
            self.approve(&debit.owner, &debit.spender, remaining);
        }
    }

    /// Decreases the allowance by `amount` in one step.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::InsufficientAllowance`] without modifying the
    /// store when the stored value is less than `amount`.
    pub fn consume(&mut self, owner: &Address, spender: &Address, amount: Amount) -> TokenResult<()> {
        let debit = self.stage_consume(owner, spender, amount)?;
        self.commit(debit);
        Ok(())
    }
}
