//! # Balance Ledger
//!
//! Per-account balances and the total supply. The only ways value enters or
//! moves are [`BalanceLedger::mint`] and committed [`Move`]s, and both keep
//! `Σ balances == total_supply`.
//!
//! ## Staged Writes
//!
//! A transfer can consist of several legs (fee to treasury, net to
//! recipient). [`BalanceLedger::stage`] validates all legs against an overlay
//! of the balances they touch and returns a [`StagedMoves`] write-set without
//! modifying the ledger. [`BalanceLedger::commit`] then applies the write-set
//! and cannot fail. Callers run every other check between the two calls, so
//! a rejected operation never leaves a half-applied transfer behind.

use levy_protocol::{Address, Amount};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{TokenError, TokenResult};

/// A single debit/credit pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Move {
    pub from: Address,
    pub to: Address,
    pub amount: Amount,
}

impl Move {
    pub fn new(from: Address, to: Address, amount: Amount) -> Self {
        Self { from, to, amount }
    }
}

/// Final balances of every account touched by a validated set of moves.
///
/// Only produced by [`BalanceLedger::stage`]. Dropping it discards the moves.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "staged moves have no effect until committed"]
pub struct StagedMoves {
    writes: HashMap<Address, Amount>,
}

impl StagedMoves {
    /// Balance an account will have after commit, if the moves touch it.
    pub fn balance_after(&self, account: &Address) -> Option<Amount> {
        self.writes.get(account).copied()
    }
}

/// Holds per-account balances and the total supply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceLedger {
    balances: HashMap<Address, Amount>,
    total_supply: Amount,
}

impl BalanceLedger {
    /// Creates an empty ledger with zero supply.
    pub fn new() -> Self {
        Self::default()
    }

    /// Balance of `account`, zero if it has never been credited.
    pub fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or_default()
    }

    /// Current total supply.
    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    /// Number of accounts that have ever been credited.
    pub fn account_count(&self) -> usize {
        self.balances.len()
    }

    /// Iterates over `(account, balance)` pairs in no particular order.
    pub fn accounts(&self) -> impl Iterator<Item = (&Address, &Amount)> {
        self.balances.iter()
    }

    /// Increases `to`'s balance and the total supply by `amount`.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Overflow`] if either the supply or the balance
    /// would exceed `U256::MAX`. Nothing is written in that case.
    pub fn mint(&mut self, to: &Address, amount: Amount) -> TokenResult<()> {
        let new_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(TokenError::Overflow)?;
        // Balance <= supply, so this only fails if the ledger is already corrupt.
        let new_balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(TokenError::Overflow)?;

        self.total_supply = new_supply;
        self.balances.insert(*to, new_balance);
        Ok(())
    }

    /// Validates `moves`, applied in order, and returns the resulting
    /// write-set. The ledger itself is not modified.
    ///
    /// Later moves see the effect of earlier ones, so a sender must cover
    /// the sum of all its debits.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::InsufficientBalance`] for the first move whose
    /// sender cannot cover it.
    pub fn stage(&self, moves: &[Move]) -> TokenResult<StagedMoves> {
        let mut writes: HashMap<Address, Amount> = HashMap::with_capacity(moves.len() * 2);

        for mv in moves {
            let from_balance = writes
                .get(&mv.from)
                .copied()
                .unwrap_or_else(|| self.balance_of(&mv.from));
            let debited =
                from_balance
                    .checked_sub(mv.amount)
                    .ok_or(TokenError::InsufficientBalance {
                        account: mv.from,
                        have: from_balance,
                        need: mv.amount,
                    })?;
            writes.insert(mv.from, debited);

            let to_balance = writes
                .get(&mv.to)
                .copied()
                .unwrap_or_else(|| self.balance_of(&mv.to));
            let credited = to_balance
                .checked_add(mv.amount)
                .ok_or(TokenError::Overflow)?;
            writes.insert(mv.to, credited);
        }

        Ok(StagedMoves { writes })
    }

    /// Applies a write-set produced by [`stage`](Self::stage).
    ///
    /// The write-set must have been staged against this ledger with no other
    /// mutation in between.
    pub fn commit(&mut self, staged: StagedMoves) {
        self.balances.extend(staged.writes);
    }

    /// Debits `from` and credits `to` by exactly `amount`, atomically.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::InsufficientBalance`] if `from` holds less than
    /// `amount`; neither balance changes.
    pub fn move_funds(&mut self, from: &Address, to: &Address, amount: Amount) -> TokenResult<()> {
        let staged = self.stage(&[Move::new(*from, *to, amount)])?;
        self.commit(staged);
        Ok(())
    }

    /// Sum of all balances, or `None` if it does not fit in 256 bits.
    pub fn sum_of_balances(&self) -> Option<Amount> {
        self.balances
            .values()
            .try_fold(Amount::zero(), |acc, b| acc.checked_add(*b))
    }

    /// Returns `true` when `Σ balances == total_supply`.
    pub fn is_conserved(&self) -> bool {
        self.sum_of_balances() == Some(self.total_supply)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address::new([b; 20])
    }

    fn amt(v: u64) -> Amount {
        Amount::from(v)
    }

    fn funded(account: Address, amount: u64) -> BalanceLedger {
        let mut ledger = BalanceLedger::new();
        ledger.mint(&account, amt(amount)).unwrap();
        ledger
    }

    #[test]
    fn mint_increases_supply_and_balance() {
        let ledger = funded(addr(1), 1_000);
        assert_eq!(ledger.total_supply(), amt(1_000));
        assert_eq!(ledger.balance_of(&addr(1)), amt(1_000));
        assert!(ledger.is_conserved());
    }

    #[test]
    fn mint_overflow_rejected_without_write() {
        let mut ledger = BalanceLedger::new();
        ledger.mint(&addr(1), Amount::MAX).unwrap();
        let before = ledger.clone();

        assert_eq!(ledger.mint(&addr(2), amt(1)), Err(TokenError::Overflow));
        assert_eq!(ledger, before);
    }

    #[test]
    fn unknown_account_has_zero_balance() {
        let ledger = BalanceLedger::new();
        assert_eq!(ledger.balance_of(&addr(42)), Amount::zero());
        assert_eq!(ledger.account_count(), 0);
    }

    #[test]
    fn move_funds_debits_and_credits_exactly() {
        let mut ledger = funded(addr(1), 1_000);
        ledger.move_funds(&addr(1), &addr(2), amt(300)).unwrap();

        assert_eq!(ledger.balance_of(&addr(1)), amt(700));
        assert_eq!(ledger.balance_of(&addr(2)), amt(300));
        assert!(ledger.is_conserved());
    }

    #[test]
    fn move_funds_insufficient_balance_changes_nothing() {
        let mut ledger = funded(addr(1), 100);
        let before = ledger.clone();

        let err = ledger.move_funds(&addr(1), &addr(2), amt(101)).unwrap_err();
        assert_eq!(
            err,
            TokenError::InsufficientBalance {
                account: addr(1),
                have: amt(100),
                need: amt(101),
            }
        );
        assert_eq!(ledger, before);
    }

    #[test]
    fn accounts_lists_every_credited_account() {
        let mut ledger = funded(addr(1), 100);
        ledger.move_funds(&addr(1), &addr(2), amt(100)).unwrap();

        let mut listed: Vec<(Address, Amount)> =
            ledger.accounts().map(|(a, b)| (*a, *b)).collect();
        listed.sort();
        assert_eq!(listed, vec![(addr(1), Amount::zero()), (addr(2), amt(100))]);
    }

    #[test]
    fn moving_entire_balance_leaves_zero_entry() {
        let mut ledger = funded(addr(1), 50);
        ledger.move_funds(&addr(1), &addr(2), amt(50)).unwrap();

        assert_eq!(ledger.balance_of(&addr(1)), Amount::zero());
        // Zero is a terminal state, not a deletion.
        assert_eq!(ledger.account_count(), 2);
    }

    #[test]
    fn self_move_is_a_no_op() {
        let mut ledger = funded(addr(1), 50);
        ledger.move_funds(&addr(1), &addr(1), amt(50)).unwrap();
        assert_eq!(ledger.balance_of(&addr(1)), amt(50));
    }

    #[test]
    fn stage_does_not_mutate() {
        let ledger = funded(addr(1), 100);
        let staged = ledger.stage(&[Move::new(addr(1), addr(2), amt(40))]).unwrap();

        assert_eq!(staged.balance_after(&addr(1)), Some(amt(60)));
        assert_eq!(staged.balance_after(&addr(2)), Some(amt(40)));
        assert_eq!(ledger.balance_of(&addr(1)), amt(100));
    }

    #[test]
    fn multi_leg_stage_requires_sender_to_cover_all_legs() {
        let ledger = funded(addr(1), 100);
        // 60 + 60 > 100: second leg must fail against the overlay.
        let moves = [
            Move::new(addr(1), addr(2), amt(60)),
            Move::new(addr(1), addr(3), amt(60)),
        ];
        let err = ledger.stage(&moves).unwrap_err();
        assert_eq!(
            err,
            TokenError::InsufficientBalance {
                account: addr(1),
                have: amt(40),
                need: amt(60),
            }
        );
    }

    #[test]
    fn multi_leg_commit_conserves_supply() {
        let mut ledger = funded(addr(1), 1_000);
        let moves = [
            Move::new(addr(1), addr(9), amt(500)),
            Move::new(addr(1), addr(2), amt(500)),
        ];
        let staged = ledger.stage(&moves).unwrap();
        ledger.commit(staged);

        assert_eq!(ledger.balance_of(&addr(1)), Amount::zero());
        assert_eq!(ledger.balance_of(&addr(9)), amt(500));
        assert_eq!(ledger.balance_of(&addr(2)), amt(500));
        assert!(ledger.is_conserved());
    }

    #[test]
    fn conservation_detects_tampering() {
        let mut ledger = funded(addr(1), 10);
        ledger.balances.insert(addr(2), amt(1));
        assert!(!ledger.is_conserved());
    }
}
