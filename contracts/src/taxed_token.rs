//! # Taxed Token
//!
//! The transfer engine: one token instance composed from the ledger,
//! allowance store, fee policy, ownership gate, and pause switch.
//!
//! ## Transfer Pipeline
//!
//! ```text
//! transfer / transfer_from
//!   └─ PauseSwitch::ensure_active
//!   └─ AllowanceStore::stage_consume      (delegated only)
//!   └─ FeePolicy::compute
//!   └─ BalanceLedger::stage               (fee leg, then net leg)
//!   ── every check passed ──
//!   └─ commit allowance debit + ledger write-set
//!   └─ append notifications
//! ```
//!
//! Nothing is written until every stage has succeeded, so a failed call
//! leaves balances, allowances, fee policy, pause state, and the event log
//! exactly as they were. No external code runs between staging and commit.
//!
//! ## Administration
//!
//! `set_treasury`, `set_fee_rate`, `set_exemption`, `pause`, and `unpause`
//! check the caller against the [`OwnershipGate`] before anything else.
//! Whether configuration input is validated depends on the [`FeeVariant`].

use levy_protocol::config::{initial_supply, TOKEN_DECIMALS};
use levy_protocol::{Address, Amount};
use serde::{Deserialize, Serialize};

use crate::allowance::AllowanceStore;
use crate::error::{TokenError, TokenResult};
use crate::events::{EventLog, Notification, SequencedNotification};
use crate::fee_policy::{FeePolicy, FeeSplit, FeeVariant};
use crate::ledger::{BalanceLedger, Move, StagedMoves};
use crate::ownership::OwnershipGate;
use crate::pause::{PauseState, PauseSwitch};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Initialization parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Human-readable token name.
    pub name: String,
    /// Ticker symbol.
    pub symbol: String,
    /// Account that receives every collected fee.
    pub treasury: Address,
    /// Initial fee rate.
    pub fee_rate: Amount,
    /// Fee formulation.
    pub variant: FeeVariant,
}

/// Descriptive token metadata. Not consulted by any operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// What a successful transfer did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    /// Amount sent to the treasury.
    pub fee_amount: Amount,
    /// Amount credited to the recipient.
    pub net_amount: Amount,
    /// `true` when a fee leg was issued.
    pub taxed: bool,
}

impl From<FeeSplit> for TransferReceipt {
    fn from(split: FeeSplit) -> Self {
        Self {
            fee_amount: split.fee_amount,
            net_amount: split.net_amount,
            taxed: split.taxed,
        }
    }
}

/// The persisted state of a token: everything except the event log, which
/// is stored as individual records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenState {
    pub metadata: TokenMetadata,
    pub ownership: OwnershipGate,
    pub treasury: Address,
    pub fee_policy: FeePolicy,
    pub pause: PauseSwitch,
    pub ledger: BalanceLedger,
    pub allowances: AllowanceStore,
}

/// A point a token can be rewound to with [`TaxedToken::rewind`].
#[derive(Debug, Clone)]
#[must_use]
pub struct Checkpoint {
    state: TokenState,
    next_seq: u64,
}

/// A fully validated transfer, ready to commit.
struct TransferPlan {
    split: FeeSplit,
    staged: StagedMoves,
    events: Vec<Notification>,
}

// ---------------------------------------------------------------------------
// TaxedToken
// ---------------------------------------------------------------------------

/// A single taxed-transfer token instance.
#[derive(Debug, Clone)]
pub struct TaxedToken {
    state: TokenState,
    events: EventLog,
}

impl TaxedToken {
    /// Initializes a token owned by `initializer`.
    ///
    /// Mints the initial supply to `initializer` and marks both the
    /// initializer and the treasury exempt. Under the validating variant the
    /// treasury and fee rate are checked exactly as their setters check them.
    ///
    /// # Errors
    ///
    /// - [`TokenError::InvalidAddress`] if `initializer` is the null address,
    ///   or if the treasury is null under the validating variant.
    /// - [`TokenError::InvalidFeeRate`] if the rate exceeds the cap under the
    ///   validating variant.
    pub fn new(config: TokenConfig, initializer: Address) -> TokenResult<Self> {
        if initializer.is_zero() {
            return Err(TokenError::InvalidAddress(
                "initializer cannot be the null address".into(),
            ));
        }

        let mut fee_policy = FeePolicy::new(config.variant, config.fee_rate);
        fee_policy.validate_fee_rate(config.fee_rate)?;
        if config.variant.validates_configuration() && config.treasury.is_zero() {
            return Err(TokenError::InvalidAddress(
                "treasury cannot be the null address".into(),
            ));
        }
        fee_policy.set_exempt(&initializer, true);
        fee_policy.set_exempt(&config.treasury, true);

        let mut token = Self {
            state: TokenState {
                metadata: TokenMetadata {
                    name: config.name,
                    symbol: config.symbol,
                    decimals: TOKEN_DECIMALS,
                },
                ownership: OwnershipGate::new(initializer),
                treasury: config.treasury,
                fee_policy,
                pause: PauseSwitch::new(),
                ledger: BalanceLedger::new(),
                allowances: AllowanceStore::new(),
            },
            events: EventLog::new(),
        };
        token.mint(&initializer, initial_supply())?;

        tracing::info!(
            symbol = %token.state.metadata.symbol,
            owner = %initializer,
            treasury = %token.state.treasury,
            fee_rate = %token.state.fee_policy.fee_rate(),
            variant = %token.state.fee_policy.variant(),
            "token initialized"
        );
        Ok(token)
    }

    /// Restores a token from persisted state and its event history.
    ///
    /// # Errors
    ///
    /// - [`TokenError::ConservationViolated`] if the balances do not sum to
    ///   the total supply.
    /// - [`TokenError::CorruptEventLog`] if the event history has gaps.
    pub fn from_state(state: TokenState, events: Vec<SequencedNotification>) -> TokenResult<Self> {
        if !state.ledger.is_conserved() {
            return Err(TokenError::ConservationViolated {
                total_supply: state.ledger.total_supply(),
                sum: state.ledger.sum_of_balances().unwrap_or(Amount::MAX),
            });
        }
        let events = EventLog::from_entries(events).ok_or(TokenError::CorruptEventLog)?;
        Ok(Self { state, events })
    }

    // -- Value operations ---------------------------------------------------

    /// Moves `amount` from `caller` to `to`, diverting the fee (if any) to
    /// the treasury.
    ///
    /// The null address is not a valid recipient, the same rule `approve`
    /// applies to spenders. The fee leg is exempt from it: under the
    /// non-validating variant a null treasury still collects fees.
    ///
    /// # Errors
    ///
    /// [`TokenError::SystemPaused`], [`TokenError::InvalidAddress`],
    /// [`TokenError::FeeExceedsAmount`], [`TokenError::Overflow`], or
    /// [`TokenError::InsufficientBalance`]. On any error nothing changes.
    pub fn transfer(
        &mut self,
        caller: &Address,
        to: &Address,
        amount: Amount,
    ) -> TokenResult<TransferReceipt> {
        self.state.pause.ensure_active()?;
        ensure_recipient(to)?;
        let plan = self.plan_transfer(caller, to, amount)?;
        Ok(self.commit_transfer(caller, to, plan))
    }

    /// Moves `amount` from `from` to `to` on `spender`'s allowance.
    ///
    /// Allowance consumption and the ledger legs commit together.
    ///
    /// # Errors
    ///
    /// As [`transfer`](Self::transfer), plus
    /// [`TokenError::InsufficientAllowance`].
    pub fn transfer_from(
        &mut self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> TokenResult<TransferReceipt> {
        self.state.pause.ensure_active()?;
        ensure_recipient(to)?;
        let debit = self.state.allowances.stage_consume(from, spender, amount)?;
        let plan = self.plan_transfer(from, to, amount)?;

        self.state.allowances.commit(debit);
        Ok(self.commit_transfer(from, to, plan))
    }

    /// Sets `spender`'s allowance over `caller`'s tokens to `amount`.
    ///
    /// Not a value movement, so it is allowed while paused.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::InvalidAddress`] if `spender` is the null
    /// address.
    pub fn approve(&mut self, caller: &Address, spender: &Address, amount: Amount) -> TokenResult<()> {
        if spender.is_zero() {
            return Err(TokenError::InvalidAddress(
                "spender cannot be the null address".into(),
            ));
        }
        self.state.allowances.approve(caller, spender, amount);
        self.events.append(vec![Notification::Approval {
            owner: *caller,
            spender: *spender,
            amount,
        }]);
        Ok(())
    }

    /// Credits newly created supply. Used once, at initialization.
    fn mint(&mut self, to: &Address, amount: Amount) -> TokenResult<()> {
        self.state.pause.ensure_active()?;
        self.state.ledger.mint(to, amount)?;
        self.events.append(vec![Notification::Transfer {
            from: Address::ZERO,
            to: *to,
            amount,
        }]);
        Ok(())
    }

    fn plan_transfer(&self, from: &Address, to: &Address, amount: Amount) -> TokenResult<TransferPlan> {
        let split = self.state.fee_policy.compute(from, to, amount)?;
        let treasury = self.state.treasury;

        let mut moves = Vec::with_capacity(2);
        let mut events = Vec::with_capacity(3);
        if split.taxed {
            moves.push(Move::new(*from, treasury, split.fee_amount));
            events.push(Notification::Transfer {
                from: *from,
                to: treasury,
                amount: split.fee_amount,
            });
        }
        moves.push(Move::new(*from, *to, split.net_amount));
        events.push(Notification::Transfer {
            from: *from,
            to: *to,
            amount: split.net_amount,
        });
        if split.taxed && self.state.fee_policy.variant().emits_fee_collected() {
            events.push(Notification::FeeCollected {
                from: *from,
                to: *to,
                fee_amount: split.fee_amount,
                net_amount: split.net_amount,
            });
        }

        let staged = self.state.ledger.stage(&moves)?;
        Ok(TransferPlan {
            split,
            staged,
            events,
        })
    }

    fn commit_transfer(&mut self, from: &Address, to: &Address, plan: TransferPlan) -> TransferReceipt {
        self.state.ledger.commit(plan.staged);
        self.events.append(plan.events);

        tracing::debug!(
            from = %from,
            to = %to,
            fee = %plan.split.fee_amount,
            net = %plan.split.net_amount,
            taxed = plan.split.taxed,
            "transfer committed"
        );
        plan.split.into()
    }

    // -- Privileged operations ----------------------------------------------

    /// Reassigns the treasury. The old treasury loses its exemption, the
    /// new one gains it.
    ///
    /// # Errors
    ///
    /// - [`TokenError::Unauthorized`] unless `caller` is the owner.
    /// - [`TokenError::InvalidAddress`] for the null address under the
    ///   validating variant.
    pub fn set_treasury(&mut self, caller: &Address, new_treasury: &Address) -> TokenResult<()> {
        self.state.ownership.authorize(caller)?;
        if self.state.fee_policy.variant().validates_configuration() && new_treasury.is_zero() {
            return Err(TokenError::InvalidAddress(
                "treasury cannot be the null address".into(),
            ));
        }

        let old = self.state.treasury;
        self.state.fee_policy.set_exempt(&old, false);
        self.state.fee_policy.set_exempt(new_treasury, true);
        self.state.treasury = *new_treasury;

        self.events.append(vec![
            Notification::TreasuryChanged {
                old,
                new: *new_treasury,
            },
            Notification::ExemptionChanged {
                account: old,
                exempt: false,
            },
            Notification::ExemptionChanged {
                account: *new_treasury,
                exempt: true,
            },
        ]);
        tracing::info!(old = %old, new = %new_treasury, "treasury changed");
        Ok(())
    }

    /// Changes the fee rate.
    ///
    /// # Errors
    ///
    /// - [`TokenError::Unauthorized`] unless `caller` is the owner.
    /// - [`TokenError::InvalidFeeRate`] above the cap under the validating
    ///   variant. The other variant accepts any rate, including ones that
    ///   make every taxed transfer fail.
    pub fn set_fee_rate(&mut self, caller: &Address, new_rate: Amount) -> TokenResult<()> {
        self.state.ownership.authorize(caller)?;
        self.state.fee_policy.validate_fee_rate(new_rate)?;

        let old = self.state.fee_policy.set_fee_rate(new_rate);
        self.events.append(vec![Notification::FeeRateChanged {
            old,
            new: new_rate,
        }]);
        tracing::info!(old = %old, new = %new_rate, "fee rate changed");
        Ok(())
    }

    /// Sets an account's exemption flag.
    ///
    /// # Errors
    ///
    /// [`TokenError::Unauthorized`] unless `caller` is the owner.
    pub fn set_exemption(&mut self, caller: &Address, account: &Address, exempt: bool) -> TokenResult<()> {
        self.state.ownership.authorize(caller)?;
        self.state.fee_policy.set_exempt(account, exempt);
        self.events.append(vec![Notification::ExemptionChanged {
            account: *account,
            exempt,
        }]);
        tracing::info!(account = %account, exempt, "exemption changed");
        Ok(())
    }

    /// Halts value movement.
    ///
    /// # Errors
    ///
    /// [`TokenError::Unauthorized`] unless `caller` is the owner.
    pub fn pause(&mut self, caller: &Address) -> TokenResult<()> {
        self.state.ownership.authorize(caller)?;
        self.state.pause.pause();
        self.events.append(vec![Notification::Paused { account: *caller }]);
        tracing::info!(by = %caller, "token paused");
        Ok(())
    }

    /// Resumes value movement.
    ///
    /// # Errors
    ///
    /// [`TokenError::Unauthorized`] unless `caller` is the owner.
    pub fn unpause(&mut self, caller: &Address) -> TokenResult<()> {
        self.state.ownership.authorize(caller)?;
        self.state.pause.unpause();
        self.events.append(vec![Notification::Unpaused { account: *caller }]);
        tracing::info!(by = %caller, "token unpaused");
        Ok(())
    }

    // -- Queries ------------------------------------------------------------

    /// The fee-rate cap (200), regardless of whether it is enforced.
    pub fn max_fee_rate(&self) -> Amount {
        FeePolicy::max_fee_rate()
    }

    pub fn current_fee_rate(&self) -> Amount {
        self.state.fee_policy.fee_rate()
    }

    /// `amount * fee_rate / 200`. Under the unconditional variant this is
    /// not what a transfer charges.
    ///
    /// # Errors
    ///
    /// [`TokenError::Overflow`] if `amount * fee_rate` exceeds 256 bits.
    pub fn calculate_tax(&self, amount: Amount) -> TokenResult<Amount> {
        self.state.fee_policy.calculate_tax(amount)
    }

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.state.ledger.balance_of(account)
    }

    pub fn is_exempt(&self, account: &Address) -> bool {
        self.state.fee_policy.is_exempt(account)
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.state.allowances.allowance(owner, spender)
    }

    pub fn total_supply(&self) -> Amount {
        self.state.ledger.total_supply()
    }

    pub fn owner(&self) -> Address {
        self.state.ownership.owner()
    }

    pub fn treasury(&self) -> Address {
        self.state.treasury
    }

    pub fn is_paused(&self) -> bool {
        self.state.pause.is_paused()
    }

    pub fn pause_state(&self) -> PauseState {
        self.state.pause.state()
    }

    pub fn variant(&self) -> FeeVariant {
        self.state.fee_policy.variant()
    }

    pub fn metadata(&self) -> &TokenMetadata {
        &self.state.metadata
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// The persistable state (without the event log).
    pub fn state(&self) -> &TokenState {
        &self.state
    }

    /// `Σ balances == total_supply`.
    pub fn conservation_holds(&self) -> bool {
        self.state.ledger.is_conserved()
    }

    // -- Checkpoints ----------------------------------------------------------

    /// Captures the current state and event position.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            state: self.state.clone(),
            next_seq: self.events.next_seq(),
        }
    }

    /// Undoes every operation committed since `checkpoint` was taken,
    /// including the notifications they appended.
    pub fn rewind(&mut self, checkpoint: Checkpoint) {
        tracing::warn!(
            discarded = self.events.next_seq().saturating_sub(checkpoint.next_seq),
            "rewinding token to checkpoint"
        );
        self.state = checkpoint.state;
        self.events.truncate(checkpoint.next_seq);
    }
}

fn ensure_recipient(to: &Address) -> TokenResult<()> {
    if to.is_zero() {
        return Err(TokenError::InvalidAddress(
            "recipient cannot be the null address".into(),
        ));
    }
    Ok(())
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

    fn config(variant: FeeVariant, rate: u64) -> TokenConfig {
        TokenConfig {
            name: "Levy".into(),
            symbol: "LVY".into(),
            treasury: addr(0xEE),
            fee_rate: Amount::from(rate),
            variant,
        }
    }

    #[test]
    fn initialization_mints_and_exempts() {
        let owner = addr(1);
        let token = TaxedToken::new(config(FeeVariant::ExemptionChecked, 100), owner).unwrap();

        assert_eq!(token.balance_of(&owner), initial_supply());
        assert_eq!(token.total_supply(), initial_supply());
        assert!(token.is_exempt(&owner));
        assert!(token.is_exempt(&addr(0xEE)));
        assert_eq!(token.pause_state(), PauseState::Active);
        assert_eq!(token.metadata().decimals, 18);
        assert_eq!(
            token.events().last().unwrap().event,
            Notification::Transfer {
                from: Address::ZERO,
                to: owner,
                amount: initial_supply(),
            }
        );
    }

    #[test]
    fn mint_is_blocked_while_paused() {
        let owner = addr(1);
        let mut token = TaxedToken::new(config(FeeVariant::ExemptionChecked, 0), owner).unwrap();
        token.pause(&owner).unwrap();
        let supply = token.total_supply();
        let events = token.events().len();

        assert_eq!(
            token.mint(&addr(2), Amount::from(5u64)),
            Err(TokenError::SystemPaused)
        );
        assert_eq!(token.total_supply(), supply);
        assert_eq!(token.events().len(), events);
    }

    #[test]
    fn null_initializer_rejected() {
        let err = TaxedToken::new(config(FeeVariant::ExemptionChecked, 0), Address::ZERO).unwrap_err();
        assert!(matches!(err, TokenError::InvalidAddress(_)));
    }

    #[test]
    fn validating_variant_checks_initial_config() {
        let mut cfg = config(FeeVariant::Unconditional, 201);
        assert!(matches!(
            TaxedToken::new(cfg.clone(), addr(1)),
            Err(TokenError::InvalidFeeRate { .. })
        ));

        cfg.fee_rate = Amount::from(2u64);
        cfg.treasury = Address::ZERO;
        assert!(matches!(
            TaxedToken::new(cfg, addr(1)),
            Err(TokenError::InvalidAddress(_))
        ));
    }

    #[test]
    fn non_validating_variant_accepts_any_initial_config() {
        let mut cfg = config(FeeVariant::ExemptionChecked, 9_999);
        cfg.treasury = Address::ZERO;
        let token = TaxedToken::new(cfg, addr(1)).unwrap();
        assert_eq!(token.treasury(), Address::ZERO);
        assert_eq!(token.current_fee_rate(), Amount::from(9_999u64));
    }

    #[test]
    fn restore_roundtrip_preserves_everything() {
        let owner = addr(1);
        let mut token = TaxedToken::new(config(FeeVariant::ExemptionChecked, 100), owner).unwrap();
        token
            .transfer(&owner, &addr(2), Amount::from(1_000u64))
            .unwrap();

        let restored = TaxedToken::from_state(
            token.state().clone(),
            token.events().iter().cloned().collect(),
        )
        .unwrap();
        assert_eq!(restored.state(), token.state());
        assert_eq!(restored.events(), token.events());
    }

    #[test]
    fn rewind_discards_operations_after_checkpoint() {
        let owner = addr(1);
        let mut token = TaxedToken::new(config(FeeVariant::ExemptionChecked, 100), owner).unwrap();
        let before = token.clone();
        let checkpoint = token.checkpoint();

        token
            .transfer(&owner, &addr(2), Amount::from(1_000u64))
            .unwrap();
        token.approve(&owner, &addr(3), Amount::from(5u64)).unwrap();
        token.pause(&owner).unwrap();
        token.rewind(checkpoint);

        assert_eq!(token.state(), before.state());
        assert_eq!(token.events(), before.events());
        assert_eq!(token.balance_of(&addr(2)), Amount::zero());
        assert!(!token.is_paused());

        // Sequence numbers continue from the checkpoint.
        token.pause(&owner).unwrap();
        assert_eq!(token.events().last().unwrap().seq, before.events().next_seq());
    }

    #[test]
    fn restore_rejects_unbalanced_state() {
        let token = TaxedToken::new(config(FeeVariant::ExemptionChecked, 100), addr(1)).unwrap();
        let mut json = serde_json::to_value(token.state()).unwrap();
        json["ledger"]["total_supply"] = serde_json::to_value(Amount::from(11u64)).unwrap();
        let tampered: TokenState = serde_json::from_value(json).unwrap();

        let err = TaxedToken::from_state(tampered, vec![]).unwrap_err();
        assert!(matches!(err, TokenError::ConservationViolated { .. }));
    }

    #[test]
    fn restore_rejects_event_gaps() {
        let token = TaxedToken::new(config(FeeVariant::ExemptionChecked, 100), addr(1)).unwrap();
        let gap = vec![SequencedNotification {
            seq: 5,
            event: Notification::Paused { account: addr(1) },
        }];
        assert_eq!(
            TaxedToken::from_state(token.state().clone(), gap).unwrap_err(),
            TokenError::CorruptEventLog
        );
    }
}
