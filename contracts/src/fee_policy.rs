//! # Fee Policy
//!
//! The exemption registry, the current fee rate, and the arithmetic that
//! splits a transfer into a fee leg and a net leg.
//!
//! ## Variants
//!
//! Two deployed formulations exist and both are reproduced exactly:
//!
//! | | [`FeeVariant::Unconditional`] | [`FeeVariant::ExemptionChecked`] |
//! |---|---|---|
//! | Transfer fee | `amount * rate / 100` | `amount * rate / 200` |
//! | Exemptions consulted when moving value | no | yes |
//! | `setFeeRate` cap (200) enforced | yes | no |
//! | Null treasury rejected | yes | no |
//! | `FeeCollected` notification | no | yes |
//!
//! [`FeePolicy::calculate_tax`] always divides by 200, so under the
//! unconditional variant the estimate is half of what a transfer actually
//! charges. Callers must not assume the two agree.

use levy_protocol::config::{ESTIMATE_FEE_DIVISOR, MAX_FEE_RATE, UNCONDITIONAL_FEE_DIVISOR};
use levy_protocol::{Address, Amount};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{TokenError, TokenResult};

// ---------------------------------------------------------------------------
// FeeVariant
// ---------------------------------------------------------------------------

/// Which fee formulation the token runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeVariant {
    /// Variant A: every transfer is taxed at `rate / 100`; configuration
    /// input is validated.
    Unconditional,
    /// Variant B: transfers touching an exempt account are untaxed, others
    /// pay `rate / 200`; configuration input is not validated.
    ExemptionChecked,
}

impl FeeVariant {
    /// Whether `setFeeRate` / `setTreasury` reject out-of-range input.
    pub fn validates_configuration(self) -> bool {
        matches!(self, FeeVariant::Unconditional)
    }

    /// Whether the exemption registry is read on the transfer path.
    pub fn consults_exemptions(self) -> bool {
        matches!(self, FeeVariant::ExemptionChecked)
    }

    /// Whether taxed transfers emit a `FeeCollected` notification.
    pub fn emits_fee_collected(self) -> bool {
        matches!(self, FeeVariant::ExemptionChecked)
    }

    /// Divisor applied to `amount * rate` on the transfer path.
    pub fn transfer_divisor(self) -> u64 {
        match self {
            FeeVariant::Unconditional => UNCONDITIONAL_FEE_DIVISOR,
            FeeVariant::ExemptionChecked => ESTIMATE_FEE_DIVISOR,
        }
    }
}

impl fmt::Display for FeeVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeeVariant::Unconditional => write!(f, "unconditional"),
            FeeVariant::ExemptionChecked => write!(f, "exemption_checked"),
        }
    }
}

impl FromStr for FeeVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "unconditional" | "a" => Ok(FeeVariant::Unconditional),
            "exemption_checked" | "b" => Ok(FeeVariant::ExemptionChecked),
            other => Err(format!("unknown fee variant: {}", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// FeeSplit
// ---------------------------------------------------------------------------

/// Outcome of fee computation for one proposed transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSplit {
    /// Amount routed to the treasury.
    pub fee_amount: Amount,
    /// Amount credited to the recipient.
    pub net_amount: Amount,
    /// `true` when a fee leg is issued.
    pub taxed: bool,
}

impl FeeSplit {
    /// The whole amount moves, no fee leg.
    pub fn untaxed(amount: Amount) -> Self {
        Self {
            fee_amount: Amount::zero(),
            net_amount: amount,
            taxed: false,
        }
    }
}

// ---------------------------------------------------------------------------
// FeePolicy
// ---------------------------------------------------------------------------

/// Fee rate, exemption registry, and variant selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeePolicy {
    variant: FeeVariant,
    fee_rate: Amount,
    exempt: BTreeSet<Address>,
}

impl FeePolicy {
    /// Creates a policy with an empty exemption registry.
    pub fn new(variant: FeeVariant, fee_rate: Amount) -> Self {
        Self {
            variant,
            fee_rate,
            exempt: BTreeSet::new(),
        }
    }

    /// The cap reported by `maxFeeRate()`.
    pub fn max_fee_rate() -> Amount {
        Amount::from(MAX_FEE_RATE)
    }

    pub fn variant(&self) -> FeeVariant {
        self.variant
    }

    pub fn fee_rate(&self) -> Amount {
        self.fee_rate
    }

    pub fn is_exempt(&self, account: &Address) -> bool {
        self.exempt.contains(account)
    }

    /// Exempt accounts in address order.
    pub fn exempt_accounts(&self) -> impl Iterator<Item = &Address> {
        self.exempt.iter()
    }

    /// Sets or clears the exemption flag. Unconditional, no validation.
    pub fn set_exempt(&mut self, account: &Address, exempt: bool) {
        if exempt {
            self.exempt.insert(*account);
        } else {
            self.exempt.remove(account);
        }
    }

    /// Checks a proposed rate against the cap when this variant validates
    /// configuration input. Always succeeds otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::InvalidFeeRate`] if the rate exceeds the cap and
    /// the variant validates.
    pub fn validate_fee_rate(&self, rate: Amount) -> TokenResult<()> {
        let max = Self::max_fee_rate();
        if self.variant.validates_configuration() && rate > max {
            return Err(TokenError::InvalidFeeRate { rate, max });
        }
        Ok(())
    }

    /// Replaces the fee rate and returns the previous one.
    pub fn set_fee_rate(&mut self, rate: Amount) -> Amount {
        std::mem::replace(&mut self.fee_rate, rate)
    }

    /// Pure estimate: `amount * rate / 200`, whichever variant is active.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Overflow`] if `amount * rate` exceeds 256 bits.
    pub fn calculate_tax(&self, amount: Amount) -> TokenResult<Amount> {
        mul_div(amount, self.fee_rate, ESTIMATE_FEE_DIVISOR)
    }

    /// Splits a proposed transfer into fee and net legs.
    ///
    /// # Errors
    ///
    /// - [`TokenError::Overflow`] if `amount * rate` exceeds 256 bits.
    /// - [`TokenError::FeeExceedsAmount`] if the fee is larger than `amount`.
    pub fn compute(&self, from: &Address, to: &Address, amount: Amount) -> TokenResult<FeeSplit> {
        if self.variant.consults_exemptions()
            && (self.is_exempt(from) || self.is_exempt(to) || self.fee_rate.is_zero())
        {
            return Ok(FeeSplit::untaxed(amount));
        }

        let fee = mul_div(amount, self.fee_rate, self.variant.transfer_divisor())?;
        let net = amount
            .checked_sub(fee)
            .ok_or(TokenError::FeeExceedsAmount { fee, amount })?;

        if fee.is_zero() {
            return Ok(FeeSplit::untaxed(amount));
        }

        Ok(FeeSplit {
            fee_amount: fee,
            net_amount: net,
            taxed: true,
        })
    }
}

/// `a * b / divisor` with a checked multiply; the division truncates.
fn mul_div(a: Amount, b: Amount, divisor: u64) -> TokenResult<Amount> {
    let product = a.checked_mul(b).ok_or(TokenError::Overflow)?;
    Ok(product / Amount::from(divisor))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
