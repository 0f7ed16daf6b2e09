//! # Protocol Configuration & Constants
//!
//! Every magic number in Levy lives here. The fee constants in particular
//! are consensus-level: the two divisors below are intentionally different,
//! and code that "fixes" one to match the other changes observable behavior.

use crate::types::Amount;

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// Crate-independent protocol version. Bump when the persisted state layout
/// or the fee arithmetic changes.
pub const PROTOCOL_VERSION: &str = "0.1.0";

/// Version tag written next to every persisted token snapshot.
pub const STATE_LAYOUT_VERSION: u16 = 1;

// ---------------------------------------------------------------------------
// Supply
// ---------------------------------------------------------------------------

/// Decimal places of the token. 18, same as every ERC-20 worth integrating with.
pub const TOKEN_DECIMALS: u8 = 18;

/// Whole tokens minted to the initializer at genesis.
pub const INITIAL_SUPPLY_WHOLE_TOKENS: u64 = 1_000_000;

/// The genesis mint in the smallest denomination: `1_000_000 × 10^18`.
pub fn initial_supply() -> Amount {
    Amount::from(INITIAL_SUPPLY_WHOLE_TOKENS) * Amount::exp10(TOKEN_DECIMALS as usize)
}

// ---------------------------------------------------------------------------
// Fee Parameters
// ---------------------------------------------------------------------------

/// Upper bound on the fee rate, enforced only by the unconditional variant's
/// configuration path. Reported by `maxFeeRate()` regardless of variant.
pub const MAX_FEE_RATE: u64 = 200;

/// Divisor applied by the unconditional variant when moving value.
pub const UNCONDITIONAL_FEE_DIVISOR: u64 = 100;

/// Divisor of the `calculateTax` estimate, and of the exemption-checked
/// variant's transfer path.
pub const ESTIMATE_FEE_DIVISOR: u64 = 200;

// ---------------------------------------------------------------------------
// Node Defaults
// ---------------------------------------------------------------------------

/// Default JSON-RPC / REST port.
pub const DEFAULT_RPC_PORT: u16 = 9841;

/// Default metrics (Prometheus) port.
pub const DEFAULT_METRICS_PORT: u16 = 9842;

/// Name of the node configuration file inside the data directory.
pub const CONFIG_FILE_NAME: &str = "levy.toml";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_supply_is_one_million_whole_tokens() {
        let expected = Amount::from_dec_str("1000000000000000000000000").unwrap();
        assert_eq!(initial_supply(), expected);
    }

    #[test]
    fn fee_divisors_differ() {
        // The estimate and the unconditional transfer path use different
        // divisors. Pin both.
        assert_eq!(UNCONDITIONAL_FEE_DIVISOR, 100);
        assert_eq!(ESTIMATE_FEE_DIVISOR, 200);
        assert_ne!(UNCONDITIONAL_FEE_DIVISOR, ESTIMATE_FEE_DIVISOR);
    }

    #[test]
    fn max_fee_rate_is_two_hundred_units() {
        assert_eq!(MAX_FEE_RATE, 200);
    }

    #[test]
    fn default_ports_are_distinct() {
        assert_ne!(DEFAULT_RPC_PORT, DEFAULT_METRICS_PORT);
    }
}
