//! # Ownership Gate
//!
//! The single administrative authority. Every privileged token operation
//! calls [`OwnershipGate::authorize`] before reading or writing anything
//! else. Transferring ownership is not supported: the owner is fixed at
//! initialization.

use levy_protocol::Address;
use serde::{Deserialize, Serialize};

use crate::error::{TokenError, TokenResult};

/// Holds the current owner identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipGate {
    owner: Address,
}

impl OwnershipGate {
    pub fn new(owner: Address) -> Self {
        Self { owner }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn is_owner(&self, caller: &Address) -> bool {
        self.owner == *caller
    }

    /// Fails with [`TokenError::Unauthorized`] unless `caller` is the owner.
    pub fn authorize(&self, caller: &Address) -> TokenResult<()> {
        if !self.is_owner(caller) {
            tracing::warn!(caller = %caller, "privileged call rejected");
            return Err(TokenError::Unauthorized { caller: *caller });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_is_authorized() {
        let owner = Address::new([1u8; 20]);
        let gate = OwnershipGate::new(owner);
        assert!(gate.authorize(&owner).is_ok());
        assert_eq!(gate.owner(), owner);
    }

    #[test]
    fn anyone_else_is_rejected() {
        let gate = OwnershipGate::new(Address::new([1u8; 20]));
        let intruder = Address::new([2u8; 20]);
        assert_eq!(
            gate.authorize(&intruder),
            Err(TokenError::Unauthorized { caller: intruder })
        );
        assert!(gate.authorize(&Address::ZERO).is_err());
    }
}
