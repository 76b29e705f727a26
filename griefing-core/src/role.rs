//! Role checks for agreement parties.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::{GriefingError, GriefingResult};

/// A party role within an agreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Party whose funds are at risk.
    Staker,
    /// Party who may reward, punish or release the stake.
    Counterparty,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Staker => write!(f, "staker"),
            Self::Counterparty => write!(f, "counterparty"),
        }
    }
}

/// The two parties of an agreement. Fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parties {
    pub staker: Address,
    pub counterparty: Address,
}

impl Parties {
    pub fn new(staker: Address, counterparty: Address) -> Self {
        Self {
            staker,
            counterparty,
        }
    }

    /// Address that holds `role`.
    pub fn holder(&self, role: Role) -> Address {
        match role {
            Role::Staker => self.staker,
            Role::Counterparty => self.counterparty,
        }
    }

    /// Check that `operator` holds `role` in this agreement.
    pub fn authorize(&self, operator: Address, role: Role) -> GriefingResult<()> {
        assert_role(operator, self.holder(role), role)
    }
}

/// Fail with [`GriefingError::Authorization`] unless `operator` is `expected`.
///
/// Addresses are parsed values, so the comparison ignores the hex case of
/// whatever text they were built from.
pub fn assert_role(operator: Address, expected: Address, role: Role) -> GriefingResult<()> {
    if operator == expected {
        return Ok(());
    }
    tracing::debug!(%role, %operator, %expected, "role check failed");
    Err(GriefingError::Authorization {
        role,
        operator,
        expected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parties() -> Parties {
        Parties::new(
            Address::parse("0x00000000000000000000000000000000000000aa").unwrap(),
            Address::parse("0x00000000000000000000000000000000000000bb").unwrap(),
        )
    }

    #[test]
    fn matching_operator_passes() {
        let p = parties();
        assert!(p.authorize(p.staker, Role::Staker).is_ok());
        assert!(p.authorize(p.counterparty, Role::Counterparty).is_ok());
    }

    #[test]
    fn mixed_case_text_is_the_same_operator() {
        let expected = Address::parse("0xABCDEF0000000000000000000000000000000001").unwrap();
        let operator = Address::parse("0xabcdef0000000000000000000000000000000001").unwrap();
        assert!(assert_role(operator, expected, Role::Staker).is_ok());
    }

    #[test]
    fn mismatch_carries_role_and_both_addresses() {
        let p = parties();
        let err = p.authorize(p.counterparty, Role::Staker).unwrap_err();
        match err {
            GriefingError::Authorization {
                role,
                operator,
                expected,
            } => {
                assert_eq!(role, Role::Staker);
                assert_eq!(operator, p.counterparty);
                assert_eq!(expected, p.staker);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn role_display() {
        assert_eq!(Role::Staker.to_string(), "staker");
        assert_eq!(Role::Counterparty.to_string(), "counterparty");
    }
}
