//! Staking token handle.

use griefing_core::{
    amount, AbiValue, Address, ContractAbi, ContractBinding, GriefingError, GriefingResult,
    Operation, TransactionReceipt,
};

use crate::connection::Connection;

/// Handle on the NMR staking token.
///
/// Staking pulls tokens from the staker through an allowance, so an
/// agreement must be approved as spender before `stake` can succeed.
#[derive(Debug, Clone)]
pub struct TokenHandle {
    address: Address,
    abi: ContractAbi,
    connection: Connection,
}

impl TokenHandle {
    pub fn new(address: Address, abi: ContractAbi, connection: Connection) -> Self {
        Self {
            address,
            abi,
            connection,
        }
    }

    /// Build from a registry binding.
    pub fn from_binding(binding: &ContractBinding, connection: Connection) -> GriefingResult<Self> {
        match binding.abi {
            Some(abi @ (ContractAbi::NumeraireToken | ContractAbi::MockNumeraireToken)) => {
                Ok(Self::new(binding.address, abi, connection))
            }
            _ => Err(GriefingError::UnsupportedOperation {
                operation: "token".to_string(),
                variant: binding.name.clone(),
            }),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn abi(&self) -> ContractAbi {
        self.abi
    }

    /// Set `spender`'s allowance to `amount`.
    pub async fn approve(&self, spender: Address, amount: &str) -> GriefingResult<TransactionReceipt> {
        let units = amount::to_base_units(amount)?;
        self.connection
            .send(
                self.address,
                Operation::Approve,
                vec![AbiValue::Address(spender), AbiValue::Uint(units)],
            )
            .await
    }

    /// Move `spender`'s allowance from `old` to `new`; `None` grants the maximum.
    ///
    /// The ledger rejects the change if the current allowance is not `old`.
    pub async fn change_approval(
        &self,
        spender: Address,
        old: &str,
        new: Option<&str>,
    ) -> GriefingResult<TransactionReceipt> {
        let old_units = amount::to_base_units(old)?;
        let new_units = match new {
            Some(new) => amount::to_base_units(new)?,
            None => u128::MAX,
        };
        self.connection
            .send(
                self.address,
                Operation::ChangeApproval,
                vec![
                    AbiValue::Address(spender),
                    AbiValue::Uint(old_units),
                    AbiValue::Uint(new_units),
                ],
            )
            .await
    }

    /// Mint test tokens to `to`. Only the test-network token can mint.
    pub async fn mint_mock_tokens(&self, to: Address, amount: &str) -> GriefingResult<TransactionReceipt> {
        if self.abi != ContractAbi::MockNumeraireToken {
            return Err(GriefingError::UnsupportedOperation {
                operation: Operation::MintMockTokens.to_string(),
                variant: "mainnet token".to_string(),
            });
        }
        let units = amount::to_positive_base_units(amount)?;
        self.connection
            .send(
                self.address,
                Operation::MintMockTokens,
                vec![AbiValue::Address(to), AbiValue::Uint(units)],
            )
            .await
    }
}
