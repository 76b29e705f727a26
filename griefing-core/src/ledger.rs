//! Collaborator interfaces: the ledger invoker and the identity provider.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::abi::AbiValue;
use crate::address::Address;
use crate::agreement::Operation;
use crate::error::GriefingResult;
use crate::receipt::TransactionReceipt;

/// A named operation on a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCall {
    pub contract: Address,
    pub operation: Operation,
    pub args: Vec<AbiValue>,
}

impl ContractCall {
    pub fn new(contract: Address, operation: Operation, args: Vec<AbiValue>) -> Self {
        Self {
            contract,
            operation,
            args,
        }
    }
}

/// Signs, broadcasts and awaits confirmation of contract calls.
///
/// Implementations report a ledger rejection as
/// [`GriefingError::TransactionReverted`](crate::GriefingError::TransactionReverted)
/// and connectivity problems as
/// [`GriefingError::Network`](crate::GriefingError::Network).
#[async_trait]
pub trait LedgerInvoker: Send + Sync {
    /// Send `call` as a transaction and wait until it is mined.
    async fn invoke(&self, call: ContractCall) -> GriefingResult<TransactionReceipt>;

    /// Evaluate a read-only call against the latest state.
    async fn query(&self, call: ContractCall) -> GriefingResult<Vec<AbiValue>>;
}

/// Supplies the identity transactions are signed with.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_operator(&self) -> GriefingResult<Address>;
}
