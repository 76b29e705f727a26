//! Signer connection and client configuration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use griefing_core::{
    AbiValue, Address, ContractCall, GriefingError, GriefingResult, IdentityProvider,
    LedgerInvoker, Network, Operation, TransactionReceipt, PROTOCOL_VERSION,
};
use serde::{Deserialize, Serialize};

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Network the client talks to.
    pub network: Network,
    /// Protocol version used for registry lookups.
    pub protocol_version: String,
    /// How long to wait for a confirmation before giving up locally.
    /// `None` waits indefinitely.
    pub confirmation_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            network: Network::Rinkeby,
            protocol_version: PROTOCOL_VERSION.to_string(),
            confirmation_timeout: Some(Duration::from_secs(300)),
        }
    }
}

impl ClientConfig {
    /// Create config for a network.
    pub fn for_network(network: Network) -> Self {
        Self {
            network,
            ..Default::default()
        }
    }

    /// Set the protocol version.
    pub fn with_protocol_version(mut self, version: impl Into<String>) -> Self {
        self.protocol_version = version.into();
        self
    }

    /// Set the confirmation timeout.
    pub fn with_confirmation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.confirmation_timeout = timeout;
        self
    }
}

/// The signer's ledger invoker and identity, plus the config to use them with.
#[derive(Clone)]
pub struct Connection {
    ledger: Arc<dyn LedgerInvoker>,
    identity: Arc<dyn IdentityProvider>,
    config: ClientConfig,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Connection {
    pub fn new(
        ledger: Arc<dyn LedgerInvoker>,
        identity: Arc<dyn IdentityProvider>,
        config: ClientConfig,
    ) -> Self {
        Self {
            ledger,
            identity,
            config,
        }
    }

    /// Connect through a wallet that is both invoker and identity provider.
    pub fn from_wallet<W>(wallet: Arc<W>, config: ClientConfig) -> Self
    where
        W: LedgerInvoker + IdentityProvider + 'static,
    {
        Self::new(wallet.clone(), wallet, config)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Current signing identity.
    pub async fn operator(&self) -> GriefingResult<Address> {
        self.identity.current_operator().await
    }

    /// Send a transaction and wait for its receipt.
    ///
    /// Hitting the confirmation timeout only stops the wait; the transaction
    /// may still be mined.
    pub async fn send(
        &self,
        contract: Address,
        operation: Operation,
        args: Vec<AbiValue>,
    ) -> GriefingResult<TransactionReceipt> {
        tracing::debug!(%contract, %operation, "sending transaction");
        let pending = self.ledger.invoke(ContractCall::new(contract, operation, args));

        let receipt = match self.config.confirmation_timeout {
            Some(limit) => tokio::time::timeout(limit, pending).await.map_err(|_| {
                GriefingError::Network(format!(
                    "no confirmation for {} on {} within {:?}; the transaction may still be mined",
                    operation, contract, limit
                ))
            })??,
            None => pending.await?,
        };

        tracing::debug!(
            %contract,
            %operation,
            tx = %receipt.hash_hex(),
            block = receipt.block_number,
            "transaction confirmed"
        );
        Ok(receipt)
    }

    /// Evaluate a read-only call.
    pub async fn query(
        &self,
        contract: Address,
        operation: Operation,
        args: Vec<AbiValue>,
    ) -> GriefingResult<Vec<AbiValue>> {
        self.ledger
            .query(ContractCall::new(contract, operation, args))
            .await
    }
}
