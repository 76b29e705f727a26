//! Session that rebuilds handles when the wallet switches network or account.
//!
//! Handles are never rebound in place. Each provider event produces a new
//! connection and bumps the session generation; handles built before the
//! event keep working against their original connection and can be told
//! apart with [`AgreementSession::is_current`].

use std::fmt;
use std::sync::Arc;

use griefing_core::{
    Address, Agreement, ContractRegistry, GriefingError, GriefingResult, IdentityProvider,
    LedgerInvoker, Network,
};

use crate::agreement::AgreementHandle;
use crate::connection::{ClientConfig, Connection};
use crate::token::TokenHandle;

/// Registry name of the staking token.
const TOKEN_CONTRACT: &str = "NMR";

/// Notifications from the wallet environment.
pub enum ProviderEvent {
    /// The wallet now signs with a different account.
    AccountChanged {
        ledger: Arc<dyn LedgerInvoker>,
        identity: Arc<dyn IdentityProvider>,
    },
    /// The wallet moved to another network.
    NetworkChanged {
        network: String,
        ledger: Arc<dyn LedgerInvoker>,
        identity: Arc<dyn IdentityProvider>,
    },
}

impl ProviderEvent {
    pub fn account_changed<W>(wallet: Arc<W>) -> Self
    where
        W: LedgerInvoker + IdentityProvider + 'static,
    {
        Self::AccountChanged {
            ledger: wallet.clone(),
            identity: wallet,
        }
    }

    pub fn network_changed<W>(network: impl Into<String>, wallet: Arc<W>) -> Self
    where
        W: LedgerInvoker + IdentityProvider + 'static,
    {
        Self::NetworkChanged {
            network: network.into(),
            ledger: wallet.clone(),
            identity: wallet,
        }
    }
}

impl fmt::Debug for ProviderEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AccountChanged { .. } => f.write_str("AccountChanged"),
            Self::NetworkChanged { network, .. } => write!(f, "NetworkChanged({})", network),
        }
    }
}

/// Current connection plus the registry used to resolve contracts.
pub struct AgreementSession {
    registry: ContractRegistry,
    connection: Connection,
    generation: u64,
}

impl fmt::Debug for AgreementSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgreementSession")
            .field("connection", &self.connection)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl AgreementSession {
    /// Start a session. The configured network must have deployments for
    /// the configured protocol version.
    pub fn new(registry: ContractRegistry, connection: Connection) -> GriefingResult<Self> {
        let config = connection.config();
        ensure_deployed(&registry, config.network, &config.protocol_version)?;
        Ok(Self {
            registry,
            connection,
            generation: 0,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn network(&self) -> Network {
        self.connection.config().network
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub async fn operator(&self) -> GriefingResult<Address> {
        self.connection.operator().await
    }

    /// Replace the connection in response to `event`.
    ///
    /// On error the session is left unchanged.
    pub fn apply(&mut self, event: ProviderEvent) -> GriefingResult<u64> {
        tracing::info!(?event, generation = self.generation, "provider event");
        let connection = match event {
            ProviderEvent::AccountChanged { ledger, identity } => {
                Connection::new(ledger, identity, self.connection.config().clone())
            }
            ProviderEvent::NetworkChanged {
                network,
                ledger,
                identity,
            } => {
                let config = self.connection.config();
                let unsupported = || GriefingError::UnsupportedNetwork {
                    contract: TOKEN_CONTRACT.to_string(),
                    network: network.clone(),
                    version: config.protocol_version.clone(),
                };
                let parsed: Network = network.parse().map_err(|_| unsupported())?;
                ensure_deployed(&self.registry, parsed, &config.protocol_version)?;
                let config = ClientConfig {
                    network: parsed,
                    ..config.clone()
                };
                Connection::new(ledger, identity, config)
            }
        };

        self.connection = connection;
        self.generation += 1;
        Ok(self.generation)
    }

    /// Build a handle for `agreement` on the current connection.
    pub fn agreement(&self, agreement: Agreement) -> AgreementHandle {
        AgreementHandle::new(agreement, self.connection.clone()).with_generation(self.generation)
    }

    /// Build a fresh handle for the same agreement on the current connection.
    pub fn rebind(&self, handle: &AgreementHandle) -> AgreementHandle {
        self.agreement(handle.agreement().clone())
    }

    /// Whether `handle` was built after the latest provider event.
    pub fn is_current(&self, handle: &AgreementHandle) -> bool {
        handle.generation() == self.generation
    }

    /// Resolve the staking token on the current network.
    pub fn token(&self) -> GriefingResult<TokenHandle> {
        let config = self.connection.config();
        let binding = self.registry.resolve(
            TOKEN_CONTRACT,
            config.network.as_str(),
            &config.protocol_version,
        )?;
        TokenHandle::from_binding(&binding, self.connection.clone())
    }
}

fn ensure_deployed(registry: &ContractRegistry, network: Network, version: &str) -> GriefingResult<()> {
    if registry.networks(version).contains(&network) {
        Ok(())
    } else {
        Err(GriefingError::UnsupportedNetwork {
            contract: TOKEN_CONTRACT.to_string(),
            network: network.to_string(),
            version: version.to_string(),
        })
    }
}
