//! Contract address registry keyed by protocol version and network.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::{GriefingError, GriefingResult};

/// Networks the contracts are deployed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Mainnet.
    Homestead,
    Rinkeby,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Homestead => "homestead",
            Self::Rinkeby => "rinkeby",
        }
    }

    pub fn is_mainnet(&self) -> bool {
        matches!(self, Self::Homestead)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = GriefingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "homestead" | "mainnet" => Ok(Self::Homestead),
            "rinkeby" => Ok(Self::Rinkeby),
            other => Err(GriefingError::UnsupportedNetwork {
                contract: "*".to_string(),
                network: other.to_string(),
                version: "*".to_string(),
            }),
        }
    }
}

/// ABI a resolved contract speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContractAbi {
    SimpleGriefing,
    CountdownGriefing,
    NumeraireToken,
    /// Test-network token that can mint.
    MockNumeraireToken,
}

impl ContractAbi {
    /// ABI for a registry contract name on `network`.
    pub fn for_contract(name: &str, network: Network) -> Option<Self> {
        match name {
            "SimpleGriefing" => Some(Self::SimpleGriefing),
            "CountdownGriefing" => Some(Self::CountdownGriefing),
            "NMR" if network.is_mainnet() => Some(Self::NumeraireToken),
            "NMR" => Some(Self::MockNumeraireToken),
            _ => None,
        }
    }
}

/// A resolved contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractBinding {
    pub name: String,
    pub address: Address,
    pub network: Network,
    pub abi: Option<ContractAbi>,
}

/// Deployed contract addresses.
///
/// JSON shape: `{ "<version>": { "<network>": { "<contract>": "0x..." } } }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractRegistry {
    versions: BTreeMap<String, BTreeMap<String, BTreeMap<String, Address>>>,
}

impl ContractRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> GriefingResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Add or replace one deployment.
    pub fn insert(
        &mut self,
        version: impl Into<String>,
        network: Network,
        contract: impl Into<String>,
        address: Address,
    ) -> &mut Self {
        self.versions
            .entry(version.into())
            .or_default()
            .entry(network.as_str().to_string())
            .or_default()
            .insert(contract.into(), address);
        self
    }

    /// Resolve `contract` on `network` for protocol `version`.
    pub fn resolve(&self, contract: &str, network: &str, version: &str) -> GriefingResult<ContractBinding> {
        let unsupported = || GriefingError::UnsupportedNetwork {
            contract: contract.to_string(),
            network: network.to_string(),
            version: version.to_string(),
        };

        let parsed: Network = network.parse().map_err(|_| unsupported())?;
        let address = self
            .versions
            .get(version)
            .and_then(|networks| networks.get(parsed.as_str()))
            .and_then(|contracts| contracts.get(contract))
            .copied()
            .ok_or_else(unsupported)?;

        tracing::debug!(contract, network = %parsed, version, %address, "resolved contract");
        Ok(ContractBinding {
            name: contract.to_string(),
            address,
            network: parsed,
            abi: ContractAbi::for_contract(contract, parsed),
        })
    }

    /// Networks with deployments for `version`.
    pub fn networks(&self, version: &str) -> Vec<Network> {
        self.versions
            .get(version)
            .map(|networks| networks.keys().filter_map(|n| n.parse().ok()).collect())
            .unwrap_or_default()
    }
}
