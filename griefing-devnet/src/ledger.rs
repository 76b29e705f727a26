//! In-memory chain: blocks, signed transactions and contract dispatch.

use std::collections::HashMap;

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use griefing_core::{
    AbiValue, Address, AgreementVariant, ContractCall, ContractRegistry, GriefingError,
    GriefingResult, Network, Operation, Parties, TransactionReceipt,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use crate::config::DevnetConfig;
use crate::contracts::{CallContext, GriefingContract, Revert, Token};

/// Derive a ledger address from a verifying key.
pub fn address_of(key: &VerifyingKey) -> Address {
    let digest = Sha256::digest(key.as_bytes());
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&digest[12..]);
    Address::from_bytes(bytes)
}

/// The signed part of a transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnsignedTransaction {
    pub from: Address,
    pub nonce: u64,
    pub call: ContractCall,
}

impl UnsignedTransaction {
    pub fn signing_bytes(&self) -> GriefingResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// A transaction with its ed25519 signature.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub tx: UnsignedTransaction,
    pub public_key: VerifyingKey,
    pub signature: Signature,
}

struct ChainState {
    block_number: u64,
    timestamp: u64,
    token: Token,
    agreements: HashMap<Address, GriefingContract>,
    nonces: HashMap<Address, u64>,
    deployed: u64,
}

impl ChainState {
    fn next_contract_address(&mut self) -> Address {
        self.deployed += 1;
        let digest = Sha256::digest(format!("devnet-contract-{}", self.deployed).as_bytes());
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest[..20]);
        Address::from_bytes(bytes)
    }

    fn dispatch(
        &mut self,
        ctx: CallContext,
        call: &ContractCall,
    ) -> Result<Vec<griefing_core::EmittedEvent>, Revert> {
        if call.contract == self.token.address {
            return self.token.execute(ctx, call.operation, &call.args);
        }
        let agreement = self
            .agreements
            .get_mut(&call.contract)
            .ok_or(Revert::NoContract(call.contract))?;
        agreement.execute(&mut self.token, ctx, call.operation, &call.args)
    }
}

/// A single-sequencer in-memory ledger.
///
/// Every transaction mines its own block. State changes of a reverted
/// transaction are discarded.
pub struct MemoryLedger {
    config: DevnetConfig,
    state: Mutex<ChainState>,
}

impl MemoryLedger {
    /// Create a ledger with a mintable staking token at genesis.
    pub fn new(config: DevnetConfig) -> GriefingResult<Self> {
        config.validate()?;
        let mut state = ChainState {
            block_number: 0,
            timestamp: config.genesis_timestamp,
            token: Token::new(Address::ZERO, true),
            agreements: HashMap::new(),
            nonces: HashMap::new(),
            deployed: 0,
        };
        state.token.address = state.next_contract_address();
        tracing::info!(token = %state.token.address, "devnet genesis");

        Ok(Self {
            config,
            state: Mutex::new(state),
        })
    }

    pub fn config(&self) -> &DevnetConfig {
        &self.config
    }

    pub async fn token_address(&self) -> Address {
        self.state.lock().await.token.address
    }

    /// Current block timestamp.
    pub async fn now(&self) -> u64 {
        self.state.lock().await.timestamp
    }

    pub async fn block_number(&self) -> u64 {
        self.state.lock().await.block_number
    }

    /// Move the clock forward without mining.
    pub async fn advance_time(&self, seconds: u64) {
        let mut state = self.state.lock().await;
        state.timestamp = state.timestamp.saturating_add(seconds);
        tracing::debug!(timestamp = state.timestamp, "clock advanced");
    }

    /// Mint the configured initial balance to `account`.
    pub async fn fund(&self, account: Address) -> GriefingResult<()> {
        let value = self.config.initial_balance_units()?;
        self.state
            .lock()
            .await
            .token
            .mint(account, value)
            .map_err(|e| GriefingError::InvalidAmount(format!("cannot fund {}: {}", account, e)))?;
        Ok(())
    }

    pub async fn balance_of(&self, account: Address) -> u128 {
        self.state.lock().await.token.balance_of(account)
    }

    /// Deploy an agreement with the configured cost ratio and countdown length.
    pub async fn deploy_agreement(&self, variant: AgreementVariant, parties: Parties) -> GriefingResult<Address> {
        let cost_ratio = self.config.cost_ratio_units()?;
        let mut state = self.state.lock().await;
        let address = state.next_contract_address();
        state.agreements.insert(
            address,
            GriefingContract {
                address,
                variant,
                staker: parties.staker,
                counterparty: parties.counterparty,
                stake: 0,
                cost_ratio,
                countdown_length: self.config.countdown_length,
                deadline: None,
            },
        );
        tracing::info!(%address, %variant, staker = %parties.staker, counterparty = %parties.counterparty, "agreement deployed");
        Ok(address)
    }

    /// Registry listing the devnet token and agreement templates under `network`.
    pub async fn registry(&self, network: Network) -> ContractRegistry {
        let token = self.token_address().await;
        let mut registry = ContractRegistry::new();
        registry.insert(self.config.protocol_version.clone(), network, "NMR", token);
        registry
    }

    pub async fn nonce_of(&self, account: Address) -> u64 {
        self.state.lock().await.nonces.get(&account).copied().unwrap_or(0)
    }

    /// Verify, execute and mine a signed transaction.
    pub async fn submit(&self, signed: SignedTransaction) -> GriefingResult<TransactionReceipt> {
        let payload = signed.tx.signing_bytes()?;
        if address_of(&signed.public_key) != signed.tx.from {
            return Err(GriefingError::Network(
                "signer key does not match sender".to_string(),
            ));
        }
        signed
            .public_key
            .verify(&payload, &signed.signature)
            .map_err(|_| GriefingError::Network("invalid transaction signature".to_string()))?;

        let mut state = self.state.lock().await;
        let from = signed.tx.from;
        let expected_nonce = state.nonces.get(&from).copied().unwrap_or(0);
        if signed.tx.nonce != expected_nonce {
            return Err(GriefingError::Network(format!(
                "nonce {} rejected, expected {}",
                signed.tx.nonce, expected_nonce
            )));
        }

        let call = &signed.tx.call;
        let timestamp = state.timestamp.saturating_add(self.config.block_interval);
        let ctx = CallContext {
            sender: from,
            timestamp,
        };

        // contracts mutate a scratch copy; only a successful call is committed
        let token = state.token.clone();
        let agreement = state.agreements.get(&call.contract).cloned();
        let result = state.dispatch(ctx, call);

        // nonce is consumed and a block is mined whether or not the call reverts
        state.nonces.insert(from, expected_nonce + 1);
        state.block_number += 1;
        state.timestamp = timestamp;

        let events = match result {
            Ok(events) => events,
            Err(revert) => {
                state.token = token;
                if let Some(agreement) = agreement {
                    state.agreements.insert(call.contract, agreement);
                }
                tracing::warn!(%from, contract = %call.contract, operation = %call.operation, %revert, "transaction reverted");
                return Err(GriefingError::TransactionReverted {
                    contract: call.contract,
                    operation: call.operation.to_string(),
                    reason: Some(revert.to_string()),
                });
            }
        };

        let mut hasher = Sha256::new();
        hasher.update(&payload);
        hasher.update(signed.signature.to_bytes());
        let receipt = TransactionReceipt {
            transaction_hash: hasher.finalize().to_vec(),
            block_number: state.block_number,
            block_timestamp: state.timestamp,
            from,
            to: call.contract,
            events,
        };
        tracing::debug!(tx = %receipt.hash_hex(), block = receipt.block_number, operation = %call.operation, "transaction mined");
        Ok(receipt)
    }

    /// Evaluate a read-only call.
    pub async fn query(&self, call: &ContractCall) -> GriefingResult<Vec<AbiValue>> {
        let state = self.state.lock().await;
        match call.operation {
            Operation::GetAgreementStatus => state
                .agreements
                .get(&call.contract)
                .map(GriefingContract::status)
                .ok_or_else(|| GriefingError::TransactionReverted {
                    contract: call.contract,
                    operation: call.operation.to_string(),
                    reason: Some(Revert::NoContract(call.contract).to_string()),
                }),
            other => Err(GriefingError::TransactionReverted {
                contract: call.contract,
                operation: other.to_string(),
                reason: Some(Revert::UnknownFunction(other).to_string()),
            }),
        }
    }
}
