//! Devnet account: signs transactions and acts as both collaborators of the SDK.

use std::sync::Arc;

use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey};
use griefing_core::{
    AbiValue, Address, ContractCall, GriefingError, GriefingResult, IdentityProvider, LedgerInvoker,
    TransactionReceipt,
};
use rand::rngs::OsRng;
use tokio::sync::Mutex;

use crate::ledger::{address_of, MemoryLedger, SignedTransaction, UnsignedTransaction};

/// An ed25519 account on a [`MemoryLedger`].
pub struct DevnetWallet {
    ledger: Arc<MemoryLedger>,
    signing_key: SigningKey,
    address: Address,
    next_nonce: Arc<Mutex<u64>>,
}

impl DevnetWallet {
    /// Create a wallet with a fresh random key.
    pub fn generate(ledger: Arc<MemoryLedger>) -> Self {
        Self::from_key(ledger, SigningKey::generate(&mut OsRng))
    }

    pub fn from_key(ledger: Arc<MemoryLedger>, signing_key: SigningKey) -> Self {
        let address = address_of(&signing_key.verifying_key());
        Self {
            ledger,
            signing_key,
            address,
            next_nonce: Arc::new(Mutex::new(0)),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn ledger(&self) -> &Arc<MemoryLedger> {
        &self.ledger
    }

    fn sign(&self, tx: UnsignedTransaction) -> GriefingResult<SignedTransaction> {
        let payload = tx.signing_bytes()?;
        Ok(SignedTransaction {
            signature: self.signing_key.sign(&payload),
            public_key: self.signing_key.verifying_key(),
            tx,
        })
    }
}

#[async_trait]
impl IdentityProvider for DevnetWallet {
    async fn current_operator(&self) -> GriefingResult<Address> {
        Ok(self.address)
    }
}

#[async_trait]
impl LedgerInvoker for DevnetWallet {
    /// Broadcast and wait for confirmation.
    ///
    /// Broadcast happens on a spawned task, so a caller that stops waiting
    /// does not stop the transaction from being mined.
    async fn invoke(&self, call: ContractCall) -> GriefingResult<TransactionReceipt> {
        let mut nonce = Arc::clone(&self.next_nonce).lock_owned().await;
        let signed = self.sign(UnsignedTransaction {
            from: self.address,
            nonce: *nonce,
            call,
        })?;
        tracing::debug!(from = %self.address, nonce = *nonce, operation = %signed.tx.call.operation, "broadcasting");

        let ledger = Arc::clone(&self.ledger);
        let delay = ledger.config().confirmation_delay;
        let pending = tokio::spawn(async move {
            let result = ledger.submit(signed).await;
            if matches!(result, Ok(_) | Err(GriefingError::TransactionReverted { .. })) {
                *nonce += 1;
            }
            drop(nonce);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            result
        });

        pending
            .await
            .map_err(|e| GriefingError::Network(format!("confirmation task failed: {}", e)))?
    }

    async fn query(&self, call: ContractCall) -> GriefingResult<Vec<AbiValue>> {
        self.ledger.query(&call).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DevnetConfig;
    use griefing_core::amount::UNIT;
    use griefing_core::Operation;

    fn ledger() -> Arc<MemoryLedger> {
        Arc::new(MemoryLedger::new(DevnetConfig::default()).unwrap())
    }

    #[tokio::test]
    async fn approve_is_mined_and_nonce_advances() {
        let ledger = ledger();
        let wallet = DevnetWallet::generate(Arc::clone(&ledger));
        let token = ledger.token_address().await;

        let receipt = wallet
            .invoke(ContractCall::new(
                token,
                Operation::Approve,
                vec![AbiValue::Address(Address::ZERO), AbiValue::Uint(UNIT)],
            ))
            .await
            .unwrap();

        assert_eq!(receipt.from, wallet.address());
        assert_eq!(receipt.block_number, 1);
        assert_eq!(receipt.transaction_hash.len(), 32);
        assert_eq!(ledger.nonce_of(wallet.address()).await, 1);
    }

    #[tokio::test]
    async fn revert_consumes_nonce_and_keeps_state() {
        let ledger = ledger();
        let wallet = DevnetWallet::generate(Arc::clone(&ledger));
        let token = ledger.token_address().await;

        let err = wallet
            .invoke(ContractCall::new(token, Operation::Punish, vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, GriefingError::TransactionReverted { .. }));
        assert_eq!(ledger.nonce_of(wallet.address()).await, 1);

        wallet
            .invoke(ContractCall::new(
                token,
                Operation::MintMockTokens,
                vec![AbiValue::Address(wallet.address()), AbiValue::Uint(UNIT)],
            ))
            .await
            .unwrap();
        assert_eq!(ledger.balance_of(wallet.address()).await, UNIT);
    }

    #[tokio::test]
    async fn forged_signature_is_rejected() {
        let ledger = ledger();
        let honest = DevnetWallet::generate(Arc::clone(&ledger));
        let forger = DevnetWallet::generate(Arc::clone(&ledger));

        let mut signed = forger
            .sign(UnsignedTransaction {
                from: forger.address(),
                nonce: 0,
                call: ContractCall::new(Address::ZERO, Operation::Approve, vec![]),
            })
            .unwrap();
        signed.tx.from = honest.address();

        let err = ledger.submit(signed).await.unwrap_err();
        assert!(matches!(err, GriefingError::Network(_)));
        assert_eq!(ledger.block_number().await, 0);
    }

    #[tokio::test]
    async fn operator_is_the_wallet_address() {
        let wallet = DevnetWallet::generate(ledger());
        assert_eq!(wallet.current_operator().await.unwrap(), wallet.address());
    }
}
