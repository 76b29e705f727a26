//! Devnet - an in-memory ledger for griefing agreements.
//!
//! Runs the staking token and agreement contracts in process, mining one
//! block per transaction. [`DevnetWallet`] implements both collaborator
//! traits of the client SDK, so an `AgreementHandle` can be driven against
//! it exactly as against a real network.

mod config;
mod contracts;
mod ledger;
mod wallet;

pub use config::DevnetConfig;
pub use contracts::{CallContext, GriefingContract, Revert, Token};
pub use ledger::{address_of, MemoryLedger, SignedTransaction, UnsignedTransaction};
pub use wallet::DevnetWallet;
