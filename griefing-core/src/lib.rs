//! # griefing-core
//!
//! Core library for staking and griefing agreements.
//!
//! This crate provides the types shared by the client SDK and ledger
//! implementations: addresses, party roles, fixed-point amount conversion,
//! ABI tuple decoding, event field extraction, agreement variants and their
//! countdown lifecycle, the contract registry, and the collaborator traits a
//! ledger backend implements.

pub mod abi;
pub mod address;
pub mod agreement;
pub mod amount;
pub mod error;
pub mod event;
pub mod ledger;
pub mod lifecycle;
pub mod receipt;
pub mod registry;
pub mod role;

pub use abi::{AbiType, AbiValue};
pub use address::Address;
pub use agreement::{
    Agreement, AgreementStatus, AgreementVariant, CountdownStatus, Operation, PunishResult,
    StakeAdjustment, WithdrawRequest, WithdrawResult,
};
pub use error::{GriefingError, GriefingResult};
pub use event::{EventMatch, ExtractedField};
pub use ledger::{ContractCall, IdentityProvider, LedgerInvoker};
pub use lifecycle::CountdownPhase;
pub use receipt::{EmittedEvent, TransactionReceipt};
pub use registry::{ContractAbi, ContractBinding, ContractRegistry, Network};
pub use role::{assert_role, Parties, Role};

/// Default protocol version of the deployed contracts.
pub const PROTOCOL_VERSION: &str = "1.2.0";
