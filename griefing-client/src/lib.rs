//! Griefing Client SDK - staking and griefing agreement client library.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use griefing_client::{AgreementHandle, ClientConfig, Connection};
//! use griefing_core::{Address, Agreement, AgreementVariant, Parties, PROTOCOL_VERSION};
//! use griefing_devnet::{DevnetConfig, DevnetWallet, MemoryLedger};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ledger = Arc::new(MemoryLedger::new(DevnetConfig::default())?);
//!     let staker = Arc::new(DevnetWallet::generate(ledger.clone()));
//!     let counterparty = Address::parse("0x00000000000000000000000000000000000000bb")?;
//!
//!     let parties = Parties::new(staker.address(), counterparty);
//!     let address = ledger.deploy_agreement(AgreementVariant::Countdown, parties).await?;
//!
//!     let handle = AgreementHandle::new(
//!         Agreement {
//!             address,
//!             variant: AgreementVariant::Countdown,
//!             parties,
//!             protocol_version: PROTOCOL_VERSION.to_string(),
//!         },
//!         Connection::from_wallet(staker, ClientConfig::default()),
//!     );
//!
//!     let request = handle.request_withdraw().await?;
//!     println!("withdrawable after {}", request.deadline);
//!
//!     Ok(())
//! }
//! ```

mod agreement;
mod connection;
mod session;
mod token;

pub use agreement::AgreementHandle;
pub use connection::{ClientConfig, Connection};
pub use session::{AgreementSession, ProviderEvent};
pub use token::TokenHandle;
