//! Walk a countdown agreement through its whole lifecycle on the devnet.
//!
//! Run with `RUST_LOG=debug` to see every transaction.

use std::sync::Arc;

use griefing_client::{AgreementHandle, ClientConfig, Connection, TokenHandle};
use griefing_core::{Agreement, AgreementVariant, ContractAbi, Parties, PROTOCOL_VERSION};
use griefing_devnet::{DevnetConfig, DevnetWallet, MemoryLedger};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = DevnetConfig::default();
    let countdown = config.countdown_length;
    let ledger = Arc::new(MemoryLedger::new(config)?);
    let staker = Arc::new(DevnetWallet::generate(ledger.clone()));
    let counterparty = Arc::new(DevnetWallet::generate(ledger.clone()));
    ledger.fund(staker.address()).await?;
    ledger.fund(counterparty.address()).await?;

    let parties = Parties::new(staker.address(), counterparty.address());
    let address = ledger.deploy_agreement(AgreementVariant::Countdown, parties).await?;
    let agreement = Agreement {
        address,
        variant: AgreementVariant::Countdown,
        parties,
        protocol_version: PROTOCOL_VERSION.to_string(),
    };

    let token = ledger.token_address().await;
    for wallet in [&staker, &counterparty] {
        let connection = Connection::from_wallet(wallet.clone(), ClientConfig::default());
        TokenHandle::new(token, ContractAbi::MockNumeraireToken, connection)
            .change_approval(address, "0", None)
            .await?;
    }

    let as_staker = AgreementHandle::new(
        agreement.clone(),
        Connection::from_wallet(staker.clone(), ClientConfig::default()),
    );
    let as_counterparty = AgreementHandle::new(
        agreement,
        Connection::from_wallet(counterparty.clone(), ClientConfig::default()),
    );

    as_staker.stake("100").await?;
    let punished = as_counterparty.punish("10", "missed the deadline").await?;
    println!("punished 10, cost {}", punished.cost);

    as_counterparty.reward("5").await?;
    as_counterparty.release("20").await?;

    let request = as_staker.request_withdraw().await?;
    println!("countdown started, deadline {}", request.deadline);

    ledger.advance_time(countdown).await;
    let withdrawn = as_staker.withdraw(staker.address()).await?;
    println!("withdrew {}", withdrawn.amount_withdrawn);

    let status = as_staker.check_status().await?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
