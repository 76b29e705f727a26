//! Agreement handle: the lifecycle operations of one on-chain agreement.

use griefing_core::event::{self, schema};
use griefing_core::{
    amount, AbiValue, Address, Agreement, AgreementStatus, AgreementVariant, CountdownPhase,
    GriefingError, GriefingResult, Operation, Parties, PunishResult, Role, StakeAdjustment,
    WithdrawRequest, WithdrawResult,
};

use crate::connection::Connection;

/// A view of one griefing agreement, bound to a signer connection.
///
/// The handle holds only identifiers: stake, deadline and every other piece
/// of mutable state are read from the ledger. Role checks run before any
/// transaction is sent; everything else is left to the ledger.
#[derive(Debug, Clone)]
pub struct AgreementHandle {
    agreement: Agreement,
    connection: Connection,
    generation: u64,
}

impl AgreementHandle {
    /// Bind to an existing agreement.
    pub fn new(agreement: Agreement, connection: Connection) -> Self {
        Self {
            agreement,
            connection,
            generation: 0,
        }
    }

    pub(crate) fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    /// Session generation this handle was built in.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn agreement(&self) -> &Agreement {
        &self.agreement
    }

    pub fn address(&self) -> Address {
        self.agreement.address
    }

    pub fn variant(&self) -> AgreementVariant {
        self.agreement.variant
    }

    pub fn parties(&self) -> Parties {
        self.agreement.parties
    }

    pub fn staker(&self) -> Address {
        self.agreement.parties.staker
    }

    pub fn counterparty(&self) -> Address {
        self.agreement.parties.counterparty
    }

    pub fn protocol_version(&self) -> &str {
        &self.agreement.protocol_version
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    async fn authorize(&self, role: Role) -> GriefingResult<Address> {
        let operator = self.connection.operator().await?;
        self.agreement.parties.authorize(operator, role)?;
        Ok(operator)
    }

    /// Increase the stake. Staker only.
    pub async fn stake(&self, amount: &str) -> GriefingResult<StakeAdjustment> {
        self.authorize(Role::Staker).await?;
        self.increase_stake(amount).await
    }

    /// Increase the stake on the staker's behalf. Counterparty only.
    pub async fn reward(&self, amount: &str) -> GriefingResult<StakeAdjustment> {
        self.authorize(Role::Counterparty).await?;
        self.increase_stake(amount).await
    }

    async fn increase_stake(&self, amount: &str) -> GriefingResult<StakeAdjustment> {
        let units = amount::to_positive_base_units(amount)?;
        let receipt = self
            .connection
            .send(self.address(), Operation::IncreaseStake, vec![AbiValue::Uint(units)])
            .await?;

        let amount = amount::from_base_units(units);
        tracing::info!(agreement = %self.address(), %amount, tx = %receipt.hash_hex(), "stake increased");
        Ok(StakeAdjustment { amount, receipt })
    }

    /// Burn `amount` of the stake, citing `message`. Counterparty only.
    ///
    /// The returned cost is what the ledger charged, as reported by its
    /// `Griefed` event.
    pub async fn punish(&self, amount: &str, message: &str) -> GriefingResult<PunishResult> {
        self.authorize(Role::Counterparty).await?;
        let units = amount::to_positive_base_units(amount)?;

        let receipt = self
            .connection
            .send(
                self.address(),
                Operation::Punish,
                vec![
                    AbiValue::Uint(units),
                    AbiValue::Bytes(message.as_bytes().to_vec()),
                ],
            )
            .await?;

        let cost = event::decode_amount(
            &receipt,
            schema::GRIEFED,
            &schema::GRIEFED_FIELDS,
            schema::GRIEFED_COST,
        )?;
        tracing::info!(agreement = %self.address(), punishment = %amount::from_base_units(units), %cost, "stake punished");
        Ok(PunishResult { cost, receipt })
    }

    /// Return `amount` of the stake to the staker. The ledger decides who may call this.
    pub async fn release(&self, amount: &str) -> GriefingResult<StakeAdjustment> {
        let units = amount::to_positive_base_units(amount)?;
        let receipt = self
            .connection
            .send(self.address(), Operation::ReleaseStake, vec![AbiValue::Uint(units)])
            .await?;

        let amount = amount::from_base_units(units);
        tracing::info!(agreement = %self.address(), %amount, "stake released");
        Ok(StakeAdjustment { amount, receipt })
    }

    /// Start the withdrawal countdown. Staker only, countdown agreements only.
    pub async fn request_withdraw(&self) -> GriefingResult<WithdrawRequest> {
        self.authorize(Role::Staker).await?;
        self.variant().require(Operation::StartCountdown)?;

        let receipt = self
            .connection
            .send(self.address(), Operation::StartCountdown, vec![])
            .await?;

        let raw = event::decode_uint(
            &receipt,
            schema::DEADLINE_SET,
            &schema::DEADLINE_SET_FIELDS,
            schema::DEADLINE_SET_DEADLINE,
        )?;
        let deadline = u64::try_from(raw)
            .map_err(|_| GriefingError::Decoding(format!("deadline {} is not a timestamp", raw)))?;

        tracing::info!(agreement = %self.address(), deadline, "countdown started");
        Ok(WithdrawRequest { receipt, deadline })
    }

    /// Retrieve the whole stake to `recipient` once the countdown has expired.
    /// Countdown agreements only; the ledger decides who may call this.
    pub async fn withdraw(&self, recipient: Address) -> GriefingResult<WithdrawResult> {
        self.variant().require(Operation::RetrieveStake)?;

        let receipt = self
            .connection
            .send(
                self.address(),
                Operation::RetrieveStake,
                vec![AbiValue::Address(recipient)],
            )
            .await?;

        let amount_withdrawn = event::decode_amount(
            &receipt,
            schema::DEPOSIT_DECREASED,
            &schema::DEPOSIT_FIELDS,
            schema::DEPOSIT_AMOUNT,
        )?;
        tracing::info!(agreement = %self.address(), %recipient, amount = %amount_withdrawn, "stake withdrawn");
        Ok(WithdrawResult {
            receipt,
            amount_withdrawn,
        })
    }

    /// Read the agreement's current status from the ledger.
    pub async fn check_status(&self) -> GriefingResult<AgreementStatus> {
        let values = self
            .connection
            .query(self.address(), Operation::GetAgreementStatus, vec![])
            .await?;
        AgreementStatus::from_values(self.variant(), &values)
    }

    /// Lifecycle phase at unix time `now`, derived from a fresh status read.
    pub async fn phase_at(&self, now: u64) -> GriefingResult<CountdownPhase> {
        let status = self.check_status().await?;
        Ok(CountdownPhase::observe(&status, now))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use griefing_core::abi;
    use griefing_core::amount::UNIT;
    use griefing_core::{
        ContractCall, EmittedEvent, IdentityProvider, LedgerInvoker, TransactionReceipt,
        PROTOCOL_VERSION,
    };

    use super::*;
    use crate::connection::ClientConfig;

    fn addr(last: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[19] = last;
        Address::from_bytes(bytes)
    }

    /// Records calls and answers with canned events.
    struct ScriptedLedger {
        operator: Address,
        events: Vec<EmittedEvent>,
        calls: Mutex<Vec<ContractCall>>,
        delay: Duration,
    }

    impl ScriptedLedger {
        fn new(operator: Address, events: Vec<EmittedEvent>) -> Self {
            Self {
                operator,
                events,
                calls: Mutex::new(Vec::new()),
                delay: Duration::ZERO,
            }
        }

        fn calls(&self) -> Vec<ContractCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LedgerInvoker for ScriptedLedger {
        async fn invoke(&self, call: ContractCall) -> GriefingResult<TransactionReceipt> {
            self.calls.lock().unwrap().push(call.clone());
            tokio::time::sleep(self.delay).await;
            Ok(TransactionReceipt {
                transaction_hash: vec![7; 32],
                block_number: 1,
                block_timestamp: 1_000,
                from: self.operator,
                to: call.contract,
                events: self.events.clone(),
            })
        }

        async fn query(&self, call: ContractCall) -> GriefingResult<Vec<AbiValue>> {
            self.calls.lock().unwrap().push(call);
            Ok(vec![
                AbiValue::Address(addr(0xa)),
                AbiValue::Address(addr(0xb)),
                AbiValue::Uint(5 * UNIT),
                AbiValue::Uint(UNIT / 10),
            ])
        }
    }

    #[async_trait]
    impl IdentityProvider for ScriptedLedger {
        async fn current_operator(&self) -> GriefingResult<Address> {
            Ok(self.operator)
        }
    }

    fn handle(variant: AgreementVariant, ledger: Arc<ScriptedLedger>) -> AgreementHandle {
        AgreementHandle::new(
            Agreement {
                address: addr(0xc),
                variant,
                parties: Parties::new(addr(0xa), addr(0xb)),
                protocol_version: PROTOCOL_VERSION.to_string(),
            },
            Connection::from_wallet(ledger, ClientConfig::default()),
        )
    }

    fn event(name: &str, values: &[AbiValue]) -> EmittedEvent {
        EmittedEvent {
            name: name.to_string(),
            address: addr(0xc),
            data: abi::encode(values),
        }
    }

    fn griefed(cost: u128) -> EmittedEvent {
        event(
            schema::GRIEFED,
            &[
                AbiValue::Address(addr(0xb)),
                AbiValue::Address(addr(0xa)),
                AbiValue::Uint(10 * UNIT),
                AbiValue::Uint(cost),
                AbiValue::Bytes(b"bad data".to_vec()),
            ],
        )
    }

    #[tokio::test]
    async fn wrong_role_never_reaches_the_ledger() {
        let ledger = Arc::new(ScriptedLedger::new(addr(0xb), vec![]));
        let h = handle(AgreementVariant::Simple, ledger.clone());

        let err = h.stake("5").await.unwrap_err();
        assert!(matches!(err, GriefingError::Authorization { role: Role::Staker, .. }));
        assert!(ledger.calls().is_empty());

        let staker_side = Arc::new(ScriptedLedger::new(addr(0xa), vec![]));
        let h = handle(AgreementVariant::Simple, staker_side.clone());
        for err in [
            h.reward("1").await.unwrap_err(),
            h.punish("1", "x").await.unwrap_err(),
        ] {
            assert!(matches!(err, GriefingError::Authorization { role: Role::Counterparty, .. }));
        }
        assert!(staker_side.calls().is_empty());
    }

    #[tokio::test]
    async fn stake_sends_base_units() {
        let ledger = Arc::new(ScriptedLedger::new(addr(0xa), vec![]));
        let h = handle(AgreementVariant::Simple, ledger.clone());

        let result = h.stake("2.50").await.unwrap();
        assert_eq!(result.amount, "2.5");

        let calls = ledger.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].operation, Operation::IncreaseStake);
        assert_eq!(calls[0].args, vec![AbiValue::Uint(5 * UNIT / 2)]);
    }

    #[tokio::test]
    async fn bad_amounts_are_rejected_locally() {
        let ledger = Arc::new(ScriptedLedger::new(addr(0xa), vec![]));
        let h = handle(AgreementVariant::Simple, ledger.clone());

        assert!(matches!(h.stake("0").await.unwrap_err(), GriefingError::InvalidAmount(_)));
        assert!(matches!(
            h.release("0.0000000000000000001").await.unwrap_err(),
            GriefingError::Precision { .. }
        ));
        assert!(ledger.calls().is_empty());
    }

    #[tokio::test]
    async fn punish_reads_cost_from_the_last_griefed_event() {
        let ledger = Arc::new(ScriptedLedger::new(addr(0xb), vec![griefed(UNIT), griefed(3 * UNIT)]));
        let h = handle(AgreementVariant::Simple, ledger.clone());

        let result = h.punish("10", "bad data").await.unwrap();
        assert_eq!(result.cost, "3");
        assert_eq!(
            ledger.calls()[0].args[1],
            AbiValue::Bytes(b"bad data".to_vec())
        );
    }

    #[tokio::test]
    async fn punish_without_event_is_a_decoding_error() {
        let ledger = Arc::new(ScriptedLedger::new(addr(0xb), vec![]));
        let h = handle(AgreementVariant::Simple, ledger);

        let err = h.punish("10", "bad data").await.unwrap_err();
        assert!(matches!(err, GriefingError::Decoding(_)));
    }

    #[tokio::test]
    async fn countdown_operations_rejected_on_simple() {
        let ledger = Arc::new(ScriptedLedger::new(addr(0xa), vec![]));
        let h = handle(AgreementVariant::Simple, ledger.clone());

        let err = h.withdraw(addr(0xa)).await.unwrap_err();
        assert!(matches!(err, GriefingError::UnsupportedOperation { .. }));
        let err = h.request_withdraw().await.unwrap_err();
        assert!(matches!(err, GriefingError::UnsupportedOperation { .. }));
        assert!(ledger.calls().is_empty());
    }

    #[tokio::test]
    async fn request_withdraw_checks_role_before_variant() {
        let ledger = Arc::new(ScriptedLedger::new(addr(0xb), vec![]));
        for variant in [AgreementVariant::Simple, AgreementVariant::Countdown] {
            let err = handle(variant, ledger.clone()).request_withdraw().await.unwrap_err();
            assert!(matches!(err, GriefingError::Authorization { role: Role::Staker, .. }));
        }
        assert!(ledger.calls().is_empty());
    }

    #[tokio::test]
    async fn deadline_is_not_rescaled() {
        let ledger = Arc::new(ScriptedLedger::new(
            addr(0xa),
            vec![event(schema::DEADLINE_SET, &[AbiValue::Uint(87_400)])],
        ));
        let h = handle(AgreementVariant::Countdown, ledger);

        let request = h.request_withdraw().await.unwrap();
        assert_eq!(request.deadline, 87_400);
    }

    #[tokio::test]
    async fn withdraw_reads_the_deposit_decrease() {
        let ledger = Arc::new(ScriptedLedger::new(
            addr(0xb),
            vec![event(
                schema::DEPOSIT_DECREASED,
                &[
                    AbiValue::Uint(1),
                    AbiValue::Address(addr(0xa)),
                    AbiValue::Uint(7 * UNIT),
                    AbiValue::Uint(0),
                ],
            )],
        ));
        // no local role check: the ledger decides
        let h = handle(AgreementVariant::Countdown, ledger);

        let result = h.withdraw(addr(0xa)).await.unwrap();
        assert_eq!(result.amount_withdrawn, "7");
    }

    #[tokio::test]
    async fn check_status_decodes_the_snapshot() {
        let ledger = Arc::new(ScriptedLedger::new(addr(0xa), vec![]));
        let h = handle(AgreementVariant::Simple, ledger.clone());

        let status = h.check_status().await.unwrap();
        assert_eq!(status.current_stake, "5");
        assert_eq!(status.cost_ratio, "0.1");
        assert_eq!(h.phase_at(0).await.unwrap(), CountdownPhase::Active);
        assert_eq!(ledger.calls()[0].operation, Operation::GetAgreementStatus);
    }

    #[tokio::test]
    async fn confirmation_timeout_is_a_network_error() {
        let mut scripted = ScriptedLedger::new(addr(0xa), vec![]);
        scripted.delay = Duration::from_secs(5);
        let ledger = Arc::new(scripted);
        let h = AgreementHandle::new(
            handle(AgreementVariant::Simple, ledger.clone()).agreement().clone(),
            Connection::from_wallet(
                ledger.clone(),
                ClientConfig::default().with_confirmation_timeout(Some(Duration::from_millis(20))),
            ),
        );

        let err = h.stake("1").await.unwrap_err();
        assert!(matches!(err, GriefingError::Network(_)));
        // broadcast happened; only the wait was abandoned
        assert_eq!(ledger.calls().len(), 1);
    }
}
