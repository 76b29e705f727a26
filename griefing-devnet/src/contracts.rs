//! Contract semantics executed by the devnet: the staking token and the
//! simple and countdown griefing agreements.

use std::collections::HashMap;

use griefing_core::abi::{self, AbiValue};
use griefing_core::amount::UNIT;
use griefing_core::event::schema;
use griefing_core::{Address, AgreementVariant, EmittedEvent, Operation};
use thiserror::Error;

/// Token id reported in deposit events.
const NMR_TOKEN_ID: u8 = 1;

/// Reasons a contract call reverts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Revert {
    #[error("only {0} can call {1}")]
    OnlyRole(&'static str, Operation),
    #[error("insufficient allowance: {available} < {required}")]
    InsufficientAllowance { available: u128, required: u128 },
    #[error("insufficient balance: {available} < {required}")]
    InsufficientBalance { available: u128, required: u128 },
    #[error("amount {requested} exceeds stake {stake}")]
    ExceedsStake { stake: u128, requested: u128 },
    #[error("countdown already started")]
    CountdownAlreadyStarted,
    #[error("countdown not started")]
    CountdownNotStarted,
    #[error("deadline not passed: now {now} < deadline {deadline}")]
    DeadlineNotPassed { now: u64, deadline: u64 },
    #[error("function {0} not found")]
    UnknownFunction(Operation),
    #[error("invalid arguments for {0}")]
    BadArguments(Operation),
    #[error("old allowance does not match")]
    IncorrectOldAllowance,
    #[error("token is not mintable")]
    MintingDisabled,
    #[error("no contract at {0}")]
    NoContract(Address),
    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),
}

/// Caller and block of the executing transaction.
#[derive(Debug, Clone, Copy)]
pub struct CallContext {
    pub sender: Address,
    pub timestamp: u64,
}

fn uint_arg(op: Operation, args: &[AbiValue], i: usize) -> Result<u128, Revert> {
    args.get(i).and_then(AbiValue::as_uint).ok_or(Revert::BadArguments(op))
}

fn address_arg(op: Operation, args: &[AbiValue], i: usize) -> Result<Address, Revert> {
    args.get(i).and_then(AbiValue::as_address).ok_or(Revert::BadArguments(op))
}

fn bytes_arg(op: Operation, args: &[AbiValue], i: usize) -> Result<Vec<u8>, Revert> {
    args.get(i)
        .and_then(AbiValue::as_bytes)
        .map(<[u8]>::to_vec)
        .ok_or(Revert::BadArguments(op))
}

fn emit(name: &str, address: Address, values: &[AbiValue]) -> EmittedEvent {
    EmittedEvent {
        name: name.to_string(),
        address,
        data: abi::encode(values),
    }
}

/// ERC-20 style staking token with allowance semantics.
#[derive(Debug, Clone)]
pub struct Token {
    pub address: Address,
    pub mintable: bool,
    balances: HashMap<Address, u128>,
    allowances: HashMap<(Address, Address), u128>,
}

impl Token {
    pub fn new(address: Address, mintable: bool) -> Self {
        Self {
            address,
            mintable,
            balances: HashMap::new(),
            allowances: HashMap::new(),
        }
    }

    pub fn balance_of(&self, owner: Address) -> u128 {
        self.balances.get(&owner).copied().unwrap_or(0)
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> u128 {
        self.allowances.get(&(owner, spender)).copied().unwrap_or(0)
    }

    pub fn mint(&mut self, to: Address, value: u128) -> Result<EmittedEvent, Revert> {
        self.credit(to, value)?;
        Ok(self.transfer_event(Address::ZERO, to, value))
    }

    fn credit(&mut self, to: Address, value: u128) -> Result<(), Revert> {
        let balance = self.balances.entry(to).or_default();
        *balance = balance.checked_add(value).ok_or(Revert::Overflow("balance"))?;
        Ok(())
    }

    fn debit(&mut self, owner: Address, value: u128) -> Result<(), Revert> {
        let available = self.balance_of(owner);
        if available < value {
            return Err(Revert::InsufficientBalance {
                available,
                required: value,
            });
        }
        self.balances.insert(owner, available - value);
        Ok(())
    }

    fn spend_allowance(&mut self, owner: Address, spender: Address, value: u128) -> Result<(), Revert> {
        let available = self.allowance(owner, spender);
        if available < value {
            return Err(Revert::InsufficientAllowance {
                available,
                required: value,
            });
        }
        // max allowance is never decremented
        if available != u128::MAX {
            self.allowances.insert((owner, spender), available - value);
        }
        Ok(())
    }

    /// Move `value` from `owner` to `to` on behalf of `spender`.
    pub fn transfer_from(
        &mut self,
        spender: Address,
        owner: Address,
        to: Address,
        value: u128,
    ) -> Result<EmittedEvent, Revert> {
        if self.balance_of(owner) < value {
            return Err(Revert::InsufficientBalance {
                available: self.balance_of(owner),
                required: value,
            });
        }
        self.spend_allowance(owner, spender, value)?;
        self.debit(owner, value)?;
        self.credit(to, value)?;
        Ok(self.transfer_event(owner, to, value))
    }

    /// Burn `value` of `owner`'s tokens on behalf of `spender`.
    pub fn burn_from(&mut self, spender: Address, owner: Address, value: u128) -> Result<EmittedEvent, Revert> {
        self.transfer_from(spender, owner, Address::ZERO, value)
    }

    /// Move `value` held by `from` to `to`.
    pub fn transfer(&mut self, from: Address, to: Address, value: u128) -> Result<EmittedEvent, Revert> {
        self.debit(from, value)?;
        self.credit(to, value)?;
        Ok(self.transfer_event(from, to, value))
    }

    fn transfer_event(&self, from: Address, to: Address, value: u128) -> EmittedEvent {
        emit(
            "Transfer",
            self.address,
            &[AbiValue::Address(from), AbiValue::Address(to), AbiValue::Uint(value)],
        )
    }

    fn approval_event(&self, owner: Address, spender: Address, value: u128) -> EmittedEvent {
        emit(
            "Approval",
            self.address,
            &[AbiValue::Address(owner), AbiValue::Address(spender), AbiValue::Uint(value)],
        )
    }

    pub fn execute(
        &mut self,
        ctx: CallContext,
        op: Operation,
        args: &[AbiValue],
    ) -> Result<Vec<EmittedEvent>, Revert> {
        match op {
            Operation::Approve => {
                let spender = address_arg(op, args, 0)?;
                let value = uint_arg(op, args, 1)?;
                self.allowances.insert((ctx.sender, spender), value);
                Ok(vec![self.approval_event(ctx.sender, spender, value)])
            }
            Operation::ChangeApproval => {
                let spender = address_arg(op, args, 0)?;
                let old = uint_arg(op, args, 1)?;
                let new = uint_arg(op, args, 2)?;
                if self.allowance(ctx.sender, spender) != old {
                    return Err(Revert::IncorrectOldAllowance);
                }
                self.allowances.insert((ctx.sender, spender), new);
                Ok(vec![self.approval_event(ctx.sender, spender, new)])
            }
            Operation::MintMockTokens => {
                if !self.mintable {
                    return Err(Revert::MintingDisabled);
                }
                let to = address_arg(op, args, 0)?;
                let value = uint_arg(op, args, 1)?;
                Ok(vec![self.mint(to, value)?])
            }
            other => Err(Revert::UnknownFunction(other)),
        }
    }
}

/// A deployed griefing agreement.
#[derive(Debug, Clone)]
pub struct GriefingContract {
    pub address: Address,
    pub variant: AgreementVariant,
    pub staker: Address,
    pub counterparty: Address,
    pub stake: u128,
    /// Cost per unit of punishment, scaled by `UNIT`. At most `UNIT`.
    pub cost_ratio: u128,
    pub countdown_length: u64,
    pub deadline: Option<u64>,
}

impl GriefingContract {
    fn only(&self, ctx: &CallContext, holder: Address, role: &'static str, op: Operation) -> Result<(), Revert> {
        if ctx.sender == holder {
            Ok(())
        } else {
            Err(Revert::OnlyRole(role, op))
        }
    }

    fn check_stake(&self, requested: u128) -> Result<(), Revert> {
        if requested > self.stake {
            return Err(Revert::ExceedsStake {
                stake: self.stake,
                requested,
            });
        }
        Ok(())
    }

    fn deposit_event(&self, name: &str, amount: u128) -> EmittedEvent {
        emit(
            name,
            self.address,
            &[
                AbiValue::Uint(u128::from(NMR_TOKEN_ID)),
                AbiValue::Address(self.staker),
                AbiValue::Uint(amount),
                AbiValue::Uint(self.stake),
            ],
        )
    }

    /// Cost burned from the punisher for `punishment`. Never exceeds `punishment`.
    pub fn cost_of(&self, punishment: u128) -> u128 {
        // split to stay within u128 for large punishments
        let whole = punishment / UNIT;
        let fraction = punishment % UNIT;
        whole * self.cost_ratio + fraction * self.cost_ratio / UNIT
    }

    pub fn execute(
        &mut self,
        token: &mut Token,
        ctx: CallContext,
        op: Operation,
        args: &[AbiValue],
    ) -> Result<Vec<EmittedEvent>, Revert> {
        if !self.variant.supports(op) {
            return Err(Revert::UnknownFunction(op));
        }

        match op {
            Operation::IncreaseStake => {
                if ctx.sender != self.staker && ctx.sender != self.counterparty {
                    return Err(Revert::OnlyRole("staker or counterparty", op));
                }
                let amount = uint_arg(op, args, 0)?;
                let stake = self.stake.checked_add(amount).ok_or(Revert::Overflow("stake"))?;
                let transfer = token.transfer_from(self.address, ctx.sender, self.address, amount)?;
                self.stake = stake;
                Ok(vec![transfer, self.deposit_event(schema::DEPOSIT_INCREASED, amount)])
            }
            Operation::Punish => {
                self.only(&ctx, self.counterparty, "counterparty", op)?;
                let punishment = uint_arg(op, args, 0)?;
                let message = bytes_arg(op, args, 1)?;
                self.check_stake(punishment)?;
                let cost = self.cost_of(punishment);
                let burn_cost = token.burn_from(self.address, ctx.sender, cost)?;
                let burn_stake = token.transfer(self.address, Address::ZERO, punishment)?;
                self.stake -= punishment;
                Ok(vec![
                    burn_cost,
                    burn_stake,
                    self.deposit_event(schema::DEPOSIT_DECREASED, punishment),
                    emit(
                        schema::GRIEFED,
                        self.address,
                        &[
                            AbiValue::Address(ctx.sender),
                            AbiValue::Address(self.staker),
                            AbiValue::Uint(punishment),
                            AbiValue::Uint(cost),
                            AbiValue::Bytes(message),
                        ],
                    ),
                ])
            }
            Operation::ReleaseStake => {
                self.only(&ctx, self.counterparty, "counterparty", op)?;
                let amount = uint_arg(op, args, 0)?;
                self.check_stake(amount)?;
                let transfer = token.transfer(self.address, self.staker, amount)?;
                self.stake -= amount;
                Ok(vec![transfer, self.deposit_event(schema::DEPOSIT_DECREASED, amount)])
            }
            Operation::StartCountdown => {
                self.only(&ctx, self.staker, "staker", op)?;
                if self.deadline.is_some() {
                    return Err(Revert::CountdownAlreadyStarted);
                }
                let deadline = ctx
                    .timestamp
                    .checked_add(self.countdown_length)
                    .ok_or(Revert::Overflow("deadline"))?;
                self.deadline = Some(deadline);
                Ok(vec![emit(
                    schema::DEADLINE_SET,
                    self.address,
                    &[AbiValue::Uint(u128::from(deadline))],
                )])
            }
            Operation::RetrieveStake => {
                self.only(&ctx, self.staker, "staker", op)?;
                let recipient = address_arg(op, args, 0)?;
                let deadline = self.deadline.ok_or(Revert::CountdownNotStarted)?;
                if ctx.timestamp < deadline {
                    return Err(Revert::DeadlineNotPassed {
                        now: ctx.timestamp,
                        deadline,
                    });
                }
                let amount = self.stake;
                let transfer = token.transfer(self.address, recipient, amount)?;
                self.stake = 0;
                Ok(vec![transfer, self.deposit_event(schema::DEPOSIT_DECREASED, amount)])
            }
            other => Err(Revert::UnknownFunction(other)),
        }
    }

    /// Values returned by `getAgreementStatus`, laid out per variant.
    pub fn status(&self) -> Vec<AbiValue> {
        let mut values = vec![
            AbiValue::Address(self.staker),
            AbiValue::Address(self.counterparty),
            AbiValue::Uint(self.stake),
            AbiValue::Uint(self.cost_ratio),
        ];
        if self.variant == AgreementVariant::Countdown {
            values.push(AbiValue::Uint(u128::from(self.countdown_length)));
            values.push(AbiValue::Uint(u128::from(self.deadline.unwrap_or(0))));
        }
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(last: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[19] = last;
        Address::from_bytes(bytes)
    }

    fn setup(variant: AgreementVariant) -> (Token, GriefingContract) {
        let mut token = Token::new(addr(0xee), true);
        token.mint(addr(0xa), 100 * UNIT).unwrap();
        token.mint(addr(0xb), 100 * UNIT).unwrap();
        let contract = GriefingContract {
            address: addr(0xc),
            variant,
            staker: addr(0xa),
            counterparty: addr(0xb),
            stake: 0,
            cost_ratio: 3 * UNIT / 10,
            countdown_length: 100,
            deadline: None,
        };
        (token, contract)
    }

    fn ctx(sender: Address, timestamp: u64) -> CallContext {
        CallContext { sender, timestamp }
    }

    fn approve(token: &mut Token, owner: Address, spender: Address) {
        token
            .execute(ctx(owner, 0), Operation::Approve, &[AbiValue::Address(spender), AbiValue::Uint(u128::MAX)])
            .unwrap();
    }

    #[test]
    fn stake_requires_allowance() {
        let (mut token, mut c) = setup(AgreementVariant::Simple);
        let err = c
            .execute(&mut token, ctx(addr(0xa), 0), Operation::IncreaseStake, &[AbiValue::Uint(UNIT)])
            .unwrap_err();
        assert!(matches!(err, Revert::InsufficientAllowance { .. }));

        approve(&mut token, addr(0xa), c.address);
        c.execute(&mut token, ctx(addr(0xa), 0), Operation::IncreaseStake, &[AbiValue::Uint(UNIT)])
            .unwrap();
        assert_eq!(c.stake, UNIT);
        assert_eq!(token.balance_of(addr(0xa)), 99 * UNIT);
    }

    #[test]
    fn punish_burns_cost_and_stake() {
        let (mut token, mut c) = setup(AgreementVariant::Simple);
        approve(&mut token, addr(0xa), c.address);
        approve(&mut token, addr(0xb), c.address);
        c.execute(&mut token, ctx(addr(0xa), 0), Operation::IncreaseStake, &[AbiValue::Uint(20 * UNIT)])
            .unwrap();

        let events = c
            .execute(
                &mut token,
                ctx(addr(0xb), 0),
                Operation::Punish,
                &[AbiValue::Uint(10 * UNIT), AbiValue::Bytes(b"bad data".to_vec())],
            )
            .unwrap();
        assert_eq!(events.last().unwrap().name, schema::GRIEFED);
        assert_eq!(c.stake, 10 * UNIT);
        assert_eq!(token.balance_of(addr(0xb)), 97 * UNIT);
    }

    #[test]
    fn punish_beyond_stake_reverts() {
        let (mut token, mut c) = setup(AgreementVariant::Simple);
        let err = c
            .execute(
                &mut token,
                ctx(addr(0xb), 0),
                Operation::Punish,
                &[AbiValue::Uint(UNIT), AbiValue::Bytes(vec![])],
            )
            .unwrap_err();
        assert!(matches!(err, Revert::ExceedsStake { .. }));
    }

    #[test]
    fn cost_never_exceeds_punishment() {
        let (_, mut c) = setup(AgreementVariant::Simple);
        for ratio in [0, UNIT / 3, UNIT] {
            c.cost_ratio = ratio;
            for p in [0, 1, UNIT - 1, 10 * UNIT, u128::MAX / 2] {
                assert!(c.cost_of(p) <= p);
            }
        }
        c.cost_ratio = 3 * UNIT / 10;
        assert_eq!(c.cost_of(10 * UNIT), 3 * UNIT);
    }

    #[test]
    fn countdown_guards_retrieval() {
        let (mut token, mut c) = setup(AgreementVariant::Countdown);
        let staker = addr(0xa);
        let err = c
            .execute(&mut token, ctx(staker, 10), Operation::RetrieveStake, &[AbiValue::Address(staker)])
            .unwrap_err();
        assert_eq!(err, Revert::CountdownNotStarted);

        c.execute(&mut token, ctx(staker, 10), Operation::StartCountdown, &[]).unwrap();
        assert_eq!(c.deadline, Some(110));
        assert_eq!(
            c.execute(&mut token, ctx(staker, 20), Operation::StartCountdown, &[]).unwrap_err(),
            Revert::CountdownAlreadyStarted
        );

        let err = c
            .execute(&mut token, ctx(staker, 109), Operation::RetrieveStake, &[AbiValue::Address(staker)])
            .unwrap_err();
        assert!(matches!(err, Revert::DeadlineNotPassed { deadline: 110, .. }));

        c.execute(&mut token, ctx(staker, 110), Operation::RetrieveStake, &[AbiValue::Address(staker)])
            .unwrap();
    }

    #[test]
    fn simple_agreement_has_no_countdown() {
        let (mut token, mut c) = setup(AgreementVariant::Simple);
        let err = c
            .execute(&mut token, ctx(addr(0xa), 0), Operation::StartCountdown, &[])
            .unwrap_err();
        assert_eq!(err, Revert::UnknownFunction(Operation::StartCountdown));
        assert_eq!(c.status().len(), 4);
    }

    #[test]
    fn change_approval_checks_old_value() {
        let (mut token, _) = setup(AgreementVariant::Simple);
        let spender = addr(0xc);
        let err = token
            .execute(
                ctx(addr(0xa), 0),
                Operation::ChangeApproval,
                &[AbiValue::Address(spender), AbiValue::Uint(5), AbiValue::Uint(10)],
            )
            .unwrap_err();
        assert_eq!(err, Revert::IncorrectOldAllowance);

        token
            .execute(
                ctx(addr(0xa), 0),
                Operation::ChangeApproval,
                &[AbiValue::Address(spender), AbiValue::Uint(0), AbiValue::Uint(10)],
            )
            .unwrap();
        assert_eq!(token.allowance(addr(0xa), spender), 10);
    }

    #[test]
    fn stake_overflow_reverts_before_transfer() {
        let (mut token, mut c) = setup(AgreementVariant::Simple);
        approve(&mut token, addr(0xa), c.address);
        c.stake = u128::MAX;

        let err = c
            .execute(&mut token, ctx(addr(0xa), 0), Operation::IncreaseStake, &[AbiValue::Uint(UNIT)])
            .unwrap_err();
        assert_eq!(err, Revert::Overflow("stake"));
        assert_eq!(token.balance_of(addr(0xa)), 100 * UNIT);
        assert_eq!(c.stake, u128::MAX);
    }

    #[test]
    fn mint_overflow_reverts() {
        let (mut token, _) = setup(AgreementVariant::Simple);
        let err = token.mint(addr(0xa), u128::MAX).unwrap_err();
        assert_eq!(err, Revert::Overflow("balance"));
        assert_eq!(token.balance_of(addr(0xa)), 100 * UNIT);
    }

    #[test]
    fn deadline_overflow_reverts() {
        let (mut token, mut c) = setup(AgreementVariant::Countdown);
        c.countdown_length = u64::MAX;
        let err = c
            .execute(&mut token, ctx(addr(0xa), 10), Operation::StartCountdown, &[])
            .unwrap_err();
        assert_eq!(err, Revert::Overflow("deadline"));
        assert_eq!(c.deadline, None);
    }
}
