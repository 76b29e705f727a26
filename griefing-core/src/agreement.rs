//! Agreement variants, ledger operations and result types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::abi::{AbiType, AbiValue};
use crate::address::Address;
use crate::amount;
use crate::error::{GriefingError, GriefingResult};
use crate::receipt::TransactionReceipt;
use crate::registry::ContractAbi;
use crate::role::Parties;

/// Ledger operations, named as in the contract ABIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    IncreaseStake,
    Punish,
    ReleaseStake,
    StartCountdown,
    RetrieveStake,
    GetAgreementStatus,
    Approve,
    ChangeApproval,
    MintMockTokens,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IncreaseStake => "increaseStake",
            Self::Punish => "punish",
            Self::ReleaseStake => "releaseStake",
            Self::StartCountdown => "startCountdown",
            Self::RetrieveStake => "retrieveStake",
            Self::GetAgreementStatus => "getAgreementStatus",
            Self::Approve => "approve",
            Self::ChangeApproval => "changeApproval",
            Self::MintMockTokens => "mintMockTokens",
        }
    }

    /// Whether the operation only reads ledger state.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::GetAgreementStatus)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Agreement contract variant. Fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgreementVariant {
    /// Stake stays until released by the counterparty.
    Simple,
    /// Staker may withdraw after a countdown expires.
    Countdown,
}

impl AgreementVariant {
    const SIMPLE_OPERATIONS: &'static [Operation] = &[
        Operation::IncreaseStake,
        Operation::Punish,
        Operation::ReleaseStake,
        Operation::GetAgreementStatus,
    ];

    const COUNTDOWN_OPERATIONS: &'static [Operation] = &[
        Operation::IncreaseStake,
        Operation::Punish,
        Operation::ReleaseStake,
        Operation::StartCountdown,
        Operation::RetrieveStake,
        Operation::GetAgreementStatus,
    ];

    /// Contract ABI for this variant.
    pub fn contract_abi(&self) -> ContractAbi {
        match self {
            Self::Simple => ContractAbi::SimpleGriefing,
            Self::Countdown => ContractAbi::CountdownGriefing,
        }
    }

    /// Ledger operations the variant's contract exposes.
    pub fn operations(&self) -> &'static [Operation] {
        match self {
            Self::Simple => Self::SIMPLE_OPERATIONS,
            Self::Countdown => Self::COUNTDOWN_OPERATIONS,
        }
    }

    pub fn supports(&self, operation: Operation) -> bool {
        self.operations().contains(&operation)
    }

    /// Fail with [`GriefingError::UnsupportedOperation`] unless `operation` is exposed.
    pub fn require(&self, operation: Operation) -> GriefingResult<()> {
        if self.supports(operation) {
            Ok(())
        } else {
            Err(GriefingError::UnsupportedOperation {
                operation: operation.to_string(),
                variant: self.to_string(),
            })
        }
    }

    /// Field layout of `getAgreementStatus` for this variant.
    pub fn status_fields(&self) -> &'static [AbiType] {
        const SIMPLE: [AbiType; 4] = [
            AbiType::Address,
            AbiType::Address,
            AbiType::UINT256,
            AbiType::UINT256,
        ];
        const COUNTDOWN: [AbiType; 6] = [
            AbiType::Address,
            AbiType::Address,
            AbiType::UINT256,
            AbiType::UINT256,
            AbiType::UINT256,
            AbiType::UINT256,
        ];
        match self {
            Self::Simple => &SIMPLE,
            Self::Countdown => &COUNTDOWN,
        }
    }
}

impl fmt::Display for AgreementVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple => write!(f, "simple"),
            Self::Countdown => write!(f, "countdown"),
        }
    }
}

/// Immutable identity of an on-chain agreement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agreement {
    pub address: Address,
    pub variant: AgreementVariant,
    pub parties: Parties,
    pub protocol_version: String,
}

/// Result of `stake`, `reward` and `release`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeAdjustment {
    pub amount: String,
    pub receipt: TransactionReceipt,
}

/// Result of `punish`. `cost` is read from the ledger's `Griefed` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PunishResult {
    pub cost: String,
    pub receipt: TransactionReceipt,
}

/// Result of `request_withdraw`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawRequest {
    pub receipt: TransactionReceipt,
    /// Unix timestamp (seconds) after which the stake can be retrieved.
    pub deadline: u64,
}

impl WithdrawRequest {
    pub fn deadline_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(i64::try_from(self.deadline).ok()?, 0)
    }
}

/// Result of `withdraw`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawResult {
    pub receipt: TransactionReceipt,
    pub amount_withdrawn: String,
}

/// Countdown state reported by a countdown agreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountdownStatus {
    /// Countdown length in seconds.
    pub length: u64,
    /// Deadline, once the countdown has been started.
    pub deadline: Option<u64>,
}

/// Snapshot returned by `getAgreementStatus`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgreementStatus {
    pub staker: Address,
    pub counterparty: Address,
    pub current_stake: String,
    /// Cost burned from the punisher per unit of punishment.
    pub cost_ratio: String,
    pub countdown: Option<CountdownStatus>,
}

impl AgreementStatus {
    /// Build a snapshot from the values of a `getAgreementStatus` call.
    pub fn from_values(variant: AgreementVariant, values: &[AbiValue]) -> GriefingResult<Self> {
        let expected = variant.status_fields().len();
        if values.len() != expected {
            return Err(GriefingError::Decoding(format!(
                "{} status has {} fields, expected {}",
                variant,
                values.len(),
                expected
            )));
        }

        let address = |i: usize| {
            values[i]
                .as_address()
                .ok_or_else(|| GriefingError::Decoding(format!("status field {} is not an address", i)))
        };
        let uint = |i: usize| {
            values[i]
                .as_uint()
                .ok_or_else(|| GriefingError::Decoding(format!("status field {} is not a uint", i)))
        };
        let seconds = |i: usize| {
            uint(i).and_then(|v| {
                u64::try_from(v).map_err(|_| {
                    GriefingError::Decoding(format!("status field {} is not a timestamp", i))
                })
            })
        };

        let countdown = match variant {
            AgreementVariant::Simple => None,
            AgreementVariant::Countdown => {
                let deadline = seconds(5)?;
                Some(CountdownStatus {
                    length: seconds(4)?,
                    deadline: (deadline != 0).then_some(deadline),
                })
            }
        };

        Ok(Self {
            staker: address(0)?,
            counterparty: address(1)?,
            current_stake: amount::from_base_units(uint(2)?),
            cost_ratio: amount::from_base_units(uint(3)?),
            countdown,
        })
    }

    pub fn has_stake(&self) -> bool {
        self.current_stake != "0"
    }
}
