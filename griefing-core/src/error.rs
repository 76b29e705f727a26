//! Error taxonomy for agreement operations.

use thiserror::Error;

use crate::address::Address;
use crate::role::Role;

/// Errors surfaced by agreement, token and registry operations.
///
/// Every variant reaches the caller unchanged: nothing is retried or
/// swallowed, and a failed call never yields a partial result.
#[derive(Debug, Error)]
pub enum GriefingError {
    /// The operator does not hold the role the action requires.
    /// Detected locally, before any transaction is broadcast.
    #[error("{role} required: operator {operator} is not {expected}")]
    Authorization {
        role: Role,
        operator: Address,
        expected: Address,
    },

    /// The operation is not available for this agreement variant.
    #[error("'{operation}' is not supported for {variant} agreements")]
    UnsupportedOperation {
        operation: String,
        variant: String,
    },

    /// The ledger rejected the transaction.
    #[error("transaction reverted: {operation} on {contract}{}", .reason.as_deref().map(|r| format!(": {}", r)).unwrap_or_default())]
    TransactionReverted {
        contract: Address,
        operation: String,
        reason: Option<String>,
    },

    /// An expected event is missing or its payload does not match the declared types.
    #[error("decoding error: {0}")]
    Decoding(String),

    /// The amount carries more fractional digits than the token supports.
    #[error("precision error: {amount} has {digits} fractional digits (max {max})", max = crate::amount::DECIMALS)]
    Precision { amount: String, digits: usize },

    /// The amount is malformed, zero where a positive value is required, or out of range.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Address text is not 40 hex characters with an optional `0x` prefix.
    #[error("invalid address '{input}': {reason}")]
    InvalidAddress { input: String, reason: String },

    /// Signing, broadcast or confirmation failure unrelated to ledger logic.
    #[error("network error: {0}")]
    Network(String),

    /// No contract mapping exists for this network and protocol version.
    #[error("{contract} is not deployed on {network} for protocol version {version}")]
    UnsupportedNetwork {
        contract: String,
        network: String,
        version: String,
    },

    /// Registry or configuration (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GriefingError {
    /// Whether the error was raised before anything was sent to the ledger.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::Authorization { .. }
                | Self::UnsupportedOperation { .. }
                | Self::Precision { .. }
                | Self::InvalidAmount(_)
                | Self::InvalidAddress { .. }
        )
    }

    /// Revert reason reported by the ledger, if this is a revert that carried one.
    pub fn revert_reason(&self) -> Option<&str> {
        match self {
            Self::TransactionReverted { reason, .. } => reason.as_deref(),
            _ => None,
        }
    }
}

/// Result type alias for agreement operations.
pub type GriefingResult<T> = Result<T, GriefingError>;
