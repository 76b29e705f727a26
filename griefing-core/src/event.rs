//! Typed field extraction from receipt events.
//!
//! When an event name occurs more than once in a receipt the last occurrence
//! is used. Duplicates are logged and reported through [`EventMatch`].

use serde::Serialize;

use crate::abi::{self, AbiType, AbiValue};
use crate::amount;
use crate::error::{GriefingError, GriefingResult};
use crate::receipt::{EmittedEvent, TransactionReceipt};

/// Event schemas emitted by the griefing contracts.
pub mod schema {
    use crate::abi::AbiType;

    pub const GRIEFED: &str = "Griefed";
    /// punisher, staker, punishment, cost, message
    pub const GRIEFED_FIELDS: [AbiType; 5] = [
        AbiType::Address,
        AbiType::Address,
        AbiType::UINT256,
        AbiType::UINT256,
        AbiType::Bytes,
    ];
    pub const GRIEFED_COST: usize = 3;

    pub const DEADLINE_SET: &str = "DeadlineSet";
    pub const DEADLINE_SET_FIELDS: [AbiType; 1] = [AbiType::UINT256];
    pub const DEADLINE_SET_DEADLINE: usize = 0;

    pub const DEPOSIT_INCREASED: &str = "DepositIncreased";
    pub const DEPOSIT_DECREASED: &str = "DepositDecreased";
    /// token id, user, amount, new deposit
    pub const DEPOSIT_FIELDS: [AbiType; 4] = [
        AbiType::UINT8,
        AbiType::Address,
        AbiType::UINT256,
        AbiType::UINT256,
    ];
    pub const DEPOSIT_AMOUNT: usize = 2;
}

/// The event chosen for a name, and how many times the name occurred.
#[derive(Debug, Clone, Copy)]
pub struct EventMatch<'a> {
    pub event: &'a EmittedEvent,
    pub occurrences: usize,
}

impl EventMatch<'_> {
    pub fn has_duplicates(&self) -> bool {
        self.occurrences > 1
    }
}

/// A decoded field, rescaled to a display amount if requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ExtractedField {
    Raw(AbiValue),
    Amount(String),
}

/// Find the last event named `name`.
pub fn find_last<'a>(receipt: &'a TransactionReceipt, name: &str) -> GriefingResult<EventMatch<'a>> {
    let mut occurrences = 0;
    let mut last = None;
    for event in receipt.events.iter().filter(|e| e.name == name) {
        occurrences += 1;
        last = Some(event);
    }

    let event = last.ok_or_else(|| {
        GriefingError::Decoding(format!(
            "event {} not found in transaction {}",
            name,
            receipt.hash_hex()
        ))
    })?;

    if occurrences > 1 {
        tracing::warn!(
            event = name,
            occurrences,
            tx = %receipt.hash_hex(),
            "event emitted more than once, using the last occurrence"
        );
    }

    Ok(EventMatch { event, occurrences })
}

/// Decode field `index` of the last `name` event against `types`.
///
/// With `rescale` set the field must be an unsigned integer and is returned
/// as a display amount.
pub fn decode_field(
    receipt: &TransactionReceipt,
    name: &str,
    types: &[AbiType],
    index: usize,
    rescale: bool,
) -> GriefingResult<ExtractedField> {
    if index >= types.len() {
        return Err(GriefingError::Decoding(format!(
            "field index {} out of range for {} with {} fields",
            index,
            name,
            types.len()
        )));
    }

    let found = find_last(receipt, name)?;
    let mut values = abi::decode(types, &found.event.data)
        .map_err(|e| GriefingError::Decoding(format!("{} payload: {}", name, e)))?;
    if values.len() != types.len() {
        return Err(GriefingError::Decoding(format!(
            "{} decoded {} fields, expected {}",
            name,
            values.len(),
            types.len()
        )));
    }

    let value = values.swap_remove(index);
    if !rescale {
        return Ok(ExtractedField::Raw(value));
    }
    let units = value.as_uint().ok_or_else(|| {
        GriefingError::Decoding(format!(
            "{} field {} is {}, cannot rescale a non-integer",
            name, index, types[index]
        ))
    })?;
    Ok(ExtractedField::Amount(amount::from_base_units(units)))
}

/// Decode an unsigned integer field without rescaling.
pub fn decode_uint(
    receipt: &TransactionReceipt,
    name: &str,
    types: &[AbiType],
    index: usize,
) -> GriefingResult<u128> {
    match decode_field(receipt, name, types, index, false)? {
        ExtractedField::Raw(AbiValue::Uint(v)) => Ok(v),
        other => Err(GriefingError::Decoding(format!(
            "{} field {} is not an unsigned integer: {:?}",
            name, index, other
        ))),
    }
}

/// Decode an unsigned integer field as a display amount.
pub fn decode_amount(
    receipt: &TransactionReceipt,
    name: &str,
    types: &[AbiType],
    index: usize,
) -> GriefingResult<String> {
    match decode_field(receipt, name, types, index, true)? {
        ExtractedField::Amount(a) => Ok(a),
        ExtractedField::Raw(v) => Err(GriefingError::Decoding(format!(
            "{} field {} was not rescaled: {:?}",
            name, index, v
        ))),
    }
}
