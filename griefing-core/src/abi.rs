//! Solidity ABI tuple encoding for event payloads and call arguments.
//!
//! Only the head/tail layout and the handful of types the agreement
//! contracts use are covered: `address`, `uintN`, `bool`, `bytes32`,
//! `bytes` and `string`. Integers are carried as `u128`; a `uint256` word
//! whose value does not fit is a decoding error, never a silent truncation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::{GriefingError, GriefingResult};

const WORD: usize = 32;

/// A declared parameter type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbiType {
    Address,
    /// Unsigned integer of the given bit width (8..=256, multiple of 8).
    Uint(u16),
    Bool,
    Bytes32,
    Bytes,
    String,
}

impl AbiType {
    pub const UINT8: AbiType = AbiType::Uint(8);
    pub const UINT256: AbiType = AbiType::Uint(256);

    /// Dynamic types are stored in the tail and referenced by offset.
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Self::Bytes | Self::String)
    }
}

impl fmt::Display for AbiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address => write!(f, "address"),
            Self::Uint(bits) => write!(f, "uint{}", bits),
            Self::Bool => write!(f, "bool"),
            Self::Bytes32 => write!(f, "bytes32"),
            Self::Bytes => write!(f, "bytes"),
            Self::String => write!(f, "string"),
        }
    }
}

/// A decoded (or to-be-encoded) value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AbiValue {
    Address(Address),
    Uint(u128),
    Bool(bool),
    Bytes32([u8; 32]),
    Bytes(Vec<u8>),
    String(String),
}

impl AbiValue {
    pub fn as_uint(&self) -> Option<u128> {
        match self {
            Self::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<Address> {
        match self {
            Self::Address(a) => Some(*a),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            Self::String(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    fn is_dynamic(&self) -> bool {
        matches!(self, Self::Bytes(_) | Self::String(_))
    }
}

/// Decode `data` as a tuple of `types`.
///
/// The result always has exactly `types.len()` elements.
pub fn decode(types: &[AbiType], data: &[u8]) -> GriefingResult<Vec<AbiValue>> {
    let head_len = types.len() * WORD;
    if data.len() < head_len {
        return Err(GriefingError::Decoding(format!(
            "payload of {} bytes is shorter than the {}-field head",
            data.len(),
            types.len()
        )));
    }

    types
        .iter()
        .enumerate()
        .map(|(i, ty)| {
            let head = word_at(data, i * WORD)?;
            if ty.is_dynamic() {
                let offset = word_to_usize(head, "offset")?;
                decode_dynamic(*ty, data, offset)
            } else {
                decode_static(*ty, head)
            }
        })
        .collect()
}

fn word_at(data: &[u8], at: usize) -> GriefingResult<&[u8]> {
    at.checked_add(WORD)
        .and_then(|end| data.get(at..end))
        .ok_or_else(|| GriefingError::Decoding(format!("word at byte {} is out of bounds", at)))
}

fn word_to_usize(word: &[u8], what: &str) -> GriefingResult<usize> {
    if word[..WORD - 8].iter().any(|b| *b != 0) {
        return Err(GriefingError::Decoding(format!("{} does not fit in 64 bits", what)));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&word[WORD - 8..]);
    usize::try_from(u64::from_be_bytes(buf))
        .map_err(|_| GriefingError::Decoding(format!("{} exceeds the address space", what)))
}

fn decode_static(ty: AbiType, word: &[u8]) -> GriefingResult<AbiValue> {
    match ty {
        AbiType::Address => {
            if word[..12].iter().any(|b| *b != 0) {
                return Err(GriefingError::Decoding(
                    "address word has non-zero padding".to_string(),
                ));
            }
            let mut bytes = [0u8; 20];
            bytes.copy_from_slice(&word[12..]);
            Ok(AbiValue::Address(Address::from_bytes(bytes)))
        }
        AbiType::Uint(bits) => {
            if bits == 0 || bits > 256 || bits % 8 != 0 {
                return Err(GriefingError::Decoding(format!("invalid type uint{}", bits)));
            }
            let width = (bits / 8) as usize;
            if word[..WORD - width].iter().any(|b| *b != 0) {
                return Err(GriefingError::Decoding(format!("value overflows uint{}", bits)));
            }
            if word[..16].iter().any(|b| *b != 0) {
                return Err(GriefingError::Decoding(format!(
                    "uint{} value exceeds 128 bits",
                    bits
                )));
            }
            let mut buf = [0u8; 16];
            buf.copy_from_slice(&word[16..]);
            Ok(AbiValue::Uint(u128::from_be_bytes(buf)))
        }
        AbiType::Bool => match word_to_usize(word, "bool")? {
            0 => Ok(AbiValue::Bool(false)),
            1 => Ok(AbiValue::Bool(true)),
            other => Err(GriefingError::Decoding(format!("invalid bool value {}", other))),
        },
        AbiType::Bytes32 => {
            let mut bytes = [0u8; 32];
            bytes.copy_from_slice(word);
            Ok(AbiValue::Bytes32(bytes))
        }
        AbiType::Bytes | AbiType::String => unreachable!("dynamic type decoded as static"),
    }
}

fn decode_dynamic(ty: AbiType, data: &[u8], offset: usize) -> GriefingResult<AbiValue> {
    let len = word_to_usize(word_at(data, offset)?, "length")?;
    let bytes = offset
        .checked_add(WORD)
        .and_then(|start| start.checked_add(len).map(|end| start..end))
        .and_then(|range| data.get(range))
        .ok_or_else(|| {
            GriefingError::Decoding(format!(
                "{} of length {} at offset {} is out of bounds",
                ty, len, offset
            ))
        })?
        .to_vec();

    match ty {
        AbiType::Bytes => Ok(AbiValue::Bytes(bytes)),
        _ => String::from_utf8(bytes)
            .map(AbiValue::String)
            .map_err(|e| GriefingError::Decoding(format!("string is not utf-8: {}", e))),
    }
}

/// Encode `values` as a tuple.
pub fn encode(values: &[AbiValue]) -> Vec<u8> {
    let mut head = Vec::with_capacity(values.len() * WORD);
    let mut tail = Vec::new();
    let head_len = values.len() * WORD;

    for value in values {
        if value.is_dynamic() {
            head.extend_from_slice(&uint_word((head_len + tail.len()) as u128));
            let bytes = value.as_bytes().unwrap_or_default();
            tail.extend_from_slice(&uint_word(bytes.len() as u128));
            tail.extend_from_slice(bytes);
            let pad = (WORD - bytes.len() % WORD) % WORD;
            tail.extend(std::iter::repeat(0u8).take(pad));
        } else {
            head.extend_from_slice(&static_word(value));
        }
    }

    head.extend(tail);
    head
}

fn uint_word(v: u128) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[16..].copy_from_slice(&v.to_be_bytes());
    word
}

fn static_word(value: &AbiValue) -> [u8; WORD] {
    match value {
        AbiValue::Address(a) => {
            let mut word = [0u8; WORD];
            word[12..].copy_from_slice(a.as_bytes());
            word
        }
        AbiValue::Uint(v) => uint_word(*v),
        AbiValue::Bool(b) => uint_word(u128::from(*b)),
        AbiValue::Bytes32(b) => *b,
        AbiValue::Bytes(_) | AbiValue::String(_) => unreachable!("dynamic value encoded as static"),
    }
}
