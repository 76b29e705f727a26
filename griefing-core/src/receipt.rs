//! Confirmed transaction receipts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::address::Address;

/// An event emitted while executing a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmittedEvent {
    /// Event name from the emitting contract's ABI.
    pub name: String,
    /// Contract that emitted the event.
    pub address: Address,
    /// ABI-encoded non-indexed fields.
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
}

/// A mined transaction and the events it emitted, in emission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    #[serde(with = "hex_bytes")]
    pub transaction_hash: Vec<u8>,
    pub block_number: u64,
    /// Unix timestamp (seconds) of the confirming block.
    pub block_timestamp: u64,
    pub from: Address,
    pub to: Address,
    pub events: Vec<EmittedEvent>,
}

impl TransactionReceipt {
    /// Transaction hash as `0x`-prefixed hex.
    pub fn hash_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.transaction_hash))
    }

    /// Confirmation time as a UTC datetime.
    pub fn confirmed_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(i64::try_from(self.block_timestamp).ok()?, 0)
    }

    /// Events named `name`, in emission order.
    pub fn events_named<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a EmittedEvent> + 'a {
        let name = name.to_owned();
        self.events.iter().filter(move |e| e.name == name)
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(serde::de::Error::custom)
    }
}
