//! Devnet configuration.

use std::time::Duration;

use griefing_core::{amount, GriefingError, GriefingResult, PROTOCOL_VERSION};
use serde::{Deserialize, Serialize};

/// Devnet configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DevnetConfig {
    /// Protocol version reported by the devnet registry.
    pub protocol_version: String,
    /// Unix timestamp of the genesis block.
    pub genesis_timestamp: u64,
    /// Seconds between consecutive blocks.
    pub block_interval: u64,
    /// Countdown length given to new countdown agreements, in seconds.
    pub countdown_length: u64,
    /// Cost per unit of punishment for new agreements, as a decimal <= 1.
    pub cost_ratio: String,
    /// Tokens minted to every funded account, as a decimal amount.
    pub initial_balance: String,
    /// Delay before a transaction is confirmed.
    #[serde(with = "millis")]
    pub confirmation_delay: Duration,
}

impl Default for DevnetConfig {
    fn default() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            genesis_timestamp: 1_600_000_000,
            block_interval: 15,
            countdown_length: 60 * 60 * 24,
            cost_ratio: "0.3".to_string(),
            initial_balance: "1000".to_string(),
            confirmation_delay: Duration::ZERO,
        }
    }
}

impl DevnetConfig {
    /// Load a config from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> GriefingResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the countdown length for new agreements.
    pub fn with_countdown_length(mut self, seconds: u64) -> Self {
        self.countdown_length = seconds;
        self
    }

    /// Set the cost ratio for new agreements.
    pub fn with_cost_ratio(mut self, ratio: impl Into<String>) -> Self {
        self.cost_ratio = ratio.into();
        self
    }

    /// Set the confirmation delay.
    pub fn with_confirmation_delay(mut self, delay: Duration) -> Self {
        self.confirmation_delay = delay;
        self
    }

    /// Check amounts parse and the cost ratio is at most 1.
    pub fn validate(&self) -> GriefingResult<()> {
        if self.cost_ratio_units()? > amount::UNIT {
            return Err(GriefingError::InvalidAmount(format!(
                "cost ratio {} exceeds 1",
                self.cost_ratio
            )));
        }
        self.initial_balance_units()?;
        Ok(())
    }

    pub(crate) fn cost_ratio_units(&self) -> GriefingResult<u128> {
        amount::to_base_units(&self.cost_ratio)
    }

    pub(crate) fn initial_balance_units(&self) -> GriefingResult<u128> {
        amount::to_base_units(&self.initial_balance)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = DevnetConfig::default();
        assert_eq!(config.countdown_length, 86_400);
        assert_eq!(config.cost_ratio_units().unwrap(), 3 * amount::UNIT / 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn custom_config() {
        let config = DevnetConfig::default()
            .with_countdown_length(120)
            .with_cost_ratio("1")
            .with_confirmation_delay(Duration::from_millis(50));

        assert_eq!(config.countdown_length, 120);
        assert_eq!(config.confirmation_delay, Duration::from_millis(50));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn ratio_above_one_is_rejected() {
        let config = DevnetConfig::default().with_cost_ratio("1.5");
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config = DevnetConfig::from_json(r#"{ "countdown_length": 10, "confirmation_delay": 250 }"#).unwrap();
        assert_eq!(config.countdown_length, 10);
        assert_eq!(config.confirmation_delay, Duration::from_millis(250));
        assert_eq!(config.block_interval, 15);
    }
}
