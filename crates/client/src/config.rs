//! Client configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use registry_types::{Amount, AmountError};

/// Errors loading or interpreting the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid bid increment: {0}")]
    InvalidIncrement(AmountError),

    #[error("bid increment must be positive")]
    ZeroIncrement,
}

/// Configuration for the registry client.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// JSON-RPC endpoint of the ledger
    pub rpc_endpoint: String,

    /// Minimum bid increment in display units
    pub bid_increment: String,

    /// Resource limit attached to every submission
    pub resource_budget: u64,

    /// Receipt polling interval while awaiting confirmation
    pub confirmation_poll_ms: u64,

    /// Largest accepted image reference
    ///
    /// This only bounds local validation. The ledger charges listing payload
    /// per byte, so with the default `resource_budget` an `imageRef` above
    /// roughly 3 KiB still fails on chain with "out of resources". Raise the
    /// budget alongside this limit when storing inline images.
    pub max_image_bytes: usize,

    /// Periodic refresh interval; disabled when absent
    pub poll_interval_secs: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rpc_endpoint: "http://127.0.0.1:8545".to_string(),
            bid_increment: "0.01".to_string(),
            resource_budget: 500_000,
            confirmation_poll_ms: 500,
            max_image_bytes: 2 * 1024 * 1024,
            poll_interval_secs: None,
        }
    }
}

impl ClientConfig {
    /// Load from a JSON file. Absent fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Domain rules derived from the configuration.
    pub fn policy(&self) -> Result<Policy, ConfigError> {
        let bid_increment =
            Amount::parse_decimal(&self.bid_increment).map_err(ConfigError::InvalidIncrement)?;
        if bid_increment.is_zero() {
            return Err(ConfigError::ZeroIncrement);
        }
        Ok(Policy {
            bid_increment,
            resource_budget: self.resource_budget,
            max_image_bytes: self.max_image_bytes,
        })
    }

    pub fn confirmation_poll(&self) -> Duration {
        Duration::from_millis(self.confirmation_poll_ms)
    }

    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

/// Global values applied to every intent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Policy {
    pub bid_increment: Amount,
    pub resource_budget: u64,
    /// Local limit only; see [`ClientConfig::max_image_bytes`].
    pub max_image_bytes: usize,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            bid_increment: Amount::CENT,
            resource_budget: 500_000,
            max_image_bytes: 2 * 1024 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_matches_default_config() {
        let policy = ClientConfig::default().policy().unwrap();
        assert_eq!(policy, Policy::default());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"bid_increment": "0.5", "poll_interval_secs": 30}"#).unwrap();
        assert_eq!(config.resource_budget, 500_000);
        assert_eq!(config.poll_interval(), Some(Duration::from_secs(30)));
        assert_eq!(
            config.policy().unwrap().bid_increment,
            Amount::parse_decimal("0.5").unwrap()
        );
    }

    #[test]
    fn test_invalid_increment() {
        let config = ClientConfig {
            bid_increment: "0".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.policy(), Err(ConfigError::ZeroIncrement)));

        let config = ClientConfig {
            bid_increment: "one cent".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.policy(),
            Err(ConfigError::InvalidIncrement(_))
        ));
    }
}
