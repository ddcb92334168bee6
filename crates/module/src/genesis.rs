//! Genesis configuration for the reference ledger.

use serde::{Deserialize, Serialize};

use registry_types::{Account, Timestamp};

/// Well-known development admin account.
pub const DEV_ADMIN: Account = Account([
    0xf3, 0x9f, 0xd6, 0xe5, 0x1a, 0xad, 0x88, 0xf6, 0xf4, 0xce, 0x6a, 0xb8, 0x82, 0x72, 0x79, 0xcf,
    0xff, 0xb9, 0x22, 0x66,
]);

/// Genesis configuration for the ledger.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerGenesisConfig {
    /// Account allowed to manage listings
    pub admin: Account,

    /// Timestamp of the genesis block
    pub initial_timestamp: Timestamp,

    /// Seconds added to the clock per produced block
    pub block_interval_secs: u64,

    /// Resource costs charged per submission
    pub schedule: ResourceSchedule,
}

/// Resource costs. Units are abstract; only their sum against a
/// submission's `resource_limit` matters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSchedule {
    /// Charged for every submission
    pub base: u64,
    /// Per byte of string payload carried by the submission
    pub per_payload_byte: u64,
    /// Per byte of string payload written to storage
    pub per_stored_byte: u64,
    pub create_listing: u64,
    pub update_listing: u64,
    /// Delete, start, end and toggle
    pub flag_update: u64,
    pub place_bid: u64,
}

impl Default for ResourceSchedule {
    fn default() -> Self {
        Self {
            base: 21_000,
            per_payload_byte: 16,
            per_stored_byte: 100,
            create_listing: 100_000,
            update_listing: 50_000,
            flag_update: 25_000,
            place_bid: 60_000,
        }
    }
}

impl Default for LedgerGenesisConfig {
    fn default() -> Self {
        Self {
            admin: DEV_ADMIN,
            initial_timestamp: 1_700_000_000,
            block_interval_secs: 12,
            schedule: ResourceSchedule::default(),
        }
    }
}

impl LedgerGenesisConfig {
    pub fn with_admin(admin: Account) -> Self {
        Self {
            admin,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), GenesisValidationError> {
        if self.admin.is_zero() {
            return Err(GenesisValidationError::ZeroAdmin);
        }
        if self.block_interval_secs == 0 {
            return Err(GenesisValidationError::ZeroBlockInterval);
        }
        Ok(())
    }
}

/// Errors that can occur during genesis validation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GenesisValidationError {
    #[error("Admin cannot be the zero account")]
    ZeroAdmin,

    #[error("Block interval must be at least one second")]
    ZeroBlockInterval,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LedgerGenesisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.admin.to_string(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[test]
    fn test_zero_admin_rejected() {
        let config = LedgerGenesisConfig::with_admin(Account::ZERO);
        assert!(matches!(
            config.validate(),
            Err(GenesisValidationError::ZeroAdmin)
        ));
    }
}
