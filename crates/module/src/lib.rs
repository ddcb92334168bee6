//! Reference ledger logic for the auction registry.
//!
//! This crate implements the registry contract's behavior in memory so the
//! client can be exercised without a real chain:
//!
//! - Listing creation, update, deletion (admin only)
//! - Auction start, end and active toggling (admin only)
//! - Bid placement with the bid amount attached as value
//! - Resource metering with receipt-level failures
//! - Block production turning accepted submissions into receipts
//!
//! # Architecture
//!
//! - `call`: resource costs of submissions
//! - `handlers`: business logic for each operation
//! - `queries`: read-only getters in the ledger's record format
//! - `state`: registry storage
//! - `chain`: mempool, blocks and receipts
//! - `genesis`: initial configuration
//! - `error`: error types
//!
//! # Example
//!
//! ```ignore
//! use registry_module::{Ledger, LedgerGenesisConfig};
//!
//! let mut ledger = Ledger::new(&LedgerGenesisConfig::default());
//! let hash = ledger.accept(submission)?;
//! ledger.produce_block();
//! let receipt = ledger.receipt(&hash);
//! ```

pub mod call;
pub mod chain;
pub mod error;
pub mod genesis;
pub mod handlers;
pub mod queries;
pub mod state;

pub use chain::Ledger;
pub use error::LedgerError;
pub use genesis::{LedgerGenesisConfig, ResourceSchedule, DEV_ADMIN};
pub use handlers::{CallContext, HandlerResult};
pub use state::RegistryState;
