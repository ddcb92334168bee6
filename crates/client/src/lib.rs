//! Client for the auction registry.
//!
//! This crate keeps a local view of a registry whose authoritative state
//! lives on a remote ledger, and submits changes to it:
//! - `sync`: pulls listings and bids into immutable snapshots
//! - `lifecycle`: submit-and-confirm cycle with phase reporting
//! - `orchestrator`: one method per user intent, with local validation
//! - `remote`: the store interface and its JSON-RPC and in-memory backends

pub mod config;
pub mod error;
pub mod input;
pub mod lifecycle;
pub mod orchestrator;
pub mod remote;
pub mod sync;

pub use config::{ClientConfig, Policy};
pub use error::{OrchestratorError, StoreError, TxError};
pub use lifecycle::{LifecycleManager, PhaseUpdate, TxPhase};
pub use orchestrator::AuctionOrchestrator;
pub use remote::{Confirmation, MemoryStore, PendingHandle, RemoteStore, RpcStore};
pub use sync::{
    spawn_poller, ChannelTrigger, ListingEntry, RefreshReason, RefreshTrigger, Snapshot,
    Synchronizer,
};
