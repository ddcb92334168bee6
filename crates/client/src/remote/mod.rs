//! Access to the remote registry.
//!
//! [`RemoteStore`] is the only way the client talks to the ledger. Two
//! implementations exist: [`RpcStore`] speaks JSON-RPC to a ledger node and
//! [`MemoryStore`] runs the reference ledger in process for tests and demos.

use async_trait::async_trait;

use registry_types::{Account, Bid, Listing, ListingId, OperationKind, Receipt, Submission, TxHash};

use crate::error::StoreError;

pub mod memory;
pub mod rpc;

pub use memory::MemoryStore;
pub use rpc::RpcStore;

/// Reference to an accepted, not yet confirmed submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingHandle {
    pub tx_hash: TxHash,
    pub kind: OperationKind,
    pub listing_id: Option<ListingId>,
}

/// Outcome of waiting for a submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Confirmation {
    /// Included in a block. The receipt's `success` bit tells whether the
    /// operation took effect.
    Confirmed(Receipt),
    /// Never included (dropped or replaced).
    Failed(String),
}

/// Capability interface to the remote registry.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Account allowed to perform admin operations.
    async fn admin(&self) -> Result<Account, StoreError>;

    /// Number of listing ids ever assigned.
    async fn listing_count(&self) -> Result<u64, StoreError>;

    /// Listing by id. Unassigned, deleted and non-positive ids are `NotFound`.
    async fn get_listing(&self, id: ListingId) -> Result<Listing, StoreError>;

    async fn get_bid(&self, listing_id: ListingId, index: u64) -> Result<Bid, StoreError>;

    /// Hand a submission to the ledger. Returns once it is accepted.
    async fn submit(&self, submission: Submission) -> Result<PendingHandle, StoreError>;

    /// Suspend until the submission is confirmed or known to have failed.
    async fn await_confirmation(&self, handle: &PendingHandle)
        -> Result<Confirmation, StoreError>;
}

pub(crate) fn handle_for(submission: &Submission, tx_hash: TxHash) -> PendingHandle {
    PendingHandle {
        tx_hash,
        kind: submission.operation.kind(),
        listing_id: submission.operation.listing_id(),
    }
}
