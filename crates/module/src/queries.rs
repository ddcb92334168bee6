//! Query handlers for the registry ledger.
//!
//! These functions provide read-only access to registry state in the record
//! format the RPC surface serves.

use registry_types::rpc::{BidRpc, ListingRpc};
use registry_types::{Listing, ListingId};

use crate::error::LedgerError;
use crate::state::RegistryState;

/// Listing record for an id.
///
/// Ids that were never assigned are not found. Ids whose listing was
/// deleted read back as a zeroed record, the way contract storage does.
pub fn listing_record(state: &RegistryState, id: ListingId) -> Result<ListingRpc, LedgerError> {
    if id == 0 || id > state.listing_counter {
        return Err(LedgerError::ListingNotFound(id));
    }
    Ok(match state.get_listing(id) {
        Some(listing) => ListingRpc::from(listing),
        None => ListingRpc::from(&Listing::default()),
    })
}

/// Bid record by listing and index.
pub fn bid_record(
    state: &RegistryState,
    listing_id: ListingId,
    index: u64,
) -> Result<BidRpc, LedgerError> {
    usize::try_from(index)
        .ok()
        .and_then(|i| state.get_bids(listing_id).get(i))
        .cloned()
        .ok_or(LedgerError::BidNotFound { listing_id, index })
}
