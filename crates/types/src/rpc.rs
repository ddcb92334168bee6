//! JSON-RPC wire types shared by the ledger client and the mock ledger.
//!
//! Listing records mirror the ledger's getter tuple: an absent highest
//! bidder is the zero account and a purged record reads back with id `0`.

use serde::{Deserialize, Serialize};

use crate::{Account, Amount, Bid, Listing, ListingId, Timestamp};

/// Error code for reads of ids or indices the ledger does not know.
pub const NOT_FOUND_CODE: i32 = -32001;

/// Error code for submissions refused at acceptance time.
pub const REJECTED_CODE: i32 = -32002;

/// Error code for anything else the server could not handle.
pub const INTERNAL_CODE: i32 = -32000;

pub mod methods {
    pub const ADMIN: &str = "ledger_admin";
    pub const LISTING_COUNTER: &str = "ledger_listingCounter";
    pub const GET_LISTING: &str = "ledger_getListing";
    pub const GET_BID: &str = "ledger_getBid";
    pub const SEND_TRANSACTION: &str = "ledger_sendTransaction";
    pub const GET_RECEIPT: &str = "ledger_getReceipt";
    pub const ADVANCE_BLOCK: &str = "admin_advanceBlock";
}

/// Listing record as returned by `ledger_getListing`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRpc {
    pub id: ListingId,
    pub title: String,
    pub description: String,
    pub image_ref: String,
    pub location: String,
    pub start_price: Amount,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub highest_bidder: Account,
    pub highest_bid: Amount,
    pub is_active: bool,
    pub is_started: bool,
    pub is_ended: bool,
    pub bid_count: u64,
}

impl ListingRpc {
    /// Convert to a domain listing. Records with a zero id are storage
    /// left-overs of purged listings and yield `None`.
    pub fn into_listing(self) -> Option<Listing> {
        if self.id == 0 {
            return None;
        }
        Some(Listing {
            id: self.id,
            title: self.title,
            description: self.description,
            image_ref: self.image_ref,
            location: self.location,
            start_price: self.start_price,
            auction_start: self.start_time,
            auction_end: self.end_time,
            highest_bidder: (!self.highest_bidder.is_zero()).then_some(self.highest_bidder),
            highest_bid: self.highest_bid,
            is_active: self.is_active,
            is_started: self.is_started,
            is_ended: self.is_ended,
            bid_count: self.bid_count,
        })
    }
}

impl From<&Listing> for ListingRpc {
    fn from(l: &Listing) -> Self {
        Self {
            id: l.id,
            title: l.title.clone(),
            description: l.description.clone(),
            image_ref: l.image_ref.clone(),
            location: l.location.clone(),
            start_price: l.start_price,
            start_time: l.auction_start,
            end_time: l.auction_end,
            highest_bidder: l.highest_bidder.unwrap_or(Account::ZERO),
            highest_bid: l.highest_bid,
            is_active: l.is_active,
            is_started: l.is_started,
            is_ended: l.is_ended,
            bid_count: l.bid_count,
        }
    }
}

/// Bid record as returned by `ledger_getBid`.
pub type BidRpc = Bid;

/// Block info response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub height: u64,
    pub timestamp: Timestamp,
    /// Submissions accepted but not yet executed
    pub pending: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_id_reads_as_absent() {
        let purged = ListingRpc::from(&Listing::default());
        assert_eq!(purged.id, 0);
        assert!(purged.into_listing().is_none());
    }

    #[test]
    fn test_zero_bidder_reads_as_none() {
        let listing = Listing {
            id: 2,
            title: "Loft".to_string(),
            ..Default::default()
        };
        let wire = ListingRpc::from(&listing);
        assert_eq!(wire.highest_bidder, Account::ZERO);
        assert_eq!(wire.into_listing(), Some(listing));
    }
}
