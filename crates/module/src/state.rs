//! Registry storage.

use std::collections::{BTreeMap, HashMap};

use registry_types::{Account, Bid, Listing, ListingId};

/// Registry state.
///
/// A contract would keep these in storage slots; this is the in-memory
/// equivalent. Deleted listings are removed from `listings` while the
/// counter keeps growing, so ids are never reused.
#[derive(Debug, Default)]
pub struct RegistryState {
    /// The only account allowed to manage listings
    pub admin: Account,

    /// Number of ids ever assigned; also the latest id
    pub listing_counter: u64,

    /// Live records by id
    pub listings: BTreeMap<ListingId, Listing>,

    /// Bid history per listing, in acceptance order
    pub bids: HashMap<ListingId, Vec<Bid>>,
}

impl RegistryState {
    pub fn new(admin: Account) -> Self {
        Self {
            admin,
            ..Default::default()
        }
    }

    /// Assign the next listing id.
    pub fn allocate_listing_id(&mut self) -> ListingId {
        self.listing_counter += 1;
        self.listing_counter
    }

    pub fn is_admin(&self, account: &Account) -> bool {
        self.admin == *account
    }

    pub fn get_listing(&self, id: ListingId) -> Option<&Listing> {
        self.listings.get(&id)
    }

    pub fn get_listing_mut(&mut self, id: ListingId) -> Option<&mut Listing> {
        self.listings.get_mut(&id)
    }

    /// Bid history of a listing; empty for unknown ids.
    pub fn get_bids(&self, id: ListingId) -> &[Bid] {
        self.bids.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Remove a listing and its bids. The id stays allocated.
    pub fn purge_listing(&mut self, id: ListingId) -> Option<Listing> {
        self.bids.remove(&id);
        self.listings.remove(&id)
    }
}
