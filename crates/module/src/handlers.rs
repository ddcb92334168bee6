//! Call handlers for the registry ledger.
//!
//! These functions implement the business logic for each operation. Every
//! handler checks authorization and preconditions before touching state, so
//! a failed call leaves the registry unchanged.

use registry_types::{AuctionState, Bid, Listing, ListingId, ListingTerms, Operation};

use crate::error::LedgerError;
use crate::state::RegistryState;

/// Context provided by the block producer for each call.
pub struct CallContext {
    /// Sender of the transaction
    pub sender: registry_types::Account,
    /// Height of the block executing the call
    pub block_height: u64,
    /// Timestamp of the block executing the call
    pub timestamp: u64,
    /// Value attached to the call (the bid amount for bids)
    pub value: registry_types::Amount,
}

/// Result type for handlers.
pub type HandlerResult<T> = Result<T, LedgerError>;

/// Dispatch an operation to its handler.
///
/// Returns the listing the operation created or touched.
pub fn handle_call(
    state: &mut RegistryState,
    ctx: &CallContext,
    operation: &Operation,
) -> HandlerResult<ListingId> {
    if !matches!(operation, Operation::PlaceBid { .. }) && !ctx.value.is_zero() {
        return Err(LedgerError::UnexpectedValue);
    }

    match operation {
        Operation::AddListing(terms) => handle_add_listing(state, ctx, terms),
        Operation::UpdateListing { id, terms } => {
            handle_update_listing(state, ctx, *id, terms).map(|_| *id)
        }
        Operation::DeleteListing { id } => handle_delete_listing(state, ctx, *id).map(|_| *id),
        Operation::StartAuction { id } => handle_start_auction(state, ctx, *id).map(|_| *id),
        Operation::EndAuction { id } => handle_end_auction(state, ctx, *id).map(|_| *id),
        Operation::ToggleActive { id } => handle_toggle_active(state, ctx, *id).map(|_| *id),
        Operation::PlaceBid { id } => handle_place_bid(state, ctx, *id).map(|_| *id),
    }
}

fn ensure_admin(state: &RegistryState, ctx: &CallContext) -> HandlerResult<()> {
    if state.is_admin(&ctx.sender) {
        Ok(())
    } else {
        Err(LedgerError::NotAuthorized)
    }
}

fn check_terms(terms: &ListingTerms) -> HandlerResult<()> {
    if terms.title.trim().is_empty() {
        return Err(LedgerError::InvalidTerms("title is empty"));
    }
    if terms.start_price.is_zero() {
        return Err(LedgerError::InvalidTerms("start price must be positive"));
    }
    if terms.end_time <= terms.start_time {
        return Err(LedgerError::InvalidTerms("auction must end after it starts"));
    }
    Ok(())
}

fn listing(state: &RegistryState, id: ListingId) -> HandlerResult<&Listing> {
    state.get_listing(id).ok_or(LedgerError::ListingNotFound(id))
}

fn listing_mut(state: &mut RegistryState, id: ListingId) -> HandlerResult<&mut Listing> {
    state
        .get_listing_mut(id)
        .ok_or(LedgerError::ListingNotFound(id))
}

/// Handle AddListing call.
pub fn handle_add_listing(
    state: &mut RegistryState,
    ctx: &CallContext,
    terms: &ListingTerms,
) -> HandlerResult<ListingId> {
    ensure_admin(state, ctx)?;
    check_terms(terms)?;

    let id = state.allocate_listing_id();
    let listing = Listing {
        id,
        title: terms.title.clone(),
        description: terms.description.clone(),
        image_ref: terms.image_ref.clone(),
        location: terms.location.clone(),
        start_price: terms.start_price,
        auction_start: terms.start_time,
        auction_end: terms.end_time,
        is_active: true,
        ..Default::default()
    };

    state.listings.insert(id, listing);
    state.bids.insert(id, Vec::new());

    Ok(id)
}

/// Handle UpdateListing call. Terms are frozen once bidding has opened.
pub fn handle_update_listing(
    state: &mut RegistryState,
    ctx: &CallContext,
    id: ListingId,
    terms: &ListingTerms,
) -> HandlerResult<()> {
    ensure_admin(state, ctx)?;
    check_terms(terms)?;

    let listing = listing_mut(state, id)?;
    if listing.is_started {
        return Err(LedgerError::AuctionAlreadyStarted(id));
    }

    listing.title = terms.title.clone();
    listing.description = terms.description.clone();
    listing.image_ref = terms.image_ref.clone();
    listing.location = terms.location.clone();
    listing.start_price = terms.start_price;
    listing.auction_start = terms.start_time;
    listing.auction_end = terms.end_time;

    Ok(())
}

/// Handle DeleteListing call.
pub fn handle_delete_listing(
    state: &mut RegistryState,
    ctx: &CallContext,
    id: ListingId,
) -> HandlerResult<()> {
    ensure_admin(state, ctx)?;

    if listing(state, id)?.state() == AuctionState::Live {
        return Err(LedgerError::AuctionInProgress(id));
    }

    state.purge_listing(id);
    Ok(())
}

/// Handle StartAuction call.
pub fn handle_start_auction(
    state: &mut RegistryState,
    ctx: &CallContext,
    id: ListingId,
) -> HandlerResult<()> {
    ensure_admin(state, ctx)?;

    let listing = listing_mut(state, id)?;
    let got = listing.state();
    if got != AuctionState::NotStarted {
        return Err(LedgerError::InvalidState {
            expected: AuctionState::NotStarted,
            got,
        });
    }

    listing.is_started = true;
    Ok(())
}

/// Handle EndAuction call.
pub fn handle_end_auction(
    state: &mut RegistryState,
    ctx: &CallContext,
    id: ListingId,
) -> HandlerResult<()> {
    ensure_admin(state, ctx)?;

    let listing = listing_mut(state, id)?;
    let got = listing.state();
    if got != AuctionState::Live {
        return Err(LedgerError::InvalidState {
            expected: AuctionState::Live,
            got,
        });
    }

    listing.is_ended = true;
    Ok(())
}

/// Handle ToggleActive call.
pub fn handle_toggle_active(
    state: &mut RegistryState,
    ctx: &CallContext,
    id: ListingId,
) -> HandlerResult<()> {
    ensure_admin(state, ctx)?;

    let listing = listing_mut(state, id)?;
    listing.is_active = !listing.is_active;
    Ok(())
}

/// Handle PlaceBid call. The attached value is the bid.
pub fn handle_place_bid(
    state: &mut RegistryState,
    ctx: &CallContext,
    id: ListingId,
) -> HandlerResult<()> {
    let listing = listing_mut(state, id)?;

    let got = listing.state();
    if got != AuctionState::Live {
        return Err(LedgerError::InvalidState {
            expected: AuctionState::Live,
            got,
        });
    }

    let required = listing.reference_price();
    if ctx.value <= required {
        return Err(LedgerError::BidTooLow {
            required,
            got: ctx.value,
        });
    }

    listing.highest_bid = ctx.value;
    listing.highest_bidder = Some(ctx.sender);
    listing.bid_count += 1;

    state.bids.entry(id).or_default().push(Bid {
        bidder: ctx.sender,
        amount: ctx.value,
        timestamp: ctx.timestamp,
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use registry_types::{Account, Amount};

    const ADMIN: Account = Account([1u8; 20]);
    const BIDDER: Account = Account([2u8; 20]);

    fn amount(text: &str) -> Amount {
        Amount::parse_decimal(text).unwrap()
    }

    fn ctx(sender: Account, value: Amount) -> CallContext {
        CallContext {
            sender,
            block_height: 10,
            timestamp: 1_000,
            value,
        }
    }

    fn terms(title: &str) -> ListingTerms {
        ListingTerms {
            title: title.to_string(),
            description: "Two bedrooms".to_string(),
            image_ref: String::new(),
            location: "Lisbon".to_string(),
            start_price: amount("1.00"),
            start_time: 1_000,
            end_time: 1_000 + 86_400,
        }
    }

    fn setup_listing() -> (RegistryState, ListingId) {
        let mut state = RegistryState::new(ADMIN);
        let id = handle_add_listing(&mut state, &ctx(ADMIN, Amount::ZERO), &terms("Flat")).unwrap();
        (state, id)
    }

    fn setup_live_listing() -> (RegistryState, ListingId) {
        let (mut state, id) = setup_listing();
        handle_start_auction(&mut state, &ctx(ADMIN, Amount::ZERO), id).unwrap();
        (state, id)
    }

    #[test]
    fn test_add_listing() {
        let (state, id) = setup_listing();
        assert_eq!(id, 1);
        let listing = state.get_listing(id).unwrap();
        assert_eq!(listing.state(), AuctionState::NotStarted);
        assert_eq!(listing.bid_count, 0);
        assert!(listing.highest_bidder.is_none());
    }

    #[test]
    fn test_add_listing_requires_admin() {
        let mut state = RegistryState::new(ADMIN);
        let result = handle_add_listing(&mut state, &ctx(BIDDER, Amount::ZERO), &terms("Flat"));
        assert!(matches!(result, Err(LedgerError::NotAuthorized)));
        assert_eq!(state.listing_counter, 0);
    }

    #[test]
    fn test_add_listing_rejects_bad_terms() {
        let mut state = RegistryState::new(ADMIN);
        let mut bad = terms("Flat");
        bad.end_time = bad.start_time;
        let result = handle_add_listing(&mut state, &ctx(ADMIN, Amount::ZERO), &bad);
        assert!(matches!(result, Err(LedgerError::InvalidTerms(_))));
    }

    #[test]
    fn test_value_rejected_on_admin_calls() {
        let (mut state, id) = setup_listing();
        let result = handle_call(
            &mut state,
            &ctx(ADMIN, Amount::CENT),
            &Operation::StartAuction { id },
        );
        assert!(matches!(result, Err(LedgerError::UnexpectedValue)));
        assert!(!state.get_listing(id).unwrap().is_started);
    }

    #[test]
    fn test_update_before_start_only() {
        let (mut state, id) = setup_listing();
        handle_update_listing(&mut state, &ctx(ADMIN, Amount::ZERO), id, &terms("Villa")).unwrap();
        assert_eq!(state.get_listing(id).unwrap().title, "Villa");

        handle_start_auction(&mut state, &ctx(ADMIN, Amount::ZERO), id).unwrap();
        let result = handle_update_listing(&mut state, &ctx(ADMIN, Amount::ZERO), id, &terms("X"));
        assert!(matches!(result, Err(LedgerError::AuctionAlreadyStarted(1))));
    }

    #[test]
    fn test_start_and_end_transitions() {
        let (mut state, id) = setup_listing();
        let admin = ctx(ADMIN, Amount::ZERO);

        let result = handle_end_auction(&mut state, &admin, id);
        assert!(matches!(
            result,
            Err(LedgerError::InvalidState {
                expected: AuctionState::Live,
                got: AuctionState::NotStarted
            })
        ));

        handle_start_auction(&mut state, &admin, id).unwrap();
        assert_eq!(state.get_listing(id).unwrap().state(), AuctionState::Live);

        let result = handle_start_auction(&mut state, &admin, id);
        assert!(matches!(result, Err(LedgerError::InvalidState { .. })));

        handle_end_auction(&mut state, &admin, id).unwrap();
        assert_eq!(state.get_listing(id).unwrap().state(), AuctionState::Ended);
    }

    #[test]
    fn test_toggle_active() {
        let (mut state, id) = setup_live_listing();
        let admin = ctx(ADMIN, Amount::ZERO);

        handle_toggle_active(&mut state, &admin, id).unwrap();
        assert_eq!(state.get_listing(id).unwrap().state(), AuctionState::Inactive);

        handle_toggle_active(&mut state, &admin, id).unwrap();
        assert_eq!(state.get_listing(id).unwrap().state(), AuctionState::Live);
    }

    #[test]
    fn test_place_bid() {
        let (mut state, id) = setup_live_listing();

        handle_place_bid(&mut state, &ctx(BIDDER, amount("1.01")), id).unwrap();

        let listing = state.get_listing(id).unwrap();
        assert_eq!(listing.highest_bid, amount("1.01"));
        assert_eq!(listing.highest_bidder, Some(BIDDER));
        assert_eq!(listing.bid_count, 1);
        assert_eq!(state.get_bids(id).len(), 1);
        assert_eq!(state.get_bids(id)[0].timestamp, 1_000);
    }

    #[test]
    fn test_bid_must_exceed_reference_price() {
        let (mut state, id) = setup_live_listing();

        let result = handle_place_bid(&mut state, &ctx(BIDDER, amount("1.00")), id);
        assert!(matches!(result, Err(LedgerError::BidTooLow { .. })));

        handle_place_bid(&mut state, &ctx(BIDDER, amount("2")), id).unwrap();
        let result = handle_place_bid(&mut state, &ctx(ADMIN, amount("2")), id);
        assert!(matches!(result, Err(LedgerError::BidTooLow { .. })));

        assert_eq!(state.get_listing(id).unwrap().bid_count, 1);
    }

    #[test]
    fn test_bid_requires_live_auction() {
        let (mut state, id) = setup_listing();
        let result = handle_place_bid(&mut state, &ctx(BIDDER, amount("5")), id);
        assert!(matches!(
            result,
            Err(LedgerError::InvalidState {
                expected: AuctionState::Live,
                got: AuctionState::NotStarted
            })
        ));
    }

    #[test]
    fn test_delete_listing() {
        let (mut state, id) = setup_live_listing();
        let admin = ctx(ADMIN, Amount::ZERO);

        let result = handle_delete_listing(&mut state, &admin, id);
        assert!(matches!(result, Err(LedgerError::AuctionInProgress(1))));

        handle_end_auction(&mut state, &admin, id).unwrap();
        handle_delete_listing(&mut state, &admin, id).unwrap();
        assert!(state.get_listing(id).is_none());
        assert_eq!(state.listing_counter, 1);

        let result = handle_delete_listing(&mut state, &admin, id);
        assert!(matches!(result, Err(LedgerError::ListingNotFound(1))));
    }
}
