//! End-to-end integration tests for the auction registry client.
//!
//! These tests drive the orchestrator against the in-memory store, which
//! runs the same ledger logic as the mock ledger server:
//! 1. Listing creation and synchronization
//! 2. Bidding with the minimum increment
//! 3. Local rejection of illegal transitions
//! 4. Failed confirmations and enumeration gaps

use std::sync::Arc;

use registry_client::{
    AuctionOrchestrator, ChannelTrigger, MemoryStore, OrchestratorError, Policy, RemoteStore,
    Snapshot, Synchronizer, TxError, TxPhase,
};
use registry_module::{ResourceSchedule, DEV_ADMIN};
use registry_types::{
    Account, Amount, AuctionState, ListingDraft, Transition, ValidationError,
};

const BIDDER_A: Account = Account([0xaa; 20]);
const BIDDER_B: Account = Account([0xbb; 20]);

struct Harness {
    store: Arc<MemoryStore>,
    sync: Arc<Synchronizer>,
    admin: AuctionOrchestrator,
}

impl Harness {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::with_admin(DEV_ADMIN));
        let sync = Arc::new(Synchronizer::new(store.clone()));
        let admin =
            AuctionOrchestrator::new(store.clone(), sync.clone(), DEV_ADMIN, Policy::default());
        Self { store, sync, admin }
    }

    fn user(&self, account: Account) -> AuctionOrchestrator {
        AuctionOrchestrator::new(
            self.store.clone(),
            self.sync.clone(),
            account,
            Policy::default(),
        )
    }

    async fn add_listings(&self, count: usize, start_price: &str) {
        for i in 0..count {
            self.admin
                .add_listing(&draft(&format!("Property {i}"), start_price))
                .await
                .unwrap();
        }
    }
}

fn draft(title: &str, start_price: &str) -> ListingDraft {
    ListingDraft {
        title: Some(title.to_string()),
        description: Some("Sea view, two bedrooms".to_string()),
        location: Some("Cascais".to_string()),
        image_ref: "ipfs://bafybeigdyrzt".to_string(),
        start_price: Some(start_price.to_string()),
        auction_start: Some(1_700_000_000),
        auction_duration: Some(7 * 86_400),
    }
}

fn amount(text: &str) -> Amount {
    Amount::parse_decimal(text).unwrap()
}

fn assert_bid_invariants(snapshot: &Snapshot) {
    for entry in snapshot.entries() {
        let listing = &entry.listing;
        assert_eq!(listing.bid_count as usize, entry.bids.len());
        if let Some(last) = entry.bids.last() {
            assert!(listing.highest_bid >= listing.start_price);
            assert_eq!(last.amount, listing.highest_bid);
            assert_eq!(Some(last.bidder), listing.highest_bidder);
        }
        for pair in entry.bids.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
            assert!(pair[0].amount < pair[1].amount);
        }
    }
}

/// startPrice 1.00 with no bids: minimum 1.01, 1.00 rejected, 1.01 accepted.
#[tokio::test]
async fn test_minimum_bid_scenario() {
    let harness = Harness::new();
    harness.add_listings(1, "1.00").await;
    harness.admin.start_auction(1).await.unwrap();

    let bidder = harness.user(BIDDER_A);
    assert_eq!(bidder.min_bid(1), Some(amount("1.01")));

    let submitted_before = harness.store.submission_count();
    let err = bidder.place_bid(1, "1.00").await.unwrap_err();
    assert_eq!(
        err,
        OrchestratorError::Validation(ValidationError::BidTooLow {
            offered: amount("1.00"),
            minimum: amount("1.01"),
        })
    );
    assert_eq!(harness.store.submission_count(), submitted_before);

    bidder.place_bid(1, "1.01").await.unwrap();

    let snapshot = bidder.snapshot();
    let listing = snapshot.listing(1).unwrap();
    assert_eq!(listing.highest_bid, amount("1.01"));
    assert_eq!(listing.highest_bidder, Some(BIDDER_A));
    assert_eq!(listing.bid_count, 1);
    assert_eq!(bidder.min_bid(1), Some(amount("1.02")));
}

/// Starting a Live auction is refused locally and never submitted.
#[tokio::test]
async fn test_start_on_live_rejected_locally() {
    let harness = Harness::new();
    harness.add_listings(1, "1.00").await;
    harness.admin.start_auction(1).await.unwrap();

    let mut phases = harness.admin.subscribe_phases();
    let submitted_before = harness.store.submission_count();

    let err = harness.admin.start_auction(1).await.unwrap_err();
    assert_eq!(
        err,
        OrchestratorError::Validation(ValidationError::IllegalTransition {
            id: 1,
            transition: Transition::Start,
            state: AuctionState::Live,
        })
    );
    assert_eq!(harness.store.submission_count(), submitted_before);

    assert_eq!(phases.try_recv().unwrap().phase, TxPhase::Preparing);
    assert!(matches!(
        phases.try_recv().unwrap().phase,
        TxPhase::Failed { .. }
    ));
}

/// A failed confirmation is surfaced, no refresh runs, the count is unchanged.
#[tokio::test]
async fn test_failed_confirmation_skips_refresh() {
    let harness = Harness::new();
    harness.add_listings(2, "1.00").await;

    let refreshes_before = harness.store.listing_count_reads();
    let generation_before = harness.admin.snapshot().generation();

    harness.store.fail_next_confirmation("resource exhausted");
    let err = harness
        .admin
        .add_listing(&draft("Penthouse", "3"))
        .await
        .unwrap_err();

    match err {
        OrchestratorError::Tx(TxError::Failed { reason, tx_hash }) => {
            assert_eq!(reason, "resource exhausted");
            assert!(tx_hash.is_some());
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(harness.store.listing_count_reads(), refreshes_before);
    assert_eq!(harness.admin.snapshot().generation(), generation_before);
    assert_eq!(harness.store.listing_count().await.unwrap(), 2);
}

/// A budget below the execution cost fails in the receipt, not at submission.
#[tokio::test]
async fn test_resource_budget_exhaustion() {
    let harness = Harness::new();
    let schedule = ResourceSchedule::default();
    let policy = Policy {
        resource_budget: schedule.base + 1_000,
        ..Policy::default()
    };
    let starved = AuctionOrchestrator::new(
        harness.store.clone(),
        harness.sync.clone(),
        DEV_ADMIN,
        policy,
    );

    let err = starved
        .add_listing(&draft("Chalet", "2"))
        .await
        .unwrap_err();
    assert_eq!(err.failure_reason(), Some("out of resources"));
    assert_eq!(harness.store.listing_count().await.unwrap(), 0);
}

/// An image inside the local size limit can still exceed the default budget.
#[tokio::test]
async fn test_large_image_needs_larger_budget() {
    let harness = Harness::new();
    let mut heavy = draft("Manor", "3");
    heavy.image_ref = "x".repeat(8 * 1024);
    assert!(heavy.image_ref.len() < Policy::default().max_image_bytes);

    let err = harness.admin.add_listing(&heavy).await.unwrap_err();
    assert_eq!(err.failure_reason(), Some("out of resources"));
    assert_eq!(harness.store.listing_count().await.unwrap(), 0);

    let funded = AuctionOrchestrator::new(
        harness.store.clone(),
        harness.sync.clone(),
        DEV_ADMIN,
        Policy {
            resource_budget: 2_000_000,
            ..Policy::default()
        },
    );
    let receipt = funded.add_listing(&heavy).await.unwrap();
    assert!(receipt.success);
    assert_eq!(harness.sync.snapshot().len(), 1);
}

/// Ids 1..5 with id 3 not found give a snapshot of 4 listings and no error.
#[tokio::test]
async fn test_enumeration_skips_missing_id() {
    let harness = Harness::new();
    harness.add_listings(5, "1.00").await;
    harness.store.hide(3);

    let snapshot = harness.sync.refresh().await.unwrap();
    assert_eq!(snapshot.len(), 4);
    assert_eq!(snapshot.ids().collect::<Vec<_>>(), vec![1, 2, 4, 5]);
}

/// Deleted listings read back zeroed and drop out of the snapshot.
#[tokio::test]
async fn test_deleted_listing_leaves_snapshot() {
    let harness = Harness::new();
    harness.add_listings(3, "1.00").await;

    harness.admin.delete_listing(2).await.unwrap();

    let snapshot = harness.admin.snapshot();
    assert_eq!(snapshot.ids().collect::<Vec<_>>(), vec![1, 3]);
    assert_eq!(harness.store.listing_count().await.unwrap(), 3);

    harness.add_listings(1, "1.00").await;
    assert_eq!(harness.admin.snapshot().ids().collect::<Vec<_>>(), vec![1, 3, 4]);
}

/// Two refreshes without a mutation in between yield the same content.
#[tokio::test]
async fn test_refresh_idempotent() {
    let harness = Harness::new();
    harness.add_listings(3, "0.5").await;
    harness.admin.start_auction(2).await.unwrap();
    harness.user(BIDDER_A).place_bid(2, "0.75").await.unwrap();

    let first = harness.sync.refresh().await.unwrap();
    let second = harness.sync.refresh().await.unwrap();
    assert!(first.same_content(&second));
    assert!(second.generation() > first.generation());
}

/// Competing bidders keep the bid history consistent with the listing.
#[tokio::test]
async fn test_bidding_war_invariants() {
    let harness = Harness::new();
    harness.add_listings(2, "10").await;
    harness.admin.start_auction(1).await.unwrap();
    harness.admin.start_auction(2).await.unwrap();

    let a = harness.user(BIDDER_A);
    let b = harness.user(BIDDER_B);

    a.place_bid(1, "10.01").await.unwrap();
    b.place_bid(1, "11").await.unwrap();
    a.place_bid(1, "12.5").await.unwrap();
    b.place_bid(2, "10.5").await.unwrap();

    // Stale minimum: b last saw 12.5 and tries to match it.
    let err = b.place_bid(1, "12.5").await.unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::Validation(ValidationError::BidTooLow { .. })
    ));

    let snapshot = harness.sync.refresh().await.unwrap();
    assert_bid_invariants(&snapshot);

    let entry = snapshot.get(1).unwrap();
    assert_eq!(entry.bids.len(), 3);
    assert_eq!(entry.listing.highest_bidder, Some(BIDDER_A));
    assert_eq!(entry.listing.highest_bid, amount("12.5"));
}

/// Full admin lifecycle: toggling hides bidding, ending closes it.
#[tokio::test]
async fn test_admin_lifecycle() {
    let harness = Harness::new();
    harness.add_listings(1, "1").await;
    let bidder = harness.user(BIDDER_A);

    harness.admin.start_auction(1).await.unwrap();
    harness.admin.toggle_active(1).await.unwrap();
    assert_eq!(
        harness.admin.snapshot().listing(1).unwrap().state(),
        AuctionState::Inactive
    );

    let err = bidder.place_bid(1, "2").await.unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::Validation(ValidationError::NotAcceptingBids { .. })
    ));

    harness.admin.toggle_active(1).await.unwrap();
    bidder.place_bid(1, "2").await.unwrap();
    harness.admin.end_auction(1).await.unwrap();
    assert_eq!(
        harness.admin.snapshot().listing(1).unwrap().state(),
        AuctionState::Ended
    );

    let err = harness.admin.end_auction(1).await.unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::Validation(ValidationError::IllegalTransition { .. })
    ));
}

/// A bid while NotStarted passes local checks; the ledger requires Live.
#[tokio::test]
async fn test_ledger_is_final_arbiter_for_bids() {
    let harness = Harness::new();
    harness.add_listings(1, "1").await;

    let err = harness
        .user(BIDDER_A)
        .place_bid(1, "1.01")
        .await
        .unwrap_err();
    let reason = err.failure_reason().unwrap();
    assert!(reason.contains("Invalid state"));
    assert_eq!(harness.admin.snapshot().listing(1).unwrap().bid_count, 0);
}

/// Post-confirmation refreshes can be routed through a background channel.
#[tokio::test]
async fn test_channel_trigger_refresh_after_confirmation() {
    let harness = Harness::new();
    let (trigger, _worker) = ChannelTrigger::spawn(harness.sync.clone());
    let admin = harness.user(DEV_ADMIN).with_trigger(Arc::new(trigger));
    let mut snapshots = harness.sync.subscribe();

    admin.add_listing(&draft("Quinta", "4")).await.unwrap();

    snapshots.changed().await.unwrap();
    assert_eq!(snapshots.borrow().len(), 1);
}

/// Unreachable store: submissions fail with a transport error, nothing is retried.
#[tokio::test]
async fn test_transport_error_surfaces() {
    let harness = Harness::new();
    harness.add_listings(1, "1").await;
    harness.store.set_unreachable(true);

    let err = harness.admin.toggle_active(1).await.unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::Tx(TxError::Store(registry_client::StoreError::Transport(_)))
    ));

    harness.store.set_unreachable(false);
    assert_eq!(
        harness.admin.snapshot().listing(1).unwrap().state(),
        AuctionState::NotStarted
    );
}
