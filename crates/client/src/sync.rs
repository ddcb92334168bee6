//! Read-side synchronization.
//!
//! The [`Synchronizer`] pulls every listing and its bid history from the
//! store and publishes the result as one immutable [`Snapshot`]. Consumers
//! hold `Arc<Snapshot>` values or subscribe to a `watch` channel; nothing
//! mutates a published snapshot.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use registry_types::{Bid, Listing, ListingId, TxHash};

use crate::error::StoreError;
use crate::remote::RemoteStore;

/// Upper bound on the bid buffer reserved before any bid is fetched.
const MAX_BID_PREALLOC: u64 = 1024;

/// A listing with its bids in acceptance order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListingEntry {
    pub listing: Listing,
    pub bids: Vec<Bid>,
}

impl ListingEntry {
    /// Check the record against its bid history.
    pub fn check_consistency(&self) -> Result<(), String> {
        let listing = &self.listing;
        if self.bids.len() as u64 != listing.bid_count {
            return Err(format!(
                "bid count {} but {} bids fetched",
                listing.bid_count,
                self.bids.len()
            ));
        }
        if self.bids.windows(2).any(|w| w[1].timestamp < w[0].timestamp) {
            return Err("bids out of timestamp order".to_string());
        }
        if self.bids.windows(2).any(|w| w[1].amount <= w[0].amount) {
            return Err("bid amounts not increasing".to_string());
        }
        match self.bids.last() {
            Some(last) => {
                if last.amount != listing.highest_bid
                    || Some(last.bidder) != listing.highest_bidder
                {
                    return Err("last bid does not match highest bid".to_string());
                }
                if listing.highest_bid < listing.start_price {
                    return Err("highest bid below start price".to_string());
                }
            }
            None => {
                if !listing.highest_bid.is_zero() || listing.highest_bidder.is_some() {
                    return Err("highest bid set without bids".to_string());
                }
            }
        }
        Ok(())
    }
}

/// Immutable view of the registry at one point in time.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    generation: u64,
    entries: BTreeMap<ListingId, ListingEntry>,
}

impl Snapshot {
    /// Number of the refresh pass that built this snapshot; 0 before the first.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get(&self, id: ListingId) -> Option<&ListingEntry> {
        self.entries.get(&id)
    }

    pub fn listing(&self, id: ListingId) -> Option<&Listing> {
        self.entries.get(&id).map(|e| &e.listing)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in id order.
    pub fn entries(&self) -> impl Iterator<Item = &ListingEntry> {
        self.entries.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = ListingId> + '_ {
        self.entries.keys().copied()
    }

    /// Same listings and bids, ignoring the generation.
    pub fn same_content(&self, other: &Snapshot) -> bool {
        self.entries == other.entries
    }
}

/// Pulls the registry and publishes snapshots.
pub struct Synchronizer {
    store: Arc<dyn RemoteStore>,
    publisher: watch::Sender<Arc<Snapshot>>,
    generation: AtomicU64,
    refresh_lock: Mutex<()>,
}

impl Synchronizer {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        let (publisher, _) = watch::channel(Arc::new(Snapshot::default()));
        Self {
            store,
            publisher,
            generation: AtomicU64::new(0),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.publisher.borrow().clone()
    }

    /// Receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.publisher.subscribe()
    }

    /// Run one full pass and publish its snapshot.
    ///
    /// Only a failure to read the listing count aborts the pass; the previous
    /// snapshot then stays published. Per-listing failures exclude that
    /// listing and are logged.
    pub async fn refresh(&self) -> Result<Arc<Snapshot>, StoreError> {
        let _pass = self.refresh_lock.lock().await;

        let count = self.store.listing_count().await?;
        let mut entries = BTreeMap::new();

        for id in 1..=count {
            match self.fetch_entry(id).await {
                Ok(entry) => match entry.check_consistency() {
                    Ok(()) => {
                        entries.insert(id, entry);
                    }
                    Err(reason) => {
                        warn!(listing_id = id, %reason, "Excluding inconsistent listing");
                    }
                },
                Err(StoreError::NotFound(_)) => {
                    debug!(listing_id = id, "Skipping absent listing");
                }
                Err(e) => {
                    warn!(listing_id = id, error = %e, "Excluding listing after fetch error");
                }
            }
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = Arc::new(Snapshot {
            generation,
            entries,
        });
        self.publisher.send_replace(snapshot.clone());

        info!(
            generation,
            listings = snapshot.len(),
            ids = count,
            "Published snapshot"
        );
        Ok(snapshot)
    }

    async fn fetch_entry(&self, id: ListingId) -> Result<ListingEntry, StoreError> {
        let listing = self.store.get_listing(id).await?;
        // The count comes from the store; only reserve what a sane record needs.
        let mut bids = Vec::with_capacity(listing.bid_count.min(MAX_BID_PREALLOC) as usize);
        for index in 0..listing.bid_count {
            bids.push(self.store.get_bid(id, index).await?);
        }
        Ok(ListingEntry { listing, bids })
    }
}

/// Why a refresh was requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshReason {
    Startup,
    Manual,
    Confirmed { tx_hash: TxHash },
    Periodic,
}

/// Something that can be asked to refresh the local view.
#[async_trait]
pub trait RefreshTrigger: Send + Sync {
    async fn request_refresh(&self, reason: RefreshReason) -> Result<(), StoreError>;
}

/// Refreshes inline; the caller waits for the new snapshot.
#[async_trait]
impl RefreshTrigger for Synchronizer {
    async fn request_refresh(&self, reason: RefreshReason) -> Result<(), StoreError> {
        debug!(?reason, "Refresh requested");
        self.refresh().await.map(|_| ())
    }
}

/// Queues refresh requests for a background worker.
///
/// Requests that arrive while a pass is running collapse into one follow-up
/// pass.
#[derive(Clone)]
pub struct ChannelTrigger {
    sender: mpsc::Sender<RefreshReason>,
}

impl ChannelTrigger {
    /// Start the worker that serves this trigger.
    pub fn spawn(synchronizer: Arc<Synchronizer>) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel::<RefreshReason>(16);
        let worker = tokio::spawn(async move {
            while let Some(reason) = receiver.recv().await {
                // Drain requests queued behind this one.
                while receiver.try_recv().is_ok() {}
                debug!(?reason, "Running queued refresh");
                if let Err(e) = synchronizer.refresh().await {
                    warn!(error = %e, "Background refresh failed");
                }
            }
        });
        (Self { sender }, worker)
    }
}

#[async_trait]
impl RefreshTrigger for ChannelTrigger {
    async fn request_refresh(&self, reason: RefreshReason) -> Result<(), StoreError> {
        match self.sender.try_send(reason) {
            Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => Ok(()),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(StoreError::Transport(
                "refresh worker stopped".to_string(),
            )),
        }
    }
}

/// Request a periodic refresh through `trigger` every `interval`.
pub fn spawn_poller(trigger: Arc<dyn RefreshTrigger>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = trigger.request_refresh(RefreshReason::Periodic).await {
                warn!(error = %e, "Periodic refresh failed");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryStore;
    use registry_types::{Account, Amount, ListingTerms, Operation, Submission};

    const ADMIN: Account = Account([1u8; 20]);

    async fn setup_store(listings: usize) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::with_admin(ADMIN));
        for i in 0..listings {
            let submission = Submission {
                sender: ADMIN,
                operation: Operation::AddListing(ListingTerms {
                    title: format!("House {i}"),
                    description: "Garden".to_string(),
                    image_ref: String::new(),
                    location: "Faro".to_string(),
                    start_price: Amount::CENT,
                    start_time: 1,
                    end_time: 2,
                }),
                value: Amount::ZERO,
                resource_limit: 500_000,
            };
            let handle = store.submit(submission).await.unwrap();
            store.await_confirmation(&handle).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_refresh_publishes_snapshot() {
        let store = setup_store(3).await;
        let sync = Synchronizer::new(store);
        let mut rx = sync.subscribe();

        assert_eq!(sync.snapshot().generation(), 0);
        let snapshot = sync.refresh().await.unwrap();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.generation(), 1);

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 3);
    }

    #[tokio::test]
    async fn test_failed_reads_exclude_only_that_listing() {
        let store = setup_store(3).await;
        store.hide(1);
        store.break_reads(2);
        let sync = Synchronizer::new(store);

        let snapshot = sync.refresh().await.unwrap();
        assert_eq!(snapshot.ids().collect::<Vec<_>>(), vec![3]);
    }

    #[tokio::test]
    async fn test_count_failure_keeps_previous_snapshot() {
        let store = setup_store(2).await;
        let sync = Synchronizer::new(store.clone());
        let first = sync.refresh().await.unwrap();

        store.set_unreachable(true);
        assert!(matches!(
            sync.refresh().await,
            Err(StoreError::Transport(_))
        ));
        assert!(Arc::ptr_eq(&sync.snapshot(), &first));
    }

    #[tokio::test]
    async fn test_refresh_is_idempotent() {
        let store = setup_store(2).await;
        let sync = Synchronizer::new(store);
        let a = sync.refresh().await.unwrap();
        let b = sync.refresh().await.unwrap();
        assert!(a.same_content(&b));
        assert_ne!(a.generation(), b.generation());
    }

    #[test]
    fn test_consistency_check() {
        let bidder = Account([2u8; 20]);
        let mut entry = ListingEntry {
            listing: Listing {
                id: 1,
                start_price: Amount::CENT,
                highest_bid: Amount::parse_decimal("0.02").unwrap(),
                highest_bidder: Some(bidder),
                bid_count: 1,
                ..Default::default()
            },
            bids: vec![Bid {
                bidder,
                amount: Amount::parse_decimal("0.02").unwrap(),
                timestamp: 5,
            }],
        };
        assert!(entry.check_consistency().is_ok());

        entry.listing.bid_count = 2;
        assert!(entry.check_consistency().is_err());

        entry.listing.bid_count = 1;
        entry.listing.highest_bidder = Some(ADMIN);
        assert!(entry.check_consistency().is_err());
    }

    /// Store whose first listing claims an absurd bid count.
    struct CorruptCountStore;

    #[async_trait]
    impl RemoteStore for CorruptCountStore {
        async fn admin(&self) -> Result<Account, StoreError> {
            Ok(ADMIN)
        }

        async fn listing_count(&self) -> Result<u64, StoreError> {
            Ok(2)
        }

        async fn get_listing(&self, id: ListingId) -> Result<Listing, StoreError> {
            Ok(Listing {
                id,
                title: format!("House {id}"),
                start_price: Amount::CENT,
                bid_count: if id == 1 { u64::MAX } else { 0 },
                is_active: true,
                ..Default::default()
            })
        }

        async fn get_bid(&self, listing_id: ListingId, _index: u64) -> Result<Bid, StoreError> {
            Err(StoreError::Transport(format!("bids of {listing_id} unavailable")))
        }

        async fn submit(
            &self,
            _submission: Submission,
        ) -> Result<crate::remote::PendingHandle, StoreError> {
            Err(StoreError::SubmissionRejected("read only".to_string()))
        }

        async fn await_confirmation(
            &self,
            _handle: &crate::remote::PendingHandle,
        ) -> Result<crate::remote::Confirmation, StoreError> {
            Err(StoreError::Transport("read only".to_string()))
        }
    }

    #[tokio::test]
    async fn test_huge_bid_count_excludes_only_that_listing() {
        let sync = Synchronizer::new(Arc::new(CorruptCountStore));
        let snapshot = sync.refresh().await.unwrap();
        assert_eq!(snapshot.ids().collect::<Vec<_>>(), vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poller_refreshes_on_interval() {
        let store = setup_store(2).await;
        let sync = Arc::new(Synchronizer::new(store));
        let mut rx = sync.subscribe();

        let poller = spawn_poller(sync.clone(), Duration::from_secs(30));
        tokio::task::yield_now().await;
        assert_eq!(sync.snapshot().generation(), 0);

        tokio::time::advance(Duration::from_secs(31)).await;
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().generation(), 1);
        assert_eq!(rx.borrow().len(), 2);

        tokio::time::advance(Duration::from_secs(30)).await;
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().generation(), 2);

        poller.abort();
    }

    #[tokio::test]
    async fn test_channel_trigger_refreshes_in_background() {
        let store = setup_store(1).await;
        let sync = Arc::new(Synchronizer::new(store));
        let mut rx = sync.subscribe();
        let (trigger, _worker) = ChannelTrigger::spawn(sync.clone());

        trigger.request_refresh(RefreshReason::Manual).await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().len(), 1);
    }
}
