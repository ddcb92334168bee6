//! In-process store running the reference ledger, with fault injection.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;

use registry_module::queries::{bid_record, listing_record};
use registry_module::{Ledger, LedgerError, LedgerGenesisConfig};
use registry_types::{Account, Bid, Listing, ListingId, Receipt, Submission, TxHash};

use super::{handle_for, Confirmation, PendingHandle, RemoteStore};
use crate::error::StoreError;

#[derive(Default)]
struct Faults {
    unreachable: bool,
    hidden: HashSet<ListingId>,
    broken: HashSet<ListingId>,
    reject_next: Option<String>,
    fail_next: Option<String>,
    doomed: HashMap<TxHash, String>,
}

/// Remote store backed by an in-memory [`Ledger`].
///
/// With auto-mining on (the default), awaiting a confirmation produces the
/// block that includes it. With auto-mining off, confirmations wait until
/// [`MemoryStore::mine`] is called.
pub struct MemoryStore {
    ledger: RwLock<Ledger>,
    auto_mine: AtomicBool,
    mined: Notify,
    faults: Mutex<Faults>,
    submissions: AtomicUsize,
    count_reads: AtomicUsize,
}

impl MemoryStore {
    pub fn new(config: &LedgerGenesisConfig) -> Self {
        Self {
            ledger: RwLock::new(Ledger::new(config)),
            auto_mine: AtomicBool::new(true),
            mined: Notify::new(),
            faults: Mutex::new(Faults::default()),
            submissions: AtomicUsize::new(0),
            count_reads: AtomicUsize::new(0),
        }
    }

    pub fn with_admin(admin: Account) -> Self {
        Self::new(&LedgerGenesisConfig::with_admin(admin))
    }

    pub fn set_auto_mine(&self, enabled: bool) {
        self.auto_mine.store(enabled, Ordering::SeqCst);
    }

    /// Produce one block and wake every waiter.
    pub fn mine(&self) -> Vec<Receipt> {
        let receipts = self.ledger.write().produce_block();
        self.mined.notify_waiters();
        receipts
    }

    /// Make every call fail with a transport error.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.faults.lock().unreachable = unreachable;
    }

    /// Report a listing as not found.
    pub fn hide(&self, id: ListingId) {
        self.faults.lock().hidden.insert(id);
    }

    /// Fail reads of a listing and its bids with a transport error.
    pub fn break_reads(&self, id: ListingId) {
        self.faults.lock().broken.insert(id);
    }

    /// Refuse the next submission at acceptance.
    pub fn reject_next_submission(&self, reason: impl Into<String>) {
        self.faults.lock().reject_next = Some(reason.into());
    }

    /// Drop the next accepted submission and report it failed.
    pub fn fail_next_confirmation(&self, reason: impl Into<String>) {
        self.faults.lock().fail_next = Some(reason.into());
    }

    /// Submissions accepted so far.
    pub fn submission_count(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    /// Number of `listing_count` reads, one per refresh pass.
    pub fn listing_count_reads(&self) -> usize {
        self.count_reads.load(Ordering::SeqCst)
    }

    fn check_reachable(&self) -> Result<(), StoreError> {
        if self.faults.lock().unreachable {
            return Err(StoreError::Transport("store unreachable".to_string()));
        }
        Ok(())
    }

    fn check_readable(&self, id: ListingId) -> Result<(), StoreError> {
        let faults = self.faults.lock();
        if faults.unreachable || faults.broken.contains(&id) {
            return Err(StoreError::Transport(format!("read of listing {id} failed")));
        }
        if faults.hidden.contains(&id) {
            return Err(StoreError::NotFound(format!("listing {id}")));
        }
        Ok(())
    }

    fn poll_confirmation(&self, hash: &TxHash) -> Option<Confirmation> {
        if let Some(reason) = self.faults.lock().doomed.remove(hash) {
            return Some(Confirmation::Failed(reason));
        }
        let ledger = self.ledger.read();
        if let Some(receipt) = ledger.receipt(hash) {
            return Some(Confirmation::Confirmed(receipt.clone()));
        }
        if !ledger.is_pending(hash) {
            return Some(Confirmation::Failed("transaction dropped".to_string()));
        }
        None
    }
}

fn map_ledger_error(err: LedgerError) -> StoreError {
    if err.is_not_found() {
        StoreError::NotFound(err.to_string())
    } else {
        StoreError::SubmissionRejected(err.to_string())
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn admin(&self) -> Result<Account, StoreError> {
        self.check_reachable()?;
        Ok(self.ledger.read().state().admin)
    }

    async fn listing_count(&self) -> Result<u64, StoreError> {
        self.check_reachable()?;
        self.count_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.ledger.read().state().listing_counter)
    }

    async fn get_listing(&self, id: ListingId) -> Result<Listing, StoreError> {
        self.check_readable(id)?;
        let record = listing_record(self.ledger.read().state(), id).map_err(map_ledger_error)?;
        record
            .into_listing()
            .ok_or_else(|| StoreError::NotFound(format!("listing {id} was deleted")))
    }

    async fn get_bid(&self, listing_id: ListingId, index: u64) -> Result<Bid, StoreError> {
        self.check_readable(listing_id)?;
        bid_record(self.ledger.read().state(), listing_id, index).map_err(map_ledger_error)
    }

    async fn submit(&self, submission: Submission) -> Result<PendingHandle, StoreError> {
        self.check_reachable()?;
        if let Some(reason) = self.faults.lock().reject_next.take() {
            return Err(StoreError::SubmissionRejected(reason));
        }

        let tx_hash = self
            .ledger
            .write()
            .accept(submission.clone())
            .map_err(map_ledger_error)?;
        self.submissions.fetch_add(1, Ordering::SeqCst);

        let doomed = self.faults.lock().fail_next.take();
        if let Some(reason) = doomed {
            self.ledger.write().drop_pending(&tx_hash);
            self.faults.lock().doomed.insert(tx_hash, reason);
        }

        Ok(handle_for(&submission, tx_hash))
    }

    async fn await_confirmation(
        &self,
        handle: &PendingHandle,
    ) -> Result<Confirmation, StoreError> {
        loop {
            let notified = self.mined.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            self.check_reachable()?;
            if let Some(confirmation) = self.poll_confirmation(&handle.tx_hash) {
                return Ok(confirmation);
            }

            if self.auto_mine.load(Ordering::SeqCst) {
                self.mine();
                continue;
            }
            notified.await;
        }
    }
}
