//! User intents on the registry.
//!
//! The orchestrator is the client's facade. Each intent is validated against
//! the latest snapshot, converted into a [`Submission`], driven through the
//! [`LifecycleManager`] and, once confirmed, followed by a refresh request.
//! Failures are returned as-is and do not trigger a refresh.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::warn;

use registry_types::validation::{check_bid, check_transition};
use registry_types::{
    Account, Amount, Listing, ListingDraft, ListingId, Operation, OperationKind, Receipt,
    Submission, Transition, ValidationError,
};

use crate::config::Policy;
use crate::error::OrchestratorError;
use crate::lifecycle::{LifecycleManager, PhaseUpdate};
use crate::remote::RemoteStore;
use crate::sync::{RefreshReason, RefreshTrigger, Snapshot, Synchronizer};

/// Facade combining validation, submission and refresh.
pub struct AuctionOrchestrator {
    store: Arc<dyn RemoteStore>,
    lifecycle: LifecycleManager,
    snapshots: watch::Receiver<Arc<Snapshot>>,
    trigger: Arc<dyn RefreshTrigger>,
    signer: Account,
    policy: Policy,
}

impl AuctionOrchestrator {
    /// Orchestrator that refreshes through `synchronizer` inline after each
    /// confirmed operation.
    pub fn new(
        store: Arc<dyn RemoteStore>,
        synchronizer: Arc<Synchronizer>,
        signer: Account,
        policy: Policy,
    ) -> Self {
        Self {
            lifecycle: LifecycleManager::new(store.clone()),
            snapshots: synchronizer.subscribe(),
            trigger: synchronizer,
            store,
            signer,
            policy,
        }
    }

    /// Route post-confirmation refreshes through another trigger.
    pub fn with_trigger(mut self, trigger: Arc<dyn RefreshTrigger>) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn signer(&self) -> Account {
        self.signer
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Latest snapshot seen by this orchestrator.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe_phases(&self) -> broadcast::Receiver<PhaseUpdate> {
        self.lifecycle.subscribe()
    }

    /// Whether the signer is the registry admin. Advisory only; the ledger
    /// enforces authorization.
    pub async fn is_admin(&self) -> Result<bool, OrchestratorError> {
        Ok(self.store.admin().await? == self.signer)
    }

    /// Smallest bid the client will submit for a listing.
    pub fn min_bid(&self, id: ListingId) -> Option<Amount> {
        self.snapshot()
            .listing(id)
            .map(|listing| listing.min_bid(self.policy.bid_increment))
    }

    pub async fn add_listing(&self, draft: &ListingDraft) -> Result<Receipt, OrchestratorError> {
        let max_image_bytes = self.policy.max_image_bytes;
        self.run(OperationKind::AddListing, None, || {
            let terms = draft.validate(max_image_bytes)?;
            Ok(self.submission(Operation::AddListing(terms), Amount::ZERO))
        })
        .await
    }

    pub async fn update_listing(
        &self,
        id: ListingId,
        draft: &ListingDraft,
    ) -> Result<Receipt, OrchestratorError> {
        let snapshot = self.snapshot();
        let max_image_bytes = self.policy.max_image_bytes;
        self.run(OperationKind::UpdateListing, Some(id), || {
            known_listing(&snapshot, id)?;
            let terms = draft.validate(max_image_bytes)?;
            Ok(self.submission(Operation::UpdateListing { id, terms }, Amount::ZERO))
        })
        .await
    }

    pub async fn delete_listing(&self, id: ListingId) -> Result<Receipt, OrchestratorError> {
        let snapshot = self.snapshot();
        self.run(OperationKind::DeleteListing, Some(id), || {
            known_listing(&snapshot, id)?;
            Ok(self.submission(Operation::DeleteListing { id }, Amount::ZERO))
        })
        .await
    }

    pub async fn start_auction(&self, id: ListingId) -> Result<Receipt, OrchestratorError> {
        self.transition(OperationKind::StartAuction, id, Transition::Start)
            .await
    }

    pub async fn end_auction(&self, id: ListingId) -> Result<Receipt, OrchestratorError> {
        self.transition(OperationKind::EndAuction, id, Transition::End)
            .await
    }

    pub async fn toggle_active(&self, id: ListingId) -> Result<Receipt, OrchestratorError> {
        self.transition(OperationKind::ToggleActive, id, Transition::ToggleActive)
            .await
    }

    /// Place a bid given as decimal text in display units.
    pub async fn place_bid(
        &self,
        id: ListingId,
        amount: &str,
    ) -> Result<Receipt, OrchestratorError> {
        let snapshot = self.snapshot();
        let increment = self.policy.bid_increment;
        self.run(OperationKind::PlaceBid, Some(id), || {
            let listing = known_listing(&snapshot, id)?;
            let value = check_bid(listing, amount, increment)?;
            Ok(self.submission(Operation::PlaceBid { id }, value))
        })
        .await
    }

    async fn transition(
        &self,
        kind: OperationKind,
        id: ListingId,
        transition: Transition,
    ) -> Result<Receipt, OrchestratorError> {
        let snapshot = self.snapshot();
        self.run(kind, Some(id), || {
            check_transition(known_listing(&snapshot, id)?, transition)?;
            let operation = match transition {
                Transition::Start => Operation::StartAuction { id },
                Transition::End => Operation::EndAuction { id },
                Transition::ToggleActive => Operation::ToggleActive { id },
            };
            Ok(self.submission(operation, Amount::ZERO))
        })
        .await
    }

    fn submission(&self, operation: Operation, value: Amount) -> Submission {
        Submission {
            sender: self.signer,
            operation,
            value,
            resource_limit: self.policy.resource_budget,
        }
    }

    async fn run<F>(
        &self,
        kind: OperationKind,
        listing_id: Option<ListingId>,
        prepare: F,
    ) -> Result<Receipt, OrchestratorError>
    where
        F: FnOnce() -> Result<Submission, ValidationError>,
    {
        let receipt = self.lifecycle.execute(kind, listing_id, prepare).await?;

        let reason = RefreshReason::Confirmed {
            tx_hash: receipt.tx_hash,
        };
        if let Err(e) = self.trigger.request_refresh(reason).await {
            warn!(operation = %kind, error = %e, "Refresh after confirmation failed");
        }
        Ok(receipt)
    }
}

fn known_listing(snapshot: &Snapshot, id: ListingId) -> Result<&Listing, ValidationError> {
    snapshot
        .listing(id)
        .ok_or(ValidationError::UnknownListing(id))
}
