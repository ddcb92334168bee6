//! Write-side transaction lifecycle.
//!
//! Every mutating intent runs through one submit-and-confirm cycle:
//!
//! ```text
//! Preparing -> Submitted(tx hash) -> Confirmed(receipt) | Failed(reason)
//! ```
//!
//! Phases are broadcast to subscribers as they happen. A confirmed receipt
//! whose outcome bit is false is reported as `Failed`. Nothing is retried.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{info, warn};

use registry_types::{ListingId, OperationKind, Receipt, Submission, TxHash, ValidationError};

use crate::error::TxError;
use crate::remote::{Confirmation, RemoteStore};

/// Phase of one operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TxPhase {
    Preparing,
    Submitted { tx_hash: TxHash },
    Confirmed { receipt: Receipt },
    Failed { reason: String },
}

impl TxPhase {
    /// Status line for display.
    pub fn label(&self) -> String {
        match self {
            TxPhase::Preparing => "Preparing transaction...".to_string(),
            TxPhase::Submitted { tx_hash } => {
                format!("Waiting for confirmation... (tx: {tx_hash})")
            }
            TxPhase::Confirmed { receipt } => {
                format!("Confirmed in block {}", receipt.block_height)
            }
            TxPhase::Failed { reason } => format!("Transaction failed: {reason}"),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TxPhase::Confirmed { .. } | TxPhase::Failed { .. })
    }
}

/// A phase change of one operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PhaseUpdate {
    pub kind: OperationKind,
    pub listing_id: Option<ListingId>,
    pub phase: TxPhase,
}

/// Drives operations through the store and reports their phases.
pub struct LifecycleManager {
    store: Arc<dyn RemoteStore>,
    phases: broadcast::Sender<PhaseUpdate>,
    in_flight: Arc<Mutex<HashSet<ListingId>>>,
}

/// Releases a listing's in-flight slot when dropped.
struct InFlightGuard {
    listing_id: ListingId,
    in_flight: Arc<Mutex<HashSet<ListingId>>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.listing_id);
    }
}

impl LifecycleManager {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        let (phases, _) = broadcast::channel(64);
        Self {
            store,
            phases,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PhaseUpdate> {
        self.phases.subscribe()
    }

    /// Whether an operation on the listing is Preparing or Submitted.
    pub fn is_in_flight(&self, listing_id: ListingId) -> bool {
        self.in_flight.lock().contains(&listing_id)
    }

    fn claim(&self, listing_id: ListingId) -> Option<InFlightGuard> {
        let mut in_flight = self.in_flight.lock();
        if !in_flight.insert(listing_id) {
            return None;
        }
        Some(InFlightGuard {
            listing_id,
            in_flight: self.in_flight.clone(),
        })
    }

    fn emit(&self, kind: OperationKind, listing_id: Option<ListingId>, phase: TxPhase) {
        match &phase {
            TxPhase::Failed { reason } => {
                warn!(operation = %kind, ?listing_id, %reason, "Transaction failed")
            }
            _ => info!(
                operation = %kind,
                ?listing_id,
                status = %phase.label(),
                "Transaction phase"
            ),
        }
        // No subscribers is fine.
        let _ = self.phases.send(PhaseUpdate {
            kind,
            listing_id,
            phase,
        });
    }

    /// Run one operation to completion.
    ///
    /// `prepare` performs validation and encoding; a validation error ends
    /// the operation before anything is submitted. Operations targeting a
    /// listing are rejected with [`TxError::Busy`] while another operation
    /// on the same listing is unresolved.
    pub async fn execute<F>(
        &self,
        kind: OperationKind,
        listing_id: Option<ListingId>,
        prepare: F,
    ) -> Result<Receipt, TxError>
    where
        F: FnOnce() -> Result<Submission, ValidationError>,
    {
        let _guard = match listing_id {
            Some(id) => Some(self.claim(id).ok_or(TxError::Busy(id))?),
            None => None,
        };

        self.emit(kind, listing_id, TxPhase::Preparing);
        let submission = match prepare() {
            Ok(submission) => submission,
            Err(e) => {
                self.emit(kind, listing_id, TxPhase::Failed { reason: e.to_string() });
                return Err(TxError::Validation(e));
            }
        };

        let handle = match self.store.submit(submission).await {
            Ok(handle) => handle,
            Err(e) => {
                self.emit(kind, listing_id, TxPhase::Failed { reason: e.to_string() });
                return Err(TxError::Store(e));
            }
        };
        let tx_hash = handle.tx_hash;
        self.emit(kind, listing_id, TxPhase::Submitted { tx_hash });

        let outcome = self.store.await_confirmation(&handle).await;
        match outcome {
            Ok(Confirmation::Confirmed(receipt)) if receipt.success => {
                self.emit(
                    kind,
                    listing_id,
                    TxPhase::Confirmed {
                        receipt: receipt.clone(),
                    },
                );
                Ok(receipt)
            }
            Ok(Confirmation::Confirmed(receipt)) => {
                let reason = receipt
                    .failure_reason
                    .unwrap_or_else(|| "execution reverted".to_string());
                self.emit(kind, listing_id, TxPhase::Failed { reason: reason.clone() });
                Err(TxError::Failed {
                    reason,
                    tx_hash: Some(tx_hash),
                })
            }
            Ok(Confirmation::Failed(reason)) => {
                self.emit(kind, listing_id, TxPhase::Failed { reason: reason.clone() });
                Err(TxError::Failed {
                    reason,
                    tx_hash: Some(tx_hash),
                })
            }
            Err(e) => {
                self.emit(kind, listing_id, TxPhase::Failed { reason: e.to_string() });
                Err(TxError::Store(e))
            }
        }
    }
}
