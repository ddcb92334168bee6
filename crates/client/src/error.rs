//! Client error types.

use thiserror::Error;

use registry_types::{ListingId, TxHash, ValidationError};

/// Errors reported by a remote store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The id or index does not exist. A skip during enumeration.
    #[error("not found: {0}")]
    NotFound(String),

    /// The store could not be reached. Never retried internally.
    #[error("transport error: {0}")]
    Transport(String),

    /// The store refused to accept the submission.
    #[error("submission rejected: {0}")]
    SubmissionRejected(String),

    /// The store answered with something the client cannot interpret.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Errors from one submit-and-confirm cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxError {
    #[error("listing {0} already has an operation in flight")]
    Busy(ListingId),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The ledger executed or dropped the operation without effect.
    #[error("transaction failed: {reason}")]
    Failed {
        reason: String,
        tx_hash: Option<TxHash>,
    },
}

/// Errors surfaced by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestratorError {
    /// Rejected locally; nothing was submitted.
    #[error(transparent)]
    Validation(ValidationError),

    #[error(transparent)]
    Tx(TxError),
}

impl From<TxError> for OrchestratorError {
    fn from(e: TxError) -> Self {
        match e {
            TxError::Validation(v) => OrchestratorError::Validation(v),
            other => OrchestratorError::Tx(other),
        }
    }
}

impl From<ValidationError> for OrchestratorError {
    fn from(e: ValidationError) -> Self {
        OrchestratorError::Validation(e)
    }
}

impl From<StoreError> for OrchestratorError {
    fn from(e: StoreError) -> Self {
        OrchestratorError::Tx(TxError::Store(e))
    }
}

impl OrchestratorError {
    /// Failure reason reported by the ledger, if the operation got that far.
    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            OrchestratorError::Tx(TxError::Failed { reason, .. }) => Some(reason),
            _ => None,
        }
    }
}
