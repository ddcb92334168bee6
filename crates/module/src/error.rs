//! Ledger error types.

use thiserror::Error;

use registry_types::{Amount, AuctionState, ListingId, TxHash};

/// Errors raised by the reference ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Listing not found: {0}")]
    ListingNotFound(ListingId),

    #[error("Bid not found: listing {listing_id}, index {index}")]
    BidNotFound { listing_id: ListingId, index: u64 },

    #[error("Invalid state. Expected: {expected}, Got: {got}")]
    InvalidState {
        expected: AuctionState,
        got: AuctionState,
    },

    #[error("Listing {0} cannot be changed once its auction has started")]
    AuctionAlreadyStarted(ListingId),

    #[error("Listing {0} cannot be deleted while its auction is live")]
    AuctionInProgress(ListingId),

    #[error("Bid must exceed {required}, got {got}")]
    BidTooLow { required: Amount, got: Amount },

    #[error("Invalid listing terms: {0}")]
    InvalidTerms(&'static str),

    #[error("Value attached to a call that does not accept value")]
    UnexpectedValue,

    #[error("Not authorized")]
    NotAuthorized,

    #[error("Zero account cannot send transactions")]
    InvalidSender,

    #[error("Resource limit {limit} is below the intrinsic cost {required}")]
    IntrinsicLimitTooLow { required: u64, limit: u64 },

    #[error("Out of resources: need {required}, limit {limit}")]
    ResourceExhausted { required: u64, limit: u64 },

    #[error("Transaction encoding failed: {0}")]
    Encoding(String),

    #[error("Unknown transaction {0}")]
    UnknownTransaction(TxHash),
}

impl LedgerError {
    /// Reads of unknown ids, indices or transactions.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            LedgerError::ListingNotFound(_)
                | LedgerError::BidNotFound { .. }
                | LedgerError::UnknownTransaction(_)
        )
    }
}
