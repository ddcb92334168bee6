//! Core type definitions for the auction registry.
//!
//! This crate provides the data structures shared by the ledger logic, the
//! client and the mock ledger: listings, bids, the derived auction state,
//! the mutating operations a client may submit, and their receipts.

use std::fmt;
use std::str::FromStr;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod amount;
pub mod rpc;
pub mod validation;

pub use amount::{Amount, AmountError};
pub use validation::{Field, FieldError, ListingDraft, Transition, ValidationError, Violation};

/// Ledger-assigned listing identifier. Valid ids start at 1.
pub type ListingId = u64;

/// Unix timestamp in seconds.
pub type Timestamp = u64;

// =========================
// IDENTIFIERS
// =========================

/// Errors produced when parsing hex identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("expected {expected} bytes, got {got}")]
    InvalidLength { expected: usize, got: usize },
}

fn decode_hex<const N: usize>(s: &str) -> Result<[u8; N], IdentifierError> {
    let trimmed = s.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let bytes = hex::decode(digits).map_err(|e| IdentifierError::InvalidHex(e.to_string()))?;
    let got = bytes.len();
    bytes
        .try_into()
        .map_err(|_| IdentifierError::InvalidLength { expected: N, got })
}

/// Account identifier on the ledger (20 bytes).
///
/// Parsing is case-insensitive; display is lowercase `0x`-prefixed hex.
#[derive(
    Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, BorshSerialize, BorshDeserialize,
    Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct Account(pub [u8; 20]);

impl Account {
    pub const ZERO: Account = Account([0u8; 20]);

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl FromStr for Account {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_hex::<20>(s).map(Account)
    }
}

impl TryFrom<String> for Account {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Account> for String {
    fn from(account: Account) -> Self {
        account.to_string()
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Transaction hash assigned by the ledger when a submission is accepted.
#[derive(
    Clone, Copy, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct TxHash(pub [u8; 32]);

impl FromStr for TxHash {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_hex::<32>(s).map(TxHash)
    }
}

impl TryFrom<String> for TxHash {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TxHash> for String {
    fn from(hash: TxHash) -> Self {
        hash.to_string()
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

// =========================
// REGISTRY RECORDS
// =========================

/// Auction lifecycle state, derived from a listing's ledger flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuctionState {
    /// Disabled by the admin; no action is offered
    Inactive,
    /// Active, waiting for the admin to start bidding
    NotStarted,
    /// Accepting bids
    Live,
    /// Bidding closed
    Ended,
}

impl AuctionState {
    /// Derive the state from the ledger flags. `Inactive` wins over everything.
    pub fn from_flags(is_active: bool, is_started: bool, is_ended: bool) -> Self {
        match (is_active, is_started, is_ended) {
            (false, _, _) => AuctionState::Inactive,
            (true, _, true) => AuctionState::Ended,
            (true, true, false) => AuctionState::Live,
            (true, false, false) => AuctionState::NotStarted,
        }
    }

    /// Whether the client offers bidding in this state.
    pub fn offers_bidding(self) -> bool {
        matches!(self, AuctionState::NotStarted | AuctionState::Live)
    }
}

impl fmt::Display for AuctionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AuctionState::Inactive => "Inactive",
            AuctionState::NotStarted => "Not Started",
            AuctionState::Live => "Live",
            AuctionState::Ended => "Ended",
        })
    }
}

/// One auctioned property as recorded on the ledger.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct Listing {
    pub id: ListingId,
    pub title: String,
    pub description: String,
    /// Opaque image reference; empty means no image
    pub image_ref: String,
    pub location: String,
    pub start_price: Amount,
    pub auction_start: Timestamp,
    pub auction_end: Timestamp,
    pub highest_bidder: Option<Account>,
    /// Zero until the first bid is accepted
    pub highest_bid: Amount,
    pub is_active: bool,
    pub is_started: bool,
    pub is_ended: bool,
    pub bid_count: u64,
}

impl Listing {
    pub fn state(&self) -> AuctionState {
        AuctionState::from_flags(self.is_active, self.is_started, self.is_ended)
    }

    /// The amount a new bid has to beat: the highest bid, or the start price
    /// while no bid exists.
    pub fn reference_price(&self) -> Amount {
        if self.highest_bid.is_zero() {
            self.start_price
        } else {
            self.highest_bid
        }
    }

    /// Smallest bid the client will submit for this listing.
    pub fn min_bid(&self, increment: Amount) -> Amount {
        self.reference_price().saturating_add(increment)
    }
}

/// One accepted bid. Bids are append-only and ordered by acceptance.
#[derive(
    Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct Bid {
    pub bidder: Account,
    pub amount: Amount,
    pub timestamp: Timestamp,
}

// =========================
// OPERATIONS
// =========================

/// Validated listing fields as they cross the ledger boundary.
#[derive(
    Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct ListingTerms {
    pub title: String,
    pub description: String,
    pub image_ref: String,
    pub location: String,
    pub start_price: Amount,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
}

/// Mutating operations accepted by the ledger.
#[derive(
    Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub enum Operation {
    AddListing(ListingTerms),
    UpdateListing { id: ListingId, terms: ListingTerms },
    DeleteListing { id: ListingId },
    StartAuction { id: ListingId },
    EndAuction { id: ListingId },
    ToggleActive { id: ListingId },
    /// The bid amount travels as the submission's attached value.
    PlaceBid { id: ListingId },
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::AddListing(_) => OperationKind::AddListing,
            Operation::UpdateListing { .. } => OperationKind::UpdateListing,
            Operation::DeleteListing { .. } => OperationKind::DeleteListing,
            Operation::StartAuction { .. } => OperationKind::StartAuction,
            Operation::EndAuction { .. } => OperationKind::EndAuction,
            Operation::ToggleActive { .. } => OperationKind::ToggleActive,
            Operation::PlaceBid { .. } => OperationKind::PlaceBid,
        }
    }

    /// Listing targeted by the operation; `None` for a new listing.
    pub fn listing_id(&self) -> Option<ListingId> {
        match self {
            Operation::AddListing(_) => None,
            Operation::UpdateListing { id, .. }
            | Operation::DeleteListing { id }
            | Operation::StartAuction { id }
            | Operation::EndAuction { id }
            | Operation::ToggleActive { id }
            | Operation::PlaceBid { id } => Some(*id),
        }
    }
}

/// Operation discriminant, used for progress reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    AddListing,
    UpdateListing,
    DeleteListing,
    StartAuction,
    EndAuction,
    ToggleActive,
    PlaceBid,
}

impl OperationKind {
    /// Only the admin account may submit these.
    pub fn requires_admin(self) -> bool {
        !matches!(self, OperationKind::PlaceBid)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperationKind::AddListing => "addListing",
            OperationKind::UpdateListing => "updateListing",
            OperationKind::DeleteListing => "deleteListing",
            OperationKind::StartAuction => "startAuction",
            OperationKind::EndAuction => "endAuction",
            OperationKind::ToggleActive => "toggleActive",
            OperationKind::PlaceBid => "placeBid",
        })
    }
}

/// An operation ready for relay: sender, attached value and resource limit.
#[derive(
    Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct Submission {
    pub sender: Account,
    pub operation: Operation,
    /// Value attached to the call; the bid amount for `PlaceBid`, zero otherwise
    pub value: Amount,
    /// Execution budget; the ledger aborts the operation when it is exceeded
    pub resource_limit: u64,
}

/// Outcome of an executed submission.
#[derive(
    Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub block_height: u64,
    pub success: bool,
    pub failure_reason: Option<String>,
    pub resources_used: u64,
    /// Listing created or touched by the operation
    pub listing_id: Option<ListingId>,
}
