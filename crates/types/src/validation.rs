//! Client-side auction rules checked before anything is submitted.
//!
//! These checks are advisory: the ledger remains the final arbiter and may
//! still reject an operation that passed here.

use std::fmt;

use thiserror::Error;

use crate::{Amount, AuctionState, Listing, ListingId, ListingTerms, Timestamp};

/// Input fields of a listing form and of a bid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Title,
    Description,
    Location,
    StartPrice,
    AuctionStart,
    AuctionDuration,
    ImageRef,
    BidAmount,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Field::Title => "title",
            Field::Description => "description",
            Field::Location => "location",
            Field::StartPrice => "startPrice",
            Field::AuctionStart => "auctionStart",
            Field::AuctionDuration => "auctionDuration",
            Field::ImageRef => "imageRef",
            Field::BidAmount => "bidAmount",
        })
    }
}

/// What is wrong with a field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Violation {
    Missing,
    NotPositive,
    Invalid(String),
    TooLarge { limit: usize, got: usize },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::Missing => f.write_str("missing"),
            Violation::NotPositive => f.write_str("must be greater than zero"),
            Violation::Invalid(reason) => write!(f, "invalid ({reason})"),
            Violation::TooLarge { limit, got } => {
                write!(f, "too large ({got} bytes, limit {limit})")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldError {
    pub field: Field,
    pub violation: Violation,
}

impl FieldError {
    pub fn new(field: Field, violation: Violation) -> Self {
        Self { field, violation }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.violation)
    }
}

fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Admin-initiated auction transitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Start,
    End,
    ToggleActive,
}

impl Transition {
    pub fn is_legal_from(self, state: AuctionState) -> bool {
        match self {
            Transition::Start => state == AuctionState::NotStarted,
            Transition::End => state == AuctionState::Live,
            Transition::ToggleActive => true,
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Transition::Start => "start",
            Transition::End => "end",
            Transition::ToggleActive => "toggle",
        })
    }
}

/// Local rejection of an intent. Never reaches the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid fields: {}", join_fields(.0))]
    Fields(Vec<FieldError>),

    #[error("cannot {transition} listing {id} while it is {state}")]
    IllegalTransition {
        id: ListingId,
        transition: Transition,
        state: AuctionState,
    },

    #[error("bid of {offered} is below the minimum of {minimum}")]
    BidTooLow { offered: Amount, minimum: Amount },

    #[error("listing {id} does not accept bids while it is {state}")]
    NotAcceptingBids { id: ListingId, state: AuctionState },

    #[error("listing {0} is not in the local snapshot")]
    UnknownListing(ListingId),
}

impl ValidationError {
    /// Field-level errors, empty for non-field violations.
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            ValidationError::Fields(errors) => errors,
            _ => &[],
        }
    }

    /// Fields that were absent from the input.
    pub fn missing_fields(&self) -> Vec<Field> {
        self.field_errors()
            .iter()
            .filter(|e| e.violation == Violation::Missing)
            .map(|e| e.field)
            .collect()
    }
}

/// Raw listing input as entered by a user.
///
/// `validate` turns it into [`ListingTerms`] or reports every problem at
/// once, so a listing is never submitted with partial data.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListingDraft {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub image_ref: String,
    /// Decimal text in display units, e.g. `"1.50"`
    pub start_price: Option<String>,
    pub auction_start: Option<Timestamp>,
    /// Seconds
    pub auction_duration: Option<u64>,
}

impl ListingDraft {
    /// Prefill a draft from an existing listing, for editing.
    pub fn from_listing(listing: &Listing) -> Self {
        Self {
            title: Some(listing.title.clone()),
            description: Some(listing.description.clone()),
            location: Some(listing.location.clone()),
            image_ref: listing.image_ref.clone(),
            start_price: Some(listing.start_price.to_string()),
            auction_start: Some(listing.auction_start),
            auction_duration: Some(listing.auction_end.saturating_sub(listing.auction_start)),
        }
    }

    pub fn validate(&self, max_image_bytes: usize) -> Result<ListingTerms, ValidationError> {
        let mut errors = Vec::new();

        let title = required_text(Field::Title, &self.title, &mut errors);
        let description = required_text(Field::Description, &self.description, &mut errors);
        let location = required_text(Field::Location, &self.location, &mut errors);

        let start_price = match self.start_price.as_deref().map(str::trim) {
            None | Some("") => {
                errors.push(FieldError::new(Field::StartPrice, Violation::Missing));
                None
            }
            Some(text) => match Amount::parse_decimal(text) {
                Ok(amount) if amount.is_zero() => {
                    errors.push(FieldError::new(Field::StartPrice, Violation::NotPositive));
                    None
                }
                Ok(amount) => Some(amount),
                Err(e) => {
                    errors.push(FieldError::new(
                        Field::StartPrice,
                        Violation::Invalid(e.to_string()),
                    ));
                    None
                }
            },
        };

        if self.auction_start.is_none() {
            errors.push(FieldError::new(Field::AuctionStart, Violation::Missing));
        }
        match self.auction_duration {
            None => errors.push(FieldError::new(Field::AuctionDuration, Violation::Missing)),
            Some(0) => errors.push(FieldError::new(
                Field::AuctionDuration,
                Violation::NotPositive,
            )),
            Some(_) => {}
        }

        if self.image_ref.len() > max_image_bytes {
            errors.push(FieldError::new(
                Field::ImageRef,
                Violation::TooLarge {
                    limit: max_image_bytes,
                    got: self.image_ref.len(),
                },
            ));
        }

        let end_time = match (self.auction_start, self.auction_duration) {
            (Some(start), Some(duration)) if duration > 0 => {
                let end = start.checked_add(duration);
                if end.is_none() {
                    errors.push(FieldError::new(
                        Field::AuctionDuration,
                        Violation::Invalid("auction end overflows".to_string()),
                    ));
                }
                end
            }
            _ => None,
        };

        match (
            title,
            description,
            location,
            start_price,
            self.auction_start,
            end_time,
        ) {
            (
                Some(title),
                Some(description),
                Some(location),
                Some(start_price),
                Some(start_time),
                Some(end_time),
            ) if errors.is_empty() => {
                Ok(ListingTerms {
                    title,
                    description,
                    image_ref: self.image_ref.clone(),
                    location,
                    start_price,
                    start_time,
                    end_time,
                })
            }
            _ => Err(ValidationError::Fields(errors)),
        }
    }
}

fn required_text(
    field: Field,
    value: &Option<String>,
    errors: &mut Vec<FieldError>,
) -> Option<String> {
    match value.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => Some(text.to_string()),
        _ => {
            errors.push(FieldError::new(field, Violation::Missing));
            None
        }
    }
}

/// Check an admin transition against the locally known state.
pub fn check_transition(listing: &Listing, transition: Transition) -> Result<(), ValidationError> {
    let state = listing.state();
    if transition.is_legal_from(state) {
        Ok(())
    } else {
        Err(ValidationError::IllegalTransition {
            id: listing.id,
            transition,
            state,
        })
    }
}

/// Parse and check a bid amount against the listing's minimum bid.
pub fn check_bid(
    listing: &Listing,
    amount_text: &str,
    increment: Amount,
) -> Result<Amount, ValidationError> {
    let offered = match Amount::parse_decimal(amount_text) {
        Ok(amount) => amount,
        Err(crate::AmountError::Empty) => {
            return Err(ValidationError::Fields(vec![FieldError::new(
                Field::BidAmount,
                Violation::Missing,
            )]))
        }
        Err(e) => {
            return Err(ValidationError::Fields(vec![FieldError::new(
                Field::BidAmount,
                Violation::Invalid(e.to_string()),
            )]))
        }
    };

    let state = listing.state();
    if !state.offers_bidding() {
        return Err(ValidationError::NotAcceptingBids {
            id: listing.id,
            state,
        });
    }

    let minimum = listing.min_bid(increment);
    if offered < minimum {
        return Err(ValidationError::BidTooLow { offered, minimum });
    }
    Ok(offered)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_draft() -> ListingDraft {
        ListingDraft {
            title: Some("Lakeside cabin".to_string()),
            description: Some("Two rooms, one dock".to_string()),
            location: Some("Lake Tahoe".to_string()),
            image_ref: String::new(),
            start_price: Some("1.00".to_string()),
            auction_start: Some(1_700_000_000),
            auction_duration: Some(86_400),
        }
    }

    fn live_listing() -> Listing {
        Listing {
            id: 1,
            title: "Lakeside cabin".to_string(),
            start_price: Amount::parse_decimal("1.00").unwrap(),
            is_active: true,
            is_started: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_complete_draft_validates() {
        let terms = complete_draft().validate(1024).unwrap();
        assert_eq!(terms.end_time, 1_700_086_400);
        assert_eq!(terms.start_price, Amount::parse_decimal("1").unwrap());
    }

    #[test]
    fn test_missing_fields_are_all_reported() {
        let draft = ListingDraft {
            title: Some("   ".to_string()),
            location: None,
            start_price: None,
            ..complete_draft()
        };
        let err = draft.validate(1024).unwrap_err();
        assert_eq!(
            err.missing_fields(),
            vec![Field::Title, Field::Location, Field::StartPrice]
        );
    }

    #[test]
    fn test_zero_price_and_duration_rejected() {
        let draft = ListingDraft {
            start_price: Some("0".to_string()),
            auction_duration: Some(0),
            ..complete_draft()
        };
        let err = draft.validate(1024).unwrap_err();
        assert_eq!(
            err.field_errors(),
            &[
                FieldError::new(Field::StartPrice, Violation::NotPositive),
                FieldError::new(Field::AuctionDuration, Violation::NotPositive),
            ]
        );
    }

    #[test]
    fn test_oversized_image_rejected() {
        let draft = ListingDraft {
            image_ref: "x".repeat(10),
            ..complete_draft()
        };
        let err = draft.validate(8).unwrap_err();
        assert_eq!(
            err.field_errors(),
            &[FieldError::new(
                Field::ImageRef,
                Violation::TooLarge { limit: 8, got: 10 }
            )]
        );
    }

    #[test]
    fn test_draft_from_listing_round_trips_terms() {
        let terms = complete_draft().validate(1024).unwrap();
        let listing = Listing {
            id: 9,
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
        let again = ListingDraft::from_listing(&listing).validate(1024).unwrap();
        assert_eq!(again, terms);
    }

    #[test]
    fn test_start_rejected_when_live() {
        let err = check_transition(&live_listing(), Transition::Start).unwrap_err();
        assert_eq!(
            err,
            ValidationError::IllegalTransition {
                id: 1,
                transition: Transition::Start,
                state: AuctionState::Live,
            }
        );
        assert!(check_transition(&live_listing(), Transition::End).is_ok());
        assert!(check_transition(&live_listing(), Transition::ToggleActive).is_ok());
    }

    #[test]
    fn test_bid_minimum() {
        let listing = live_listing();
        assert_eq!(
            check_bid(&listing, "1.00", Amount::CENT),
            Err(ValidationError::BidTooLow {
                offered: Amount::parse_decimal("1.00").unwrap(),
                minimum: Amount::parse_decimal("1.01").unwrap(),
            })
        );
        assert_eq!(
            check_bid(&listing, "1.01", Amount::CENT),
            Ok(Amount::parse_decimal("1.01").unwrap())
        );
    }

    #[test]
    fn test_bid_rejected_on_ended_or_inactive() {
        let mut listing = live_listing();
        listing.is_ended = true;
        assert!(matches!(
            check_bid(&listing, "5", Amount::CENT),
            Err(ValidationError::NotAcceptingBids { state: AuctionState::Ended, .. })
        ));
        listing.is_active = false;
        assert!(matches!(
            check_bid(&listing, "5", Amount::CENT),
            Err(ValidationError::NotAcceptingBids { state: AuctionState::Inactive, .. })
        ));
    }

    #[test]
    fn test_bid_amount_must_parse() {
        let err = check_bid(&live_listing(), "", Amount::CENT).unwrap_err();
        assert_eq!(err.missing_fields(), vec![Field::BidAmount]);
        let err = check_bid(&live_listing(), "abc", Amount::CENT).unwrap_err();
        assert_eq!(err.field_errors()[0].field, Field::BidAmount);
    }
}
