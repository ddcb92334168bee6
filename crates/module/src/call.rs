//! Resource costs of submissions.

use registry_types::{ListingTerms, Operation, Submission};

use crate::genesis::ResourceSchedule;

fn terms_bytes(terms: &ListingTerms) -> u64 {
    (terms.title.len() + terms.description.len() + terms.image_ref.len() + terms.location.len())
        as u64
}

/// Bytes of string payload carried by an operation.
pub fn payload_bytes(operation: &Operation) -> u64 {
    match operation {
        Operation::AddListing(terms) | Operation::UpdateListing { terms, .. } => {
            terms_bytes(terms)
        }
        _ => 0,
    }
}

/// Cost charged before execution; a limit below it is refused at acceptance.
pub fn intrinsic_cost(schedule: &ResourceSchedule, submission: &Submission) -> u64 {
    schedule.base.saturating_add(
        schedule
            .per_payload_byte
            .saturating_mul(payload_bytes(&submission.operation)),
    )
}

/// Cost of executing the operation itself.
pub fn execution_cost(schedule: &ResourceSchedule, operation: &Operation) -> u64 {
    let storage = schedule
        .per_stored_byte
        .saturating_mul(payload_bytes(operation));
    match operation {
        Operation::AddListing(_) => schedule.create_listing.saturating_add(storage),
        Operation::UpdateListing { .. } => schedule.update_listing.saturating_add(storage),
        Operation::DeleteListing { .. }
        | Operation::StartAuction { .. }
        | Operation::EndAuction { .. }
        | Operation::ToggleActive { .. } => schedule.flag_update,
        Operation::PlaceBid { .. } => schedule.place_bid,
    }
}

/// Total cost of a submission.
pub fn total_cost(schedule: &ResourceSchedule, submission: &Submission) -> u64 {
    intrinsic_cost(schedule, submission)
        .saturating_add(execution_cost(schedule, &submission.operation))
}
