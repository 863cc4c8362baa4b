//! Wording of the notifications each transition enqueues.

use crate::domain::booking::{Booking, DisputeOutcome};
use crate::domain::notification::{Notice, NotificationCategory};
use crate::domain::party::AccountId;
use crate::domain::request::ServiceRequest;
use crate::domain::transaction::Transaction;

fn to_parties(
    booking: &Booking,
    title: &str,
    message: &str,
    category: NotificationCategory,
) -> Vec<Notice> {
    std::iter::once(booking.client())
        .chain(booking.provider())
        .map(|receiver| Notice::new(receiver, title, message, category))
        .collect()
}

fn to_other_party(
    booking: &Booking,
    actor: AccountId,
    title: &str,
    message: String,
) -> Vec<Notice> {
    std::iter::once(booking.client())
        .chain(booking.provider())
        .filter(|receiver| *receiver != actor)
        .map(|receiver| {
            Notice::new(receiver, title, message.clone(), NotificationCategory::Booking)
        })
        .collect()
}

pub fn request_submitted(request: &ServiceRequest) -> Vec<Notice> {
    request
        .provider()
        .map(|provider| {
            Notice::new(
                provider,
                "New Service Request",
                format!("You have a new {} request #{}.", request.kind().label(), request.id()),
                NotificationCategory::Request,
            )
        })
        .into_iter()
        .collect()
}

pub fn provider_assigned(request: &ServiceRequest, provider: AccountId) -> Vec<Notice> {
    vec![Notice::new(
        provider,
        "Request Assigned",
        format!("Request #{} has been assigned to you.", request.id()),
        NotificationCategory::Request,
    )]
}

pub fn quotation_received(request: &ServiceRequest) -> Vec<Notice> {
    let total = request
        .quotation()
        .map(|quotation| quotation.total().to_string())
        .unwrap_or_default();
    vec![Notice::new(
        request.client(),
        "Quotation Received",
        format!("Request #{} has been quoted at {total}.", request.id()),
        NotificationCategory::Request,
    )]
}

pub fn request_accepted(request: &ServiceRequest, booking: &Booking) -> Vec<Notice> {
    to_parties(
        booking,
        "Request Accepted",
        &format!(
            "Request #{} was accepted. Booking #{} is active at {}.",
            request.id(),
            booking.id(),
            booking.amount_fee()
        ),
        NotificationCategory::Booking,
    )
}

pub fn request_rejected(
    request: &ServiceRequest,
    rejected_by: AccountId,
    previous_provider: Option<AccountId>,
    reason: &str,
) -> Vec<Notice> {
    let mut notices = vec![Notice::new(
        request.client(),
        "Request Rejected",
        format!("Request #{} was rejected: {reason}", request.id()),
        NotificationCategory::Request,
    )];
    if let Some(provider) = previous_provider
        && provider != rejected_by
    {
        notices.push(Notice::new(
            provider,
            "Request Rejected",
            format!("The client rejected request #{}.", request.id()),
            NotificationCategory::Request,
        ));
    }
    notices
}

pub fn request_withdrawn(request: &ServiceRequest) -> Vec<Notice> {
    request
        .provider()
        .map(|provider| {
            Notice::new(
                provider,
                "Request Withdrawn",
                format!("The client withdrew request #{}.", request.id()),
                NotificationCategory::Request,
            )
        })
        .into_iter()
        .collect()
}

pub fn progress_updated(booking: &Booking, actor: AccountId) -> Vec<Notice> {
    to_other_party(
        booking,
        actor,
        "Work In Progress",
        format!("Booking #{} has a progress update.", booking.id()),
    )
}

pub fn booking_completed(booking: &Booking, transaction: Option<&Transaction>) -> Vec<Notice> {
    let mut notices = to_parties(
        booking,
        "Booking Completed",
        &format!(
            "Booking #{} was completed for {}.",
            booking.id(),
            booking.total_amount()
        ),
        NotificationCategory::Booking,
    );
    if let Some(tx) = transaction {
        notices.push(Notice::new(
            tx.provider(),
            "Payout Pending",
            format!(
                "Booking #{}: payout {} after {} commission ({}).",
                booking.id(),
                tx.provider_payout(),
                tx.commission_amount(),
                tx.commission_rate()
            ),
            NotificationCategory::Payment,
        ));
    }
    notices
}

pub fn reschedule_requested(booking: &Booking, actor: AccountId, reason: &str) -> Vec<Notice> {
    to_other_party(
        booking,
        actor,
        "Reschedule Requested",
        format!("A reschedule was requested for booking #{}: {reason}", booking.id()),
    )
}

pub fn reschedule_resolved(booking: &Booking, approved: bool) -> Vec<Notice> {
    let verdict = if approved { "approved" } else { "denied" };
    to_parties(
        booking,
        "Reschedule Resolved",
        &format!("The reschedule for booking #{} was {verdict}.", booking.id()),
        NotificationCategory::Booking,
    )
}

pub fn booking_cancelled(booking: &Booking, actor: AccountId, reason: &str) -> Vec<Notice> {
    to_other_party(
        booking,
        actor,
        "Booking Cancelled",
        format!("Booking #{} was cancelled: {reason}", booking.id()),
    )
}

pub fn back_job_requested(booking: &Booking, reason: &str) -> Vec<Notice> {
    booking
        .provider()
        .map(|provider| {
            Notice::new(
                provider,
                "Back-Job Requested",
                format!("The client asked for rework on booking #{}: {reason}", booking.id()),
                NotificationCategory::Booking,
            )
        })
        .into_iter()
        .collect()
}

pub fn back_job_resolved(booking: &Booking, approved: bool) -> Vec<Notice> {
    let verdict = if approved { "approved" } else { "rejected" };
    vec![Notice::new(
        booking.client(),
        "Back-Job Resolved",
        format!("Your rework request for booking #{} was {verdict}.", booking.id()),
        NotificationCategory::Booking,
    )]
}

pub fn supplement_added(booking: &Booking, label: &str) -> Vec<Notice> {
    vec![Notice::new(
        booking.client(),
        "Rework Supplement",
        format!(
            "A supplement '{label}' was added to booking #{}. New total {}.",
            booking.id(),
            booking.total_amount()
        ),
        NotificationCategory::Payment,
    )]
}

pub fn dispute_opened(booking: &Booking, actor: AccountId) -> Vec<Notice> {
    std::iter::once(booking.client())
        .chain(booking.provider())
        .filter(|receiver| *receiver != actor)
        .map(|receiver| {
            Notice::new(
                receiver,
                "Dispute Opened",
                format!("A dispute was opened on booking #{}.", booking.id()),
                NotificationCategory::Dispute,
            )
        })
        .collect()
}

pub fn dispute_resolved(booking: &Booking, outcome: &DisputeOutcome) -> Vec<Notice> {
    let mut notices = vec![Notice::new(
        booking.client(),
        "Dispute Resolved",
        format!(
            "Your dispute for booking #{} has been resolved ({}).",
            booking.id(),
            outcome.label()
        ),
        NotificationCategory::Info,
    )];
    if let Some(provider) = booking.provider() {
        notices.push(Notice::new(
            provider,
            "Dispute Resolved",
            format!(
                "The dispute for booking #{} has been resolved ({}).",
                booking.id(),
                outcome.label()
            ),
            NotificationCategory::Info,
        ));
    }
    notices
}

pub fn refund_requested(booking: &Booking, amount: &str) -> Vec<Notice> {
    booking
        .provider()
        .map(|provider| {
            Notice::new(
                provider,
                "Refund Requested",
                format!("The client requested a refund of {amount} on booking #{}.", booking.id()),
                NotificationCategory::Payment,
            )
        })
        .into_iter()
        .collect()
}

pub fn refund_resolved(booking: &Booking, approved: bool) -> Vec<Notice> {
    let verdict = if approved { "approved" } else { "rejected" };
    to_parties(
        booking,
        "Refund Resolved",
        &format!("The refund for booking #{} was {verdict}.", booking.id()),
        NotificationCategory::Payment,
    )
}

pub fn payout_paid(transaction: &Transaction) -> Vec<Notice> {
    vec![Notice::new(
        transaction.provider(),
        "Payout Sent",
        format!(
            "Payout {} for booking #{} has been paid.",
            transaction.provider_payout(),
            transaction.booking()
        ),
        NotificationCategory::Payment,
    )]
}
