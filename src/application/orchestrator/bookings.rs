use super::{
    LifecycleOrchestrator, ensure_admin, ensure_booking_client, ensure_booking_party,
    ensure_booking_provider, forbidden, is_provider_of,
};
use crate::application::locks::LockKey;
use crate::application::notices;
use crate::domain::booking::{Booking, BookingId, CompletionKind, DisputeOutcome};
use crate::domain::money::Money;
use crate::domain::party::Actor;
use crate::domain::ports::Changeset;
use crate::domain::request::QuotedLineItem;
use crate::error::{Entity, Result};
use tracing::info;

impl LifecycleOrchestrator {
    pub async fn update_progress(
        &self,
        actor: Actor,
        id: BookingId,
        note: String,
    ) -> Result<Booking> {
        let _guard = self.locks.acquire(LockKey::Booking(id)).await;
        let mut booking = self.booking(id).await?;
        ensure_booking_party(&booking, actor, "update progress on")?;

        let now = self.clock.now();
        booking.update_progress(note, now)?;
        let changes = Changeset::new(now)
            .booking(booking.clone())
            .notify(notices::progress_updated(&booking, actor.id));
        self.store.commit(changes).await?;

        info!(booking = %id, "Progress updated");
        Ok(booking)
    }

    /// `active → completed`. The first completion settles commission into a
    /// transaction in the same commit; completing rework never does.
    pub async fn complete_booking(
        &self,
        actor: Actor,
        id: BookingId,
        notes: Option<String>,
    ) -> Result<Booking> {
        let _guard = self.locks.acquire(LockKey::Booking(id)).await;
        let mut booking = self.booking(id).await?;
        ensure_booking_party(&booking, actor, "complete")?;

        let now = self.clock.now();
        let kind = booking.complete(notes, now)?;
        let first = kind == CompletionKind::FirstCompletion && booking.transaction().is_none();
        let transaction = if first {
            Some(self.settle(&mut booking, now).await?)
        } else {
            None
        };

        let mut changes = Changeset::new(now)
            .booking(booking.clone())
            .notify(notices::booking_completed(&booking, transaction.as_ref()));
        if let Some(transaction) = transaction {
            info!(
                booking = %id,
                transaction = %transaction.id(),
                commission = %transaction.commission_amount(),
                payout = %transaction.provider_payout(),
                "Commission settled"
            );
            changes = changes.transaction(transaction);
        }
        self.store.commit(changes).await?;

        info!(
            booking = %id,
            total = %booking.total_amount(),
            rework = kind == CompletionKind::Rework,
            "Booking completed"
        );
        Ok(booking)
    }

    pub async fn request_reschedule(
        &self,
        actor: Actor,
        id: BookingId,
        reason: String,
    ) -> Result<Booking> {
        let _guard = self.locks.acquire(LockKey::Booking(id)).await;
        let mut booking = self.booking(id).await?;
        ensure_booking_party(&booking, actor, "reschedule")?;

        let now = self.clock.now();
        booking.request_reschedule(actor.id, actor.role, reason.clone(), now)?;
        let changes = Changeset::new(now)
            .booking(booking.clone())
            .notify(notices::reschedule_requested(&booking, actor.id, &reason));
        self.store.commit(changes).await?;

        info!(booking = %id, by = %actor.id, "Reschedule requested");
        Ok(booking)
    }

    /// Approves or denies the pending reschedule. Either party or an administrator.
    pub async fn resolve_reschedule(
        &self,
        actor: Actor,
        id: BookingId,
        approve: bool,
    ) -> Result<Booking> {
        let _guard = self.locks.acquire(LockKey::Booking(id)).await;
        let mut booking = self.booking(id).await?;
        if !actor.is_admin() {
            ensure_booking_party(&booking, actor, "resolve a reschedule on")?;
        }

        let now = self.clock.now();
        booking.resolve_reschedule(approve, now)?;
        let changes = Changeset::new(now)
            .booking(booking.clone())
            .notify(notices::reschedule_resolved(&booking, approve));
        self.store.commit(changes).await?;

        info!(booking = %id, approved = approve, "Reschedule resolved");
        Ok(booking)
    }

    pub async fn cancel_booking(
        &self,
        actor: Actor,
        id: BookingId,
        reason: String,
    ) -> Result<Booking> {
        let _guard = self.locks.acquire(LockKey::Booking(id)).await;
        let mut booking = self.booking(id).await?;
        if !actor.is_admin() {
            ensure_booking_party(&booking, actor, "cancel")?;
        }

        let now = self.clock.now();
        booking.cancel(actor.id, actor.role, reason.clone(), now)?;
        let changes = Changeset::new(now)
            .booking(booking.clone())
            .notify(notices::booking_cancelled(&booking, actor.id, &reason));
        self.store.commit(changes).await?;

        info!(booking = %id, by = %actor.id, "Booking cancelled");
        Ok(booking)
    }

    /// Client asks for rework on a completed booking, within the configured window.
    pub async fn request_back_job(
        &self,
        actor: Actor,
        id: BookingId,
        reason: String,
    ) -> Result<Booking> {
        let _guard = self.locks.acquire(LockKey::Booking(id)).await;
        let mut booking = self.booking(id).await?;
        ensure_booking_client(&booking, actor, "request a back-job on")?;

        let now = self.clock.now();
        booking.request_back_job(actor.id, reason.clone(), self.policy.back_job_window, now)?;
        let changes = Changeset::new(now)
            .booking(booking.clone())
            .notify(notices::back_job_requested(&booking, &reason));
        self.store.commit(changes).await?;

        info!(booking = %id, "Back-job requested");
        Ok(booking)
    }

    /// Approves (`→ active`) or rejects (`→ completed`) a pending back-job.
    pub async fn resolve_back_job(
        &self,
        actor: Actor,
        id: BookingId,
        approve: bool,
    ) -> Result<Booking> {
        let _guard = self.locks.acquire(LockKey::Booking(id)).await;
        let mut booking = self.booking(id).await?;
        if !(actor.is_admin() || is_provider_of(&booking, actor.id)) {
            return Err(forbidden(actor, "resolve a back-job on", Entity::Booking, id.0));
        }

        let now = self.clock.now();
        if approve {
            booking.approve_back_job(now)?;
        } else {
            booking.reject_back_job(now)?;
        }
        let changes = Changeset::new(now)
            .booking(booking.clone())
            .notify(notices::back_job_resolved(&booking, approve));
        self.store.commit(changes).await?;

        info!(booking = %id, approved = approve, "Back-job resolved");
        Ok(booking)
    }

    /// Prices extra rework as a supplementary line item; `amount_fee` is untouched.
    pub async fn add_supplement(
        &self,
        actor: Actor,
        id: BookingId,
        label: String,
        price: Money,
    ) -> Result<Booking> {
        let _guard = self.locks.acquire(LockKey::Booking(id)).await;
        let mut booking = self.booking(id).await?;
        ensure_booking_provider(&booking, actor, "add a supplement to")?;

        let now = self.clock.now();
        booking.add_supplement(QuotedLineItem::new(label.clone(), price), now)?;
        let changes = Changeset::new(now)
            .booking(booking.clone())
            .notify(notices::supplement_added(&booking, &label));
        self.store.commit(changes).await?;

        info!(booking = %id, price = %price, "Supplement added");
        Ok(booking)
    }

    pub async fn open_dispute(
        &self,
        actor: Actor,
        id: BookingId,
        description: String,
    ) -> Result<Booking> {
        let _guard = self.locks.acquire(LockKey::Booking(id)).await;
        let mut booking = self.booking(id).await?;
        ensure_booking_party(&booking, actor, "dispute")?;

        let now = self.clock.now();
        booking.raise_dispute(actor.id, actor.role, description, now)?;
        let changes = Changeset::new(now)
            .booking(booking.clone())
            .notify(notices::dispute_opened(&booking, actor.id));
        self.store.commit(changes).await?;

        info!(booking = %id, complainer = %actor.id, "Dispute opened");
        Ok(booking)
    }

    /// Administrator closes the open dispute into exactly one terminal outcome.
    ///
    /// Completing a booking that was disputed while active settles its transaction, unless
    /// it already has one from an earlier completion. A cancelled outcome flags an existing
    /// transaction for clawback; a refunded outcome leaves it as it was.
    pub async fn resolve_dispute(
        &self,
        actor: Actor,
        id: BookingId,
        outcome: DisputeOutcome,
        notes: String,
    ) -> Result<Booking> {
        let _guard = self.locks.acquire(LockKey::Booking(id)).await;
        let mut booking = self.booking(id).await?;
        ensure_admin(actor, "resolve a dispute on", Entity::Booking, id.0)?;

        let now = self.clock.now();
        let completed = booking.resolve_dispute(actor.id, outcome.clone(), notes, now)?;
        let touched = match (&outcome, completed) {
            (_, Some(CompletionKind::FirstCompletion)) if booking.transaction().is_none() => {
                Some(self.settle(&mut booking, now).await?)
            }
            (DisputeOutcome::Cancelled, _) => self.clawback(&booking).await?,
            _ => None,
        };

        let changes = Changeset::new(now)
            .booking(booking.clone())
            .notify(notices::dispute_resolved(&booking, &outcome));
        let changes = touched.into_iter().fold(changes, Changeset::transaction);
        self.store.commit(changes).await?;

        info!(booking = %id, outcome = outcome.label(), admin = %actor.id, "Dispute resolved");
        Ok(booking)
    }

    /// Client refund request on a completed booking, outside any dispute.
    pub async fn request_refund(
        &self,
        actor: Actor,
        id: BookingId,
        amount: Money,
        reason: String,
    ) -> Result<Booking> {
        let _guard = self.locks.acquire(LockKey::Booking(id)).await;
        let mut booking = self.booking(id).await?;
        ensure_booking_client(&booking, actor, "request a refund on")?;

        let now = self.clock.now();
        booking.request_refund(actor.id, actor.role, amount, reason, now)?;
        let changes = Changeset::new(now)
            .booking(booking.clone())
            .notify(notices::refund_requested(&booking, &amount.to_string()));
        self.store.commit(changes).await?;

        info!(booking = %id, amount = %amount, "Refund requested");
        Ok(booking)
    }

    /// Administrator decision on a pending refund request.
    pub async fn resolve_refund(
        &self,
        actor: Actor,
        id: BookingId,
        approve: bool,
    ) -> Result<Booking> {
        let _guard = self.locks.acquire(LockKey::Booking(id)).await;
        let mut booking = self.booking(id).await?;
        ensure_admin(actor, "resolve a refund on", Entity::Booking, id.0)?;

        let now = self.clock.now();
        let clawed_back = if approve {
            booking.approve_refund(actor.id, now)?;
            self.clawback(&booking).await?
        } else {
            booking.reject_refund(actor.id, now)?;
            None
        };

        let changes = Changeset::new(now)
            .booking(booking.clone())
            .notify(notices::refund_resolved(&booking, approve));
        let changes = clawed_back.into_iter().fold(changes, Changeset::transaction);
        self.store.commit(changes).await?;

        info!(booking = %id, approved = approve, admin = %actor.id, "Refund resolved");
        Ok(booking)
    }
}
