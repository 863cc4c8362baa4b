use super::{LifecycleOrchestrator, ensure_admin};
use crate::application::locks::LockKey;
use crate::application::notices;
use crate::domain::booking::Booking;
use crate::domain::commission::{
    CommissionBreakdown, CommissionSettings, ProviderClassification, RateUpdate, compute,
};
use crate::domain::money::Money;
use crate::domain::party::Actor;
use crate::domain::ports::{Changeset, Sequence};
use crate::domain::transaction::{Transaction, TransactionId};
use crate::error::{Entity, LifecycleError, Result};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

impl LifecycleOrchestrator {
    /// Splits the booking's total with the live rates and links the resulting
    /// transaction to the booking. The caller commits both together.
    pub(super) async fn settle(
        &self,
        booking: &mut Booking,
        now: DateTime<Utc>,
    ) -> Result<Transaction> {
        let provider = booking.provider().ok_or_else(|| {
            LifecycleError::internal(format!(
                "Booking {} completed without a provider",
                booking.id()
            ))
        })?;
        let classification = match self.directory.profile(provider).await? {
            Some(profile) => profile.classification,
            None => {
                warn!(
                    provider = %provider,
                    "No profile for provider, using default commission rate"
                );
                ProviderClassification::Unclassified
            }
        };
        let breakdown = {
            let settings = self.commission.read().await;
            compute(&settings, booking.total_amount(), classification)?
        };

        let id = TransactionId(self.store.next_id(Sequence::Transaction).await?);
        booking.attach_transaction(id)?;
        Ok(Transaction::settle(
            id,
            booking.id(),
            provider,
            booking.client(),
            breakdown,
            now,
        ))
    }

    /// The booking's transaction flagged for payout recovery, if it has one.
    pub(super) async fn clawback(&self, booking: &Booking) -> Result<Option<Transaction>> {
        let Some(id) = booking.transaction() else {
            return Ok(None);
        };
        let mut transaction = self.transaction(id).await?;
        transaction.flag_clawback();
        warn!(booking = %booking.id(), transaction = %id, "Payout flagged for clawback");
        Ok(Some(transaction))
    }

    /// Records that a provider payout went out. Administrator only.
    pub async fn mark_payout_paid(&self, actor: Actor, id: TransactionId) -> Result<Transaction> {
        ensure_admin(actor, "mark paid", Entity::Transaction, id.0)?;
        let booking = self.transaction(id).await?.booking();
        // Serialised with refunds, which flag the same record.
        let _guard = self.locks.acquire(LockKey::Booking(booking)).await;
        let mut transaction = self.transaction(id).await?;

        let now = self.clock.now();
        transaction.mark_paid()?;
        let changes = Changeset::new(now)
            .transaction(transaction.clone())
            .notify(notices::payout_paid(&transaction));
        self.store.commit(changes).await?;

        info!(transaction = %id, payout = %transaction.provider_payout(), "Payout marked paid");
        Ok(transaction)
    }

    pub async fn commission_settings(&self) -> CommissionSettings {
        self.commission.read().await.clone()
    }

    /// Administrative rate change. Applies to transactions settled afterwards only.
    ///
    /// The new settings, with who changed them and when, are saved before they go live.
    pub async fn update_commission_settings(
        &self,
        actor: Actor,
        update: RateUpdate,
    ) -> Result<CommissionSettings> {
        ensure_admin(actor, "update", Entity::CommissionSettings, 1)?;
        let mut settings = self.commission.write().await;
        let mut next = settings.clone();
        next.apply(&update, actor.id, self.clock.now())?;
        self.store.save_commission_settings(&next).await?;
        *settings = next.clone();

        info!(
            admin = %actor.id,
            default_rate = %next.default_rate,
            "Commission settings updated"
        );
        Ok(next)
    }

    /// Forward-looking breakdown with the live rates. Writes nothing.
    pub async fn preview_commission(
        &self,
        gross: Money,
        classification: ProviderClassification,
    ) -> Result<CommissionBreakdown> {
        let settings = self.commission.read().await;
        compute(&settings, gross, classification)
    }
}
