use super::booking::BookingId;
use super::commission::CommissionBreakdown;
use super::money::{Money, Rate};
use super::party::AccountId;
use crate::error::{LifecycleError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

record_id!(
    /// Identity of a settled payout record.
    TransactionId
);

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    #[default]
    Pending,
    Paid,
    ClawbackPending,
}

impl PayoutStatus {
    pub const fn label(self) -> &'static str {
        match self {
            PayoutStatus::Pending => "pending",
            PayoutStatus::Paid => "paid",
            PayoutStatus::ClawbackPending => "clawback_pending",
        }
    }
}

/// The money side of a completed booking.
///
/// Amounts are copied from the [`CommissionBreakdown`] they were computed with and are
/// never recomputed. Only `payout_status` moves after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    id: TransactionId,
    booking: BookingId,
    provider: AccountId,
    client: AccountId,
    total_amount: Money,
    commission_rate: Rate,
    commission_amount: Money,
    provider_payout: Money,
    payout_status: PayoutStatus,
    created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn settle(
        id: TransactionId,
        booking: BookingId,
        provider: AccountId,
        client: AccountId,
        breakdown: CommissionBreakdown,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            booking,
            provider,
            client,
            total_amount: breakdown.gross,
            commission_rate: breakdown.rate,
            commission_amount: breakdown.commission,
            provider_payout: breakdown.payout,
            payout_status: PayoutStatus::Pending,
            created_at: now,
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn booking(&self) -> BookingId {
        self.booking
    }

    pub fn provider(&self) -> AccountId {
        self.provider
    }

    pub fn client(&self) -> AccountId {
        self.client
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn commission_rate(&self) -> Rate {
        self.commission_rate
    }

    pub fn commission_amount(&self) -> Money {
        self.commission_amount
    }

    pub fn provider_payout(&self) -> Money {
        self.provider_payout
    }

    pub fn payout_status(&self) -> PayoutStatus {
        self.payout_status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn mark_paid(&mut self) -> Result<()> {
        if self.payout_status != PayoutStatus::Pending {
            return Err(LifecycleError::ValidationError(format!(
                "Payout for transaction {} is {}, not pending",
                self.id,
                self.payout_status.label()
            )));
        }
        self.payout_status = PayoutStatus::Paid;
        Ok(())
    }

    /// Flags the payout for recovery after a refund. Repeated flags are a no-op.
    pub fn flag_clawback(&mut self) {
        self.payout_status = PayoutStatus::ClawbackPending;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::commission::{CommissionSettings, ProviderClassification, compute};
    use rust_decimal_macros::dec;

    fn settled() -> Transaction {
        let breakdown = compute(
            &CommissionSettings::default(),
            Money::new(dec!(250.00)).unwrap(),
            ProviderClassification::Shop,
        )
        .unwrap();
        Transaction::settle(
            TransactionId(1),
            BookingId(1),
            AccountId(10),
            AccountId(1),
            breakdown,
            Utc::now(),
        )
    }

    #[test]
    fn test_settle_copies_breakdown() {
        let tx = settled();
        assert_eq!(tx.commission_amount().value(), dec!(25.00));
        assert_eq!(tx.provider_payout().value(), dec!(225.00));
        assert_eq!(
            tx.commission_amount().checked_add(tx.provider_payout()).unwrap(),
            tx.total_amount()
        );
        assert_eq!(tx.payout_status(), PayoutStatus::Pending);
    }

    #[test]
    fn test_payout_bookkeeping() {
        let mut tx = settled();
        tx.mark_paid().unwrap();
        assert!(matches!(tx.mark_paid(), Err(LifecycleError::ValidationError(_))));

        let before = tx.total_amount();
        tx.flag_clawback();
        assert_eq!(tx.payout_status(), PayoutStatus::ClawbackPending);
        assert_eq!(tx.total_amount(), before);
        assert!(tx.mark_paid().is_err());
    }

    #[test]
    fn test_transaction_json_round_trip() {
        let tx = settled();
        let json = serde_json::to_string(&tx).unwrap();
        let back: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tx);
    }
}
