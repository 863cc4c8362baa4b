use crate::domain::booking::{Booking, BookingId};
use crate::domain::commission::CommissionSettings;
use crate::domain::notification::{
    DeliveryOutcome, DeliveryState, NotificationId, NotificationIntent,
};
use crate::domain::ports::{BookingFilter, Changeset, LifecycleStore, Sequence};
use crate::domain::request::{RequestId, ServiceRequest};
use crate::domain::transaction::{Transaction, TransactionId};
use crate::error::{LifecycleError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    sequences: HashMap<Sequence, u64>,
    requests: HashMap<RequestId, ServiceRequest>,
    bookings: BTreeMap<BookingId, Booking>,
    booking_by_request: HashMap<RequestId, BookingId>,
    transactions: BTreeMap<TransactionId, Transaction>,
    transaction_by_booking: HashMap<BookingId, TransactionId>,
    outbox: BTreeMap<NotificationId, NotificationIntent>,
    last_notification: u64,
    commission: Option<CommissionSettings>,
}

impl Tables {
    fn check(&self, changes: &Changeset) -> Result<()> {
        for booking in &changes.bookings {
            if let Some(existing) = self.booking_by_request.get(&booking.request())
                && *existing != booking.id()
            {
                return Err(LifecycleError::already_booked(
                    booking.request(),
                    *existing,
                    self.requests.get(&booking.request()),
                ));
            }
        }
        for transaction in &changes.transactions {
            if let Some(existing) = self.transaction_by_booking.get(&transaction.booking())
                && *existing != transaction.id()
            {
                return Err(LifecycleError::DuplicateTransaction {
                    booking: transaction.booking(),
                });
            }
        }
        Ok(())
    }
}

/// A thread-safe in-memory lifecycle store.
///
/// All tables sit behind a single `RwLock`, so a commit is applied under one write
/// guard and readers never observe half of it. Suited to tests and CLI replays.
#[derive(Default, Clone)]
pub struct InMemoryLifecycleStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryLifecycleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LifecycleStore for InMemoryLifecycleStore {
    async fn next_id(&self, sequence: Sequence) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let counter = tables.sequences.entry(sequence).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn request(&self, id: RequestId) -> Result<Option<ServiceRequest>> {
        let tables = self.tables.read().await;
        Ok(tables.requests.get(&id).cloned())
    }

    async fn booking(&self, id: BookingId) -> Result<Option<Booking>> {
        let tables = self.tables.read().await;
        Ok(tables.bookings.get(&id).cloned())
    }

    async fn booking_for_request(&self, request: RequestId) -> Result<Option<Booking>> {
        let tables = self.tables.read().await;
        Ok(tables
            .booking_by_request
            .get(&request)
            .and_then(|id| tables.bookings.get(id))
            .cloned())
    }

    async fn transaction(&self, id: TransactionId) -> Result<Option<Transaction>> {
        let tables = self.tables.read().await;
        Ok(tables.transactions.get(&id).cloned())
    }

    async fn transactions_for_booking(&self, booking: BookingId) -> Result<Vec<Transaction>> {
        let tables = self.tables.read().await;
        Ok(tables
            .transactions
            .values()
            .filter(|tx| tx.booking() == booking)
            .cloned()
            .collect())
    }

    async fn bookings(&self, filter: &BookingFilter) -> Result<Vec<Booking>> {
        let tables = self.tables.read().await;
        Ok(tables
            .bookings
            .values()
            .filter(|booking| filter.matches(booking))
            .cloned()
            .collect())
    }

    async fn transactions(&self) -> Result<Vec<Transaction>> {
        let tables = self.tables.read().await;
        Ok(tables.transactions.values().cloned().collect())
    }

    async fn commit(&self, changes: Changeset) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.check(&changes)?;

        for request in changes.requests {
            tables.requests.insert(request.id(), request);
        }
        for booking in changes.bookings {
            tables.booking_by_request.insert(booking.request(), booking.id());
            tables.bookings.insert(booking.id(), booking);
        }
        for transaction in changes.transactions {
            tables
                .transaction_by_booking
                .insert(transaction.booking(), transaction.id());
            tables.transactions.insert(transaction.id(), transaction);
        }
        for notice in changes.notices {
            tables.last_notification += 1;
            let id = NotificationId(tables.last_notification);
            tables
                .outbox
                .insert(id, NotificationIntent::from_notice(id, notice, changes.at));
        }
        Ok(())
    }

    async fn pending_notifications(&self, limit: usize) -> Result<Vec<NotificationIntent>> {
        let tables = self.tables.read().await;
        Ok(tables
            .outbox
            .values()
            .filter(|intent| intent.delivery == DeliveryState::Pending)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn record_delivery(
        &self,
        id: NotificationId,
        outcome: DeliveryOutcome,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        let intent = tables
            .outbox
            .get_mut(&id)
            .ok_or_else(|| LifecycleError::internal(format!("Notification {id} not in outbox")))?;
        intent.attempts += 1;
        match outcome {
            DeliveryOutcome::Delivered => intent.delivery = DeliveryState::Delivered { at },
            DeliveryOutcome::Failed { .. } => {}
            DeliveryOutcome::Abandoned { error } => {
                intent.delivery = DeliveryState::Abandoned {
                    at,
                    last_error: error,
                }
            }
        }
        Ok(())
    }

    async fn prune_notifications(&self, settled_before: DateTime<Utc>) -> Result<usize> {
        let mut tables = self.tables.write().await;
        let before = tables.outbox.len();
        tables.outbox.retain(|_, intent| {
            intent
                .delivery
                .settled_at()
                .is_none_or(|at| at >= settled_before)
        });
        Ok(before - tables.outbox.len())
    }

    async fn commission_settings(&self) -> Result<Option<CommissionSettings>> {
        let tables = self.tables.read().await;
        Ok(tables.commission.clone())
    }

    async fn save_commission_settings(&self, settings: &CommissionSettings) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.commission = Some(settings.clone());
        Ok(())
    }
}
