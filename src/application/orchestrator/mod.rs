//! The lifecycle orchestrator: the only writer of requests, bookings and transactions.
//!
//! Every mutating operation follows the same shape. It takes the entity's lock, loads
//! the record, checks the caller's right to act, runs the pure state machine, and writes
//! the result together with any derived records and notification intents in a single
//! [`Changeset`](crate::domain::ports::Changeset). Nothing is written if any step fails.

mod bookings;
mod payments;
mod requests;

use super::locks::EntityLocks;
use crate::domain::booking::{Booking, BookingId};
use crate::domain::commission::CommissionSettings;
use crate::domain::party::{AccountId, Actor};
use crate::domain::ports::{
    BookingFilter, ClockRef, LifecycleStoreRef, PartyDirectoryRef, ServiceCatalogRef, SystemClock,
};
use crate::domain::request::{RequestId, ServiceRequest};
use crate::domain::transaction::{Transaction, TransactionId};
use crate::error::{Entity, LifecycleError, Result};
use chrono::Duration;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Deployment-level rules the state machines are parameterised with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecyclePolicy {
    /// How long after completion a client may still ask for rework.
    pub back_job_window: Duration,
    /// Whether providers may re-price direct (catalog) requests with a quotation.
    pub allow_direct_requote: bool,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            back_job_window: Duration::days(7),
            allow_direct_requote: false,
        }
    }
}

pub struct LifecycleOrchestrator {
    store: LifecycleStoreRef,
    catalog: ServiceCatalogRef,
    directory: PartyDirectoryRef,
    clock: ClockRef,
    commission: RwLock<CommissionSettings>,
    policy: LifecyclePolicy,
    locks: EntityLocks,
}

impl LifecycleOrchestrator {
    pub fn new(
        store: LifecycleStoreRef,
        catalog: ServiceCatalogRef,
        directory: PartyDirectoryRef,
        commission: CommissionSettings,
        policy: LifecyclePolicy,
    ) -> Self {
        Self {
            store,
            catalog,
            directory,
            clock: Arc::new(SystemClock),
            commission: RwLock::new(commission),
            policy,
            locks: EntityLocks::new(),
        }
    }

    /// Replaces the wall clock, for deterministic timestamps in tests.
    pub fn with_clock(mut self, clock: ClockRef) -> Self {
        self.clock = clock;
        self
    }

    pub fn policy(&self) -> LifecyclePolicy {
        self.policy
    }

    pub async fn request(&self, id: RequestId) -> Result<ServiceRequest> {
        self.store
            .request(id)
            .await?
            .ok_or_else(|| LifecycleError::not_found(Entity::Request, id.0))
    }

    pub async fn booking(&self, id: BookingId) -> Result<Booking> {
        self.store
            .booking(id)
            .await?
            .ok_or_else(|| LifecycleError::not_found(Entity::Booking, id.0))
    }

    pub async fn booking_for_request(&self, request: RequestId) -> Result<Option<Booking>> {
        self.store.booking_for_request(request).await
    }

    pub async fn transaction(&self, id: TransactionId) -> Result<Transaction> {
        self.store
            .transaction(id)
            .await?
            .ok_or_else(|| LifecycleError::not_found(Entity::Transaction, id.0))
    }

    /// Unlocked read; may trail concurrent writes.
    pub async fn bookings(&self, filter: &BookingFilter) -> Result<Vec<Booking>> {
        self.store.bookings(filter).await
    }

    pub async fn transactions_for_booking(&self, booking: BookingId) -> Result<Vec<Transaction>> {
        self.booking(booking).await?;
        self.store.transactions_for_booking(booking).await
    }

    pub async fn transactions(&self) -> Result<Vec<Transaction>> {
        self.store.transactions().await
    }
}

fn forbidden(actor: Actor, operation: &'static str, entity: Entity, id: u64) -> LifecycleError {
    LifecycleError::Forbidden {
        actor: actor.id,
        operation,
        entity,
        id,
    }
}

fn ensure_admin(actor: Actor, operation: &'static str, entity: Entity, id: u64) -> Result<()> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(forbidden(actor, operation, entity, id))
    }
}

fn ensure_booking_party(booking: &Booking, actor: Actor, operation: &'static str) -> Result<()> {
    if booking.is_party(actor.id) {
        Ok(())
    } else {
        Err(forbidden(actor, operation, Entity::Booking, booking.id().0))
    }
}

fn ensure_booking_client(booking: &Booking, actor: Actor, operation: &'static str) -> Result<()> {
    if booking.client() == actor.id {
        Ok(())
    } else {
        Err(forbidden(actor, operation, Entity::Booking, booking.id().0))
    }
}

fn ensure_booking_provider(booking: &Booking, actor: Actor, operation: &'static str) -> Result<()> {
    if booking.provider() == Some(actor.id) {
        Ok(())
    } else {
        Err(forbidden(actor, operation, Entity::Booking, booking.id().0))
    }
}

fn is_provider_of(booking: &Booking, account: AccountId) -> bool {
    booking.provider() == Some(account)
}
