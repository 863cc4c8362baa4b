use super::booking::{Booking, BookingId, BookingStatus};
use super::commission::{CommissionSettings, ProviderClassification};
use super::money::Money;
use super::notification::{
    DeliveryOutcome, Notice, NotificationCategory, NotificationId, NotificationIntent,
};
use super::party::AccountId;
use super::request::{RequestId, ServiceId, ServiceRequest};
use super::transaction::{Transaction, TransactionId};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Id sequences handed out by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sequence {
    Request,
    Booking,
    Transaction,
}

impl Sequence {
    pub const fn label(self) -> &'static str {
        match self {
            Sequence::Request => "request",
            Sequence::Booking => "booking",
            Sequence::Transaction => "transaction",
        }
    }
}

/// Everything one lifecycle operation writes. Applied all-or-nothing by
/// [`LifecycleStore::commit`]; notices become outbox intents stamped with `at`.
#[derive(Debug, Clone)]
pub struct Changeset {
    pub at: DateTime<Utc>,
    pub requests: Vec<ServiceRequest>,
    pub bookings: Vec<Booking>,
    pub transactions: Vec<Transaction>,
    pub notices: Vec<Notice>,
}

impl Changeset {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            at,
            requests: Vec::new(),
            bookings: Vec::new(),
            transactions: Vec::new(),
            notices: Vec::new(),
        }
    }

    pub fn request(mut self, request: ServiceRequest) -> Self {
        self.requests.push(request);
        self
    }

    pub fn booking(mut self, booking: Booking) -> Self {
        self.bookings.push(booking);
        self
    }

    pub fn transaction(mut self, transaction: Transaction) -> Self {
        self.transactions.push(transaction);
        self
    }

    pub fn notify(mut self, notices: impl IntoIterator<Item = Notice>) -> Self {
        self.notices.extend(notices);
        self
    }
}

/// Read-side filter for booking listings. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingFilter {
    pub client: Option<AccountId>,
    pub provider: Option<AccountId>,
    pub status: Option<BookingStatus>,
}

impl BookingFilter {
    pub fn matches(&self, booking: &Booking) -> bool {
        self.client.is_none_or(|client| booking.client() == client)
            && self
                .provider
                .is_none_or(|provider| booking.provider() == Some(provider))
            && self.status.is_none_or(|status| booking.status() == status)
    }
}

/// Persistence for requests, bookings, transactions and the notification outbox.
///
/// `commit` must reject a booking for a request that already has a different booking
/// (`AlreadyBooked`) and a transaction for a booking that already has a different one
/// (`DuplicateTransaction`), writing nothing in either case.
#[async_trait]
pub trait LifecycleStore: Send + Sync {
    async fn next_id(&self, sequence: Sequence) -> Result<u64>;
    async fn request(&self, id: RequestId) -> Result<Option<ServiceRequest>>;
    async fn booking(&self, id: BookingId) -> Result<Option<Booking>>;
    async fn booking_for_request(&self, request: RequestId) -> Result<Option<Booking>>;
    async fn transaction(&self, id: TransactionId) -> Result<Option<Transaction>>;
    async fn transactions_for_booking(&self, booking: BookingId) -> Result<Vec<Transaction>>;
    async fn bookings(&self, filter: &BookingFilter) -> Result<Vec<Booking>>;
    async fn transactions(&self) -> Result<Vec<Transaction>>;
    async fn commit(&self, changes: Changeset) -> Result<()>;
    async fn pending_notifications(&self, limit: usize) -> Result<Vec<NotificationIntent>>;
    async fn record_delivery(
        &self,
        id: NotificationId,
        outcome: DeliveryOutcome,
        at: DateTime<Utc>,
    ) -> Result<()>;
    /// Drops delivered and abandoned intents settled before `settled_before`. Pending
    /// intents are never dropped. Returns how many were removed.
    async fn prune_notifications(&self, settled_before: DateTime<Utc>) -> Result<usize>;
    /// The live commission settings, if any were ever saved.
    async fn commission_settings(&self) -> Result<Option<CommissionSettings>>;
    async fn save_commission_settings(&self, settings: &CommissionSettings) -> Result<()>;
}

pub type LifecycleStoreRef = Arc<dyn LifecycleStore>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogService {
    pub id: ServiceId,
    pub name: String,
    pub price: Money,
}

/// Read-only snapshot of the service catalog.
#[async_trait]
pub trait ServiceCatalog: Send + Sync {
    async fn service(&self, id: ServiceId) -> Result<Option<CatalogService>>;
}

pub type ServiceCatalogRef = Arc<dyn ServiceCatalog>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyProfile {
    pub id: AccountId,
    pub display_name: String,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub classification: ProviderClassification,
}

/// Identity collaborator: display attributes and commission classification.
#[async_trait]
pub trait PartyDirectory: Send + Sync {
    async fn profile(&self, id: AccountId) -> Result<Option<PartyProfile>>;
}

pub type PartyDirectoryRef = Arc<dyn PartyDirectory>;

/// Delivery channel for outbox intents. Duplicates are tolerated.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(
        &self,
        receiver: AccountId,
        title: &str,
        message: &str,
        category: NotificationCategory,
    ) -> Result<()>;
}

pub type NotificationSinkRef = Arc<dyn NotificationSink>;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub type ClockRef = Arc<dyn Clock>;
