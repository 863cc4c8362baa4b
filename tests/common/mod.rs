#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use mechconnect::application::{LifecycleOrchestrator, LifecyclePolicy};
use mechconnect::domain::booking::Booking;
use mechconnect::domain::commission::{CommissionSettings, MechanicTier, ProviderClassification};
use mechconnect::domain::money::Money;
use mechconnect::domain::notification::NotificationCategory;
use mechconnect::domain::party::{AccountId, Actor};
use mechconnect::domain::ports::{CatalogService, Clock, NotificationSink, PartyProfile};
use mechconnect::domain::request::{
    CustomRequest, DirectRequest, QuotedLineItem, RequestKind, ServiceId, ServiceRequest,
};
use mechconnect::error::{LifecycleError, Result};
use mechconnect::infrastructure::directory::{StaticCatalog, StaticDirectory};
use mechconnect::infrastructure::in_memory::InMemoryLifecycleStore;
use rust_decimal::Decimal;
use std::fs::File;
use std::io::Error;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

pub const CLIENT: u64 = 1;
pub const OTHER_CLIENT: u64 = 2;
pub const GOLD_MECHANIC: u64 = 10;
pub const STANDARD_MECHANIC: u64 = 11;
pub const SHOP: u64 = 20;
pub const ADMIN: u64 = 99;

pub const OIL_SERVICE: ServiceId = ServiceId(7);
pub const FILTER_ADD_ON: ServiceId = ServiceId(8);

pub fn money(value: Decimal) -> Money {
    Money::new(value).unwrap()
}

/// A clock tests move by hand.
pub struct FixedClock(Mutex<DateTime<Utc>>);

impl FixedClock {
    pub fn new() -> Self {
        Self(Mutex::new(Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()))
    }

    pub fn advance(&self, by: Duration) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    pub receiver: AccountId,
    pub title: String,
    pub category: NotificationCategory,
}

/// Records every notification it is handed; can be switched to fail.
#[derive(Default)]
pub struct RecordingSink {
    pub delivered: Mutex<Vec<Delivered>>,
    failing: AtomicBool,
}

impl RecordingSink {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn titles_for(&self, receiver: u64) -> Vec<String> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.receiver == AccountId(receiver))
            .map(|d| d.title.clone())
            .collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(
        &self,
        receiver: AccountId,
        title: &str,
        _message: &str,
        category: NotificationCategory,
    ) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(LifecycleError::InternalError("sink offline".into()));
        }
        self.delivered.lock().unwrap().push(Delivered {
            receiver,
            title: title.to_string(),
            category,
        });
        Ok(())
    }
}

pub fn catalog() -> StaticCatalog {
    StaticCatalog::new([
        CatalogService {
            id: OIL_SERVICE,
            name: "Full service".to_string(),
            price: money(Decimal::new(80000, 2)),
        },
        CatalogService {
            id: FILTER_ADD_ON,
            name: "Cabin filter".to_string(),
            price: money(Decimal::new(15000, 2)),
        },
    ])
}

pub fn directory() -> StaticDirectory {
    let profile = |id: u64, name: &str, classification| PartyProfile {
        id: AccountId(id),
        display_name: name.to_string(),
        contact: None,
        classification,
    };
    StaticDirectory::new([
        profile(
            GOLD_MECHANIC,
            "Ana",
            ProviderClassification::Mechanic(MechanicTier::Gold),
        ),
        profile(
            STANDARD_MECHANIC,
            "Ben",
            ProviderClassification::Mechanic(MechanicTier::Standard),
        ),
        profile(SHOP, "Corner Garage", ProviderClassification::Shop),
    ])
}

pub struct Harness {
    pub orchestrator: LifecycleOrchestrator,
    pub store: Arc<InMemoryLifecycleStore>,
    pub clock: Arc<FixedClock>,
}

pub fn harness() -> Harness {
    harness_with(LifecyclePolicy::default())
}

pub fn harness_with(policy: LifecyclePolicy) -> Harness {
    let store = Arc::new(InMemoryLifecycleStore::new());
    let clock = Arc::new(FixedClock::new());
    let orchestrator = LifecycleOrchestrator::new(
        store.clone(),
        Arc::new(catalog()),
        Arc::new(directory()),
        CommissionSettings::default(),
        policy,
    )
    .with_clock(clock.clone());
    Harness {
        orchestrator,
        store,
        clock,
    }
}

impl Harness {
    pub async fn direct_request(&self, provider: u64) -> ServiceRequest {
        let kind = RequestKind::Direct(DirectRequest {
            service: OIL_SERVICE,
            add_ons: vec![],
        });
        self.orchestrator
            .submit_request(Actor::client(CLIENT), Some(AccountId(provider)), kind)
            .await
            .unwrap()
    }

    pub async fn custom_request(&self, provider: Option<u64>) -> ServiceRequest {
        let kind = RequestKind::Custom(CustomRequest {
            description: "Brakes squeal when cold".to_string(),
            budget_estimate: None,
        });
        self.orchestrator
            .submit_request(Actor::client(CLIENT), provider.map(AccountId), kind)
            .await
            .unwrap()
    }

    /// Direct request for the 800.00 service, accepted by the gold mechanic.
    pub async fn active_booking(&self) -> Booking {
        let request = self.direct_request(GOLD_MECHANIC).await;
        self.orchestrator
            .accept_request(Actor::mechanic(GOLD_MECHANIC), request.id(), None)
            .await
            .unwrap()
    }

    pub async fn completed_booking(&self) -> Booking {
        let booking = self.active_booking().await;
        self.orchestrator
            .complete_booking(Actor::mechanic(GOLD_MECHANIC), booking.id(), None)
            .await
            .unwrap()
    }

    /// Custom request quoted at 600.00 by the gold mechanic and accepted by the client.
    pub async fn quoted_booking(&self) -> Booking {
        let request = self.custom_request(Some(GOLD_MECHANIC)).await;
        self.orchestrator
            .quote_request(
                Actor::mechanic(GOLD_MECHANIC),
                request.id(),
                brake_quote(),
                None,
            )
            .await
            .unwrap();
        self.orchestrator
            .accept_request(Actor::client(CLIENT), request.id(), None)
            .await
            .unwrap()
    }
}

pub fn brake_quote() -> Vec<QuotedLineItem> {
    vec![
        QuotedLineItem::new("Oil change", money(Decimal::new(45000, 2))),
        QuotedLineItem::new("Filter", money(Decimal::new(15000, 2))),
    ]
}

pub const COMMAND_HEADER: [&str; 8] = [
    "op", "actor", "role", "target", "provider", "amount", "note", "outcome",
];

/// Writes `jobs` direct-request lifecycles, each submitted, accepted and completed.
pub fn generate_commands(path: &Path, jobs: u64) -> std::result::Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);
    wtr.write_record(COMMAND_HEADER)?;

    for booking in 1..=jobs {
        wtr.write_record([
            "submit_direct",
            "1",
            "client",
            "7",
            "10",
            "",
            "",
            "",
        ])?;
        let id = booking.to_string();
        wtr.write_record(["accept", "10", "mechanic", &id, "", "", "", ""])?;
        wtr.write_record(["complete", "10", "mechanic", &id, "", "", "", ""])?;
    }

    wtr.flush()?;
    Ok(())
}
