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
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const CF_REQUESTS: &str = "requests";
pub const CF_BOOKINGS: &str = "bookings";
pub const CF_TRANSACTIONS: &str = "transactions";
pub const CF_OUTBOX: &str = "outbox";
/// Sequences, the request→booking / booking→transaction uniqueness indexes and the
/// live commission settings.
pub const CF_META: &str = "meta";

const COLUMN_FAMILIES: [&str; 5] = [CF_REQUESTS, CF_BOOKINGS, CF_TRANSACTIONS, CF_OUTBOX, CF_META];

impl From<rocksdb::Error> for LifecycleError {
    fn from(error: rocksdb::Error) -> Self {
        LifecycleError::InternalError(Box::new(error))
    }
}

fn key(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

fn sequence_key(sequence: Sequence) -> Vec<u8> {
    format!("seq:{}", sequence.label()).into_bytes()
}

fn booking_index_key(request: RequestId) -> Vec<u8> {
    let mut bytes = b"booking-of:".to_vec();
    bytes.extend_from_slice(&key(request.0));
    bytes
}

fn transaction_index_key(booking: BookingId) -> Vec<u8> {
    let mut bytes = b"transaction-of:".to_vec();
    bytes.extend_from_slice(&key(booking.0));
    bytes
}

const OUTBOX_SEQUENCE: &[u8] = b"seq:notification";
const COMMISSION_SETTINGS: &[u8] = b"commission-settings";

fn decode_id(bytes: &[u8]) -> Result<u64> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| LifecycleError::internal("Corrupt id in meta column family"))?;
    Ok(u64::from_be_bytes(raw))
}

/// A persistent lifecycle store backed by RocksDB.
///
/// Each entity lives in its own column family keyed by big-endian id. A commit is a
/// single `WriteBatch`; the uniqueness checks that precede it run under `write_lock`
/// so two commits cannot both pass the check for the same request or booking.
#[derive(Clone)]
pub struct RocksDbLifecycleStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDbLifecycleStore {
    /// Opens or creates the database, creating missing column families.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()));
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| LifecycleError::internal(format!("{name} column family not found")))
    }

    fn get<T: DeserializeOwned>(&self, cf: &str, id: u64) -> Result<Option<T>> {
        match self.db.get_cf(self.cf(cf)?, key(id))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, cf: &str) -> Result<Vec<T>> {
        let mut records = Vec::new();
        for item in self.db.iterator_cf(self.cf(cf)?, IteratorMode::Start) {
            let (_key, value) = item?;
            records.push(serde_json::from_slice(&value)?);
        }
        Ok(records)
    }

    fn meta_id(&self, meta_key: &[u8]) -> Result<Option<u64>> {
        match self.db.get_cf(self.cf(CF_META)?, meta_key)? {
            Some(bytes) => Ok(Some(decode_id(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put<T: Serialize>(
        &self,
        batch: &mut WriteBatch,
        cf: &str,
        id: u64,
        record: &T,
    ) -> Result<()> {
        batch.put_cf(self.cf(cf)?, key(id), serde_json::to_vec(record)?);
        Ok(())
    }
}

#[async_trait]
impl LifecycleStore for RocksDbLifecycleStore {
    async fn next_id(&self, sequence: Sequence) -> Result<u64> {
        let _guard = self.write_lock.lock().await;
        let seq_key = sequence_key(sequence);
        let next = self.meta_id(&seq_key)?.unwrap_or(0) + 1;
        self.db.put_cf(self.cf(CF_META)?, seq_key, key(next))?;
        Ok(next)
    }

    async fn request(&self, id: RequestId) -> Result<Option<ServiceRequest>> {
        self.get(CF_REQUESTS, id.0)
    }

    async fn booking(&self, id: BookingId) -> Result<Option<Booking>> {
        self.get(CF_BOOKINGS, id.0)
    }

    async fn booking_for_request(&self, request: RequestId) -> Result<Option<Booking>> {
        match self.meta_id(&booking_index_key(request))? {
            Some(id) => self.get(CF_BOOKINGS, id),
            None => Ok(None),
        }
    }

    async fn transaction(&self, id: TransactionId) -> Result<Option<Transaction>> {
        self.get(CF_TRANSACTIONS, id.0)
    }

    async fn transactions_for_booking(&self, booking: BookingId) -> Result<Vec<Transaction>> {
        let transactions: Vec<Transaction> = self.scan(CF_TRANSACTIONS)?;
        Ok(transactions
            .into_iter()
            .filter(|tx| tx.booking() == booking)
            .collect())
    }

    async fn bookings(&self, filter: &BookingFilter) -> Result<Vec<Booking>> {
        let bookings: Vec<Booking> = self.scan(CF_BOOKINGS)?;
        Ok(bookings
            .into_iter()
            .filter(|booking| filter.matches(booking))
            .collect())
    }

    async fn transactions(&self) -> Result<Vec<Transaction>> {
        self.scan(CF_TRANSACTIONS)
    }

    async fn commit(&self, changes: Changeset) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        for booking in &changes.bookings {
            if let Some(existing) = self.meta_id(&booking_index_key(booking.request()))?
                && existing != booking.id().0
            {
                let stored: Option<ServiceRequest> = self.get(CF_REQUESTS, booking.request().0)?;
                return Err(LifecycleError::already_booked(
                    booking.request(),
                    BookingId(existing),
                    stored.as_ref(),
                ));
            }
        }
        for transaction in &changes.transactions {
            if let Some(existing) = self.meta_id(&transaction_index_key(transaction.booking()))?
                && existing != transaction.id().0
            {
                return Err(LifecycleError::DuplicateTransaction {
                    booking: transaction.booking(),
                });
            }
        }

        let mut batch = WriteBatch::default();
        let meta = self.cf(CF_META)?;
        for request in &changes.requests {
            self.put(&mut batch, CF_REQUESTS, request.id().0, request)?;
        }
        for booking in &changes.bookings {
            self.put(&mut batch, CF_BOOKINGS, booking.id().0, booking)?;
            batch.put_cf(meta, booking_index_key(booking.request()), key(booking.id().0));
        }
        for transaction in &changes.transactions {
            self.put(&mut batch, CF_TRANSACTIONS, transaction.id().0, transaction)?;
            batch.put_cf(
                meta,
                transaction_index_key(transaction.booking()),
                key(transaction.id().0),
            );
        }
        if !changes.notices.is_empty() {
            let mut last = self.meta_id(OUTBOX_SEQUENCE)?.unwrap_or(0);
            for notice in changes.notices {
                last += 1;
                let id = NotificationId(last);
                let intent = NotificationIntent::from_notice(id, notice, changes.at);
                self.put(&mut batch, CF_OUTBOX, id.0, &intent)?;
            }
            batch.put_cf(meta, OUTBOX_SEQUENCE, key(last));
        }
        self.db.write(batch)?;
        Ok(())
    }

    async fn pending_notifications(&self, limit: usize) -> Result<Vec<NotificationIntent>> {
        let intents: Vec<NotificationIntent> = self.scan(CF_OUTBOX)?;
        Ok(intents
            .into_iter()
            .filter(|intent| intent.delivery == DeliveryState::Pending)
            .take(limit)
            .collect())
    }

    async fn record_delivery(
        &self,
        id: NotificationId,
        outcome: DeliveryOutcome,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut intent: NotificationIntent = self
            .get(CF_OUTBOX, id.0)?
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
        self.db
            .put_cf(self.cf(CF_OUTBOX)?, key(id.0), serde_json::to_vec(&intent)?)?;
        Ok(())
    }

    async fn prune_notifications(&self, settled_before: DateTime<Utc>) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let intents: Vec<NotificationIntent> = self.scan(CF_OUTBOX)?;
        let outbox = self.cf(CF_OUTBOX)?;
        let mut batch = WriteBatch::default();
        let mut pruned = 0;
        for intent in intents {
            if intent
                .delivery
                .settled_at()
                .is_some_and(|at| at < settled_before)
            {
                batch.delete_cf(outbox, key(intent.id.0));
                pruned += 1;
            }
        }
        if pruned > 0 {
            self.db.write(batch)?;
        }
        Ok(pruned)
    }

    async fn commission_settings(&self) -> Result<Option<CommissionSettings>> {
        match self.db.get_cf(self.cf(CF_META)?, COMMISSION_SETTINGS)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn save_commission_settings(&self, settings: &CommissionSettings) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.db.put_cf(
            self.cf(CF_META)?,
            COMMISSION_SETTINGS,
            serde_json::to_vec(settings)?,
        )?;
        Ok(())
    }
}
