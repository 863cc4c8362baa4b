use crate::domain::booking::BookingId;
use crate::domain::request::RequestId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// The single entity a mutating operation is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockKey {
    Request(RequestId),
    Booking(BookingId),
}

/// Per-entity async mutexes, created on first use and dropped once nobody holds or
/// waits on them.
#[derive(Debug, Default)]
pub struct EntityLocks {
    slots: Mutex<HashMap<LockKey, Arc<AsyncMutex<()>>>>,
}

impl EntityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `key`. Waiters are served in FIFO order.
    pub async fn acquire(&self, key: LockKey) -> EntityGuard<'_> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(key).or_default())
        };
        let guard = slot.lock_owned().await;
        EntityGuard {
            locks: self,
            key,
            guard: Some(guard),
        }
    }

    /// Number of entities with a live lock slot.
    pub fn live(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

pub struct EntityGuard<'a> {
    locks: &'a EntityLocks,
    key: LockKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for EntityGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut slots = self
            .locks
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Only the map still holds the slot: no holder, no waiter.
        if let Some(slot) = slots.get(&self.key)
            && Arc::strong_count(slot) == 1
        {
            slots.remove(&self.key);
        }
    }
}
