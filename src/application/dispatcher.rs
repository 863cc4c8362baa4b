use crate::domain::notification::DeliveryOutcome;
use crate::domain::ports::{ClockRef, LifecycleStoreRef, NotificationSinkRef, SystemClock};
use crate::error::Result;
use chrono::TimeDelta;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherSettings {
    /// Intents fetched per pass.
    pub batch_size: usize,
    /// Attempts after which an intent is abandoned.
    pub max_attempts: u32,
    /// How long delivered and abandoned intents stay in the outbox.
    pub retention: TimeDelta,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_attempts: 5,
            retention: TimeDelta::days(7),
        }
    }
}

/// Counts from one dispatch pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
    pub abandoned: usize,
}

/// Drains the notification outbox into a sink.
///
/// Delivery is at-least-once: an intent is marked delivered only after the sink
/// accepted it. A failing sink never affects the lifecycle state that produced the
/// intent; the failure is logged and retried on the next pass.
pub struct NotificationDispatcher {
    store: LifecycleStoreRef,
    sink: NotificationSinkRef,
    clock: ClockRef,
    settings: DispatcherSettings,
}

impl NotificationDispatcher {
    pub fn new(store: LifecycleStoreRef, sink: NotificationSinkRef) -> Self {
        Self {
            store,
            sink,
            clock: Arc::new(SystemClock),
            settings: DispatcherSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: DispatcherSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_clock(mut self, clock: ClockRef) -> Self {
        self.clock = clock;
        self
    }

    /// Attempts every pending intent once, up to the batch size.
    pub async fn dispatch_pending(&self) -> Result<DispatchReport> {
        let mut report = DispatchReport::default();
        let pending = self
            .store
            .pending_notifications(self.settings.batch_size)
            .await?;

        for intent in pending {
            let delivery = self
                .sink
                .notify(intent.receiver, &intent.title, &intent.message, intent.category)
                .await;
            let outcome = match delivery {
                Ok(()) => {
                    report.delivered += 1;
                    debug!(
                        notification = %intent.id,
                        receiver = %intent.receiver,
                        "Notification delivered"
                    );
                    DeliveryOutcome::Delivered
                }
                Err(e) if intent.attempts + 1 >= self.settings.max_attempts => {
                    report.abandoned += 1;
                    error!(
                        notification = %intent.id,
                        receiver = %intent.receiver,
                        attempts = intent.attempts + 1,
                        error = %e,
                        "Notification abandoned"
                    );
                    DeliveryOutcome::Abandoned {
                        error: e.to_string(),
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        notification = %intent.id,
                        receiver = %intent.receiver,
                        attempts = intent.attempts + 1,
                        error = %e,
                        "Notification delivery failed"
                    );
                    DeliveryOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            };
            self.store
                .record_delivery(intent.id, outcome, self.clock.now())
                .await?;
        }
        Ok(report)
    }

    /// Removes intents that settled longer ago than the retention window.
    pub async fn compact(&self) -> Result<usize> {
        let Some(cutoff) = self.clock.now().checked_sub_signed(self.settings.retention) else {
            return Ok(0);
        };
        let pruned = self.store.prune_notifications(cutoff).await?;
        if pruned > 0 {
            debug!(pruned, "Outbox compacted");
        }
        Ok(pruned)
    }

    /// Dispatches on every tick until `shutdown` flips to true, then drains once more.
    /// Each pass also compacts the outbox.
    pub async fn run(&self, period: Duration, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(period = ?period, "Starting notification dispatcher");
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.dispatch_pending().await {
                        warn!(error = %e, "Dispatch pass failed");
                    }
                    if let Err(e) = self.compact().await {
                        warn!(error = %e, "Outbox compaction failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        let report = self.dispatch_pending().await?;
        info!(delivered = report.delivered, "Notification dispatcher stopped");
        Ok(())
    }
}
