use mechconnect::application::{DispatcherSettings, NotificationDispatcher};
use mechconnect::domain::booking::BookingStatus;
use mechconnect::domain::notification::NotificationCategory;
use mechconnect::domain::party::Actor;
use mechconnect::domain::ports::LifecycleStore;
use std::sync::Arc;

mod common;
use common::*;

fn dispatcher(h: &Harness, sink: Arc<RecordingSink>) -> NotificationDispatcher {
    NotificationDispatcher::new(h.store.clone(), sink).with_clock(h.clock.clone())
}

#[tokio::test]
async fn test_transitions_enqueue_notices_for_parties() {
    let h = harness();
    let sink = Arc::new(RecordingSink::default());
    h.completed_booking().await;

    let report = dispatcher(&h, sink.clone()).dispatch_pending().await.unwrap();
    assert!(report.delivered > 0);
    assert_eq!(report.failed, 0);

    let mechanic = sink.titles_for(GOLD_MECHANIC);
    assert_eq!(
        mechanic,
        vec![
            "New Service Request",
            "Request Accepted",
            "Booking Completed",
            "Payout Pending",
        ]
    );
    let client = sink.titles_for(CLIENT);
    assert_eq!(client, vec!["Request Accepted", "Booking Completed"]);

    let payout = sink
        .delivered
        .lock()
        .unwrap()
        .iter()
        .find(|d| d.title == "Payout Pending")
        .cloned()
        .unwrap();
    assert_eq!(payout.category, NotificationCategory::Payment);
}

#[tokio::test]
async fn test_sink_failure_does_not_roll_back_transition() {
    let h = harness();
    let sink = Arc::new(RecordingSink::default());
    sink.set_failing(true);

    let booking = h.active_booking().await;
    let report = dispatcher(&h, sink.clone()).dispatch_pending().await.unwrap();
    assert_eq!(report.delivered, 0);
    assert!(report.failed > 0);

    let stored = h.orchestrator.booking(booking.id()).await.unwrap();
    assert_eq!(stored.status(), BookingStatus::Active);

    sink.set_failing(false);
    let retry = dispatcher(&h, sink.clone()).dispatch_pending().await.unwrap();
    assert_eq!(retry.delivered, report.failed);
    assert!(h.store.pending_notifications(100).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_undeliverable_notices_are_abandoned() {
    let h = harness();
    let sink = Arc::new(RecordingSink::default());
    sink.set_failing(true);
    h.direct_request(GOLD_MECHANIC).await;

    let dispatcher = dispatcher(&h, sink.clone()).with_settings(DispatcherSettings {
        batch_size: 10,
        max_attempts: 3,
        ..DispatcherSettings::default()
    });
    for _ in 0..2 {
        assert_eq!(dispatcher.dispatch_pending().await.unwrap().failed, 1);
    }
    let last = dispatcher.dispatch_pending().await.unwrap();
    assert_eq!(last.abandoned, 1);

    sink.set_failing(false);
    let after = dispatcher.dispatch_pending().await.unwrap();
    assert_eq!(after.delivered, 0);
    assert!(sink.delivered.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_rejected_operation_enqueues_nothing() {
    let h = harness();
    let booking = h.active_booking().await;
    let sink = Arc::new(RecordingSink::default());
    dispatcher(&h, sink.clone()).dispatch_pending().await.unwrap();

    let result = h
        .orchestrator
        .request_back_job(Actor::client(CLIENT), booking.id(), "Too early".to_string())
        .await;
    assert!(result.is_err());
    assert!(h.store.pending_notifications(100).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_dispute_notices_reach_both_parties() {
    let h = harness();
    let booking = h.active_booking().await;
    let sink = Arc::new(RecordingSink::default());
    let dispatcher = dispatcher(&h, sink.clone());
    dispatcher.dispatch_pending().await.unwrap();
    sink.delivered.lock().unwrap().clear();

    h.orchestrator
        .open_dispute(Actor::client(CLIENT), booking.id(), "Wrong part".to_string())
        .await
        .unwrap();
    h.orchestrator
        .resolve_dispute(
            Actor::admin(ADMIN),
            booking.id(),
            mechconnect::domain::booking::DisputeOutcome::Cancelled,
            "Voided".to_string(),
        )
        .await
        .unwrap();
    dispatcher.dispatch_pending().await.unwrap();

    assert!(sink.titles_for(GOLD_MECHANIC).contains(&"Dispute Opened".to_string()));
    assert!(sink.titles_for(CLIENT).contains(&"Dispute Resolved".to_string()));
    assert!(sink.titles_for(GOLD_MECHANIC).contains(&"Dispute Resolved".to_string()));
}

#[tokio::test]
async fn test_settled_intents_are_compacted_after_retention() {
    let h = harness();
    let sink = Arc::new(RecordingSink::default());
    h.completed_booking().await;
    let dispatcher = dispatcher(&h, sink.clone());

    let report = dispatcher.dispatch_pending().await.unwrap();
    assert_eq!(dispatcher.compact().await.unwrap(), 0);

    // A notice that keeps failing stays in the outbox however old it gets.
    sink.set_failing(true);
    h.direct_request(GOLD_MECHANIC).await;
    assert_eq!(dispatcher.dispatch_pending().await.unwrap().failed, 1);

    h.clock.advance(chrono::Duration::days(8));
    assert_eq!(dispatcher.compact().await.unwrap(), report.delivered);
    assert_eq!(h.store.pending_notifications(100).await.unwrap().len(), 1);
}
