use mechconnect::domain::booking::BookingStatus;
use mechconnect::domain::party::Actor;
use mechconnect::domain::request::RequestStatus;
use mechconnect::error::LifecycleError;
use rust_decimal_macros::dec;
use std::sync::Arc;

mod common;
use common::*;

const RACERS: u64 = 16;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_accepts_book_exactly_once() {
    let h = Arc::new(harness());
    let request = h.custom_request(None).await;

    let handles: Vec<_> = (0..RACERS)
        .map(|i| {
            let h = h.clone();
            let id = request.id();
            tokio::spawn(async move {
                h.orchestrator
                    .accept_request(Actor::mechanic(100 + i), id, Some(money(dec!(300))))
                    .await
            })
        })
        .collect();

    let mut booked = Vec::new();
    let mut lost = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(booking) => booked.push(booking),
            Err(LifecycleError::AlreadyBooked { .. }) => lost += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(booked.len(), 1);
    assert_eq!(lost, RACERS - 1);

    let winner = &booked[0];
    let request = h.orchestrator.request(request.id()).await.unwrap();
    assert_eq!(request.provider(), winner.provider());
    let stored = h
        .orchestrator
        .booking_for_request(request.id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.id(), winner.id());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_completions_settle_once() {
    let h = Arc::new(harness());
    let booking = h.active_booking().await;

    let handles: Vec<_> = [Actor::client(CLIENT), Actor::mechanic(GOLD_MECHANIC)]
        .into_iter()
        .cycle()
        .take(8)
        .map(|actor| {
            let h = h.clone();
            let id = booking.id();
            tokio::spawn(async move { h.orchestrator.complete_booking(actor, id, None).await })
        })
        .collect();

    let mut completed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => completed += 1,
            Err(LifecycleError::InvalidState { current, .. }) => {
                assert_eq!(current, BookingStatus::Completed)
            }
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(completed, 1);
    let transactions = h
        .orchestrator
        .transactions_for_booking(booking.id())
        .await
        .unwrap();
    assert_eq!(transactions.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_disputes_open_one() {
    let h = Arc::new(harness());
    let booking = h.completed_booking().await;

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let h = h.clone();
            let id = booking.id();
            let actor = if i % 2 == 0 {
                Actor::client(CLIENT)
            } else {
                Actor::mechanic(GOLD_MECHANIC)
            };
            tokio::spawn(async move {
                h.orchestrator
                    .open_dispute(actor, id, format!("complaint {i}"))
                    .await
            })
        })
        .collect();

    let mut opened = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => opened += 1,
            Err(LifecycleError::DisputeAlreadyOpen { .. }) => conflicts += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(opened, 1);
    assert_eq!(conflicts, 5);
    let booking = h.orchestrator.booking(booking.id()).await.unwrap();
    assert_eq!(booking.status(), BookingStatus::Dispute);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_accept_and_reject_race_has_one_winner() {
    let h = Arc::new(harness());

    for _ in 0..20 {
        let request = h.direct_request(GOLD_MECHANIC).await;
        let id = request.id();

        let accept = {
            let h = h.clone();
            tokio::spawn(async move {
                h.orchestrator
                    .accept_request(Actor::mechanic(GOLD_MECHANIC), id, None)
                    .await
            })
        };
        let reject = {
            let h = h.clone();
            tokio::spawn(async move {
                h.orchestrator
                    .reject_request(Actor::client(CLIENT), id, "Found a cheaper shop".to_string())
                    .await
            })
        };
        let accepted = accept.await.unwrap();
        let rejected = reject.await.unwrap();

        let stored = h.orchestrator.request(id).await.unwrap();
        let booking = h.orchestrator.booking_for_request(id).await.unwrap();
        match (accepted, rejected) {
            (Ok(winner), Err(LifecycleError::InvalidTransition { current, .. })) => {
                assert_eq!(current, RequestStatus::Accepted);
                assert_eq!(stored.status(), RequestStatus::Accepted);
                assert_eq!(booking.map(|b| b.id()), Some(winner.id()));
            }
            (Err(LifecycleError::InvalidTransition { current, .. }), Ok(_)) => {
                assert_eq!(current, RequestStatus::Rejected);
                assert_eq!(stored.status(), RequestStatus::Rejected);
                assert!(booking.is_none());
            }
            other => panic!("expected exactly one winner, got {other:?}"),
        }
    }
}
