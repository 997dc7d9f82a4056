//! Admission controller behaviour under concurrent callers.
//!
//! Covers:
//! - FIFO grant order with the refill timer running
//! - Bucket conservation under a multi-threaded burst
//! - Independent limiters do not share state
//! - Daily ceiling across a simulated day boundary

mod common;

use chrono::{TimeZone, Utc};
use common::admission;
use course_generation_gate::resilience::ManualClock;
use course_generation_gate::{AdmissionController, GenerationError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

async fn wait_for_queue(limiter: &AdmissionController, len: usize) {
    while limiter.status().queue_length < len {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_timer_grants_waiters_in_arrival_order() {
    // one token per second, bucket of one
    let limiter = Arc::new(AdmissionController::new(&admission(60, 1500, Some(1))));
    limiter.acquire().await.unwrap();
    limiter.start().unwrap();

    let order = Arc::new(Mutex::new(Vec::new()));
    let mut handles = Vec::new();
    for i in 0..5 {
        let l = Arc::clone(&limiter);
        let order = Arc::clone(&order);
        handles.push(tokio::spawn(async move {
            l.acquire().await.unwrap();
            order.lock().await.push(i);
        }));
        wait_for_queue(&limiter, i + 1).await;
    }

    for h in handles {
        h.await.unwrap();
    }
    assert_eq!(*order.lock().await, vec![0, 1, 2, 3, 4]);
    assert_eq!(limiter.status().requests_today, 6);
    limiter.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_burst_never_overdraws_bucket() {
    let limiter = Arc::new(AdmissionController::new(&admission(15, 1500, Some(10))));

    let mut handles = Vec::new();
    for _ in 0..25 {
        let l = Arc::clone(&limiter);
        handles.push(tokio::spawn(async move {
            l.acquire_with_deadline(Duration::from_millis(200)).await
        }));
    }

    let mut granted = 0;
    let mut timed_out = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(()) => granted += 1,
            Err(GenerationError::AdmissionTimeout { .. }) => timed_out += 1,
            Err(other) => panic!("unexpected {other}"),
        }
    }

    assert_eq!(granted, 10);
    assert_eq!(timed_out, 15);
    let status = limiter.status();
    assert_eq!(status.available_tokens, 0);
    assert_eq!(status.queue_length, 0);
    assert_eq!(status.requests_today, 10);
}

#[tokio::test]
async fn test_refill_interleaved_with_acquire_keeps_bounds() {
    let limiter = AdmissionController::new(&admission(15, 1500, Some(3)));
    for step in 0..50 {
        if step % 3 == 0 {
            limiter.refill();
        } else {
            let _ = limiter
                .acquire_with_deadline(Duration::from_millis(1))
                .await;
        }
        let s = limiter.status();
        assert!(s.available_tokens <= s.max_tokens, "step {step}: {s:?}");
    }
}

#[tokio::test]
async fn test_independent_limiters_do_not_share_tokens() {
    let a = AdmissionController::new(&admission(15, 1, None));
    let b = AdmissionController::new(&admission(15, 1, None));

    a.acquire().await.unwrap();
    assert!(a.acquire().await.is_err());
    b.acquire().await.unwrap();
    assert_eq!(b.status().requests_today, 1);
}

#[tokio::test]
async fn test_quota_resets_at_utc_midnight() {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 6, 30, 22, 15, 0).unwrap(),
    ));
    let limiter = AdmissionController::with_clock(&admission(15, 1, None), clock.clone());

    limiter.acquire().await.unwrap();
    match limiter.acquire().await {
        Err(GenerationError::QuotaExceeded {
            hours_until_reset, ..
        }) => assert_eq!(hours_until_reset, 2),
        other => panic!("expected quota error, got {other:?}"),
    }

    clock.set(Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 1).unwrap());
    limiter.acquire().await.unwrap();
    let status = limiter.status();
    assert_eq!(status.requests_today, 1);
    assert_eq!(status.daily_limit, 1);
}

#[tokio::test]
async fn test_status_serializes_for_introspection() {
    let limiter = AdmissionController::new(&admission(15, 1500, None));
    limiter.acquire().await.unwrap();
    let json = serde_json::to_value(limiter.status()).unwrap();
    assert_eq!(json["availableTokens"], 14);
    assert_eq!(json["maxTokens"], 15);
    assert_eq!(json["queueLength"], 0);
    assert_eq!(json["requestsToday"], 1);
    assert_eq!(json["dailyLimit"], 1500);
}
