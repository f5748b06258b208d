// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Tests for the per-minute rate gate

use fabstir_gen_gateway::admission::{AdmissionController, AdmissionDecision, PlanTier, Principal};
use fabstir_gen_gateway::collaborators::LogNotifier;
use fabstir_gen_gateway::counters::MemoryCounterStore;
use std::sync::Arc;
use std::time::Duration;

fn controller() -> AdmissionController {
    AdmissionController::new(Arc::new(MemoryCounterStore::new()), Arc::new(LogNotifier))
}

fn controller_with_window(window: Duration) -> AdmissionController {
    AdmissionController::with_rate_window(
        Arc::new(MemoryCounterStore::new()),
        Arc::new(LogNotifier),
        window,
    )
}

#[tokio::test]
async fn test_guest_allowed_within_limit() {
    let admission = controller();
    let principal = Principal::Anonymous("203.0.113.7".to_string());

    // Guest allows 2 per minute
    for _ in 0..2 {
        let decision = admission
            .check_rate_limit(&principal, PlanTier::Guest)
            .await
            .unwrap();
        assert!(decision.is_none(), "should be allowed within limit");
    }
}

#[tokio::test]
async fn test_rejection_carries_retry_data() {
    let admission = controller();
    let principal = Principal::Anonymous("203.0.113.8".to_string());

    for _ in 0..2 {
        admission
            .check_rate_limit(&principal, PlanTier::Guest)
            .await
            .unwrap();
    }
    let decision = admission
        .check_rate_limit(&principal, PlanTier::Guest)
        .await
        .unwrap()
        .expect("third request should be rate limited");
    match decision {
        AdmissionDecision::RateLimited {
            retry_after_secs,
            limit,
            used,
        } => {
            assert_eq!(limit, 2);
            assert_eq!(used, 2);
            assert!(retry_after_secs >= 1 && retry_after_secs <= 60);
        }
        other => panic!("expected RateLimited, got {:?}", other),
    }
}

#[tokio::test]
async fn test_rejected_request_consumes_no_slot() {
    let admission = controller_with_window(Duration::from_millis(100));
    let principal = Principal::User("u-rate".to_string());

    // Fill the guest window, then hammer it with rejected requests
    for _ in 0..2 {
        admission
            .check_rate_limit(&principal, PlanTier::Guest)
            .await
            .unwrap();
    }
    for _ in 0..10 {
        assert!(admission
            .check_rate_limit(&principal, PlanTier::Guest)
            .await
            .unwrap()
            .is_some());
    }

    // Rejections did not extend or refill the window
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(admission
        .check_rate_limit(&principal, PlanTier::Guest)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_concurrent_requests_at_last_slot_admit_exactly_limit() {
    let admission = Arc::new(controller());
    let principal = Principal::User("u-race".to_string());

    // 8 concurrent checks against a guest limit of 2: exactly 2 may pass
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let admission = admission.clone();
            let principal = principal.clone();
            tokio::spawn(async move {
                admission
                    .check_rate_limit(&principal, PlanTier::Guest)
                    .await
                    .unwrap()
                    .is_none()
            })
        })
        .collect();

    let mut allowed = 0;
    for handle in handles {
        if handle.await.unwrap() {
            allowed += 1;
        }
    }
    assert_eq!(allowed, 2, "exactly the window limit must be admitted");
}

#[tokio::test]
async fn test_tiers_have_distinct_limits() {
    let admission = controller();
    let principal = Principal::User("u-pro".to_string());

    // Pro allows 30 per minute
    for i in 0..30 {
        assert!(
            admission
                .check_rate_limit(&principal, PlanTier::Pro)
                .await
                .unwrap()
                .is_none(),
            "pro request {} should be allowed",
            i + 1
        );
    }
    assert!(admission
        .check_rate_limit(&principal, PlanTier::Pro)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_principals_are_independent() {
    let admission = controller();
    let a = Principal::Anonymous("198.51.100.1".to_string());
    let b = Principal::Anonymous("198.51.100.2".to_string());

    for _ in 0..2 {
        admission.check_rate_limit(&a, PlanTier::Guest).await.unwrap();
    }
    assert!(admission
        .check_rate_limit(&a, PlanTier::Guest)
        .await
        .unwrap()
        .is_some());
    assert!(admission
        .check_rate_limit(&b, PlanTier::Guest)
        .await
        .unwrap()
        .is_none());
}
