// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Tests for the in-process counter store

use fabstir_gen_gateway::counters::{CounterStore, MemoryCounterStore};
use std::time::Duration;

#[tokio::test]
async fn test_incr_creates_and_counts() {
    let store = MemoryCounterStore::new();
    assert_eq!(store.get("k").await.unwrap(), 0);
    assert_eq!(
        store
            .incr_with_window("k", Duration::from_secs(60))
            .await
            .unwrap(),
        1
    );
    assert_eq!(
        store
            .incr_with_window("k", Duration::from_secs(60))
            .await
            .unwrap(),
        2
    );
    assert_eq!(store.get("k").await.unwrap(), 2);
}

#[tokio::test]
async fn test_expired_key_reads_zero_without_write() {
    let store = MemoryCounterStore::new();
    store
        .incr_with_window("k", Duration::from_millis(50))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(80)).await;
    // Read after expiry: zero, and no TTL left
    assert_eq!(store.get("k").await.unwrap(), 0);
    assert!(store.ttl("k").await.unwrap().is_none());
}

#[tokio::test]
async fn test_incr_after_expiry_restarts_window() {
    let store = MemoryCounterStore::new();
    for _ in 0..3 {
        store
            .incr_with_window("k", Duration::from_millis(50))
            .await
            .unwrap();
    }
    tokio::time::sleep(Duration::from_millis(80)).await;
    // Count resets to 1 when the window has lapsed, not 4
    assert_eq!(
        store
            .incr_with_window("k", Duration::from_millis(50))
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn test_decr_floors_at_zero() {
    let store = MemoryCounterStore::new();
    assert_eq!(store.decr("missing").await.unwrap(), 0);
    store
        .incr_with_window("k", Duration::from_secs(60))
        .await
        .unwrap();
    assert_eq!(store.decr("k").await.unwrap(), 0);
    assert_eq!(store.decr("k").await.unwrap(), 0);
}

#[tokio::test]
async fn test_ttl_reports_remaining_window() {
    let store = MemoryCounterStore::new();
    store
        .incr_with_window("k", Duration::from_secs(60))
        .await
        .unwrap();
    let ttl = store.ttl("k").await.unwrap().expect("ttl should exist");
    assert!(ttl <= Duration::from_secs(60));
    assert!(ttl > Duration::from_secs(55));
}
