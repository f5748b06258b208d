// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Per-provider failure tracking over a sliding window. A provider with 3
//! or more failures inside the 60-second window is throttled and skipped
//! by the fallback chain builder until the window lapses.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::counters::CounterStore;

const FAILURE_WINDOW: Duration = Duration::from_secs(60);
const FAILURE_THRESHOLD: u64 = 3;

pub struct ProviderHealthTracker {
    store: Arc<dyn CounterStore>,
    window: Duration,
    threshold: u64,
}

impl ProviderHealthTracker {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self {
            store,
            window: FAILURE_WINDOW,
            threshold: FAILURE_THRESHOLD,
        }
    }

    /// Custom window/threshold for tests.
    pub fn with_window(store: Arc<dyn CounterStore>, window: Duration, threshold: u64) -> Self {
        Self {
            store,
            window,
            threshold,
        }
    }

    /// Record one failure for `provider`. Never fails from the caller's
    /// perspective; a store error is logged and dropped.
    pub async fn record_failure(&self, provider: &str) {
        let key = failure_key(provider);
        match self.store.incr_with_window(&key, self.window).await {
            Ok(count) => {
                debug!("Provider {} failure recorded ({} in window)", provider, count);
            }
            Err(e) => {
                warn!("Failed to record failure for {}: {}", provider, e);
            }
        }
    }

    /// True when the failure count within a still-valid window has reached
    /// the threshold. Expired windows read as zero without a write; a
    /// store error reads as healthy rather than blocking dispatch.
    pub async fn is_throttled(&self, provider: &str) -> bool {
        match self.store.get(&failure_key(provider)).await {
            Ok(count) => count >= self.threshold,
            Err(e) => {
                debug!("Throttle check for {} failed open: {}", provider, e);
                false
            }
        }
    }
}

fn failure_key(provider: &str) -> String {
    format!("provfail:{}", provider)
}
