// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Fallback chain construction: primary first, then every credentialed,
//! non-throttled alternate in fixed priority order.

use futures::future::join_all;
use std::sync::Arc;
use tracing::debug;

use super::health::ProviderHealthTracker;
use super::registry::{OperatingMode, ProviderRegistry};

pub struct FallbackChainBuilder {
    registry: Arc<ProviderRegistry>,
    health: Arc<ProviderHealthTracker>,
}

impl FallbackChainBuilder {
    pub fn new(registry: Arc<ProviderRegistry>, health: Arc<ProviderHealthTracker>) -> Self {
        Self { registry, health }
    }

    /// Ordered provider names to attempt for a request.
    ///
    /// Self-hosted mode never falls back: the caller supplied the
    /// credentials, and a fallback attempt would silently run on the
    /// service's own keys. Hosted mode appends alternates that are not the
    /// primary, hold a credential, and are not currently throttled; the
    /// throttle checks are fanned out concurrently so chain construction
    /// adds one round-trip of latency, not one per candidate.
    pub async fn build(&self, primary: &str, mode: OperatingMode) -> Vec<String> {
        if mode == OperatingMode::SelfHosted {
            return vec![primary.to_string()];
        }

        let candidates: Vec<&str> = self
            .registry
            .priority()
            .iter()
            .map(|p| p.name())
            .filter(|name| *name != primary)
            .filter(|name| {
                self.registry
                    .get(name)
                    .map(|p| p.has_credential())
                    .unwrap_or(false)
            })
            .collect();

        let throttle_checks = join_all(
            candidates
                .iter()
                .map(|name| self.health.is_throttled(name)),
        )
        .await;

        let mut chain = vec![primary.to_string()];
        for (name, throttled) in candidates.into_iter().zip(throttle_checks) {
            if throttled {
                debug!("Provider {} throttled, excluded from chain", name);
            } else {
                chain.push(name.to_string());
            }
        }
        chain
    }
}
