// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Tests for fallback chain construction

use fabstir_gen_gateway::counters::MemoryCounterStore;
use fabstir_gen_gateway::providers::{
    FallbackChainBuilder, ImageProvider, OperatingMode, ProviderHealthTracker, ProviderRegistry,
};
use std::sync::Arc;

use super::support::ScriptedProvider;

fn build_world() -> (Arc<ProviderRegistry>, Arc<ProviderHealthTracker>, FallbackChainBuilder) {
    let flux = ScriptedProvider::new("flux", vec![]);
    let sdxl = ScriptedProvider::new("sdxl", vec![]);
    let dalle = ScriptedProvider::without_credential("dalle");
    let registry = Arc::new(ProviderRegistry::new(vec![
        flux as Arc<dyn ImageProvider>,
        sdxl as Arc<dyn ImageProvider>,
        dalle as Arc<dyn ImageProvider>,
    ]));
    let health = Arc::new(ProviderHealthTracker::new(Arc::new(
        MemoryCounterStore::new(),
    )));
    let builder = FallbackChainBuilder::new(registry.clone(), health.clone());
    (registry, health, builder)
}

#[tokio::test]
async fn test_self_hosted_is_primary_only() {
    let (_, _, builder) = build_world();
    let chain = builder.build("flux", OperatingMode::SelfHosted).await;
    assert_eq!(chain, vec!["flux".to_string()]);
}

#[tokio::test]
async fn test_hosted_appends_credentialed_alternates() {
    let (_, _, builder) = build_world();
    let chain = builder.build("flux", OperatingMode::Hosted).await;
    // dalle has no credential and is skipped
    assert_eq!(chain, vec!["flux".to_string(), "sdxl".to_string()]);
}

#[tokio::test]
async fn test_primary_is_always_first() {
    let (_, _, builder) = build_world();
    let chain = builder.build("sdxl", OperatingMode::Hosted).await;
    assert_eq!(chain, vec!["sdxl".to_string(), "flux".to_string()]);
}

#[tokio::test]
async fn test_throttled_alternate_excluded() {
    let (_, health, builder) = build_world();
    for _ in 0..3 {
        health.record_failure("sdxl").await;
    }
    let chain = builder.build("flux", OperatingMode::Hosted).await;
    assert_eq!(chain, vec!["flux".to_string()]);
}

#[tokio::test]
async fn test_throttled_primary_stays_in_chain() {
    // Throttling governs alternates only; the caller's requested primary
    // is always attempted
    let (_, health, builder) = build_world();
    for _ in 0..3 {
        health.record_failure("flux").await;
    }
    let chain = builder.build("flux", OperatingMode::Hosted).await;
    assert_eq!(chain, vec!["flux".to_string(), "sdxl".to_string()]);
}

#[tokio::test]
async fn test_alternate_order_is_fixed_priority() {
    let (_, _, builder) = build_world();
    let chain = builder.build("dalle", OperatingMode::Hosted).await;
    assert_eq!(
        chain,
        vec!["dalle".to_string(), "flux".to_string(), "sdxl".to_string()]
    );
}
