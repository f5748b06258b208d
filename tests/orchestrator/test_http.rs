// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Router-level tests driving the HTTP surface end to end

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use fabstir_gen_gateway::admission::AdmissionController;
use fabstir_gen_gateway::api::{build_router, AppState};
use fabstir_gen_gateway::collaborators::{
    LogNotifier, MemoryCreditService, MemoryJobStore, StaticSessionResolver,
};
use fabstir_gen_gateway::counters::{CounterStore, MemoryCounterStore};
use fabstir_gen_gateway::providers::{
    FallbackChainBuilder, GenerationDispatcher, ImageProvider, ProviderHealthTracker,
    ProviderRegistry,
};

use super::support::{Scripted, ScriptedProvider};

fn test_router(providers: Vec<Arc<ScriptedProvider>>) -> Router {
    let store: Arc<dyn CounterStore> = Arc::new(MemoryCounterStore::new());
    let registry = Arc::new(ProviderRegistry::new(
        providers
            .into_iter()
            .map(|p| p as Arc<dyn ImageProvider>)
            .collect(),
    ));
    let health = Arc::new(ProviderHealthTracker::new(store.clone()));
    let notifier = Arc::new(LogNotifier);
    let state = AppState {
        sessions: Arc::new(StaticSessionResolver::new()),
        credits: Arc::new(MemoryCreditService::new()),
        jobs: Arc::new(MemoryJobStore::new()),
        notifier: notifier.clone(),
        admission: Arc::new(AdmissionController::new(store, notifier)),
        registry: registry.clone(),
        health: health.clone(),
        chain_builder: Arc::new(FallbackChainBuilder::new(registry.clone(), health.clone())),
        dispatcher: Arc::new(GenerationDispatcher::new(registry, health)),
    };
    build_router(state)
}

fn post_generate(addr: &str, prompt: &str) -> Request<Body> {
    let body = json!({ "tool": "image-studio", "prompt": prompt }).to_string();
    Request::builder()
        .method("POST")
        .uri("/generate")
        .header("content-type", "application/json")
        .header("x-forwarded-for", addr)
        .body(Body::from(body))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_post_generate_returns_result() {
    let router = test_router(vec![ScriptedProvider::new("flux", vec![Scripted::Success])]);

    let response = router
        .oneshot(post_generate("198.51.100.10", "a lighthouse at dusk"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-request-id").is_some());
    assert_eq!(response.headers().get("x-provider").unwrap(), "flux");

    let body = json_body(response).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["provider"], "flux");
    assert!(body["resultUrl"].as_str().unwrap().starts_with("https://"));
    assert!(body["resolvedSeed"].is_u64());
}

#[tokio::test]
async fn test_post_generate_rejects_empty_prompt() {
    let router = test_router(vec![ScriptedProvider::new("flux", vec![])]);

    let response = router
        .oneshot(post_generate("198.51.100.11", "   "))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json_body(response).await;
    assert_eq!(body["ok"], false);
    assert_eq!(body["error_type"], "invalid_request");
}

#[tokio::test]
async fn test_rate_limited_request_gets_retry_after_header() {
    let router = test_router(vec![ScriptedProvider::new("flux", vec![])]);
    let addr = "203.0.113.50";

    // Anonymous guests get 2 per minute
    for _ in 0..2 {
        let response = router
            .clone()
            .oneshot(post_generate(addr, "a quiet meadow"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = router
        .oneshot(post_generate(addr, "a quiet meadow"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().get("retry-after").is_some());

    let body = json_body(response).await;
    assert_eq!(body["error_type"], "rate_limited");
    assert_eq!(body["details"]["limit"], 2);
}

#[tokio::test]
async fn test_history_lists_submitted_jobs() {
    let router = test_router(vec![ScriptedProvider::new("flux", vec![])]);
    let addr = "198.51.100.12";

    let response = router
        .clone()
        .oneshot(post_generate(addr, "a castle on a hill"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/generate")
                .header("x-forwarded-for", addr)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["status"], "succeeded");
    assert_eq!(items[0]["provider"], "flux");
    assert_eq!(body["hasMore"], false);
}

#[tokio::test]
async fn test_health_reports_provider_status() {
    let router = test_router(vec![
        ScriptedProvider::new("flux", vec![]),
        ScriptedProvider::without_credential("dalle"),
    ]);

    let response = router
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    let providers = body["providers"].as_array().unwrap();
    assert_eq!(providers.len(), 2);
    assert_eq!(providers[0]["name"], "flux");
    assert_eq!(providers[0]["credentialed"], true);
    assert_eq!(providers[1]["credentialed"], false);
}
