// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HTTP surface: router, shared state and the error-response wrapper

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use futures::future::join_all;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::errors::ApiError;
use super::generate::{generate_handler, history_handler};
use crate::admission::AdmissionController;
use crate::collaborators::{CreditService, JobStore, Notifier, SessionResolver};
use crate::providers::{
    FallbackChainBuilder, GenerationDispatcher, ProviderHealthTracker, ProviderRegistry,
};

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<dyn SessionResolver>,
    pub credits: Arc<dyn CreditService>,
    pub jobs: Arc<dyn JobStore>,
    pub notifier: Arc<dyn Notifier>,
    pub admission: Arc<AdmissionController>,
    pub registry: Arc<ProviderRegistry>,
    pub health: Arc<ProviderHealthTracker>,
    pub chain_builder: Arc<FallbackChainBuilder>,
    pub dispatcher: Arc<GenerationDispatcher>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/generate", post(generate_handler).get(history_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(state: AppState, listen_addr: &str) -> anyhow::Result<()> {
    let app = build_router(state);
    let addr = listen_addr.parse::<SocketAddr>()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Generation gateway listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    providers: Vec<ProviderHealthEntry>,
}

#[derive(Debug, Serialize)]
struct ProviderHealthEntry {
    name: String,
    credentialed: bool,
    throttled: bool,
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let providers = state.registry.priority();
    let throttles = join_all(
        providers
            .iter()
            .map(|p| state.health.is_throttled(p.name())),
    )
    .await;
    let entries = providers
        .iter()
        .zip(throttles)
        .map(|(p, throttled)| ProviderHealthEntry {
            name: p.name().to_string(),
            credentialed: p.has_credential(),
            throttled,
        })
        .collect();
    Json(HealthResponse {
        status: "ok",
        providers: entries,
    })
}

/// An `ApiError` bound to its request trace id; renders the JSON error
/// body plus `x-request-id` and, where applicable, `Retry-After`.
pub struct ApiFailure {
    error: ApiError,
    request_id: String,
}

impl ApiFailure {
    pub fn new(error: ApiError, request_id: String) -> Self {
        Self { error, request_id }
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.error.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = self.error.to_response(Some(self.request_id.clone()));
        let mut response = (status, Json(body)).into_response();
        if let Ok(value) = header::HeaderValue::from_str(&self.request_id) {
            response.headers_mut().insert("x-request-id", value);
        }
        if let Some(retry_after) = self.error.retry_after() {
            if let Ok(value) = header::HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
