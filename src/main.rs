// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use clap::Parser;
use std::env;
use std::sync::Arc;
use tracing::{info, warn};

use fabstir_gen_gateway::{
    api::{start_server, AppState},
    admission::AdmissionController,
    collaborators::{LogNotifier, MemoryCreditService, MemoryJobStore, StaticSessionResolver},
    config::GatewayConfig,
    counters::{CounterStore, MemoryCounterStore, RedisCounterStore},
    providers::{
        FallbackChainBuilder, GenerationDispatcher, OpenAiCompatProvider, ProviderHealthTracker,
        ProviderRegistry,
    },
};

#[derive(Parser, Debug)]
#[command(name = "fabstir-gen-gateway", about = "Image generation gateway node")]
struct Args {
    /// Listen address override (falls back to API_LISTEN_ADDR)
    #[arg(long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = GatewayConfig::from_env();
    let listen_addr = args.listen.unwrap_or_else(|| config.listen_addr.clone());

    // Counter store: shared Redis when configured, process-local otherwise
    let store: Arc<dyn CounterStore> = match config.redis_url.as_deref() {
        Some(url) => match RedisCounterStore::connect(url).await {
            Ok(store) => {
                info!("Using shared counter store");
                Arc::new(store)
            }
            Err(e) => {
                warn!("Counter store unreachable ({}), using in-process counters", e);
                Arc::new(MemoryCounterStore::new())
            }
        },
        None => {
            info!("REDIS_URL not set, using in-process counters");
            Arc::new(MemoryCounterStore::new())
        }
    };

    let mut adapters: Vec<Arc<dyn fabstir_gen_gateway::ImageProvider>> = Vec::new();
    for p in &config.providers {
        if p.api_key.is_none() {
            info!("Provider {} has no credential configured", p.name);
        }
        adapters.push(Arc::new(OpenAiCompatProvider::new(
            &p.name,
            &p.endpoint,
            &p.model,
            p.api_key.clone(),
        )?));
    }
    let registry = Arc::new(ProviderRegistry::new(adapters));
    let health = Arc::new(ProviderHealthTracker::new(store.clone()));
    let chain_builder = Arc::new(FallbackChainBuilder::new(registry.clone(), health.clone()));
    let dispatcher = Arc::new(GenerationDispatcher::new(registry.clone(), health.clone()));

    let notifier = Arc::new(LogNotifier);
    let admission = Arc::new(AdmissionController::new(store.clone(), notifier.clone()));

    let mut resolver = StaticSessionResolver::new();
    for token in &config.auth_tokens {
        resolver = resolver.with_token(&token.token, &token.user_id, token.tier);
    }

    let state = AppState {
        sessions: Arc::new(resolver),
        credits: Arc::new(MemoryCreditService::new()),
        jobs: Arc::new(MemoryJobStore::new()),
        notifier,
        admission,
        registry,
        health,
        chain_builder,
        dispatcher,
    };

    start_server(state, &listen_addr).await
}
