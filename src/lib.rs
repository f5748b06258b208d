// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod admission;
pub mod api;
pub mod collaborators;
pub mod config;
pub mod counters;
pub mod providers;
pub mod validate;

// Re-export the orchestrator surface
pub use admission::{AdmissionController, AdmissionDecision, ConcurrencyGuard, PlanTier, Principal};
pub use api::{ApiError, AppState, ErrorResponse, GenerateRequest, GenerateResponse};
pub use collaborators::{
    CreditService, JobFilter, JobPage, JobRecord, JobStatus, JobStore, LogNotifier,
    MemoryCreditService, MemoryJobStore, Notifier, NotifyEvent, Session, SessionResolver,
    StaticSessionResolver,
};
pub use config::GatewayConfig;
pub use counters::{CounterStore, MemoryCounterStore, RedisCounterStore};
pub use providers::{
    DispatchError, FallbackChainBuilder, GenerationDispatcher, GenerationRequest,
    GenerationResult, ImageProvider, OpenAiCompatProvider, OperatingMode, ProviderError,
    ProviderHealthTracker, ProviderOutput, ProviderRegistry,
};
pub use validate::is_valid_result_reference;
