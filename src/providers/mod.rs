// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Upstream provider layer: adapters, health tracking, fallback chain
//! construction and the generation dispatcher.

pub mod adapter;
pub mod chain;
pub mod classify;
pub mod dispatch;
pub mod health;
pub mod openai_compat;
pub mod registry;
pub mod sanitize;

pub use adapter::{GenerationRequest, ImageProvider, ProviderError, ProviderOutput};
pub use chain::FallbackChainBuilder;
pub use dispatch::{DispatchError, GenerationDispatcher, GenerationResult};
pub use health::ProviderHealthTracker;
pub use openai_compat::OpenAiCompatProvider;
pub use registry::{OperatingMode, ProviderRegistry};
pub use sanitize::sanitize_prompt;
