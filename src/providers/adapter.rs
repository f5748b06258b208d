// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Provider adapter seam: the trait every upstream image provider
//! implements, plus the typed error taxonomy the dispatcher matches on.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Internal generation request handed to a provider adapter. Built by the
/// API layer after validation; prompt may be the sanitized variant on a
/// content-filter retry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub guidance_scale: f32,
    pub seed: u64,
    pub hd: bool,
}

/// What a provider returns on success: one or more result references,
/// primary first.
#[derive(Debug, Clone)]
pub struct ProviderOutput {
    pub result_urls: Vec<String>,
    pub seed: u64,
}

impl ProviderOutput {
    pub fn primary_url(&self) -> &str {
        self.result_urls.first().map(String::as_str).unwrap_or("")
    }
}

/// Typed failure taxonomy, produced only at the adapter boundary
/// (`classify.rs`). The dispatcher never inspects upstream message text.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Upstream moderation rejected the prompt or output.
    #[error("content filtered by {provider}: {message}")]
    ContentFiltered { provider: String, message: String },

    /// Worth retrying against another provider. `marker` distinguishes
    /// synthetic transients (timeout, invalid result) from upstream ones.
    #[error("transient error from {provider} ({marker}): {message}")]
    Transient {
        provider: String,
        marker: &'static str,
        message: String,
    },

    /// Caller-caused or otherwise unretryable; aborts the whole chain.
    #[error("fatal error from {provider}: {message}")]
    Fatal { provider: String, message: String },
}

impl ProviderError {
    pub fn provider(&self) -> &str {
        match self {
            ProviderError::ContentFiltered { provider, .. }
            | ProviderError::Transient { provider, .. }
            | ProviderError::Fatal { provider, .. } => provider,
        }
    }

    pub fn timeout(provider: &str, deadline: Duration) -> Self {
        ProviderError::Transient {
            provider: provider.to_string(),
            marker: "timeout",
            message: format!("no response within {}s", deadline.as_secs()),
        }
    }

    /// A call that "succeeded" with a malformed result reference is raised
    /// as a server-side transient so fallback applies uniformly.
    pub fn invalid_result(provider: &str, reference: &str) -> Self {
        ProviderError::Transient {
            provider: provider.to_string(),
            marker: "invalid_result",
            message: format!("provider returned unusable result reference: {:.80}", reference),
        }
    }
}

/// One upstream image generation provider.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this provider has the credential it needs to be called.
    /// Credential-less providers are skipped by the fallback chain.
    fn has_credential(&self) -> bool;

    /// Run one generation attempt. `deadline` is threaded into the
    /// underlying HTTP call so the transport gives up on its own; the
    /// dispatcher still races a timeout around the whole call as a
    /// backstop. Upstream cancellation past the deadline is best-effort.
    async fn generate(
        &self,
        request: &GenerationRequest,
        deadline: Duration,
    ) -> Result<ProviderOutput, ProviderError>;
}
