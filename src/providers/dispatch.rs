// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Generation dispatcher: walks the fallback chain, racing each provider
//! call against a timeout, classifying failures and retrying a
//! content-filtered primary once with a sanitized prompt.
//!
//! Per-request state machine:
//! `Pending -> Attempting(p) -> { Succeeded
//!                             | ContentFiltered -> RetryingSanitized -> { Succeeded | next }
//!                             | Transient -> Attempting(next)
//!                             | Fatal -> Failed }`
//! with chain exhaustion ending in `AllFailed`.

use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::adapter::{GenerationRequest, ImageProvider, ProviderError, ProviderOutput};
use super::health::ProviderHealthTracker;
use super::registry::ProviderRegistry;
use super::sanitize::sanitize_prompt;
use crate::validate::is_valid_result_reference;

const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(180);

/// Final product of a successful dispatch. `provider` is the provider
/// actually used, which may differ from the requested primary.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub result_url: String,
    pub result_urls: Vec<String>,
    pub resolved_seed: u64,
    pub duration_ms: u64,
    pub provider: String,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Terminal failure from a single provider: a fatal error, or the
    /// preserved underlying error when only one provider was attempted.
    #[error(transparent)]
    Provider(ProviderError),

    /// The whole chain was exhausted without a usable result.
    #[error("all providers unavailable ({attempted} attempted)")]
    AllProvidersUnavailable {
        attempted: usize,
        last: Option<ProviderError>,
    },

    /// The requested primary is not in the registry.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
}

pub struct GenerationDispatcher {
    registry: Arc<ProviderRegistry>,
    health: Arc<ProviderHealthTracker>,
    attempt_timeout: Duration,
}

impl GenerationDispatcher {
    pub fn new(registry: Arc<ProviderRegistry>, health: Arc<ProviderHealthTracker>) -> Self {
        Self {
            registry,
            health,
            attempt_timeout: ATTEMPT_TIMEOUT,
        }
    }

    /// Custom attempt timeout for tests.
    pub fn with_timeout(
        registry: Arc<ProviderRegistry>,
        health: Arc<ProviderHealthTracker>,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            health,
            attempt_timeout,
        }
    }

    /// Attempt `chain` in order for `request`.
    ///
    /// A content-filter rejection triggers exactly one sanitized retry,
    /// only when the rejecting provider is the chain's primary; if the
    /// retry is also rejected the attempt falls through like any other
    /// failed attempt. Transient failures move to the next candidate.
    /// Fatal failures abort immediately: a caller error will not improve
    /// on a different provider. Every content-filtered or transient
    /// attempt records a provider failure; a later sanitized success does
    /// not clear the record.
    pub async fn dispatch(
        &self,
        chain: &[String],
        request: &GenerationRequest,
    ) -> Result<GenerationResult, DispatchError> {
        let started = Instant::now();
        let mut last_error: Option<ProviderError> = None;
        let mut attempted = 0usize;
        let mut sanitize_spent = false;

        for (position, name) in chain.iter().enumerate() {
            let provider = self
                .registry
                .get(name)
                .ok_or_else(|| DispatchError::UnknownProvider(name.clone()))?;
            attempted += 1;

            debug!("Attempting provider {} ({}/{})", name, position + 1, chain.len());
            match self.attempt(provider.as_ref(), request).await {
                Ok(output) => {
                    return Ok(self.finish(output, name, started));
                }
                Err(ProviderError::Fatal { provider, message }) => {
                    // Not recorded against provider health: the chain
                    // aborts and the failure is the caller's, not theirs.
                    warn!("Fatal error from {}, aborting chain: {}", provider, message);
                    return Err(DispatchError::Provider(ProviderError::Fatal {
                        provider,
                        message,
                    }));
                }
                Err(err @ ProviderError::ContentFiltered { .. }) => {
                    self.health.record_failure(name).await;
                    let is_primary = position == 0;
                    if is_primary && !sanitize_spent {
                        sanitize_spent = true;
                        match self.retry_sanitized(provider.as_ref(), request).await {
                            Ok(output) => {
                                return Ok(self.finish(output, name, started));
                            }
                            Err(ProviderError::Fatal { provider, message }) => {
                                return Err(DispatchError::Provider(ProviderError::Fatal {
                                    provider,
                                    message,
                                }));
                            }
                            Err(_) => {
                                // Retry exhausted: the original attempt's
                                // classification stands and the chain moves on
                                last_error = Some(err);
                            }
                        }
                    } else {
                        last_error = Some(err);
                    }
                }
                Err(err @ ProviderError::Transient { .. }) => {
                    self.health.record_failure(name).await;
                    debug!("Transient failure from {}: {}", name, err);
                    last_error = Some(err);
                }
            }
        }

        if attempted == 1 {
            if let Some(err) = last_error {
                return Err(DispatchError::Provider(err));
            }
        }
        Err(DispatchError::AllProvidersUnavailable {
            attempted,
            last: last_error,
        })
    }

    /// One provider call raced against the attempt timeout. A timeout is a
    /// synthetic transient with its own marker; the dropped call may still
    /// complete upstream and its result is discarded.
    async fn attempt(
        &self,
        provider: &dyn ImageProvider,
        request: &GenerationRequest,
    ) -> Result<ProviderOutput, ProviderError> {
        let outcome = tokio::time::timeout(
            self.attempt_timeout,
            provider.generate(request, self.attempt_timeout),
        )
        .await;
        let output = match outcome {
            Ok(result) => result?,
            Err(_) => {
                return Err(ProviderError::timeout(provider.name(), self.attempt_timeout))
            }
        };
        self.validated(provider.name(), output)
    }

    async fn retry_sanitized(
        &self,
        provider: &dyn ImageProvider,
        request: &GenerationRequest,
    ) -> Result<ProviderOutput, ProviderError> {
        let sanitized = GenerationRequest {
            prompt: sanitize_prompt(&request.prompt),
            ..request.clone()
        };
        info!(
            "Content filtered by {}, retrying once with sanitized prompt",
            provider.name()
        );
        self.attempt(provider, &sanitized).await
    }

    /// A provider call that "succeeded" with an unusable result reference
    /// becomes a transient failure so the normal fallback logic applies.
    fn validated(
        &self,
        provider: &str,
        output: ProviderOutput,
    ) -> Result<ProviderOutput, ProviderError> {
        if !is_valid_result_reference(output.primary_url()) {
            return Err(ProviderError::invalid_result(provider, output.primary_url()));
        }
        Ok(output)
    }

    fn finish(&self, output: ProviderOutput, provider: &str, started: Instant) -> GenerationResult {
        let duration_ms = started.elapsed().as_millis() as u64;
        info!(
            "Generation succeeded via {} in {}ms",
            provider, duration_ms
        );
        GenerationResult {
            result_url: output.primary_url().to_string(),
            result_urls: output.result_urls,
            resolved_seed: output.seed,
            duration_ms,
            provider: provider.to_string(),
        }
    }
}
