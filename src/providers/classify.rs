// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Heuristic mapping of upstream failures onto the typed taxonomy.
//!
//! Providers report errors as free-text with inconsistent status codes, so
//! some pattern matching is unavoidable; it is confined to this module and
//! the rest of the gateway dispatches on the resulting tag only.

use super::adapter::ProviderError;

/// Message fragments that indicate a moderation/safety rejection.
const CONTENT_FILTER_PATTERNS: &[&str] = &[
    "content policy",
    "content_policy",
    "safety system",
    "safety filter",
    "moderation",
    "nsfw",
    "flagged",
];

/// Message fragments that indicate a retryable upstream condition.
const TRANSIENT_PATTERNS: &[&str] = &[
    "timeout",
    "timed out",
    "overloaded",
    "currently loading",
    "temporarily unavailable",
    "service unavailable",
    "rate limit",
    "too many requests",
    "try again",
    "capacity",
];

/// Classify an upstream failure from its HTTP status (when present) and
/// message text. Anything not recognizably a filter rejection or a
/// transient condition is fatal: retrying a caller error against a
/// different provider cannot help.
pub fn classify_upstream(provider: &str, status: Option<u16>, message: &str) -> ProviderError {
    let lower = message.to_lowercase();

    // Some providers signal moderation with 400/422, so the message check
    // runs before the status buckets.
    if CONTENT_FILTER_PATTERNS.iter().any(|p| lower.contains(p)) {
        return ProviderError::ContentFiltered {
            provider: provider.to_string(),
            message: message.to_string(),
        };
    }

    let transient_status = matches!(status, Some(408 | 429 | 500 | 502 | 503 | 504));
    if transient_status || TRANSIENT_PATTERNS.iter().any(|p| lower.contains(p)) {
        return ProviderError::Transient {
            provider: provider.to_string(),
            marker: "upstream",
            message: message.to_string(),
        };
    }

    ProviderError::Fatal {
        provider: provider.to_string(),
        message: message.to_string(),
    }
}

/// Classify a transport-level error (connection refused, DNS, reqwest
/// timeout). These never carry an HTTP status and are always transient.
pub fn classify_transport(provider: &str, error: &reqwest::Error) -> ProviderError {
    let marker = if error.is_timeout() { "timeout" } else { "connect" };
    ProviderError::Transient {
        provider: provider.to_string(),
        marker,
        message: error.to_string(),
    }
}
