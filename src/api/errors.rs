// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Caller-facing error taxonomy. Every terminal failure carries a machine
//! readable code, a short human hint and, for policy rejections, the
//! structured retry data a client needs to back off without parsing prose.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::providers::{DispatchError, ProviderError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error_type: String,
    pub message: String,
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone)]
pub enum ApiError {
    InvalidRequest(String),
    Unauthorized(String),
    InsufficientBalance,
    RateLimited {
        retry_after: u64,
        limit: u64,
        used: u64,
    },
    QuotaExceeded {
        retry_after: u64,
        limit: u64,
        used: u64,
    },
    ConcurrencyExceeded {
        retry_after: u64,
        limit: u64,
    },
    ContentRejected {
        provider: String,
        message: String,
    },
    AllProvidersUnavailable {
        retry_after: u64,
        message: String,
    },
    InternalError(String),
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::InvalidRequest(_) | ApiError::ContentRejected { .. } => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::InsufficientBalance => 402,
            ApiError::RateLimited { .. } | ApiError::QuotaExceeded { .. } => 429,
            ApiError::ConcurrencyExceeded { .. } | ApiError::AllProvidersUnavailable { .. } => 503,
            ApiError::InternalError(_) => 500,
        }
    }

    /// Retry-After header value, for the statuses that carry one.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            ApiError::RateLimited { retry_after, .. }
            | ApiError::QuotaExceeded { retry_after, .. }
            | ApiError::ConcurrencyExceeded { retry_after, .. }
            | ApiError::AllProvidersUnavailable { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }

    pub fn to_response(&self, request_id: Option<String>) -> ErrorResponse {
        let (error_type, message, details) = match self {
            ApiError::InvalidRequest(msg) => ("invalid_request", msg.clone(), None),
            ApiError::Unauthorized(msg) => ("unauthorized", msg.clone(), None),
            ApiError::InsufficientBalance => (
                "insufficient_balance",
                "Not enough credits for an HD generation".to_string(),
                None,
            ),
            ApiError::RateLimited {
                retry_after,
                limit,
                used,
            } => (
                "rate_limited",
                "Rate limit exceeded".to_string(),
                Some(retry_details(*retry_after, *limit, *used)),
            ),
            ApiError::QuotaExceeded {
                retry_after,
                limit,
                used,
            } => (
                "quota_exceeded",
                "Daily generation quota exhausted".to_string(),
                Some(retry_details(*retry_after, *limit, *used)),
            ),
            ApiError::ConcurrencyExceeded { retry_after, limit } => {
                let mut details = HashMap::new();
                details.insert("retryAfter".to_string(), (*retry_after).into());
                details.insert("limit".to_string(), (*limit).into());
                (
                    "concurrency_exceeded",
                    "Too many generations in flight".to_string(),
                    Some(details),
                )
            }
            ApiError::ContentRejected { provider, message } => {
                let mut details = HashMap::new();
                details.insert(
                    "provider".to_string(),
                    serde_json::Value::String(provider.clone()),
                );
                (
                    "content_rejected",
                    format!("Prompt rejected by content filter: {}", message),
                    Some(details),
                )
            }
            ApiError::AllProvidersUnavailable {
                retry_after,
                message,
            } => {
                let mut details = HashMap::new();
                details.insert("retryAfter".to_string(), (*retry_after).into());
                ("all_providers_unavailable", message.clone(), Some(details))
            }
            ApiError::InternalError(msg) => ("internal_error", msg.clone(), None),
        };

        ErrorResponse {
            ok: false,
            error_type: error_type.to_string(),
            message,
            request_id,
            details,
        }
    }
}

fn retry_details(retry_after: u64, limit: u64, used: u64) -> HashMap<String, serde_json::Value> {
    let mut details = HashMap::new();
    details.insert("retryAfter".to_string(), retry_after.into());
    details.insert("limit".to_string(), limit.into());
    details.insert("used".to_string(), used.into());
    details
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::InsufficientBalance => write!(f, "Insufficient balance"),
            ApiError::RateLimited { retry_after, .. } => {
                write!(f, "Rate limited, retry after {}s", retry_after)
            }
            ApiError::QuotaExceeded { retry_after, .. } => {
                write!(f, "Quota exceeded, resets in {}s", retry_after)
            }
            ApiError::ConcurrencyExceeded { limit, .. } => {
                write!(f, "Concurrency cap of {} reached", limit)
            }
            ApiError::ContentRejected { provider, .. } => {
                write!(f, "Content rejected by {}", provider)
            }
            ApiError::AllProvidersUnavailable { message, .. } => f.write_str(message),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Provider(ProviderError::ContentFiltered { provider, message }) => {
                ApiError::ContentRejected { provider, message }
            }
            DispatchError::Provider(ProviderError::Transient { message, .. }) => {
                ApiError::AllProvidersUnavailable {
                    retry_after: 30,
                    message,
                }
            }
            DispatchError::Provider(ProviderError::Fatal { provider, message }) => {
                ApiError::InternalError(format!(
                    "provider {} rejected the request: {}",
                    provider, message
                ))
            }
            DispatchError::AllProvidersUnavailable { attempted, last } => {
                let message = match last {
                    Some(e) => {
                        format!("All {} providers unavailable; last error: {}", attempted, e)
                    }
                    None => "No providers available for this request".to_string(),
                };
                ApiError::AllProvidersUnavailable {
                    retry_after: 30,
                    message,
                }
            }
            DispatchError::UnknownProvider(name) => {
                ApiError::InvalidRequest(format!("unknown provider: {}", name))
            }
        }
    }
}
