// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Generation endpoint handlers
//!
//! POST pipeline:
//! 1. Validate request
//! 2. Resolve session (principal + tier)
//! 3. Admission gates (rate / concurrency / quota or HD credit)
//! 4. Build fallback chain for the requested primary
//! 5. Create pending job record
//! 6. Dispatch through the chain
//! 7. Update job record, release the concurrency slot, respond

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::request::{GenerateRequest, HistoryQuery};
use super::response::{GenerateResponse, HistoryResponse};
use crate::admission::AdmissionDecision;
use crate::api::errors::ApiError;
use crate::api::http_server::{ApiFailure, AppState};
use crate::collaborators::{JobFilter, JobRecord, JobStatus, Session};
use crate::providers::GenerationRequest;

const MAX_HISTORY_LIMIT: usize = 100;
const DEFAULT_HISTORY_LIMIT: usize = 20;

/// POST /generate
pub async fn generate_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<GenerateRequest>,
) -> Result<Response, ApiFailure> {
    let request_id = Uuid::new_v4().to_string();
    let fail = |error: ApiError| ApiFailure::new(error, request_id.clone());

    if let Err(e) = request.validate() {
        warn!("Generation request rejected: {}", e);
        return Err(fail(ApiError::InvalidRequest(e)));
    }
    // validate() has checked the mode string already
    let mode = request
        .operating_mode()
        .map_err(|e| fail(ApiError::InvalidRequest(e)))?;

    let session = state
        .sessions
        .resolve(bearer_token(&headers), &client_addr(&headers))
        .await;
    debug!(
        "Generation request {}: principal={} tier={} tool={}",
        request_id, session.principal, session.tier, request.tool
    );

    // HD output draws on the credit balance, which only exists for
    // authenticated accounts.
    if request.is_hd() && session.principal.is_anonymous() {
        return Err(fail(ApiError::Unauthorized(
            "HD generation requires an account".to_string(),
        )));
    }
    let hd_affordable = if request.is_hd() {
        let affordable = state
            .credits
            .can_afford_hd(&session.principal)
            .await
            .map_err(|e| fail(ApiError::InternalError(e.to_string())))?;
        Some(affordable)
    } else {
        None
    };

    let (decision, guard) = state
        .admission
        .admit(&session.principal, session.tier, hd_affordable)
        .await
        .map_err(|e| fail(ApiError::InternalError(e.to_string())))?;
    let guard = match decision {
        AdmissionDecision::Allowed => guard,
        AdmissionDecision::RateLimited {
            retry_after_secs,
            limit,
            used,
        } => {
            return Err(fail(ApiError::RateLimited {
                retry_after: retry_after_secs,
                limit,
                used,
            }))
        }
        AdmissionDecision::QuotaExceeded {
            retry_after_secs,
            limit,
            used,
        } => {
            return Err(fail(ApiError::QuotaExceeded {
                retry_after: retry_after_secs,
                limit,
                used,
            }))
        }
        AdmissionDecision::ConcurrencyExceeded {
            retry_after_secs,
            limit,
        } => {
            return Err(fail(ApiError::ConcurrencyExceeded {
                retry_after: retry_after_secs,
                limit,
            }))
        }
        AdmissionDecision::InsufficientBalance => return Err(fail(ApiError::InsufficientBalance)),
    };
    let guard = match guard {
        Some(g) => g,
        None => {
            return Err(fail(ApiError::InternalError(
                "admission allowed without a concurrency claim".to_string(),
            )))
        }
    };

    let primary = match &request.provider {
        Some(name) => name.clone(),
        None => match state.registry.default_primary() {
            Some(p) => p.name().to_string(),
            None => {
                guard.release().await;
                return Err(fail(ApiError::AllProvidersUnavailable {
                    retry_after: 60,
                    message: "No provider credentials configured".to_string(),
                }));
            }
        },
    };
    if state.registry.get(&primary).is_none() {
        guard.release().await;
        return Err(fail(ApiError::InvalidRequest(format!(
            "unknown provider: {}",
            primary
        ))));
    }

    let chain = state.chain_builder.build(&primary, mode).await;
    let resolved_seed = request.seed.unwrap_or_else(rand::random);
    let dispatch_request = GenerationRequest {
        prompt: request.prompt.clone(),
        negative_prompt: request.neg_prompt.clone(),
        width: request.width,
        height: request.height,
        steps: request.steps,
        guidance_scale: request.guidance,
        seed: resolved_seed,
        hd: request.is_hd(),
    };

    let mut record = JobRecord {
        id: request_id.clone(),
        principal: session.principal.key(),
        tool: request.tool.clone(),
        mode: request.mode.clone(),
        status: JobStatus::Pending,
        provider: None,
        result_url: None,
        error: None,
        created_at: Utc::now(),
    };
    if let Err(e) = state.jobs.create(record.clone()).await {
        warn!("Failed to create job record {}: {}", request_id, e);
    }

    let outcome = state.dispatcher.dispatch(&chain, &dispatch_request).await;
    guard.release().await;

    match outcome {
        Ok(result) => {
            record.status = JobStatus::Succeeded;
            record.provider = Some(result.provider.clone());
            record.result_url = Some(result.result_url.clone());
            if let Err(e) = state.jobs.update(record).await {
                warn!("Failed to update job record {}: {}", request_id, e);
            }
            if request.is_hd() {
                debit_credits(&state, &session).await;
            }

            let provider = result.provider.clone();
            let body: GenerateResponse = result.into();
            Ok((
                [
                    ("x-request-id", request_id.clone()),
                    ("x-provider", provider),
                ],
                Json(body),
            )
                .into_response())
        }
        Err(err) => {
            record.status = JobStatus::Failed;
            record.error = Some(err.to_string());
            if let Err(e) = state.jobs.update(record).await {
                warn!("Failed to update job record {}: {}", request_id, e);
            }
            Err(fail(err.into()))
        }
    }
}

/// GET /generate — cursor-paginated history for the calling principal.
pub async fn history_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiFailure> {
    let request_id = Uuid::new_v4().to_string();
    let fail = |error: ApiError| ApiFailure::new(error, request_id.clone());

    let session = state
        .sessions
        .resolve(bearer_token(&headers), &client_addr(&headers))
        .await;

    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(MAX_HISTORY_LIMIT)
        .max(1);
    let status = match query.status.as_deref() {
        None => None,
        Some("pending") => Some(JobStatus::Pending),
        Some("succeeded") => Some(JobStatus::Succeeded),
        Some("failed") => Some(JobStatus::Failed),
        Some(other) => {
            return Err(fail(ApiError::InvalidRequest(format!(
                "invalid status filter: {}",
                other
            ))))
        }
    };
    let filter = JobFilter {
        tool: query.tool.clone(),
        status,
        mode: query.mode.clone(),
    };

    let page = state
        .jobs
        .list(&session.principal, limit, query.cursor.as_deref(), &filter)
        .await
        .map_err(|e| fail(ApiError::InternalError(e.to_string())))?;

    Ok(Json(HistoryResponse {
        items: page.items,
        next_cursor: page.next_cursor,
        has_more: page.has_more,
    }))
}

async fn debit_credits(state: &AppState, session: &Session) {
    if let Err(e) = state.credits.debit_hd(&session.principal).await {
        // The ledger is external; a failed debit is its operators' problem,
        // not grounds to fail a delivered generation
        warn!("HD credit debit failed for {}: {}", session.principal, e);
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

fn client_addr(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| "127.0.0.1".to_string())
}
