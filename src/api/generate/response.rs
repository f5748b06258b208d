// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Generation response DTOs

use serde::{Deserialize, Serialize};

use crate::collaborators::JobRecord;
use crate::providers::GenerationResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub ok: bool,
    pub result_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_urls: Option<Vec<String>>,
    pub duration_ms: u64,
    pub resolved_seed: u64,
    /// Provider actually used; may differ from the requested primary when
    /// the fallback chain kicked in.
    pub provider: String,
}

impl From<GenerationResult> for GenerateResponse {
    fn from(result: GenerationResult) -> Self {
        let extras = if result.result_urls.len() > 1 {
            Some(result.result_urls)
        } else {
            None
        };
        Self {
            ok: true,
            result_url: result.result_url,
            result_urls: extras,
            duration_ms: result.duration_ms,
            resolved_seed: result.resolved_seed,
            provider: result.provider,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub items: Vec<JobRecord>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}
