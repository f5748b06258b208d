// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Generation request DTO and validation

use serde::{Deserialize, Serialize};

use crate::providers::registry::OperatingMode;

/// Dimensions a request may ask for.
pub const ALLOWED_DIMENSIONS: &[u32] = &[256, 512, 768, 1024, 1536, 2048];

pub const MAX_PROMPT_LEN: usize = 2000;

fn default_width() -> u32 {
    1024
}

fn default_height() -> u32 {
    1024
}

fn default_steps() -> u32 {
    30
}

fn default_guidance() -> f32 {
    7.5
}

fn default_mode() -> String {
    "hosted".to_string()
}

fn default_quality() -> String {
    "standard".to_string()
}

/// POST /generate body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    /// Product-line tool this request belongs to (free-form label for the
    /// job record; prompt assembly per tool happens upstream of the core).
    pub tool: String,
    /// Requested primary provider; the registry default when absent.
    #[serde(default)]
    pub provider: Option<String>,
    /// `hosted` (service keys, fallback allowed) or `self-hosted`
    /// (caller keys, no fallback).
    #[serde(default = "default_mode")]
    pub mode: String,
    pub prompt: String,
    #[serde(default)]
    pub neg_prompt: Option<String>,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_steps")]
    pub steps: u32,
    #[serde(default = "default_guidance")]
    pub guidance: f32,
    /// `standard` (daily quota) or `hd` (credit balance).
    #[serde(default = "default_quality")]
    pub quality: String,
}

impl GenerateRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.prompt.trim().is_empty() {
            return Err("prompt must not be empty".to_string());
        }
        if self.prompt.len() > MAX_PROMPT_LEN {
            return Err(format!(
                "prompt exceeds {} characters",
                MAX_PROMPT_LEN
            ));
        }
        if self.tool.trim().is_empty() {
            return Err("tool must not be empty".to_string());
        }
        if !ALLOWED_DIMENSIONS.contains(&self.width) {
            return Err(format!("invalid width {}; allowed: {:?}", self.width, ALLOWED_DIMENSIONS));
        }
        if !ALLOWED_DIMENSIONS.contains(&self.height) {
            return Err(format!(
                "invalid height {}; allowed: {:?}",
                self.height, ALLOWED_DIMENSIONS
            ));
        }
        if self.steps == 0 || self.steps > 100 {
            return Err(format!("steps must be between 1 and 100, got {}", self.steps));
        }
        if !(0.0..=30.0).contains(&self.guidance) {
            return Err(format!("guidance must be between 0 and 30, got {}", self.guidance));
        }
        match self.quality.as_str() {
            "standard" | "hd" => {}
            other => return Err(format!("invalid quality '{}'; expected standard or hd", other)),
        }
        self.operating_mode()?;
        Ok(())
    }

    pub fn is_hd(&self) -> bool {
        self.quality == "hd"
    }

    pub fn operating_mode(&self) -> Result<OperatingMode, String> {
        match self.mode.as_str() {
            "hosted" => Ok(OperatingMode::Hosted),
            "self-hosted" => Ok(OperatingMode::SelfHosted),
            other => Err(format!(
                "invalid mode '{}'; expected hosted or self-hosted",
                other
            )),
        }
    }
}

/// GET /generate query string.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
    pub cursor: Option<String>,
    pub tool: Option<String>,
    pub status: Option<String>,
    pub mode: Option<String>,
}
