// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Environment-driven gateway configuration

use std::env;
use tracing::warn;

use crate::admission::PlanTier;

/// One configured upstream provider, in priority order.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub name: String,
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
}

/// Token table entry mapping a bearer token to a user and tier.
#[derive(Debug, Clone)]
pub struct AuthToken {
    pub token: String,
    pub user_id: String,
    pub tier: PlanTier,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub listen_addr: String,
    /// Cross-instance counter store; the in-process store is used when unset.
    pub redis_url: Option<String>,
    pub providers: Vec<ProviderConfig>,
    pub auth_tokens: Vec<AuthToken>,
}

impl GatewayConfig {
    /// Load from environment variables. Provider entries without an API
    /// key stay in the priority list but are skipped by the chain builder.
    pub fn from_env() -> Self {
        let listen_addr =
            env::var("API_LISTEN_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let redis_url = env::var("REDIS_URL").ok();

        // Fixed priority order; determinism here keeps fallback debuggable
        let providers = vec![
            ProviderConfig {
                name: "flux".to_string(),
                endpoint: env::var("FLUX_ENDPOINT")
                    .unwrap_or_else(|_| "https://api.flux.example.com".to_string()),
                model: env::var("FLUX_MODEL").unwrap_or_else(|_| "flux2-klein-4b".to_string()),
                api_key: env::var("FLUX_API_KEY").ok(),
            },
            ProviderConfig {
                name: "sdxl".to_string(),
                endpoint: env::var("SDXL_ENDPOINT")
                    .unwrap_or_else(|_| "https://api.sdxl.example.com".to_string()),
                model: env::var("SDXL_MODEL")
                    .unwrap_or_else(|_| "stable-diffusion-xl-base-1.0".to_string()),
                api_key: env::var("SDXL_API_KEY").ok(),
            },
            ProviderConfig {
                name: "dalle".to_string(),
                endpoint: env::var("DALLE_ENDPOINT")
                    .unwrap_or_else(|_| "https://api.openai.com".to_string()),
                model: env::var("DALLE_MODEL").unwrap_or_else(|_| "dall-e-3".to_string()),
                api_key: env::var("DALLE_API_KEY").ok(),
            },
        ];

        Self {
            listen_addr,
            redis_url,
            providers,
            auth_tokens: parse_auth_tokens(&env::var("AUTH_TOKENS").unwrap_or_default()),
        }
    }
}

/// `AUTH_TOKENS` format: `token:user_id:tier` entries separated by commas.
fn parse_auth_tokens(raw: &str) -> Vec<AuthToken> {
    raw.split(',')
        .filter(|entry| !entry.trim().is_empty())
        .filter_map(|entry| {
            let parts: Vec<&str> = entry.trim().splitn(3, ':').collect();
            if parts.len() != 3 {
                warn!("Ignoring malformed AUTH_TOKENS entry");
                return None;
            }
            let tier = match parts[2] {
                "free" => PlanTier::Free,
                "plus" => PlanTier::Plus,
                "pro" => PlanTier::Pro,
                other => {
                    warn!("Ignoring AUTH_TOKENS entry with unknown tier '{}'", other);
                    return None;
                }
            };
            Some(AuthToken {
                token: parts[0].to_string(),
                user_id: parts[1].to_string(),
                tier,
            })
        })
        .collect()
}
