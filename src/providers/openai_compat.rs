// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Adapter for OpenAI-compatible image generation APIs
//! (`POST {endpoint}/v1/images/generations`). Covers the hosted providers
//! and self-hosted sidecars alike; one instance per configured upstream.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::adapter::{GenerationRequest, ImageProvider, ProviderError, ProviderOutput};
use super::classify::{classify_transport, classify_upstream};

pub struct OpenAiCompatProvider {
    name: String,
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    url: Option<String>,
    b64_json: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpstreamError {
    error: Option<UpstreamErrorBody>,
}

#[derive(Debug, Deserialize)]
struct UpstreamErrorBody {
    message: Option<String>,
}

impl OpenAiCompatProvider {
    pub fn new(
        name: &str,
        endpoint: &str,
        model: &str,
        api_key: Option<String>,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()?;
        Ok(Self {
            name: name.to_string(),
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl ImageProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
        deadline: Duration,
    ) -> Result<ProviderOutput, ProviderError> {
        let mut body = serde_json::json!({
            "prompt": request.prompt,
            "model": self.model,
            "size": format!("{}x{}", request.width, request.height),
            "n": 1,
            "response_format": "b64_json",
            "guidance_scale": request.guidance_scale,
            "num_inference_steps": request.steps,
            "seed": request.seed,
        });
        if let Some(ref neg) = request.negative_prompt {
            body["negative_prompt"] = serde_json::json!(neg);
        }
        if request.hd {
            body["quality"] = serde_json::json!("hd");
        }

        let url = format!("{}/v1/images/generations", self.endpoint);
        debug!("Provider {} POST {}", self.name, url);

        let mut builder = self.client.post(&url).timeout(deadline).json(&body);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| classify_transport(&self.name, &e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<UpstreamError>(&text)
                .ok()
                .and_then(|e| e.error)
                .and_then(|e| e.message)
                .unwrap_or(text);
            warn!("Provider {} returned {}: {}", self.name, status, message);
            return Err(classify_upstream(&self.name, Some(status.as_u16()), &message));
        }

        let parsed: ImagesResponse = response.json().await.map_err(|e| {
            ProviderError::Transient {
                provider: self.name.clone(),
                marker: "invalid_result",
                message: format!("unparseable response body: {}", e),
            }
        })?;

        let result_urls: Vec<String> = parsed
            .data
            .into_iter()
            .filter_map(|d| match (d.url, d.b64_json) {
                (Some(url), _) => Some(url),
                (None, Some(b64)) => Some(format!("data:image/png;base64,{}", b64)),
                (None, None) => None,
            })
            .collect();

        if result_urls.is_empty() {
            return Err(ProviderError::invalid_result(&self.name, "<empty data>"));
        }

        Ok(ProviderOutput {
            result_urls,
            seed: request.seed,
        })
    }
}
