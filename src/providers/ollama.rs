use std::time::Duration;

use async_trait::async_trait;
use log::error;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::errors::ProviderError;
use crate::providers::{CompletionRequest, Provider, api_error};

/// Client for a local Ollama server
#[derive(Debug)]
pub struct Ollama {
    base_url: String,
    client: Client,
    model: String,
}

/// Non-streaming `POST /api/generate` body
#[derive(Debug, Serialize)]
pub struct GenerateRequest {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    options: SamplingOptions,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct SamplingOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub response: String,
}

impl GenerateRequest {
    fn from_completion(model: &str, request: CompletionRequest) -> Self {
        Self {
            model: model.to_string(),
            prompt: request.prompt,
            system: request.system,
            options: SamplingOptions {
                temperature: request.temperature,
            },
            stream: false,
        }
    }
}

impl Ollama {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            // Ollama only speaks HTTP/1.1
            client: Client::builder()
                .timeout(timeout)
                .http1_only()
                .build()
                .unwrap_or_default(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl Provider for Ollama {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest::from_completion(&self.model, request);

        let response = self.client.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            let err = api_error(response).await;
            error!("Ollama API error: {}", err);
            return Err(err);
        }

        let raw = response.text().await?;
        let parsed: GenerateResponse = serde_json::from_str(&raw).map_err(|e| {
            error!(
                "Unreadable Ollama response: {} (starts with {:?})",
                e,
                raw.chars().take(200).collect::<String>()
            );
            ProviderError::ParseError(e.to_string())
        })?;

        Ok(parsed.response)
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
