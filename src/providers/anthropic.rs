use std::time::Duration;

use async_trait::async_trait;
use log::error;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::errors::ProviderError;
use crate::providers::{CompletionRequest, Provider, api_error};

const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Client for the Messages API
#[derive(Debug)]
pub struct Anthropic {
    client: Client,
    api_key: String,
    /// Base URL, `https://api.anthropic.com` when empty
    endpoint: String,
    model: String,
    max_tokens: u32,
}

/// Body of `POST /v1/messages` for a single user turn
#[derive(Debug, Serialize)]
pub struct MessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

/// Only text blocks are read back
#[derive(Debug, Deserialize)]
pub struct MessagesResponse {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: String,
}

impl MessagesRequest {
    fn from_completion(model: &str, max_tokens: u32, request: CompletionRequest) -> Self {
        Self {
            model: model.to_string(),
            max_tokens,
            messages: vec![Message {
                role: "user",
                content: request.prompt,
            }],
            system: request.system,
            temperature: request.temperature,
        }
    }
}

impl MessagesResponse {
    /// Concatenated text blocks
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text.as_str())
            .collect()
    }
}

impl Anthropic {
    pub fn new(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client: Client::builder().timeout(timeout).build().unwrap_or_default(),
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            model: model.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    fn messages_url(&self) -> String {
        let base = if self.endpoint.trim().is_empty() {
            "https://api.anthropic.com"
        } else {
            self.endpoint.trim_end_matches('/')
        };
        format!("{}/v1/messages", base)
    }
}

#[async_trait]
impl Provider for Anthropic {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError> {
        let body = MessagesRequest::from_completion(&self.model, self.max_tokens, request);

        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let err = api_error(response).await;
            error!("Anthropic API error: {}", err);
            return Err(err);
        }

        let parsed = response
            .json::<MessagesResponse>()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        Ok(parsed.text())
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}
