/*!
 * Provider implementations for generative translation backends.
 *
 * This module contains client implementations for the supported LLM providers:
 * - Gemini: Google Generative Language API
 * - Ollama: Local LLM server
 * - Anthropic: Anthropic Messages API
 * - Mock: Scriptable provider for tests
 */

use async_trait::async_trait;
use std::fmt::Debug;

use crate::errors::ProviderError;

/// A single-turn text generation request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Optional system instruction
    pub system: Option<String>,
    /// User prompt
    pub prompt: String,
    /// Sampling temperature
    pub temperature: f32,
}

impl CompletionRequest {
    /// Create a request with the default temperature
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            temperature: 0.3,
        }
    }

    /// Set the system instruction
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Common trait for all LLM providers
///
/// This trait defines the interface that all provider implementations must follow,
/// allowing them to be used interchangeably by the model-backed translation backend.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// Complete a request and return the generated text
    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError>;

    /// Provider name for logs
    fn name(&self) -> &str;
}

/// Read a non-success response into a `ProviderError::ApiError`
pub(crate) async fn api_error(response: reqwest::Response) -> ProviderError {
    let status_code = response.status().as_u16();
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to get error response text".to_string());

    match status_code {
        401 | 403 => ProviderError::AuthenticationError(message),
        _ => ProviderError::ApiError { status_code, message },
    }
}

pub mod anthropic;
pub mod gemini;
pub mod mock;
pub mod ollama;
