/*!
 * Translation backends used by the alignment engine.
 *
 * A backend advertises a capability:
 * - `Generative`: text goes through a language model provider
 * - `Passthrough`: text is returned unchanged (no provider configured)
 *
 * The backend is selected once at startup from the translation config.
 */

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{info, warn};

use crate::app_config::{TranslationConfig, TranslationProvider};
use crate::errors::ProviderError;
use crate::language_utils::display_name;
use crate::providers::anthropic::Anthropic;
use crate::providers::gemini::Gemini;
use crate::providers::ollama::Ollama;
use crate::providers::{CompletionRequest, Provider};
use crate::subtitle_processor::{DialogueLine, format_dialogue};
use crate::translation::prompts;

/// What a backend can actually do with text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendCapability {
    /// Produces real translations
    Generative,
    /// Echoes its input
    Passthrough,
}

/// Translation operations needed by the alignment engine
#[async_trait]
pub trait TranslationBackend: Send + Sync + Debug {
    /// Capability of this backend
    fn capability(&self) -> BackendCapability;

    /// Short name for logs
    fn name(&self) -> &str;

    /// Translate a whole scene, returning `Speaker: text` lines
    async fn translate_scene(&self, dialogue: &[DialogueLine], target_language: &str) -> Result<String, ProviderError>;

    /// Translate a single cue text
    async fn translate_line(&self, text: &str, target_language: &str) -> Result<String, ProviderError>;

    /// Pick the best alternative among `/`-separated variants
    async fn choose_variant(
        &self,
        original: &str,
        variants: &[String],
        target_language: &str,
    ) -> Result<String, ProviderError>;
}

/// Backend that prompts a language model provider
#[derive(Debug)]
pub struct ModelBackend {
    provider: Arc<dyn Provider>,
    temperature: f32,
}

impl ModelBackend {
    pub fn new(provider: Arc<dyn Provider>, temperature: f32) -> Self {
        Self { provider, temperature }
    }

    async fn ask(&self, prompt: String) -> Result<String, ProviderError> {
        let request = CompletionRequest::new(prompt).temperature(self.temperature);
        let text = self.provider.complete(request).await?;
        Ok(text.trim().to_string())
    }
}

#[async_trait]
impl TranslationBackend for ModelBackend {
    fn capability(&self) -> BackendCapability {
        BackendCapability::Generative
    }

    fn name(&self) -> &str {
        self.provider.name()
    }

    async fn translate_scene(&self, dialogue: &[DialogueLine], target_language: &str) -> Result<String, ProviderError> {
        self.ask(prompts::scene_prompt(dialogue, &display_name(target_language)))
            .await
    }

    async fn translate_line(&self, text: &str, target_language: &str) -> Result<String, ProviderError> {
        self.ask(prompts::line_prompt(text, &display_name(target_language)))
            .await
    }

    async fn choose_variant(
        &self,
        original: &str,
        variants: &[String],
        target_language: &str,
    ) -> Result<String, ProviderError> {
        self.ask(prompts::variant_prompt(original, variants, &display_name(target_language)))
            .await
    }
}

/// Backend used when no model is available: every operation is the identity
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityBackend;

#[async_trait]
impl TranslationBackend for IdentityBackend {
    fn capability(&self) -> BackendCapability {
        BackendCapability::Passthrough
    }

    fn name(&self) -> &str {
        "identity"
    }

    async fn translate_scene(&self, dialogue: &[DialogueLine], _target_language: &str) -> Result<String, ProviderError> {
        Ok(format_dialogue(dialogue))
    }

    async fn translate_line(&self, text: &str, _target_language: &str) -> Result<String, ProviderError> {
        Ok(text.to_string())
    }

    async fn choose_variant(
        &self,
        original: &str,
        variants: &[String],
        _target_language: &str,
    ) -> Result<String, ProviderError> {
        Ok(variants.first().cloned().unwrap_or_else(|| original.to_string()))
    }
}

/// Build the backend described by the config.
///
/// A keyed provider without an API key degrades to the identity backend.
pub fn from_config(config: &TranslationConfig) -> Arc<dyn TranslationBackend> {
    let provider = config.provider;

    if provider == TranslationProvider::None {
        info!("No translation provider configured, using identity translation");
        return Arc::new(IdentityBackend);
    }

    if provider.requires_api_key() && config.api_key.trim().is_empty() {
        warn!(
            "{} requires an API key but none is configured, falling back to identity translation",
            provider.display_name()
        );
        return Arc::new(IdentityBackend);
    }

    let timeout = Duration::from_secs(config.timeout_secs);
    let model = config.get_model();
    let endpoint = config.get_endpoint();

    let provider_impl: Arc<dyn Provider> = match provider {
        TranslationProvider::Gemini => Arc::new(Gemini::new(&config.api_key, endpoint, &model, timeout)),
        TranslationProvider::Anthropic => Arc::new(Anthropic::new(&config.api_key, endpoint, &model, timeout)),
        TranslationProvider::Ollama => Arc::new(Ollama::new(endpoint, &model, timeout)),
        TranslationProvider::None => return Arc::new(IdentityBackend),
    };

    info!("Using {} translation backend (model: {})", provider.display_name(), model);
    Arc::new(ModelBackend::new(provider_impl, config.temperature))
}
