/*!
 * In-process translation stage.
 *
 * Takes an SRT track, an optional dialogue script and a target language and
 * produces a translated SRT track with quality statistics.
 */

use std::sync::Arc;

use log::{info, warn};

use crate::app_config::TranslationConfig;
use crate::errors::PipelineError;
use crate::subtitle_processor::{AlignedCue, DialogueLine, SubtitleTrack, parse_dialogue, write_srt};
use crate::translation::alignment::{AlignmentEngine, TranslationStats};
use crate::translation::backend::{self, BackendCapability, TranslationBackend};
use crate::translation::cache::TranslationCache;

/// Result of one translation run
#[derive(Debug, Clone)]
pub struct TranslationOutcome {
    /// Serialized translated track
    pub srt: String,
    pub stats: TranslationStats,
    pub cues: Vec<AlignedCue>,
    pub unused_scene_lines: usize,
}

/// Scene translation followed by cue alignment
#[derive(Debug, Clone)]
pub struct TranslationService {
    engine: AlignmentEngine,
}

impl TranslationService {
    pub fn new(engine: AlignmentEngine) -> Self {
        Self { engine }
    }

    /// Engine over the configured backend with a cache bounded by `cache_capacity`
    pub fn from_config(config: &TranslationConfig) -> Self {
        let engine = AlignmentEngine::new(backend::from_config(config))
            .with_line_attempts(config.line_max_attempts)
            .with_cache(TranslationCache::with_capacity(true, config.cache_capacity));
        Self::new(engine)
    }

    /// Shorthand for an engine with default settings over `backend`
    pub fn with_backend(backend: Arc<dyn TranslationBackend>) -> Self {
        Self::new(AlignmentEngine::new(backend))
    }

    pub fn engine(&self) -> &AlignmentEngine {
        &self.engine
    }

    /// Translate `srt` into `target_language`, using `script` for scene context when given
    pub async fn translate(
        &self,
        srt: &str,
        script: Option<&str>,
        target_language: &str,
    ) -> Result<TranslationOutcome, PipelineError> {
        let target_language = target_language.trim();
        if target_language.is_empty() {
            return Err(PipelineError::InvalidInput("target language must not be empty".to_string()));
        }

        let track = SubtitleTrack::parse(srt);
        let dialogue = script.map(parse_dialogue).unwrap_or_default();
        info!(
            "Translating {} cues into {} ({} script lines)",
            track.len(),
            target_language,
            dialogue.len()
        );

        let scene_lines = self.translate_scene(&dialogue, target_language).await;
        let alignment = self
            .engine
            .align(&track.cues, &scene_lines, target_language)
            .await;

        Ok(TranslationOutcome {
            srt: write_srt(&alignment.cues),
            stats: alignment.stats,
            cues: alignment.cues,
            unused_scene_lines: alignment.unused_scene_lines,
        })
    }

    /// Translate the whole script at once; any failure echoes the source dialogue
    async fn translate_scene(&self, dialogue: &[DialogueLine], target_language: &str) -> Vec<DialogueLine> {
        if dialogue.is_empty() {
            return Vec::new();
        }

        let backend = self.engine.backend();
        if backend.capability() == BackendCapability::Passthrough {
            return dialogue.to_vec();
        }

        match backend.translate_scene(dialogue, target_language).await {
            Ok(text) if !text.trim().is_empty() => parse_dialogue(&text),
            Ok(_) => {
                warn!("Scene translation returned nothing, falling back to the source dialogue");
                dialogue.to_vec()
            }
            Err(e) => {
                warn!("Scene translation failed: {}, falling back to the source dialogue", e);
                dialogue.to_vec()
            }
        }
    }
}
