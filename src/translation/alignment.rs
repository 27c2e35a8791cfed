/*!
 * Alignment of scene-level translations onto time-coded cues.
 *
 * The engine walks the cues in track order with a cursor into the translated
 * scene lines. Scene lines are consumed positionally; once they run out each
 * remaining cue is translated on its own. A cue whose direct translation
 * keeps failing carries the failure sentinel and gets one more attempt after
 * the first pass.
 */

use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::subtitle_processor::{AlignedCue, DialogueLine, SubtitleCue};
use crate::translation::backend::{BackendCapability, TranslationBackend};
use crate::translation::cache::TranslationCache;
use crate::translation::normalize::normalize_cjk_spacing;

/// Prefix marking a cue that could not be translated
pub const FAILURE_SENTINEL: &str = "[TRANSLATION FAILED] ";

/// Separator between alternative renderings inside one cue
pub const VARIANT_SEPARATOR: char = '/';

/// Quality report over an aligned track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationStats {
    pub language: String,
    pub total_lines: usize,
    pub translated: usize,
    pub failed: usize,
    pub success_rate_pct: f64,
    pub failed_indices: Vec<u32>,
}

impl TranslationStats {
    pub fn from_cues(cues: &[AlignedCue], language: &str) -> Self {
        let failed_indices: Vec<u32> = cues
            .iter()
            .filter(|cue| is_failed(&cue.translated_text))
            .map(|cue| cue.index)
            .collect();

        let total_lines = cues.len();
        let failed = failed_indices.len();
        let translated = total_lines - failed;
        let rate = if total_lines > 0 {
            translated as f64 / total_lines as f64 * 100.0
        } else {
            0.0
        };

        Self {
            language: language.to_string(),
            total_lines,
            translated,
            failed,
            success_rate_pct: (rate * 10.0).round() / 10.0,
            failed_indices,
        }
    }

    /// At least one cue still carries the failure sentinel
    pub fn is_degraded(&self) -> bool {
        self.failed > 0
    }
}

/// Output of one alignment run
#[derive(Debug, Clone)]
pub struct Alignment {
    /// One entry per input cue, in input order
    pub cues: Vec<AlignedCue>,
    pub stats: TranslationStats,
    /// Scene lines consumed positionally
    pub scene_lines_used: usize,
    /// Surplus scene lines, reported only
    pub unused_scene_lines: usize,
}

/// Whether a translated text is a sentinel-marked failure
pub fn is_failed(text: &str) -> bool {
    text.starts_with(FAILURE_SENTINEL.trim_end())
}

/// Split `/`-separated alternatives, dropping empty pieces
pub fn split_variants(text: &str) -> Vec<String> {
    text.split(VARIANT_SEPARATOR)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

/// Cue-level alignment engine
#[derive(Debug, Clone)]
pub struct AlignmentEngine {
    backend: Arc<dyn TranslationBackend>,
    cache: TranslationCache,
    line_attempts: u32,
    second_chance_attempts: u32,
}

impl AlignmentEngine {
    pub fn new(backend: Arc<dyn TranslationBackend>) -> Self {
        Self {
            backend,
            cache: TranslationCache::default(),
            line_attempts: 3,
            second_chance_attempts: 1,
        }
    }

    /// Attempts per direct translation in the first pass (at least 1)
    pub fn with_line_attempts(mut self, attempts: u32) -> Self {
        self.line_attempts = attempts.max(1);
        self
    }

    pub fn with_cache(mut self, cache: TranslationCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn backend(&self) -> &Arc<dyn TranslationBackend> {
        &self.backend
    }

    pub fn cache(&self) -> &TranslationCache {
        &self.cache
    }

    /// Align translated scene lines to the cues, translating the rest directly
    pub async fn align(&self, cues: &[SubtitleCue], scene_lines: &[DialogueLine], target_language: &str) -> Alignment {
        debug!(
            "Aligning {} cues with {} scene lines (backend: {})",
            cues.len(),
            scene_lines.len(),
            self.backend.name()
        );

        let mut resolved_texts = Vec::with_capacity(cues.len());
        let mut aligned = Vec::with_capacity(cues.len());
        let mut cursor = 0;

        for cue in cues {
            let resolved = self.resolve_variants(&cue.text, target_language).await;

            let translated_text = match scene_lines.get(cursor) {
                Some(line) => {
                    cursor += 1;
                    line.text.clone()
                }
                None => {
                    self.translate_direct(&resolved, target_language, self.line_attempts)
                        .await
                }
            };

            aligned.push(AlignedCue {
                index: cue.index,
                start: cue.start,
                end: cue.end,
                translated_text,
            });
            resolved_texts.push(resolved);
        }

        for (cue, resolved) in aligned.iter_mut().zip(&resolved_texts) {
            if !is_failed(&cue.translated_text) {
                continue;
            }
            let retry = self
                .translate_direct(resolved, target_language, self.second_chance_attempts)
                .await;
            if !is_failed(&retry) {
                debug!("Second attempt recovered cue {}", cue.index);
                cue.translated_text = retry;
            }
        }

        let unused_scene_lines = scene_lines.len() - cursor;
        if unused_scene_lines > 0 {
            warn!("Unused scene lines: {}", unused_scene_lines);
        }

        let stats = TranslationStats::from_cues(&aligned, target_language);
        if stats.is_degraded() {
            warn!(
                "Translation degraded: {} of {} cues failed ({:?})",
                stats.failed, stats.total_lines, stats.failed_indices
            );
        } else {
            info!("Aligned {} cues ({}% translated)", stats.total_lines, stats.success_rate_pct);
        }

        Alignment {
            cues: aligned,
            stats,
            scene_lines_used: cursor,
            unused_scene_lines,
        }
    }

    /// Reduce a `/`-separated cue to a single alternative
    pub async fn resolve_variants(&self, text: &str, target_language: &str) -> String {
        if !text.contains(VARIANT_SEPARATOR) {
            return text.to_string();
        }

        let variants = split_variants(text);
        let first = match variants.first() {
            Some(first) => first.clone(),
            None => return text.to_string(),
        };
        if variants.len() == 1 || self.backend.capability() == BackendCapability::Passthrough {
            return first;
        }

        match self.backend.choose_variant(text, &variants, target_language).await {
            Ok(choice) => {
                let choice = choice.trim();
                match variants.iter().find(|v| v.as_str() == choice) {
                    Some(chosen) => chosen.clone(),
                    None => {
                        debug!("Variant choice '{}' matches no option, using the first", choice);
                        first
                    }
                }
            }
            Err(e) => {
                warn!("Variant choice failed: {}", e);
                first
            }
        }
    }

    /// Translate one text with bounded retries, returning the sentinel on failure
    pub async fn translate_direct(&self, text: &str, target_language: &str, attempts: u32) -> String {
        if self.backend.capability() == BackendCapability::Passthrough {
            return text.to_string();
        }

        let cleaned = normalize_cjk_spacing(text);
        if let Some(cached) = self.cache.get(&cleaned, target_language) {
            return cached;
        }

        for attempt in 1..=attempts.max(1) {
            match self.backend.translate_line(&cleaned, target_language).await {
                Ok(translated) => {
                    let translated = translated.trim();
                    if !translated.is_empty() && translated != cleaned {
                        self.cache.store(&cleaned, target_language, translated);
                        return translated.to_string();
                    }
                    warn!(
                        "Empty or unchanged translation on attempt {}/{} for: {}",
                        attempt,
                        attempts,
                        cleaned.chars().take(50).collect::<String>()
                    );
                }
                Err(e) => {
                    warn!("Line translation attempt {}/{} failed: {}", attempt, attempts, e);
                }
            }
        }

        format!("{}{}", FAILURE_SENTINEL, text)
    }
}
