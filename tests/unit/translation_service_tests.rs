/*!
 * Tests for the in-process translation stage
 */

use std::sync::Arc;

use subpipe::errors::PipelineError;
use subpipe::providers::CompletionRequest;
use subpipe::providers::mock::MockProvider;
use subpipe::subtitle_processor::SubtitleTrack;
use subpipe::translation::{ModelBackend, TranslationService, TranslationStats};

use crate::common::scripted_backend::ScriptedBackend;
use crate::common::{SAMPLE_SCRIPT, SAMPLE_SRT, init_logger};

const FRENCH_SCENE: &str = "Aki: Bonjour.\nRen: Où vas-tu ?\nAki: À la gare, puis à la maison.";

#[tokio::test]
async fn test_translate_withSceneAnswer_shouldAlignSceneThenTranslateRest() {
    init_logger();
    let backend = Arc::new(ScriptedBackend::new().with_scene(FRENCH_SCENE));
    let service = TranslationService::with_backend(backend.clone());

    let outcome = service.translate(SAMPLE_SRT, Some(SAMPLE_SCRIPT), "fr").await.unwrap();

    assert_eq!(backend.scene_calls(), 1);
    assert_eq!(backend.line_calls(), 2);
    assert_eq!(outcome.cues[0].translated_text, "Bonjour.");
    assert_eq!(outcome.cues[2].translated_text, "À la gare, puis à la maison.");
    assert_eq!(outcome.cues[4].translated_text, "<See you tomorrow.>");
    assert_eq!(outcome.unused_scene_lines, 0);
}

#[tokio::test]
async fn test_translate_withFailingScene_shouldEchoSourceDialogue() {
    let backend = Arc::new(ScriptedBackend::new());
    let service = TranslationService::with_backend(backend.clone());

    let outcome = service.translate(SAMPLE_SRT, Some(SAMPLE_SCRIPT), "fr").await.unwrap();

    assert_eq!(backend.scene_calls(), 1);
    assert_eq!(outcome.cues[0].translated_text, "Good morning.");
    assert_eq!(outcome.cues[1].translated_text, "Where are you going?");
    assert_eq!(outcome.stats.total_lines, 5);
}

#[tokio::test]
async fn test_translate_withoutScript_shouldSkipSceneCall() {
    let backend = Arc::new(ScriptedBackend::new());
    let service = TranslationService::with_backend(backend.clone());

    let outcome = service.translate(SAMPLE_SRT, None, "de").await.unwrap();

    assert_eq!(backend.scene_calls(), 0);
    assert_eq!(backend.line_calls(), 5);
    assert_eq!(outcome.stats.language, "de");
}

#[tokio::test]
async fn test_translate_shouldPreserveCueCountAndTiming() {
    let service = TranslationService::with_backend(Arc::new(ScriptedBackend::new()));

    let outcome = service.translate(SAMPLE_SRT, Some(SAMPLE_SCRIPT), "es").await.unwrap();

    let source = SubtitleTrack::parse(SAMPLE_SRT);
    let output = SubtitleTrack::parse(&outcome.srt);
    assert_eq!(output.len(), source.len());
    for (out, src) in output.cues.iter().zip(&source.cues) {
        assert_eq!((out.index, out.start, out.end), (src.index, src.start, src.end));
    }
}

#[tokio::test]
async fn test_translate_withEmptyTrack_shouldReturnEmptyOutput() {
    let service = TranslationService::with_backend(Arc::new(ScriptedBackend::new()));

    let outcome = service.translate("", Some(SAMPLE_SCRIPT), "fr").await.unwrap();

    assert!(outcome.srt.is_empty());
    assert_eq!(outcome.stats.total_lines, 0);
    assert_eq!(outcome.unused_scene_lines, 3);
}

#[tokio::test]
async fn test_translate_withBlankTarget_shouldRejectBeforeAnyCall() {
    let backend = Arc::new(ScriptedBackend::new());
    let service = TranslationService::with_backend(backend.clone());

    let err = service.translate(SAMPLE_SRT, None, "").await.unwrap_err();

    assert!(matches!(err, PipelineError::InvalidInput(_)));
    assert_eq!(backend.line_calls(), 0);
}

fn model_answer(request: &CompletionRequest) -> String {
    if request.prompt.contains("scene dialogue") {
        "Aki: Bonjour.".to_string()
    } else {
        "Traduit".to_string()
    }
}

#[tokio::test]
async fn test_translate_withModelBackend_shouldDriveProviderPrompts() {
    let provider = MockProvider::working().with_custom_response(model_answer);
    let backend = ModelBackend::new(Arc::new(provider.clone()), 0.3);
    let service = TranslationService::with_backend(Arc::new(backend));

    let outcome = service.translate(SAMPLE_SRT, Some(SAMPLE_SCRIPT), "fr").await.unwrap();

    assert_eq!(outcome.cues[0].translated_text, "Bonjour.");
    assert!(outcome.cues[1..].iter().all(|c| c.translated_text == "Traduit"));
    // One scene prompt plus four line prompts
    assert_eq!(provider.request_count(), 5);
}

#[tokio::test]
async fn test_stats_shouldSerializeAsFlatJson() {
    let backend = Arc::new(ScriptedBackend::echoing_lines());
    let service = TranslationService::with_backend(backend);

    let outcome = service.translate(SAMPLE_SRT, None, "fr").await.unwrap();
    let json = serde_json::to_value(&outcome.stats).unwrap();

    assert_eq!(json["language"], "fr");
    assert_eq!(json["total_lines"], 5);
    assert_eq!(json["failed"], 5);
    assert_eq!(json["success_rate_pct"], 0.0);
    assert_eq!(json["failed_indices"], serde_json::json!([1, 2, 3, 4, 5]));

    let parsed: TranslationStats = serde_json::from_value(json).unwrap();
    assert_eq!(parsed, outcome.stats);
}
