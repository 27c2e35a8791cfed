/*!
 * Integration tests for the two-phase job flow against fake stage services
 */

use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use futures::future::join_all;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use subpipe::errors::{PipelineError, Stage, UpstreamDetail};
use subpipe::pipeline::{JobId, TranslationStage};
use subpipe::subtitle_processor::SubtitleTrack;
use subpipe::translation::TranslationService;

use crate::common::scripted_backend::ScriptedBackend;
use crate::common::{SAMPLE_SRT, TRANSLATED_SRT, file_count, init_logger, orchestrator_for, sample_bundle, zip_bundle};

const VIDEO: &[u8] = b"\x00\x00\x00\x18ftypmp42 fake video payload";
const RENDERED: &[u8] = b"rendered video with burned subtitles";

async fn mount_extractor(server: &MockServer, bundle: Vec<u8>) {
    Mock::given(method("POST"))
        .and(path("/transcribe"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(bundle))
        .mount(server)
        .await;
}

async fn mount_translator(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/translate"))
        .respond_with(ResponseTemplate::new(200).set_body_string(TRANSLATED_SRT))
        .mount(server)
        .await;
}

async fn mount_overlay(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/overlay"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(RENDERED.to_vec()))
        .mount(server)
        .await;
}

async fn requests_to(server: &MockServer, route: &str) -> Vec<wiremock::Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == route)
        .collect()
}

#[tokio::test]
async fn test_fullFlow_shouldRegisterJobAndRenderIt() {
    init_logger();
    let server = MockServer::start().await;
    mount_extractor(&server, sample_bundle()).await;
    mount_translator(&server).await;
    mount_overlay(&server).await;
    let dir = TempDir::new().unwrap();
    let (orchestrator, _) = orchestrator_for(&server, dir.path(), TranslationStage::Remote);

    let job_id = orchestrator
        .process_initial(Bytes::from_static(VIDEO), Some("clip.mp4"), "fr")
        .await
        .unwrap();

    assert_eq!(orchestrator.job_count(), 1);
    let job = orchestrator.jobs().get(&job_id).unwrap();
    assert_eq!(job.target_language, "fr");
    assert_eq!(job.subtitle.read().await.unwrap().as_ref(), TRANSLATED_SRT.as_bytes());
    assert_eq!(job.video.read().await.unwrap().as_ref(), VIDEO);

    let translate_body = String::from_utf8_lossy(&requests_to(&server, "/translate").await[0].body).into_owned();
    assert!(translate_body.contains("Good morning."));
    assert!(translate_body.contains("Ren: Where are you going?"));
    assert!(translate_body.contains("name=\"target_lang\""));

    let rendered = orchestrator.render(&job_id, r#"{"font_size": 32}"#).await.unwrap();
    assert!(rendered.file_name().starts_with("final_"));
    assert!(rendered.file_name().ends_with(".mp4"));
    assert_eq!(rendered.len(), RENDERED.len() as u64);

    let overlay_body = String::from_utf8_lossy(&requests_to(&server, "/overlay").await[0].body).into_owned();
    assert!(overlay_body.contains("Prends soin de toi."));
    assert!(overlay_body.contains("\"font_size\":32"));
    assert!(overlay_body.contains("\"font\":\"Arial\""));

    // The job survives rendering
    assert!(orchestrator.jobs().get(&job_id).is_some());
}

#[tokio::test]
async fn test_render_withUnknownJob_shouldFailWithoutCallingRenderer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/overlay"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let (orchestrator, _) = orchestrator_for(&server, dir.path(), TranslationStage::Remote);

    let err = orchestrator.render(&JobId::new(), "{}").await.unwrap_err();

    assert!(matches!(err, PipelineError::NotFound(_)));
}

#[tokio::test]
async fn test_render_withInvalidStyle_shouldFailWithoutCallingRenderer() {
    let server = MockServer::start().await;
    mount_extractor(&server, sample_bundle()).await;
    mount_translator(&server).await;
    Mock::given(method("POST"))
        .and(path("/overlay"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let (orchestrator, _) = orchestrator_for(&server, dir.path(), TranslationStage::Remote);
    let job_id = orchestrator
        .process_initial(Bytes::from_static(VIDEO), None, "fr")
        .await
        .unwrap();

    for style in ["not json", "[1, 2]", r#"{"font_color": "red"}"#, r#"{"alignment": 0}"#] {
        let err = orchestrator.render(&job_id, style).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)), "style {:?}", style);
    }
}

#[tokio::test]
async fn test_renderStream_shouldYieldBytesAndDeleteFileOnDrop() {
    let server = MockServer::start().await;
    mount_extractor(&server, sample_bundle()).await;
    mount_translator(&server).await;
    mount_overlay(&server).await;
    let dir = TempDir::new().unwrap();
    let (orchestrator, _) = orchestrator_for(&server, dir.path(), TranslationStage::Remote);
    let job_id = orchestrator
        .process_initial(Bytes::from_static(VIDEO), None, "fr")
        .await
        .unwrap();

    let rendered = orchestrator.render(&job_id, "{}").await.unwrap();
    let rendered_path = rendered.path().to_path_buf();
    assert!(rendered_path.exists());

    let mut stream = rendered.into_stream().await.unwrap();
    let mut received = Vec::new();
    while let Some(chunk) = stream.next().await {
        received.extend_from_slice(&chunk.unwrap());
    }
    assert_eq!(received, RENDERED);

    drop(stream);
    assert!(!rendered_path.exists());
}

#[tokio::test]
async fn test_processInitial_withMalformedBundle_shouldNotRetryOrRegister() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/transcribe"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"this is not a zip".to_vec()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/translate"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let (orchestrator, sleeper) = orchestrator_for(&server, dir.path(), TranslationStage::Remote);

    let err = orchestrator
        .process_initial(Bytes::from_static(VIDEO), None, "fr")
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::MalformedBundle(_)));
    assert_eq!(err.stage(), Some(Stage::Extraction));
    assert_eq!(orchestrator.job_count(), 0);
    assert!(sleeper.delays().is_empty());
    assert_eq!(file_count(dir.path()), 0);
}

#[tokio::test]
async fn test_processInitial_withBundleMissingScript_shouldBeMalformed() {
    let server = MockServer::start().await;
    mount_extractor(&server, zip_bundle(&[("clip.srt", SAMPLE_SRT), ("notes.md", "x")])).await;
    let dir = TempDir::new().unwrap();
    let (orchestrator, _) = orchestrator_for(&server, dir.path(), TranslationStage::Remote);

    let err = orchestrator
        .process_initial(Bytes::from_static(VIDEO), None, "fr")
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::MalformedBundle(_)));
}

#[tokio::test]
async fn test_processInitial_withFailingExtractor_shouldExhaustRetries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/transcribe"))
        .respond_with(ResponseTemplate::new(500).set_body_string("whisper crashed"))
        .expect(3)
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let (orchestrator, sleeper) = orchestrator_for(&server, dir.path(), TranslationStage::Remote);

    let err = orchestrator
        .process_initial(Bytes::from_static(VIDEO), None, "fr")
        .await
        .unwrap_err();

    match err {
        PipelineError::Upstream {
            stage: Stage::Extraction,
            detail: UpstreamDetail::Status { code, body },
        } => {
            assert_eq!(code, 500);
            assert_eq!(body, "whisper crashed");
        }
        other => panic!("expected extraction failure, got {:?}", other),
    }
    assert_eq!(sleeper.delays().len(), 2);
    assert_eq!(orchestrator.job_count(), 0);
}

#[tokio::test]
async fn test_processInitial_withEmptyTargetOrVideo_shouldRejectBeforeAnyCall() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let (orchestrator, _) = orchestrator_for(&server, dir.path(), TranslationStage::Remote);

    let err = orchestrator
        .process_initial(Bytes::from_static(VIDEO), None, "   ")
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::InvalidInput(_)));

    let err = orchestrator.process_initial(Bytes::new(), None, "fr").await.unwrap_err();
    assert!(matches!(err, PipelineError::InvalidInput(_)));
}

#[tokio::test]
async fn test_processInitial_inProcess_shouldPreserveCueCount() {
    let server = MockServer::start().await;
    mount_extractor(&server, sample_bundle()).await;
    Mock::given(method("POST"))
        .and(path("/translate"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(ScriptedBackend::new().with_scene("Aki: Bonjour.\nRen: Où vas-tu ?"));
    let service = TranslationService::with_backend(backend.clone());
    let (orchestrator, _) = orchestrator_for(&server, dir.path(), TranslationStage::InProcess(service));

    let job_id = orchestrator
        .process_initial(Bytes::from_static(VIDEO), Some("clip.mkv"), "fr")
        .await
        .unwrap();

    let job = orchestrator.jobs().get(&job_id).unwrap();
    assert_eq!(job.video.path().extension().unwrap(), "mkv");

    let srt = String::from_utf8(job.subtitle.read().await.unwrap().to_vec()).unwrap();
    let track = SubtitleTrack::parse(&srt);
    assert_eq!(track.len(), 5);
    assert_eq!(track.cues[0].text, "Bonjour.");
    assert_eq!(track.cues[2].text, "<To the station, then home.>");
    assert_eq!(backend.scene_calls(), 1);
}

#[tokio::test]
async fn test_processInitial_concurrently_shouldKeepJobsIsolated() {
    let server = MockServer::start().await;
    mount_extractor(&server, sample_bundle()).await;
    mount_translator(&server).await;
    let dir = TempDir::new().unwrap();
    let (orchestrator, _) = orchestrator_for(&server, dir.path(), TranslationStage::Remote);

    let videos: Vec<Bytes> = (0..4).map(|i| Bytes::from(format!("video #{}", i))).collect();
    let results = join_all(
        videos
            .iter()
            .map(|video| orchestrator.process_initial(video.clone(), None, "ja")),
    )
    .await;

    let ids: Vec<JobId> = results.into_iter().map(Result::unwrap).collect();
    assert_eq!(orchestrator.job_count(), 4);

    let mut paths = Vec::new();
    for (id, video) in ids.iter().zip(&videos) {
        let job = orchestrator.jobs().get(id).unwrap();
        assert_eq!(&job.video.read().await.unwrap(), video);
        paths.push(job.video.path().to_path_buf());
        paths.push(job.subtitle.path().to_path_buf());
    }
    paths.sort();
    paths.dedup();
    assert_eq!(paths.len(), 8);

    let mut unique_ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
    unique_ids.sort();
    unique_ids.dedup();
    assert_eq!(unique_ids.len(), 4);
}

#[tokio::test]
async fn test_render_afterFailure_shouldRemainRetryable() {
    let server = MockServer::start().await;
    mount_extractor(&server, sample_bundle()).await;
    mount_translator(&server).await;
    Mock::given(method("POST"))
        .and(path("/overlay"))
        .respond_with(ResponseTemplate::new(503).set_body_string("ffmpeg busy"))
        .up_to_n_times(3)
        .mount(&server)
        .await;
    mount_overlay(&server).await;
    let dir = TempDir::new().unwrap();
    let (orchestrator, _) = orchestrator_for(&server, dir.path(), TranslationStage::Remote);
    let job_id = orchestrator
        .process_initial(Bytes::from_static(VIDEO), None, "fr")
        .await
        .unwrap();

    let err = orchestrator.render(&job_id, "{}").await.unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Rendering));

    let rendered = orchestrator.render(&job_id, "{}").await.unwrap();
    assert_eq!(rendered.len(), RENDERED.len() as u64);
}
