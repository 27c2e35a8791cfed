/*!
 * Tests for the retrying stage client against a fake stage service
 */

use bytes::Bytes;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use subpipe::errors::{PipelineError, Stage, UpstreamDetail};
use subpipe::pipeline::{ArtifactStore, FilePart};

use crate::common::{assert_secs, init_logger, recording_client};

fn srt_part() -> FilePart {
    FilePart::new("srt", "input.srt", "text/plain", Bytes::from_static(b"1\n"))
}

#[tokio::test]
async fn test_call_withPersistent503_shouldTryThreeTimesWithBackoff() {
    init_logger();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/translate"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .expect(3)
        .mount(&server)
        .await;

    let (client, sleeper) = recording_client(3);
    let err = client
        .call(
            Stage::Translation,
            &format!("{}/translate", server.uri()),
            &[srt_part()],
            &[("target_lang", "fr")],
        )
        .await
        .unwrap_err();

    match err {
        PipelineError::Upstream { stage, detail } => {
            assert_eq!(stage, Stage::Translation);
            assert_eq!(
                detail,
                UpstreamDetail::Status {
                    code: 503,
                    body: "busy".to_string()
                }
            );
        }
        other => panic!("expected upstream error, got {:?}", other),
    }

    let delays = sleeper.delays();
    assert_eq!(delays.len(), 2);
    assert_secs(delays[0], 0.8);
    assert_secs(delays[1], 1.44);
}

#[tokio::test]
async fn test_call_withOneTransientFailure_shouldReturnSecondBody() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/overlay"))
        .respond_with(ResponseTemplate::new(500).set_body_string("hiccup"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/overlay"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"video-bytes".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let (client, sleeper) = recording_client(3);
    let body = client
        .call(Stage::Rendering, &format!("{}/overlay", server.uri()), &[srt_part()], &[])
        .await
        .unwrap();

    assert_eq!(body.as_ref(), b"video-bytes");
    assert_eq!(sleeper.delays().len(), 1);
}

#[tokio::test]
async fn test_call_withUnreachableStage_shouldReportTransportError() {
    let (client, sleeper) = recording_client(2);

    let err = client
        .call(Stage::Extraction, "http://127.0.0.1:1/transcribe", &[srt_part()], &[])
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Upstream {
            stage: Stage::Extraction,
            detail: UpstreamDetail::Transport(_)
        }
    ));
    assert_eq!(sleeper.delays().len(), 1);
}

#[tokio::test]
async fn test_call_withSingleAttemptPolicy_shouldNotSleep() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502))
        .expect(1)
        .mount(&server)
        .await;

    let (client, sleeper) = recording_client(1);
    let result = client.call(Stage::Extraction, &server.uri(), &[srt_part()], &[]).await;

    assert!(result.is_err());
    assert!(sleeper.delays().is_empty());
}

#[tokio::test]
async fn test_call_shouldSendFilesAndFieldsAsMultipart() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/translate"))
        .and(header("accept", "*/*"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = recording_client(3);
    let script = FilePart::new(
        "script",
        "input.txt",
        "text/plain",
        Bytes::from_static(b"Aki: hello"),
    );
    client
        .call(
            Stage::Translation,
            &format!("{}/translate", server.uri()),
            &[srt_part(), script],
            &[("target_lang", "ja")],
        )
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);

    let content_type = requests[0].headers.get("content-type").unwrap().to_str().unwrap();
    assert!(content_type.starts_with("multipart/form-data"));

    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("name=\"srt\"; filename=\"input.srt\""));
    assert!(body.contains("name=\"script\"; filename=\"input.txt\""));
    assert!(body.contains("Aki: hello"));
    assert!(body.contains("name=\"target_lang\""));
    assert!(body.contains("\r\n\r\nja\r\n"));
}

#[tokio::test]
async fn test_call_withStagedArtifact_shouldStreamFileOnEveryAttempt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/overlay"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/overlay"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"rendered".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let video: Vec<u8> = (0..600_000u32).map(|i| (i % 251) as u8).collect();
    let artifact = ArtifactStore::new(dir.path())
        .persist(Bytes::from(video.clone()), ".mp4")
        .await
        .unwrap();

    let (client, sleeper) = recording_client(3);
    let body = client
        .call(
            Stage::Rendering,
            &format!("{}/overlay", server.uri()),
            &[FilePart::staged("video", "video/mp4", &artifact)],
            &[],
        )
        .await
        .unwrap();

    assert_eq!(body.as_ref(), b"rendered");
    assert_eq!(sleeper.delays().len(), 1);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    let file_name = format!("filename=\"{}\"", artifact.file_name());
    for request in &requests {
        let body = &request.body;
        assert!(String::from_utf8_lossy(body).contains(&file_name));
        assert!(body.windows(video.len()).any(|window| window == video.as_slice()));
    }
}
