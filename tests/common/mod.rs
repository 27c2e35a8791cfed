/*!
 * Common test utilities for the subpipe test suite
 */

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use subpipe::app_config::{StageEndpoints, TimeoutConfig};
use subpipe::pipeline::{
    ArtifactStore, MemoryJobStore, Orchestrator, RecordingSleeper, RetryPolicy, StageClient, TranslationStage,
};
use wiremock::MockServer;
use zip::write::{FileOptions, ZipWriter};


/// Five cues, the middle one spread over two lines
pub const SAMPLE_SRT: &str = "1
00:00:01,000 --> 00:00:02,000
Good morning.

2
00:00:02,500 --> 00:00:04,000
Where are you going?

3
00:00:04,500 --> 00:00:06,000
To the station,
then home.

4
00:00:06,500 --> 00:00:08,000
Take care.

5
00:00:08,500 --> 00:00:10,000
See you tomorrow.
";

/// Three lines of dialogue, shorter than the track
pub const SAMPLE_SCRIPT: &str = "Aki: Good morning.
Ren: Where are you going?
Aki: To the station, then home.
";

/// Translation stage answer for `SAMPLE_SRT`
pub const TRANSLATED_SRT: &str = "1
00:00:01,000 --> 00:00:02,000
Bonjour.

2
00:00:02,500 --> 00:00:04,000
Où vas-tu ?

3
00:00:04,500 --> 00:00:06,000
À la gare, puis à la maison.

4
00:00:06,500 --> 00:00:08,000
Prends soin de toi.

5
00:00:08,500 --> 00:00:10,000
À demain.
";

/// Route test logs through env_logger; repeated calls are fine
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Build a zip archive from `(name, content)` pairs
pub fn zip_bundle(files: &[(&str, &str)]) -> Vec<u8> {
    let mut buffer = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
        for (name, content) in files {
            zip.start_file(*name, FileOptions::default()).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }
    buffer
}

/// The extraction bundle the fake transcription service returns
pub fn sample_bundle() -> Vec<u8> {
    zip_bundle(&[("clip.srt", SAMPLE_SRT), ("clip.txt", SAMPLE_SCRIPT)])
}

/// Short timeouts for local fake services
pub fn test_timeouts() -> TimeoutConfig {
    TimeoutConfig {
        connect_secs: 2.0,
        read_secs: 5.0,
        total_secs: 10.0,
    }
}

/// Stage client with the default backoff schedule and a recording sleeper
pub fn recording_client(max_attempts: u32) -> (StageClient, RecordingSleeper) {
    let sleeper = RecordingSleeper::new();
    let policy = RetryPolicy::new(max_attempts, Duration::from_millis(800), 1.8);
    let client = StageClient::new(&test_timeouts(), policy)
        .unwrap()
        .with_sleeper(Arc::new(sleeper.clone()));
    (client, sleeper)
}

/// Endpoints pointing at one fake server
pub fn endpoints_for(server: &MockServer) -> StageEndpoints {
    StageEndpoints {
        extractor_url: format!("{}/transcribe", server.uri()),
        translator_url: format!("{}/translate", server.uri()),
        overlay_url: format!("{}/overlay", server.uri()),
    }
}

/// Orchestrator against a fake server, staging artifacts under `dir`
pub fn orchestrator_for(server: &MockServer, dir: &Path, translation: TranslationStage) -> (Orchestrator, RecordingSleeper) {
    let (client, sleeper) = recording_client(3);
    let orchestrator = Orchestrator::new(
        client,
        endpoints_for(server),
        ArtifactStore::new(dir),
        Arc::new(MemoryJobStore::new()),
        translation,
    );
    (orchestrator, sleeper)
}

/// Number of entries in a directory
pub fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

/// Assert two durations match to the microsecond
pub fn assert_secs(actual: Duration, expected: f64) {
    assert!(
        (actual.as_secs_f64() - expected).abs() < 1e-6,
        "expected {}s, got {:?}",
        expected,
        actual
    );
}
