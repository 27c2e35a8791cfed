/*!
 * Pipeline orchestrator.
 *
 * An initial request walks RECEIVED -> EXTRACTED -> TRANSLATED -> REGISTERED
 * and returns a job handle; any failure aborts with the failing stage and
 * registers nothing. A render request looks the job up, validates the style,
 * calls the rendering stage and hands back a stream over the rendered file.
 */

use std::io;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use log::{error, info};
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::app_config::{Config, StageEndpoints, TranslationMode};
use crate::errors::{PipelineError, Stage};
use crate::pipeline::artifacts::{Artifact, ArtifactStore};
use crate::pipeline::job_store::{Job, JobId, JobStore, MemoryJobStore};
use crate::pipeline::retry::RetryPolicy;
use crate::pipeline::stage_client::{FilePart, StageClient};
use crate::pipeline::style::RenderStyle;
use crate::translation::TranslationService;

/// Chunk size used when streaming rendered output
pub const RENDER_CHUNK_SIZE: usize = 1024 * 1024;

const DEFAULT_VIDEO_SUFFIX: &str = ".mp4";

/// Where subtitle translation happens
#[derive(Debug, Clone)]
pub enum TranslationStage {
    /// The configured remote translation service
    Remote,
    /// The alignment engine inside this process
    InProcess(TranslationService),
}

/// A rendered video owned by the caller; the file goes away with it
#[derive(Debug)]
pub struct RenderedVideo {
    artifact: Artifact,
    file_name: String,
}

impl RenderedVideo {
    /// Download name, `final_<hex>.mp4`
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn len(&self) -> u64 {
        self.artifact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifact.is_empty()
    }

    pub fn path(&self) -> &Path {
        self.artifact.path()
    }

    /// Open the rendered file as a chunked stream that owns the artifact
    pub async fn into_stream(self) -> Result<RenderStream, PipelineError> {
        let file = File::open(self.artifact.path()).await?;
        Ok(RenderStream {
            inner: ReaderStream::with_capacity(file, RENDER_CHUNK_SIZE),
            _artifact: self.artifact,
        })
    }
}

/// Chunks of a rendered file; dropping the stream deletes the file
#[derive(Debug)]
pub struct RenderStream {
    // Declared first so the file handle closes before the artifact is removed
    inner: ReaderStream<File>,
    _artifact: Artifact,
}

impl Stream for RenderStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

/// Sequences the pipeline stages and owns the job registry
#[derive(Debug, Clone)]
pub struct Orchestrator {
    client: StageClient,
    endpoints: StageEndpoints,
    artifacts: ArtifactStore,
    jobs: Arc<dyn JobStore>,
    translation: TranslationStage,
}

impl Orchestrator {
    pub fn new(
        client: StageClient,
        endpoints: StageEndpoints,
        artifacts: ArtifactStore,
        jobs: Arc<dyn JobStore>,
        translation: TranslationStage,
    ) -> Self {
        Self {
            client,
            endpoints,
            artifacts,
            jobs,
            translation,
        }
    }

    /// Wire an orchestrator from the application config.
    ///
    /// In in-process mode the initial flow translates through `service`, so a
    /// caller that also serves `/translate` shares one engine and cache.
    pub fn from_config(config: &Config, service: &TranslationService) -> Result<Self, PipelineError> {
        let client = StageClient::new(&config.timeouts, RetryPolicy::from_config(&config.retry))?;

        let mut jobs = MemoryJobStore::new();
        if let Some(ttl) = config.jobs.ttl_secs {
            jobs = jobs.with_ttl(std::time::Duration::from_secs(ttl));
        }
        if let Some(capacity) = config.jobs.capacity {
            jobs = jobs.with_capacity(capacity);
        }

        let translation = match config.translation.mode {
            TranslationMode::Remote => TranslationStage::Remote,
            TranslationMode::InProcess => TranslationStage::InProcess(service.clone()),
        };

        Ok(Self::new(
            client,
            config.stages.clone(),
            ArtifactStore::system(),
            Arc::new(jobs),
            translation,
        ))
    }

    pub fn translation(&self) -> &TranslationStage {
        &self.translation
    }

    pub fn jobs(&self) -> &Arc<dyn JobStore> {
        &self.jobs
    }

    /// Number of live jobs
    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// Drop expired jobs
    pub fn evict_expired(&self) -> usize {
        self.jobs.evict_expired()
    }

    /// Extract, translate and register a job for `video`.
    ///
    /// `file_name` only contributes the extension of the staged video.
    pub async fn process_initial(
        &self,
        video: Bytes,
        file_name: Option<&str>,
        target_language: &str,
    ) -> Result<JobId, PipelineError> {
        let result = self.run_initial(video, file_name, target_language).await;
        if let Err(e) = &result {
            let stage = e.stage().map(|s| s.as_str()).unwrap_or("input");
            error!("process_initial FAILED({}): {}", stage, e);
        }
        result
    }

    async fn run_initial(
        &self,
        video: Bytes,
        file_name: Option<&str>,
        target_language: &str,
    ) -> Result<JobId, PipelineError> {
        let target_language = target_language.trim();
        if target_language.is_empty() {
            return Err(PipelineError::InvalidInput("target_lang must not be empty".to_string()));
        }
        if video.is_empty() {
            return Err(PipelineError::InvalidInput("uploaded video is empty".to_string()));
        }

        let suffix = video_suffix(file_name);
        let video_artifact = self.artifacts.persist(video.clone(), &suffix).await?;
        info!("RECEIVED video ({} bytes) for {}", video_artifact.len(), target_language);

        let archive = self
            .client
            .call(
                Stage::Extraction,
                &self.endpoints.extractor_url,
                &[FilePart::new("file", video_artifact.file_name(), "video/mp4", video)],
                &[],
            )
            .await?;
        let bundle = self.artifacts.split_bundle(&archive).await?;
        info!("EXTRACTED subtitle ({} bytes) and script ({} bytes)", bundle.subtitle.len(), bundle.script.len());

        let translated = match &self.translation {
            TranslationStage::Remote => {
                self.client
                    .call(
                        Stage::Translation,
                        &self.endpoints.translator_url,
                        &[
                            FilePart::new("srt", bundle.subtitle_artifact.file_name(), "text/plain", bundle.subtitle.clone()),
                            FilePart::new("script", bundle.script_artifact.file_name(), "text/plain", bundle.script.clone()),
                        ],
                        &[("target_lang", target_language)],
                    )
                    .await?
            }
            TranslationStage::InProcess(service) => {
                let srt = String::from_utf8_lossy(&bundle.subtitle);
                let script = String::from_utf8_lossy(&bundle.script);
                let outcome = service.translate(&srt, Some(script.as_ref()), target_language).await?;
                Bytes::from(outcome.srt)
            }
        };
        info!("TRANSLATED subtitle into {} ({} bytes)", target_language, translated.len());

        let subtitle_artifact = self.artifacts.persist(translated, ".srt").await?;
        let job = self
            .jobs
            .insert(Job::new(video_artifact, subtitle_artifact, target_language));
        info!("REGISTERED job {}", job.id);

        Ok(job.id)
    }

    /// Render a registered job with `style_json`.
    ///
    /// Unknown jobs and invalid styles fail before any outbound call. The job
    /// itself is left untouched whatever happens.
    pub async fn render(&self, job_id: &JobId, style_json: &str) -> Result<RenderedVideo, PipelineError> {
        let job = self
            .jobs
            .get(job_id)
            .ok_or_else(|| PipelineError::NotFound(job_id.to_string()))?;
        info!("LOOKED_UP job {}", job.id);

        let style = RenderStyle::parse(style_json)?;

        let style_json = style.to_json()?;

        let rendered = self
            .client
            .call(
                Stage::Rendering,
                &self.endpoints.overlay_url,
                &[
                    FilePart::staged("video", "video/mp4", &job.video),
                    FilePart::staged("srt", "text/plain", &job.subtitle),
                ],
                &[("style_json", style_json.as_str())],
            )
            .await
            .inspect_err(|e| error!("render FAILED for job {}: {}", job.id, e))?;

        let artifact = self.artifacts.persist(rendered, DEFAULT_VIDEO_SUFFIX).await?;
        info!("RENDERED job {} ({} bytes)", job.id, artifact.len());

        Ok(RenderedVideo {
            artifact,
            file_name: format!("final_{}.mp4", Uuid::new_v4().simple()),
        })
    }
}

/// Extension of the uploaded file, `.mp4` when absent
fn video_suffix(file_name: Option<&str>) -> String {
    file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext.to_lowercase()))
        .unwrap_or_else(|| DEFAULT_VIDEO_SUFFIX.to_string())
}
