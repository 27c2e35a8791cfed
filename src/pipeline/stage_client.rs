/*!
 * Retrying HTTP client shared by every pipeline stage.
 *
 * One `call` is one logical multipart request. Transport failures and
 * non-success statuses are retried under the injected `RetryPolicy`; the
 * pause between attempts goes through a `Sleeper`.
 */

use std::sync::Arc;

use bytes::Bytes;
use log::{debug, info, warn};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use crate::app_config::TimeoutConfig;
use crate::errors::{PipelineError, Stage};
use crate::pipeline::artifacts::Artifact;
use crate::pipeline::retry::{RetryPolicy, Sleeper, TokioSleeper};

/// Chunk size used when uploading staged files
pub const UPLOAD_CHUNK_SIZE: usize = 256 * 1024;

/// Content of a file field
#[derive(Debug, Clone)]
pub enum PartBody {
    Memory(Bytes),
    /// Streamed from disk, reopened on every attempt
    Staged(Artifact),
}

impl PartBody {
    pub fn len(&self) -> u64 {
        match self {
            Self::Memory(bytes) => bytes.len() as u64,
            Self::Staged(artifact) => artifact.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A file field of a multipart request
#[derive(Debug, Clone)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub mime: String,
    pub body: PartBody,
}

impl FilePart {
    pub fn new(field: impl Into<String>, file_name: impl Into<String>, mime: impl Into<String>, bytes: Bytes) -> Self {
        Self {
            field: field.into(),
            file_name: file_name.into(),
            mime: mime.into(),
            body: PartBody::Memory(bytes),
        }
    }

    /// Upload a staged artifact under its own file name
    pub fn staged(field: impl Into<String>, mime: impl Into<String>, artifact: &Artifact) -> Self {
        Self {
            field: field.into(),
            file_name: artifact.file_name(),
            mime: mime.into(),
            body: PartBody::Staged(artifact.clone()),
        }
    }

    async fn to_part(&self, stage: Stage) -> Result<Part, PipelineError> {
        let part = match &self.body {
            PartBody::Memory(bytes) => Part::stream_with_length(bytes.clone(), bytes.len() as u64),
            PartBody::Staged(artifact) => {
                let file = File::open(artifact.path()).await?;
                let stream = ReaderStream::with_capacity(file, UPLOAD_CHUNK_SIZE);
                Part::stream_with_length(Body::wrap_stream(stream), artifact.len())
            }
        };

        part.file_name(self.file_name.clone())
            .mime_str(&self.mime)
            .map_err(|e| PipelineError::Internal(format!("Invalid {} part mime {}: {}", stage, self.mime, e)))
    }
}

/// HTTP client for stage calls
#[derive(Debug, Clone)]
pub struct StageClient {
    http: Client,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl StageClient {
    /// Build a client with the three configured timeouts
    pub fn new(timeouts: &TimeoutConfig, policy: RetryPolicy) -> Result<Self, PipelineError> {
        let http = Client::builder()
            .connect_timeout(timeouts.connect())
            .read_timeout(timeouts.read())
            .timeout(timeouts.total())
            .build()
            .map_err(|e| PipelineError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            policy,
            sleeper: Arc::new(TokioSleeper),
        })
    }

    /// Replace the sleeper used between attempts
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    async fn build_form(&self, stage: Stage, parts: &[FilePart], fields: &[(&str, &str)]) -> Result<Form, PipelineError> {
        let mut form = Form::new();
        for part in parts {
            form = form.part(part.field.clone(), part.to_part(stage).await?);
        }
        for (name, value) in fields {
            form = form.text(name.to_string(), value.to_string());
        }
        Ok(form)
    }

    /// POST a multipart request to `endpoint`, retrying under the policy.
    ///
    /// Returns the response body of the first successful attempt. After the
    /// last failed attempt the error carries the stage and either the final
    /// status with its body or the transport failure.
    pub async fn call(
        &self,
        stage: Stage,
        endpoint: &str,
        parts: &[FilePart],
        fields: &[(&str, &str)],
    ) -> Result<Bytes, PipelineError> {
        let attempts = self.policy.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            debug!("{} stage: attempt {}/{} to {}", stage, attempt + 1, attempts, endpoint);

            let error = match self.attempt(stage, endpoint, parts, fields).await {
                Ok(body) => {
                    debug!("{} stage: received {} bytes", stage, body.len());
                    return Ok(body);
                }
                Err(error @ PipelineError::Upstream { .. }) => error,
                Err(error) => return Err(error),
            };

            warn!("{} stage attempt {}/{} failed: {}", stage, attempt + 1, attempts, error);
            last_error = Some(error);

            if attempt + 1 < attempts {
                let delay = self.policy.delay(attempt);
                info!("Retrying {} stage in {:.2}s", stage, delay.as_secs_f64());
                self.sleeper.sleep(delay).await;
            }
        }

        Err(last_error.unwrap_or_else(|| PipelineError::upstream_transport(stage, "no attempt was made")))
    }

    async fn attempt(
        &self,
        stage: Stage,
        endpoint: &str,
        parts: &[FilePart],
        fields: &[(&str, &str)],
    ) -> Result<Bytes, PipelineError> {
        let form = self.build_form(stage, parts, fields).await?;

        let response = self
            .http
            .post(endpoint)
            .header(reqwest::header::ACCEPT, "*/*")
            .multipart(form)
            .send()
            .await
            .map_err(|e| PipelineError::upstream_transport(stage, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::upstream_status(stage, status.as_u16(), body));
        }

        response
            .bytes()
            .await
            .map_err(|e| PipelineError::upstream_transport(stage, e))
    }
}
