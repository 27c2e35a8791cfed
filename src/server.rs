/*!
 * HTTP surface of the pipeline.
 *
 * Routes:
 * - `POST /process_initial`: multipart `file` + `target_lang`, returns a job id
 * - `POST /overlay`: multipart `job_id` + `style_json`, streams the rendered video
 * - `POST /translate`: multipart `srt`, optional `script`, `target_lang`,
 *   optional `return_json_stats`
 * - `GET /healthz`: liveness and live job count
 */

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use log::{error, info, warn};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};

use crate::app_config::ServerConfig;
use crate::errors::PipelineError;
use crate::pipeline::{JobId, Orchestrator};
use crate::translation::{TranslationService, TranslationStats};

/// Shared handler state
#[derive(Debug, Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub translator: TranslationService,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator, translator: TranslationService) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            translator,
        }
    }
}

/// Pipeline error rendered as `{"detail": ...}` with a matching status
#[derive(Debug)]
pub struct ApiError(pub PipelineError);

impl From<PipelineError> for ApiError {
    fn from(error: PipelineError) -> Self {
        Self(error)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            PipelineError::Upstream { .. } | PipelineError::MalformedBundle(_) => StatusCode::BAD_GATEWAY,
            PipelineError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PipelineError::NotFound(_) => StatusCode::NOT_FOUND,
            PipelineError::Io(_) | PipelineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match &self.0 {
            PipelineError::NotFound(_) => "Invalid job_id or expired job".to_string(),
            other => other.to_string(),
        };

        if status.is_server_error() {
            error!("{} {}", status.as_u16(), self.0);
        } else {
            warn!("{} {}", status.as_u16(), self.0);
        }

        (status, Json(ErrorBody { detail })).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct ProcessInitialResponse {
    pub job_id: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub jobs_active: usize,
}

#[derive(Debug, Serialize)]
pub struct TranslateResponse {
    pub ok: bool,
    pub srt: String,
    pub stats: TranslationStats,
}

#[derive(Debug)]
struct UploadedField {
    file_name: Option<String>,
    bytes: Bytes,
}

/// Multipart fields by name; a repeated name keeps the last value
#[derive(Debug, Default)]
struct FormFields(HashMap<String, UploadedField>);

impl FormFields {
    async fn read(mut multipart: Multipart) -> Result<Self, PipelineError> {
        let mut fields = HashMap::new();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| PipelineError::InvalidInput(format!("unreadable form data: {}", e)))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            let file_name = field.file_name().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| PipelineError::InvalidInput(format!("unreadable field {}: {}", name, e)))?;
            fields.insert(name, UploadedField { file_name, bytes });
        }
        Ok(Self(fields))
    }

    fn take(&mut self, name: &str) -> Option<UploadedField> {
        self.0.remove(name)
    }

    fn require(&mut self, name: &str) -> Result<UploadedField, PipelineError> {
        self.take(name)
            .ok_or_else(|| PipelineError::InvalidInput(format!("missing form field: {}", name)))
    }

    fn text(&mut self, name: &str) -> Result<Option<String>, PipelineError> {
        self.take(name)
            .map(|field| {
                String::from_utf8(field.bytes.to_vec())
                    .map_err(|_| PipelineError::InvalidInput(format!("{} must be UTF-8 text", name)))
            })
            .transpose()
    }

    fn require_text(&mut self, name: &str) -> Result<String, PipelineError> {
        self.text(name)?
            .ok_or_else(|| PipelineError::InvalidInput(format!("missing form field: {}", name)))
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

/// Keep a value safe for a Content-Disposition file name
fn file_name_component(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
        .collect()
}

async fn process_initial(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ProcessInitialResponse>, ApiError> {
    let mut fields = FormFields::read(multipart).await?;
    let file = fields.require("file")?;
    let target_lang = fields.require_text("target_lang")?;

    let job_id = state
        .orchestrator
        .process_initial(file.bytes, file.file_name.as_deref(), &target_lang)
        .await?;

    Ok(Json(ProcessInitialResponse {
        job_id: job_id.to_string(),
        message: "Translation ready. Use this job_id for overlay.".to_string(),
    }))
}

async fn overlay(State(state): State<AppState>, multipart: Multipart) -> Result<Response, ApiError> {
    let mut fields = FormFields::read(multipart).await?;
    let job_id: JobId = fields.require_text("job_id")?.parse()?;
    let style_json = fields.require_text("style_json")?;

    let rendered = state.orchestrator.render(&job_id, &style_json).await?;
    let file_name = rendered.file_name().to_string();
    let length = rendered.len();
    let stream = rendered.into_stream().await?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "video/mp4")
        .header(header::CONTENT_LENGTH, length)
        .header(header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", file_name))
        .body(Body::from_stream(stream))
        .map_err(|e| ApiError(PipelineError::Internal(format!("Failed to build response: {}", e))))
}

async fn translate(State(state): State<AppState>, multipart: Multipart) -> Result<Response, ApiError> {
    let mut fields = FormFields::read(multipart).await?;
    let srt = fields.require_text("srt")?;
    let target_lang = fields.require_text("target_lang")?;
    let script = fields.text("script")?.filter(|s| !s.trim().is_empty());
    let return_json = fields
        .text("return_json_stats")?
        .map(|v| is_truthy(&v))
        .unwrap_or(false);

    let outcome = state
        .translator
        .translate(&srt, script.as_deref(), &target_lang)
        .await?;

    if return_json {
        return Ok(Json(TranslateResponse {
            ok: true,
            srt: outcome.srt,
            stats: outcome.stats,
        })
        .into_response());
    }

    let file_name = format!("translated_{}.srt", file_name_component(target_lang.trim()));
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", file_name)),
        ],
        outcome.srt,
    )
        .into_response())
}

async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        jobs_active: state.orchestrator.job_count(),
    })
}

/// CORS for the configured origins; `*` allows any origin
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(parsed)
}

/// Build the application router
pub fn router(state: AppState, config: &ServerConfig) -> Router {
    Router::new()
        .route("/process_initial", post(process_initial))
        .route("/overlay", post(overlay))
        .route("/translate", post(translate))
        .route("/healthz", get(healthz))
        .layer(DefaultBodyLimit::max(config.max_upload_mb.saturating_mul(1024 * 1024)))
        .layer(cors_layer(&config.cors_origins))
        .with_state(state)
}

/// Periodically drop expired jobs
pub fn spawn_eviction_task(orchestrator: Arc<Orchestrator>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            orchestrator.evict_expired();
        }
    })
}

/// Bind and serve until the process is stopped
pub async fn serve(state: AppState, config: &ServerConfig) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("Listening on {}", config.bind_addr);

    let eviction = spawn_eviction_task(
        Arc::clone(&state.orchestrator),
        Duration::from_secs(config.eviction_interval_secs.max(1)),
    );

    let result = axum::serve(listener, router(state, config))
        .await
        .context("HTTP server failed");
    eviction.abort();
    result
}
