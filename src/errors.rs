/*!
 * Error types for the subpipe application.
 *
 * This module contains custom error types for the pipeline and the translation
 * backends, using the thiserror crate for ergonomic error definitions.
 */

use std::fmt;

use thiserror::Error;

/// One external step of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Transcription service producing the subtitle + script bundle
    Extraction,
    /// Translation of the subtitle track
    Translation,
    /// Subtitle burning into the video
    Rendering,
}

impl Stage {
    /// Lowercase stage identifier used in logs and error payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Extraction => "extraction",
            Self::Translation => "translation",
            Self::Rendering => "rendering",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What went wrong on the last attempt against an upstream stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamDetail {
    /// The stage answered with a non-success status
    Status {
        /// HTTP status code
        code: u16,
        /// Response body, verbatim
        body: String,
    },
    /// The request never produced a response (connect, timeout, body read)
    Transport(String),
}

impl fmt::Display for UpstreamDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status { code, body } => write!(f, "{} {}", code, body),
            Self::Transport(cause) => write!(f, "transport error: {}", cause),
        }
    }
}

/// Errors surfaced by the pipeline orchestrator
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A stage exhausted its retries or answered with a non-success status
    #[error("{stage} stage failed: {detail}")]
    Upstream {
        /// Failing stage
        stage: Stage,
        /// Status/body or transport cause of the final attempt
        detail: UpstreamDetail,
    },

    /// The extraction response was not a valid subtitle + script archive
    #[error("Malformed extraction bundle: {0}")]
    MalformedBundle(String),

    /// Caller supplied unusable input (style descriptor, upload, language)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unknown or evicted job handle
    #[error("Job not found: {0}")]
    NotFound(String),

    /// Local storage failure while staging artifacts
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything else that is our fault
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Build an upstream error from a status code and body
    pub fn upstream_status(stage: Stage, code: u16, body: impl Into<String>) -> Self {
        Self::Upstream {
            stage,
            detail: UpstreamDetail::Status { code, body: body.into() },
        }
    }

    /// Build an upstream error from a transport failure
    pub fn upstream_transport(stage: Stage, cause: impl fmt::Display) -> Self {
        Self::Upstream {
            stage,
            detail: UpstreamDetail::Transport(cause.to_string()),
        }
    }

    /// Stage this error is attributed to, if any
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Upstream { stage, .. } => Some(*stage),
            Self::MalformedBundle(_) => Some(Stage::Extraction),
            _ => None,
        }
    }
}

/// Errors that can occur when working with translation provider APIs
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_connect() || error.is_timeout() {
            Self::ConnectionError(error.to_string())
        } else if error.is_decode() {
            Self::ParseError(error.to_string())
        } else {
            Self::RequestFailed(error.to_string())
        }
    }
}
