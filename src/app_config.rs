use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::Path;
use std::time::Duration;

/// Upper bound on `retry.max_retries`
pub const MAX_STAGE_ATTEMPTS: u32 = 20;

/// Application configuration module
/// This module handles the application configuration including loading,
/// environment overrides and validation.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// External stage endpoints
    #[serde(default)]
    pub stages: StageEndpoints,

    /// Outbound HTTP timeouts
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Retry/backoff policy for stage calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Job store retention policy
    #[serde(default)]
    pub jobs: JobStoreConfig,

    /// Translation config
    #[serde(default)]
    pub translation: TranslationConfig,

    /// HTTP server config
    #[serde(default)]
    pub server: ServerConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Locations of the external pipeline stages
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StageEndpoints {
    // @field: Transcription service returning the srt + script bundle
    #[serde(default = "default_extractor_url")]
    pub extractor_url: String,

    // @field: Translation service returning a translated srt
    #[serde(default = "default_translator_url")]
    pub translator_url: String,

    // @field: Rendering service burning subtitles into the video
    #[serde(default = "default_overlay_url")]
    pub overlay_url: String,
}

impl Default for StageEndpoints {
    fn default() -> Self {
        Self {
            extractor_url: default_extractor_url(),
            translator_url: default_translator_url(),
            overlay_url: default_overlay_url(),
        }
    }
}

/// Outbound HTTP timeouts, in seconds
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TimeoutConfig {
    /// Connection establishment
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_secs: f64,

    /// Time allowed between reads of the response
    #[serde(default = "default_read_timeout_secs")]
    pub read_secs: f64,

    /// Whole-request budget
    #[serde(default = "default_total_timeout_secs")]
    pub total_secs: f64,
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_secs_f64(self.connect_secs)
    }

    pub fn read(&self) -> Duration {
        Duration::from_secs_f64(self.read_secs)
    }

    pub fn total(&self) -> Duration {
        Duration::from_secs_f64(self.total_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: default_connect_timeout_secs(),
            read_secs: default_read_timeout_secs(),
            total_secs: default_total_timeout_secs(),
        }
    }
}

/// Retry policy for stage calls
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RetryConfig {
    /// Total attempts per stage call
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry, in seconds
    #[serde(default = "default_initial_backoff_secs")]
    pub initial_backoff_secs: f64,

    /// Growth factor applied to the delay after each retry
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_secs: default_initial_backoff_secs(),
            backoff_factor: default_backoff_factor(),
        }
    }
}

/// Job store retention policy; `None` disables the corresponding limit
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct JobStoreConfig {
    /// Seconds a job stays renderable after registration
    #[serde(default)]
    pub ttl_secs: Option<u64>,

    /// Maximum number of live jobs; the oldest is evicted first
    #[serde(default)]
    pub capacity: Option<usize>,
}

/// Where the translation stage runs
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TranslationMode {
    /// Call the remote translation service
    #[default]
    Remote,
    /// Run the alignment engine inside this process
    InProcess,
}

impl std::str::FromStr for TranslationMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "remote" => Ok(Self::Remote),
            "in_process" | "local" => Ok(Self::InProcess),
            _ => Err(anyhow!("Invalid translation mode: {}", s)),
        }
    }
}

/// Translation provider type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    // @provider: No model, identity translation
    None,
    // @provider: Google Gemini
    #[default]
    Gemini,
    // @provider: Ollama
    Ollama,
    // @provider: Anthropic
    Anthropic,
}

impl TranslationProvider {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::None => "None",
            Self::Gemini => "Gemini",
            Self::Ollama => "Ollama",
            Self::Anthropic => "Anthropic",
        }
    }

    // @returns: Whether the provider needs an API key
    pub fn requires_api_key(&self) -> bool {
        matches!(self, Self::Gemini | Self::Anthropic)
    }

    // @returns: Model used when none is configured
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Gemini => "gemini-2.0-flash",
            Self::Ollama => "llama3.2:3b",
            Self::Anthropic => "claude-3-haiku-20240307",
        }
    }

    // @returns: Endpoint used when none is configured
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Gemini => "https://generativelanguage.googleapis.com",
            Self::Ollama => "http://localhost:11434",
            Self::Anthropic => "https://api.anthropic.com",
        }
    }
}

impl std::fmt::Display for TranslationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name().to_lowercase())
    }
}

impl std::str::FromStr for TranslationProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "none" | "identity" => Ok(Self::None),
            "gemini" | "google" => Ok(Self::Gemini),
            "ollama" => Ok(Self::Ollama),
            "anthropic" => Ok(Self::Anthropic),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Translation service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    /// Remote stage or in-process alignment
    #[serde(default)]
    pub mode: TranslationMode,

    /// Translation provider to use for in-process translation
    #[serde(default)]
    pub provider: TranslationProvider,

    /// Model name; empty selects the provider default
    #[serde(default)]
    pub model: String,

    /// API key for keyed providers
    #[serde(default)]
    pub api_key: String,

    /// Provider endpoint; empty selects the provider default
    #[serde(default)]
    pub endpoint: String,

    /// Attempts per direct line translation before marking it failed
    #[serde(default = "default_line_max_attempts")]
    pub line_max_attempts: u32,

    /// Temperature parameter for text generation (0.0 to 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Provider request timeout in seconds
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,

    /// Most line translations kept in the cache; the oldest is evicted first
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

impl TranslationConfig {
    /// Get the model for the active provider
    pub fn get_model(&self) -> String {
        if self.model.is_empty() {
            self.provider.default_model().to_string()
        } else {
            self.model.clone()
        }
    }

    /// Get the endpoint for the active provider
    pub fn get_endpoint(&self) -> String {
        if self.endpoint.is_empty() {
            self.provider.default_endpoint().to_string()
        } else {
            self.endpoint.clone()
        }
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            mode: TranslationMode::default(),
            provider: TranslationProvider::default(),
            model: String::new(),
            api_key: String::new(),
            endpoint: String::new(),
            line_max_attempts: default_line_max_attempts(),
            temperature: default_temperature(),
            timeout_secs: default_provider_timeout_secs(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Allowed CORS origins; `*` allows any
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Seconds between expired-job sweeps
    #[serde(default = "default_eviction_interval_secs")]
    pub eviction_interval_secs: u64,

    /// Largest accepted request body, in megabytes
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            cors_origins: default_cors_origins(),
            eviction_interval_secs: default_eviction_interval_secs(),
            max_upload_mb: default_max_upload_mb(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

fn default_extractor_url() -> String {
    "http://localhost:8001/transcribe".to_string()
}

fn default_translator_url() -> String {
    "http://localhost:8002/translate".to_string()
}

fn default_overlay_url() -> String {
    "http://localhost:8003/overlay".to_string()
}

fn default_connect_timeout_secs() -> f64 {
    15.0
}

fn default_read_timeout_secs() -> f64 {
    300.0
}

fn default_total_timeout_secs() -> f64 {
    600.0
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_secs() -> f64 {
    0.8
}

fn default_backoff_factor() -> f64 {
    1.8
}

fn default_line_max_attempts() -> u32 {
    3
}

fn default_temperature() -> f32 {
    0.3
}

fn default_provider_timeout_secs() -> u64 {
    120
}

fn default_cache_capacity() -> usize {
    10_000
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_eviction_interval_secs() -> u64 {
    60
}

fn default_max_upload_mb() -> usize {
    1024
}

/// Parse an override value, naming the variable on failure
fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| anyhow!("Invalid value for {}: {:?} ({})", name, value, e))
}

impl Config {
    /// Load from a JSON file, or create and save the default when it doesn't exist
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<(Self, bool)> {
        let path = path.as_ref();
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to open config file: {}", path.display()))?;
            let config: Config = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            return Ok((config, false));
        }

        let config = Config::default();
        let config_json = serde_json::to_string_pretty(&config)
            .context("Failed to serialize default config to JSON")?;
        std::fs::write(path, config_json)
            .with_context(|| format!("Failed to write default config to file: {}", path.display()))?;

        Ok((config, true))
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from any variable lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("EXTRACTOR_URL") {
            self.stages.extractor_url = v;
        }
        if let Some(v) = get("TRANSLATOR_URL") {
            self.stages.translator_url = v;
        }
        if let Some(v) = get("OVERLAY_URL") {
            self.stages.overlay_url = v;
        }

        if let Some(v) = get("CONNECT_TIMEOUT") {
            self.timeouts.connect_secs = parse_var("CONNECT_TIMEOUT", &v)?;
        }
        if let Some(v) = get("READ_TIMEOUT") {
            self.timeouts.read_secs = parse_var("READ_TIMEOUT", &v)?;
        }
        if let Some(v) = get("TOTAL_TIMEOUT") {
            self.timeouts.total_secs = parse_var("TOTAL_TIMEOUT", &v)?;
        }

        if let Some(v) = get("MAX_RETRIES") {
            self.retry.max_retries = parse_var("MAX_RETRIES", &v)?;
        }
        if let Some(v) = get("INITIAL_BACKOFF") {
            self.retry.initial_backoff_secs = parse_var("INITIAL_BACKOFF", &v)?;
        }
        if let Some(v) = get("BACKOFF_FACTOR") {
            self.retry.backoff_factor = parse_var("BACKOFF_FACTOR", &v)?;
        }

        if let Some(v) = get("JOB_TTL_SECS") {
            self.jobs.ttl_secs = Some(parse_var("JOB_TTL_SECS", &v)?);
        }
        if let Some(v) = get("JOB_CAPACITY") {
            self.jobs.capacity = Some(parse_var("JOB_CAPACITY", &v)?);
        }

        if let Some(v) = get("TRANSLATION_CACHE_CAPACITY") {
            self.translation.cache_capacity = parse_var("TRANSLATION_CACHE_CAPACITY", &v)?;
        }
        if let Some(v) = get("TRANSLATION_MODE") {
            self.translation.mode = parse_var("TRANSLATION_MODE", &v)?;
        }
        if let Some(v) = get("TRANSLATION_PROVIDER") {
            self.translation.provider = parse_var("TRANSLATION_PROVIDER", &v)?;
        }
        if let Some(v) = get("TRANSLATION_MODEL") {
            self.translation.model = v;
        }
        if let Some(v) = get("TRANSLATION_API_KEY").or_else(|| get("GOOGLE_API_KEY")) {
            self.translation.api_key = v;
        }

        if let Some(v) = get("BIND_ADDR") {
            self.server.bind_addr = v;
        }

        Ok(())
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        for (name, url) in [
            ("extractor_url", &self.stages.extractor_url),
            ("translator_url", &self.stages.translator_url),
            ("overlay_url", &self.stages.overlay_url),
        ] {
            url::Url::parse(url).map_err(|e| anyhow!("Invalid stage endpoint {}: {} ({})", name, url, e))?;
        }

        for (name, secs) in [
            ("connect", self.timeouts.connect_secs),
            ("read", self.timeouts.read_secs),
            ("total", self.timeouts.total_secs),
        ] {
            if !(secs.is_finite() && secs > 0.0) {
                return Err(anyhow!("The {} timeout must be a positive number of seconds", name));
            }
        }

        if self.retry.max_retries == 0 {
            return Err(anyhow!("max_retries must be at least 1"));
        }
        if self.retry.max_retries > MAX_STAGE_ATTEMPTS {
            return Err(anyhow!("max_retries must be at most {}", MAX_STAGE_ATTEMPTS));
        }
        if !(self.retry.initial_backoff_secs.is_finite() && self.retry.initial_backoff_secs >= 0.0) {
            return Err(anyhow!("initial_backoff_secs must be a non-negative number"));
        }
        if !(self.retry.backoff_factor.is_finite() && self.retry.backoff_factor >= 1.0) {
            return Err(anyhow!("backoff_factor must be at least 1.0"));
        }

        if self.jobs.capacity == Some(0) {
            return Err(anyhow!("Job capacity must be at least 1 when set"));
        }
        if self.server.max_upload_mb == 0 {
            return Err(anyhow!("max_upload_mb must be at least 1"));
        }
        if self.translation.line_max_attempts == 0 {
            return Err(anyhow!("line_max_attempts must be at least 1"));
        }
        if self.translation.cache_capacity == 0 {
            return Err(anyhow!("cache_capacity must be at least 1"));
        }

        Ok(())
    }
}
