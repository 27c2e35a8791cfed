#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, info, warn};
use std::io::Write;
use std::path::{Path, PathBuf};

use subpipe::app_config::{self, Config, TranslationMode, TranslationProvider};
use subpipe::server::{self, AppState};
use subpipe::subtitle_processor::SubtitleTrack;
use subpipe::translation::TranslationService;
use subpipe::Orchestrator;

/// CLI Wrapper for TranslationProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTranslationProvider {
    None,
    Gemini,
    Ollama,
    Anthropic,
}

impl From<CliTranslationProvider> for TranslationProvider {
    fn from(cli_provider: CliTranslationProvider) -> Self {
        match cli_provider {
            CliTranslationProvider::None => TranslationProvider::None,
            CliTranslationProvider::Gemini => TranslationProvider::Gemini,
            CliTranslationProvider::Ollama => TranslationProvider::Ollama,
            CliTranslationProvider::Anthropic => TranslationProvider::Anthropic,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

/// Options shared by every command that loads the configuration
#[derive(Args, Debug)]
struct ConfigArgs {
    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,

    /// Translation provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliTranslationProvider>,

    /// Model name to use for translation
    #[arg(short, long)]
    model: Option<String>,
}

#[derive(Args, Debug)]
struct ServeArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Listen address, e.g. 0.0.0.0:8000
    #[arg(short, long)]
    bind: Option<String>,

    /// Translate inside this process instead of calling the translation service
    #[arg(long)]
    in_process: bool,
}

#[derive(Args, Debug)]
struct TranslateArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Subtitle track to translate
    #[arg(value_name = "SRT_PATH")]
    srt_path: PathBuf,

    /// Dialogue script (`Speaker: text` lines) used for scene translation
    #[arg(short, long)]
    script: Option<PathBuf>,

    /// Target language (code like 'ja' or a name like 'Japanese')
    #[arg(short, long)]
    target_language: String,

    /// Output file; defaults to <input>.<lang>.srt next to the input
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print translation statistics as JSON on stdout
    #[arg(long)]
    stats: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP pipeline service
    Serve(ServeArgs),

    /// Translate a subtitle file locally
    Translate(TranslateArgs),

    /// Generate shell completions for subpipe
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// subpipe - subtitle pipeline orchestrator
///
/// Sends a video through transcription and translation, keeps the result
/// under a job id, and renders the translated subtitles into the video on
/// request.
#[derive(Parser, Debug)]
#[command(name = "subpipe")]
#[command(version)]
#[command(about = "Subtitle extraction, translation and rendering pipeline")]
#[command(long_about = "subpipe coordinates external transcription, translation and rendering services.

EXAMPLES:
    subpipe serve                                   # Serve on the configured address
    subpipe serve --bind 127.0.0.1:9000 --in-process
    subpipe translate movie.srt -s movie.txt -t ja  # Translate locally with scene context
    subpipe translate movie.srt -t fr -p none       # Identity translation, no model
    subpipe completions bash > subpipe.bash

CONFIGURATION:
    Configuration is stored in conf.json by default. If the file doesn't exist,
    a default one is created. Environment variables (also read from .env) such
    as EXTRACTOR_URL, TRANSLATOR_URL, OVERLAY_URL, MAX_RETRIES or GOOGLE_API_KEY
    override the file.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger { level: LevelFilter::Trace }))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color and tag for a level
    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("\x1B[1;31m", "ERROR"),
            Level::Warn => ("\x1B[1;33m", "WARN "),
            Level::Info => ("\x1B[1;32m", "INFO "),
            Level::Debug => ("\x1B[1;36m", "DEBUG"),
            Level::Trace => ("\x1B[1;35m", "TRACE"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level && metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let now = chrono::Local::now().format("%H:%M:%S.%3f");
        let (color, tag) = Self::style_for_level(record.level());
        let _ = writeln!(
            std::io::stderr(),
            "{}{} {} {}\x1B[0m",
            color,
            now,
            tag,
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

fn level_filter(level: &app_config::LogLevel) -> LevelFilter {
    match level {
        app_config::LogLevel::Error => LevelFilter::Error,
        app_config::LogLevel::Warn => LevelFilter::Warn,
        app_config::LogLevel::Info => LevelFilter::Info,
        app_config::LogLevel::Debug => LevelFilter::Debug,
        app_config::LogLevel::Trace => LevelFilter::Trace,
    }
}

/// Load conf file, then `.env` and process environment, then CLI flags
fn load_config(args: &ConfigArgs) -> Result<Config> {
    if let Some(level) = &args.log_level {
        log::set_max_level(level_filter(&level.clone().into()));
    }

    match dotenvy::dotenv() {
        Ok(path) => info!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => warn!("Ignoring unreadable .env file: {}", e),
    }

    let (mut config, created) = Config::load_or_create(&args.config_path)?;
    if created {
        warn!("Config file not found at '{}', created a default one.", args.config_path);
    }

    config
        .apply_env_overrides()
        .context("Invalid environment override")?;

    if let Some(provider) = &args.provider {
        config.translation.provider = provider.clone().into();
    }
    if let Some(model) = &args.model {
        config.translation.model = model.clone();
    }
    if let Some(level) = &args.log_level {
        config.log_level = level.clone().into();
    }

    config.validate().context("Configuration validation failed")?;
    log::set_max_level(level_filter(&config.log_level));

    Ok(config)
}

async fn run_serve(args: ServeArgs) -> Result<()> {
    let mut config = load_config(&args.config)?;
    if let Some(bind) = args.bind {
        config.server.bind_addr = bind;
    }
    if args.in_process {
        config.translation.mode = TranslationMode::InProcess;
    }

    info!(
        "Stages: extractor={} translator={} overlay={}",
        config.stages.extractor_url, config.stages.translator_url, config.stages.overlay_url
    );
    info!(
        "Retry policy: {} attempts, {}s initial backoff, x{} factor",
        config.retry.max_retries, config.retry.initial_backoff_secs, config.retry.backoff_factor
    );

    let service = TranslationService::from_config(&config.translation);
    let orchestrator = Orchestrator::from_config(&config, &service)?;
    let state = AppState::new(orchestrator, service);
    server::serve(state, &config.server).await
}

/// `movie.srt` + `ja` -> `movie.ja.srt`
fn default_output_path(input: &Path, target_language: &str) -> Result<PathBuf> {
    let stem = input
        .file_stem()
        .ok_or_else(|| anyhow!("Input path has no file name: {:?}", input))?
        .to_string_lossy();
    let language: String = target_language
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-')
        .collect();
    Ok(input.with_file_name(format!("{}.{}.srt", stem, language)))
}

async fn run_translate(args: TranslateArgs) -> Result<()> {
    let config = load_config(&args.config)?;

    let srt = tokio::fs::read_to_string(&args.srt_path)
        .await
        .with_context(|| format!("Failed to read subtitle file: {}", args.srt_path.display()))?;
    let script = match &args.script {
        Some(path) => Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read script file: {}", path.display()))?,
        ),
        None => None,
    };

    let source_cues = SubtitleTrack::parse(&srt).len();
    info!("Loaded {} cues from {}", source_cues, args.srt_path.display());

    let outcome = TranslationService::from_config(&config.translation)
        .translate(&srt, script.as_deref(), &args.target_language)
        .await?;

    let output = match args.output {
        Some(path) => path,
        None => default_output_path(&args.srt_path, &args.target_language)?,
    };
    tokio::fs::write(&output, &outcome.srt)
        .await
        .with_context(|| format!("Failed to write output file: {}", output.display()))?;

    info!(
        "Wrote {} ({}/{} cues translated, {}%)",
        output.display(),
        outcome.stats.translated,
        outcome.stats.total_lines,
        outcome.stats.success_rate_pct
    );
    if outcome.stats.is_degraded() {
        warn!("Failed cue indices: {:?}", outcome.stats.failed_indices);
    }

    if args.stats {
        println!("{}", serde_json::to_string_pretty(&outcome.stats)?);
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "subpipe", &mut std::io::stdout());
            Ok(())
        }
        Commands::Serve(args) => run_serve(args).await,
        Commands::Translate(args) => run_translate(args).await,
    }
}
