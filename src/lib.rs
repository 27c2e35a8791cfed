/*!
 * # subpipe - subtitle pipeline orchestrator
 *
 * Coordinates a multi-stage subtitling pipeline: a source video goes to a
 * transcription service, the resulting subtitle/script pair is translated,
 * and the translated subtitle is later burned into the video by a rendering
 * service.
 *
 * ## Architecture
 *
 * - `app_config`: Configuration management and environment overrides
 * - `errors`: Error types shared across the crate
 * - `subtitle_processor`: SRT and dialogue script parsing, SRT writing
 * - `language_utils`: ISO 639 code expansion for prompts
 * - `providers`: Language model clients (Gemini, Ollama, Anthropic, mock)
 * - `translation`: Scene translation and cue alignment:
 *   - `translation::backend`: Model-backed and identity backends
 *   - `translation::alignment`: Positional alignment engine and stats
 *   - `translation::service`: In-process translation stage
 * - `pipeline`: Stage client, artifacts, job store and the orchestrator
 * - `server`: HTTP routes
 */

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

pub mod app_config;
pub mod errors;
pub mod language_utils;
pub mod pipeline;
pub mod providers;
pub mod server;
pub mod subtitle_processor;
pub mod translation;

pub use app_config::Config;
pub use errors::{PipelineError, ProviderError, Stage};
pub use pipeline::{JobId, Orchestrator};
pub use subtitle_processor::{AlignedCue, DialogueLine, SubtitleCue, SubtitleTrack};
pub use translation::{AlignmentEngine, TranslationService, TranslationStats};
