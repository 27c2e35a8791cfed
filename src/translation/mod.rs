/*!
 * Subtitle translation and alignment.
 *
 * - `backend`: translation backends (model-backed or identity)
 * - `prompts`: prompt templates for scene, line and variant requests
 * - `normalize`: whitespace cleanup for CJK text
 * - `cache`: line translation cache
 * - `alignment`: positional alignment engine and quality stats
 * - `service`: the in-process translation stage
 */

pub mod alignment;
pub mod backend;
pub mod cache;
pub mod normalize;
pub mod prompts;
pub mod service;

pub use self::alignment::{Alignment, AlignmentEngine, FAILURE_SENTINEL, TranslationStats};
pub use self::backend::{BackendCapability, IdentityBackend, ModelBackend, TranslationBackend};
pub use self::cache::TranslationCache;
pub use self::service::{TranslationOutcome, TranslationService};
