/*!
 * Multi-stage media pipeline.
 *
 * - `retry`: retry policy and sleeper seam
 * - `stage_client`: retrying multipart client for external stages
 * - `artifacts`: temporary artifact storage and bundle splitting
 * - `job_store`: job registry with expiry and capacity
 * - `style`: render style descriptor
 * - `orchestrator`: stage sequencing and the two-phase job flow
 */

pub mod artifacts;
pub mod job_store;
pub mod orchestrator;
pub mod retry;
pub mod stage_client;
pub mod style;

pub use self::artifacts::{Artifact, ArtifactStore, ExtractedBundle};
pub use self::job_store::{Job, JobId, JobStore, MemoryJobStore};
pub use self::orchestrator::{Orchestrator, RenderStream, RenderedVideo, TranslationStage};
pub use self::retry::{RecordingSleeper, RetryPolicy, Sleeper, TokioSleeper};
pub use self::stage_client::{FilePart, PartBody, StageClient};
pub use self::style::RenderStyle;
