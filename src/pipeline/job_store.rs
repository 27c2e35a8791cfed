/*!
 * Job registry linking a job handle to its staged artifacts.
 *
 * The in-memory store applies an optional time-to-live and an optional
 * capacity. Removing a job drops its artifact handles, which deletes the
 * files once no render is still using them.
 */

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::errors::PipelineError;
use crate::pipeline::artifacts::Artifact;

/// Opaque job handle, rendered as 32 lowercase hex digits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for JobId {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| PipelineError::NotFound(s.to_string()))
    }
}

/// A registered job; immutable once stored
#[derive(Debug)]
pub struct Job {
    pub id: JobId,
    pub video: Artifact,
    pub subtitle: Artifact,
    pub target_language: String,
    pub created_at: Instant,
}

impl Job {
    pub fn new(video: Artifact, subtitle: Artifact, target_language: impl Into<String>) -> Self {
        Self {
            id: JobId::new(),
            video,
            subtitle,
            target_language: target_language.into(),
            created_at: Instant::now(),
        }
    }
}

/// Storage for registered jobs
pub trait JobStore: Send + Sync + fmt::Debug {
    /// Register a job, returning the shared handle
    fn insert(&self, job: Job) -> Arc<Job>;

    /// Look up a live job
    fn get(&self, id: &JobId) -> Option<Arc<Job>>;

    /// Remove a job, releasing its artifacts
    fn remove(&self, id: &JobId) -> Option<Arc<Job>>;

    /// Number of live jobs
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired job, returning how many were removed
    fn evict_expired(&self) -> usize;
}

/// Process-local job store
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<JobId, Arc<Job>>>,
    ttl: Option<Duration>,
    capacity: Option<usize>,
}

impl MemoryJobStore {
    /// Unbounded store without expiry
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity.max(1));
        self
    }

    fn is_expired(&self, job: &Job, now: Instant) -> bool {
        self.ttl
            .map(|ttl| now.duration_since(job.created_at) >= ttl)
            .unwrap_or(false)
    }

    fn sweep(&self, jobs: &mut HashMap<JobId, Arc<Job>>) -> usize {
        let now = Instant::now();
        let before = jobs.len();
        jobs.retain(|_, job| !self.is_expired(job, now));
        before - jobs.len()
    }
}

impl JobStore for MemoryJobStore {
    fn insert(&self, job: Job) -> Arc<Job> {
        let job = Arc::new(job);
        let mut jobs = self.jobs.lock();

        self.sweep(&mut jobs);
        if let Some(capacity) = self.capacity {
            while jobs.len() >= capacity {
                let oldest = jobs
                    .values()
                    .min_by_key(|job| job.created_at)
                    .map(|job| job.id);
                match oldest {
                    Some(id) => {
                        info!("Job store at capacity ({}), evicting job {}", capacity, id);
                        jobs.remove(&id);
                    }
                    None => break,
                }
            }
        }

        jobs.insert(job.id, Arc::clone(&job));
        debug!("Registered job {} ({} live)", job.id, jobs.len());
        job
    }

    fn get(&self, id: &JobId) -> Option<Arc<Job>> {
        let mut jobs = self.jobs.lock();
        let expired = jobs.get(id).map(|job| self.is_expired(job, Instant::now()))?;
        if expired {
            debug!("Job {} expired", id);
            jobs.remove(id);
            return None;
        }
        jobs.get(id).cloned()
    }

    fn remove(&self, id: &JobId) -> Option<Arc<Job>> {
        self.jobs.lock().remove(id)
    }

    fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    fn evict_expired(&self) -> usize {
        let evicted = self.sweep(&mut self.jobs.lock());
        if evicted > 0 {
            info!("Evicted {} expired job(s)", evicted);
        }
        evicted
    }
}
