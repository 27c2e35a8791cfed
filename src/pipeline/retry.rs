use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::app_config::RetryConfig;

// @module: Retry policy and the sleeping seam used between attempts

/// Longest pause between two attempts
pub const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Bounded exponential backoff
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_backoff: Duration,
    /// Multiplier applied for each further retry
    pub factor: f64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration, factor: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            factor,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::try_from_secs_f64(config.initial_backoff_secs).unwrap_or(Duration::ZERO),
            config.backoff_factor,
        )
    }

    /// Delay before retry `n` (0-indexed): `initial_backoff * factor^n`, capped at `MAX_BACKOFF`
    pub fn delay(&self, retry: u32) -> Duration {
        if self.initial_backoff.is_zero() {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let secs = self.initial_backoff.as_secs_f64() * self.factor.powi(exponent);
        Duration::try_from_secs_f64(secs)
            .map(|delay| delay.min(MAX_BACKOFF))
            .unwrap_or(MAX_BACKOFF)
    }

    /// Single attempt, no waiting
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, 1.0)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Asynchronous pause between attempts
#[async_trait]
pub trait Sleeper: Send + Sync + Debug {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Records requested delays and returns immediately
#[derive(Debug, Default, Clone)]
pub struct RecordingSleeper {
    delays: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays requested so far, in order
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().push(duration);
    }
}
