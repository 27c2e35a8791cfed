/*!
 * Scriptable in-memory provider.
 *
 * Used by tests and benchmarks to drive `ModelBackend` without a network.
 * By default it answers `[MOCK] <prompt>`, which never equals the text it
 * was asked to translate.
 */

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::errors::ProviderError;
use crate::providers::{CompletionRequest, Provider};

/// How the mock answers
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    Working,
    /// Every `fail_every`-th request fails with a 503
    Intermittent { fail_every: usize },
    /// Every request fails with a 500
    Failing,
    /// Every request succeeds with an empty body
    Empty,
}

pub type ResponseFn = fn(&CompletionRequest) -> String;

/// Provider whose clones share one request counter
#[derive(Debug, Clone)]
pub struct MockProvider {
    behavior: MockBehavior,
    requests: Arc<AtomicUsize>,
    response: Option<ResponseFn>,
}

impl MockProvider {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            requests: Arc::new(AtomicUsize::new(0)),
            response: None,
        }
    }

    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every })
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    /// Answer successful requests with `response` instead of the tagged prompt
    pub fn with_custom_response(mut self, response: ResponseFn) -> Self {
        self.response = Some(response);
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn answer(&self, request: &CompletionRequest) -> String {
        self.response
            .map(|response| response(request))
            .unwrap_or_else(|| format!("[MOCK] {}", request.prompt))
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError> {
        let number = self.requests.fetch_add(1, Ordering::SeqCst) + 1;

        match self.behavior {
            MockBehavior::Working => Ok(self.answer(&request)),
            MockBehavior::Intermittent { fail_every } if fail_every > 0 && number % fail_every == 0 => {
                Err(ProviderError::ApiError {
                    status_code: 503,
                    message: format!("simulated outage on request #{}", number),
                })
            }
            MockBehavior::Intermittent { .. } => Ok(self.answer(&request)),
            MockBehavior::Failing => Err(ProviderError::ApiError {
                status_code: 500,
                message: "simulated provider failure".to_string(),
            }),
            MockBehavior::Empty => Ok(String::new()),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
