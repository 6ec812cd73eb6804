//! Bounded timeout and retry around a single provider.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::LlmError;
use crate::llm::provider::{CompletionRequest, CompletionResponse, LlmProvider};

/// Retries transient failures of the wrapped provider with exponential backoff.
pub struct RetryProvider {
    inner: Arc<dyn LlmProvider>,
    timeout: Duration,
    max_retries: u32,
    base_backoff: Duration,
}

impl RetryProvider {
    pub fn new(inner: Arc<dyn LlmProvider>, timeout: Duration, max_retries: u32) -> Self {
        Self {
            inner,
            timeout,
            max_retries,
            base_backoff: Duration::from_millis(500),
        }
    }

    pub fn with_base_backoff(mut self, backoff: Duration) -> Self {
        self.base_backoff = backoff;
        self
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff * (1u32 << attempt.min(5))
    }
}

#[async_trait]
impl LlmProvider for RetryProvider {
    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let mut attempt = 0u32;
        loop {
            let result = match tokio::time::timeout(self.timeout, self.inner.complete(request.clone()))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(LlmError::Timeout {
                    provider: self.inner.model_name().to_string(),
                    timeout: self.timeout,
                }),
            };

            match result {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = match &e {
                        LlmError::RateLimited {
                            retry_after: Some(after),
                            ..
                        } => *after,
                        _ => self.backoff(attempt),
                    };
                    attempt += 1;
                    tracing::warn!(
                        model = self.inner.model_name(),
                        attempt,
                        error = %e,
                        "LLM call failed, retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
