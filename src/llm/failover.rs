//! Ordered model fallback.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::LlmError;
use crate::llm::provider::{CompletionRequest, CompletionResponse, LlmProvider};

/// Tries each provider in order until one succeeds.
pub struct FailoverProvider {
    providers: Vec<Arc<dyn LlmProvider>>,
}

impl FailoverProvider {
    /// Returns `None` for an empty list.
    pub fn new(providers: Vec<Arc<dyn LlmProvider>>) -> Option<Self> {
        if providers.is_empty() {
            return None;
        }
        Some(Self { providers })
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[async_trait]
impl LlmProvider for FailoverProvider {
    fn model_name(&self) -> &str {
        self.providers[0].model_name()
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let mut last_error = String::new();
        for (i, provider) in self.providers.iter().enumerate() {
            match provider.complete(request.clone()).await {
                Ok(response) => {
                    if i > 0 {
                        tracing::info!(model = provider.model_name(), "Fallback model answered");
                    }
                    return Ok(response);
                }
                // All models share one API key.
                Err(e @ LlmError::AuthFailed { .. }) => return Err(e),
                Err(e) => {
                    tracing::warn!(model = provider.model_name(), error = %e, "Model failed, trying next");
                    last_error = e.to_string();
                }
            }
        }
        Err(LlmError::AllProvidersFailed {
            attempts: self.providers.len(),
            last: last_error,
        })
    }
}
