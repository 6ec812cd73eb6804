//! Bridges rig-core completion models to our `LlmProvider` trait.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use rig::completion::{AssistantContent, CompletionModel, Message};

use crate::error::LlmError;
use crate::llm::provider::{ChatMessage, CompletionRequest, CompletionResponse, LlmProvider, Role};

/// Anthropic rejects requests without an explicit output budget.
const DEFAULT_MAX_TOKENS: u64 = 1024;

static AUTH_FAILURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(401|403)\b|unauthori[sz]ed|invalid[ _]api[ _]key|authentication|permission")
        .expect("valid auth failure regex")
});

static RATE_LIMITED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b429\b|rate[ _]limit|too many requests").expect("valid rate limit regex")
});

static REJECTED_REQUEST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(400|404|422)\b|invalid_request|bad request|model_not_found|does not exist")
        .expect("valid rejected request regex")
});

/// Map a rig failure message onto our error kinds. Auth and request
/// rejections are not retryable; anything unrecognised is.
fn classify_error(provider: &str, reason: String) -> LlmError {
    let provider = provider.to_string();
    if AUTH_FAILURE.is_match(&reason) {
        LlmError::AuthFailed { provider }
    } else if RATE_LIMITED.is_match(&reason) {
        LlmError::RateLimited {
            provider,
            retry_after: None,
        }
    } else if REJECTED_REQUEST.is_match(&reason) {
        LlmError::InvalidRequest { provider, reason }
    } else {
        LlmError::RequestFailed { provider, reason }
    }
}

/// Wraps any rig `CompletionModel`.
pub struct RigAdapter<M> {
    model: M,
    model_name: String,
}

impl<M: CompletionModel> RigAdapter<M> {
    pub fn new(model: M, model_name: &str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
        }
    }
}

/// Split our flat message list into rig's (preamble, history, prompt) shape.
fn split_messages(messages: Vec<ChatMessage>) -> (Option<String>, Vec<Message>, Option<Message>) {
    let mut preamble: Vec<String> = Vec::new();
    let mut history = Vec::new();
    for message in messages {
        match message.role {
            Role::System => preamble.push(message.content),
            Role::User => history.push(Message::user(message.content)),
            Role::Assistant => history.push(Message::assistant(message.content)),
        }
    }
    let prompt = history.pop();
    let preamble = (!preamble.is_empty()).then(|| preamble.join("\n\n"));
    (preamble, history, prompt)
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let (preamble, history, prompt) = split_messages(request.messages);
        let prompt = prompt.ok_or_else(|| LlmError::InvalidResponse {
            provider: self.model_name.clone(),
            reason: "completion request has no user or assistant message".to_string(),
        })?;

        let mut builder = self
            .model
            .completion_request(prompt)
            .messages(history)
            .max_tokens(request.max_tokens.map(u64::from).unwrap_or(DEFAULT_MAX_TOKENS));
        if let Some(preamble) = preamble {
            builder = builder.preamble(preamble);
        }
        if let Some(temperature) = request.temperature {
            builder = builder.temperature(f64::from(temperature));
        }

        let response = self
            .model
            .completion(builder.build())
            .await
            .map_err(|e| classify_error(&self.model_name, e.to_string()))?;

        let content = response
            .choice
            .iter()
            .filter_map(|part| match part {
                AssistantContent::Text(text) => Some(text.text.clone()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");

        Ok(CompletionResponse {
            content,
            input_tokens: response.usage.input_tokens as u32,
            output_tokens: response.usage.output_tokens as u32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_moves_system_to_preamble_and_last_message_to_prompt() {
        let (preamble, history, prompt) = split_messages(vec![
            ChatMessage::system("be brief"),
            ChatMessage::user("hello"),
            ChatMessage::assistant("hi there"),
            ChatMessage::user("what time is checkout?"),
        ]);
        assert_eq!(preamble.as_deref(), Some("be brief"));
        assert_eq!(history.len(), 2);
        assert!(prompt.is_some());
    }

    #[test]
    fn provider_rejections_are_not_retried() {
        let auth = classify_error(
            "gpt-4o-mini",
            "ProviderError: Invalid status code 401 Unauthorized: Incorrect API key provided"
                .to_string(),
        );
        assert!(matches!(auth, LlmError::AuthFailed { .. }));
        assert!(!auth.is_retryable());

        let bad = classify_error(
            "gpt-4o-mini",
            "ProviderError: 400 Bad Request: invalid_request_error".to_string(),
        );
        assert!(matches!(bad, LlmError::InvalidRequest { .. }));
        assert!(!bad.is_retryable());

        let missing = classify_error("gpt-5-nano", "The model `gpt-5-nano` does not exist".to_string());
        assert!(matches!(missing, LlmError::InvalidRequest { .. }));
    }

    #[test]
    fn transient_failures_stay_retryable() {
        let limited = classify_error("m", "HTTP 429 Too Many Requests".to_string());
        assert!(matches!(limited, LlmError::RateLimited { retry_after: None, .. }));
        assert!(limited.is_retryable());

        let reset = classify_error("m", "HttpError: connection reset by peer".to_string());
        assert!(matches!(reset, LlmError::RequestFailed { .. }));
        assert!(reset.is_retryable());
    }

    #[test]
    fn split_without_conversation_has_no_prompt() {
        let (preamble, history, prompt) = split_messages(vec![ChatMessage::system("only system")]);
        assert!(preamble.is_some());
        assert!(history.is_empty());
        assert!(prompt.is_none());
    }
}
