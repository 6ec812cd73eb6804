//! Embedding clients.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::EmbeddingError;

pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_EMBED_BATCH: usize = 64;
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Maps texts to vectors. Ingest and query must use the same embedder.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed one batch; the result has one vector per input, in order.
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Largest batch `embed` accepts.
    fn batch_size(&self) -> usize;
}

/// Settings for [`OpenAiEmbedder`].
#[derive(Debug, Clone)]
pub struct EmbedderConfig {
    pub api_key: SecretString,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub max_retries: usize,
    pub batch_size: usize,
}

impl EmbedderConfig {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            batch_size: DEFAULT_EMBED_BATCH,
        }
    }
}

/// Async client for OpenAI-compatible `/embeddings` endpoints.
#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    max_retries: usize,
    batch_size: usize,
}

impl OpenAiEmbedder {
    pub fn new(config: EmbedderConfig) -> Result<Self, EmbeddingError> {
        let key = config.api_key.expose_secret().trim().to_string();
        if key.is_empty() {
            return Err(EmbeddingError::RequestFailed("missing OpenAI API key".into()));
        }
        if config.model.trim().is_empty() {
            return Err(EmbeddingError::RequestFailed("missing embedding model name".into()));
        }

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {key}"))
            .map_err(|e| EmbeddingError::RequestFailed(format!("invalid API key: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| EmbeddingError::RequestFailed(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", config.base_url.trim_end_matches('/')),
            model: config.model,
            max_retries: config.max_retries,
            batch_size: config.batch_size.max(1),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn should_retry(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }

    fn is_retryable_error(err: &reqwest::Error) -> bool {
        err.is_timeout() || err.is_connect() || err.is_request()
    }

    fn retry_backoff(attempt: usize) -> Duration {
        let capped = attempt.min(5) as u32;
        Duration::from_millis(500 * (1 << capped))
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        if inputs.len() > self.batch_size {
            return Err(EmbeddingError::BatchTooLarge {
                len: inputs.len(),
                max: self.batch_size,
            });
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: inputs,
        };

        let mut attempt = 0usize;
        loop {
            match self.client.post(&self.endpoint).json(&request).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let mut parsed: EmbeddingResponse = resp.json().await.map_err(|e| {
                            EmbeddingError::InvalidResponse(format!(
                                "failed to parse embedding response: {e}"
                            ))
                        })?;
                        parsed.data.sort_by_key(|entry| entry.index);
                        if parsed.data.len() != inputs.len() {
                            return Err(EmbeddingError::InvalidResponse(format!(
                                "{} embeddings returned for {} inputs",
                                parsed.data.len(),
                                inputs.len()
                            )));
                        }
                        tracing::debug!(
                            model = %self.model,
                            count = inputs.len(),
                            "Embedded batch"
                        );
                        return Ok(parsed.data.into_iter().map(|e| e.embedding).collect());
                    }

                    let body = resp
                        .text()
                        .await
                        .unwrap_or_else(|_| "<body unavailable>".to_string());
                    if Self::should_retry(status) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        tracing::warn!(%status, attempt, "Embedding request failed, retrying");
                        tokio::time::sleep(Self::retry_backoff(attempt)).await;
                        continue;
                    }
                    return Err(EmbeddingError::RequestFailed(format!(
                        "embeddings request failed ({status}): {body}"
                    )));
                }
                Err(err) => {
                    if Self::is_retryable_error(&err) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        tracing::warn!(attempt, "Embedding request error, retrying: {}", err);
                        tokio::time::sleep(Self::retry_backoff(attempt)).await;
                        continue;
                    }
                    return Err(EmbeddingError::RequestFailed(err.to_string()));
                }
            }
        }
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingEntry>,
}

#[derive(Deserialize)]
struct EmbeddingEntry {
    index: usize,
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EmbedderConfig {
        EmbedderConfig::new(SecretString::from("sk-test"))
    }

    #[test]
    fn rejects_blank_key() {
        let result = OpenAiEmbedder::new(EmbedderConfig::new(SecretString::from("  ")));
        assert!(matches!(result, Err(EmbeddingError::RequestFailed(_))));
    }

    #[test]
    fn endpoint_is_built_from_base_url() {
        let embedder = OpenAiEmbedder::new(EmbedderConfig {
            base_url: "http://localhost:8080/v1/".into(),
            ..config()
        })
        .unwrap();
        assert_eq!(embedder.endpoint, "http://localhost:8080/v1/embeddings");
        assert_eq!(embedder.model(), DEFAULT_EMBEDDING_MODEL);
        assert_eq!(embedder.batch_size(), DEFAULT_EMBED_BATCH);
    }

    #[tokio::test]
    async fn empty_batch_makes_no_request() {
        let embedder = OpenAiEmbedder::new(EmbedderConfig {
            base_url: "http://127.0.0.1:9".into(),
            ..config()
        })
        .unwrap();
        assert!(embedder.embed(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn oversized_batch_is_rejected() {
        let embedder = OpenAiEmbedder::new(EmbedderConfig {
            batch_size: 2,
            ..config()
        })
        .unwrap();
        let inputs = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let err = embedder.embed(&inputs).await.unwrap_err();
        assert!(matches!(err, EmbeddingError::BatchTooLarge { len: 3, max: 2 }));
    }

    #[test]
    fn response_entries_sort_by_index() {
        let mut parsed: EmbeddingResponse = serde_json::from_str(
            r#"{"data": [{"index": 1, "embedding": [2.0]}, {"index": 0, "embedding": [1.0]}]}"#,
        )
        .unwrap();
        parsed.data.sort_by_key(|e| e.index);
        assert_eq!(parsed.data[0].embedding, vec![1.0]);
    }

    #[test]
    fn retry_policy() {
        assert!(OpenAiEmbedder::should_retry(StatusCode::TOO_MANY_REQUESTS));
        assert!(OpenAiEmbedder::should_retry(StatusCode::BAD_GATEWAY));
        assert!(!OpenAiEmbedder::should_retry(StatusCode::UNAUTHORIZED));
        assert!(OpenAiEmbedder::retry_backoff(2) > OpenAiEmbedder::retry_backoff(1));
    }
}
