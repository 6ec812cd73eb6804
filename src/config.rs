//! Configuration types, read from the environment.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::booking::DEFAULT_ROOM_TYPES;
use crate::dialogue::DEFAULT_HISTORY_CAP;
use crate::error::ConfigError;
use crate::llm::{LlmBackend, LlmConfig};
use crate::notify::SmtpConfig;
use crate::rag::answer::DEFAULT_TOP_K;
use crate::rag::chunker::{DEFAULT_CHUNK_TOKENS, DEFAULT_OVERLAP_TOKENS};
use crate::rag::embedder::{DEFAULT_EMBED_BATCH, DEFAULT_EMBEDDING_MODEL};
use crate::rag::{ChunkConfig, EmbedderConfig};

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_DB_PATH: &str = "./data/hotel-assist.db";
pub const DEFAULT_HTTP_HOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Retrieval settings.
#[derive(Debug, Clone)]
pub struct RagConfig {
    pub chunk: ChunkConfig,
    pub top_k: usize,
    pub embedder: EmbedderConfig,
}

/// Everything the binary needs to wire the assistant.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub rag: RagConfig,
    pub db_path: PathBuf,
    /// Loopback unless set; the API has no authentication.
    pub http_host: IpAddr,
    pub http_port: u16,
    pub smtp: Option<SmtpConfig>,
    pub history_cap: usize,
    pub room_types: Vec<String>,
    pub session_idle_timeout: Duration,
    /// Daily rolling log files go here when set.
    pub log_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |key: &str| get(key).ok_or_else(|| ConfigError::MissingEnvVar(key.into()));

        let backend = match get("HOTEL_ASSIST_LLM_BACKEND") {
            Some(raw) => raw
                .parse::<LlmBackend>()
                .map_err(|message| invalid("HOTEL_ASSIST_LLM_BACKEND", message))?,
            None => LlmBackend::OpenAi,
        };

        // Embeddings always go to an OpenAI-compatible endpoint.
        let openai_key = require("OPENAI_API_KEY")?;
        let (llm_key, default_model) = match backend {
            LlmBackend::OpenAi => (openai_key.clone(), DEFAULT_OPENAI_MODEL),
            LlmBackend::Anthropic => (require("ANTHROPIC_API_KEY")?, DEFAULT_ANTHROPIC_MODEL),
        };

        let llm = LlmConfig {
            backend,
            api_key: SecretString::from(llm_key),
            model: get("HOTEL_ASSIST_MODEL").unwrap_or_else(|| default_model.to_string()),
            fallback_models: get("HOTEL_ASSIST_FALLBACK_MODELS")
                .map(|raw| split_list(&raw))
                .unwrap_or_default(),
            timeout: Duration::from_secs(parse_or(&get, "HOTEL_ASSIST_LLM_TIMEOUT_SECS", 60)?),
            max_retries: parse_or(&get, "HOTEL_ASSIST_LLM_MAX_RETRIES", 2)?,
        };

        let chunk = ChunkConfig {
            chunk_tokens: parse_or(&get, "HOTEL_ASSIST_CHUNK_TOKENS", DEFAULT_CHUNK_TOKENS)?,
            overlap_tokens: parse_or(&get, "HOTEL_ASSIST_CHUNK_OVERLAP", DEFAULT_OVERLAP_TOKENS)?,
        };
        if chunk.chunk_tokens == 0 {
            return Err(invalid("HOTEL_ASSIST_CHUNK_TOKENS", "must be greater than zero"));
        }
        if chunk.overlap_tokens >= chunk.chunk_tokens {
            return Err(invalid(
                "HOTEL_ASSIST_CHUNK_OVERLAP",
                format!("must be less than chunk size {}", chunk.chunk_tokens),
            ));
        }

        let mut embedder = EmbedderConfig::new(SecretString::from(openai_key));
        embedder.model =
            get("HOTEL_ASSIST_EMBEDDING_MODEL").unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.into());
        if let Some(base_url) = get("HOTEL_ASSIST_EMBEDDING_BASE_URL") {
            embedder.base_url = base_url;
        }
        embedder.batch_size = positive(&get, "HOTEL_ASSIST_EMBED_BATCH", DEFAULT_EMBED_BATCH)?;

        let rag = RagConfig {
            chunk,
            top_k: positive(&get, "HOTEL_ASSIST_TOP_K", DEFAULT_TOP_K)?,
            embedder,
        };

        let room_types = get("HOTEL_ASSIST_ROOM_TYPES")
            .map(|raw| split_list(&raw))
            .filter(|types| !types.is_empty())
            .unwrap_or_else(|| DEFAULT_ROOM_TYPES.iter().map(|s| s.to_string()).collect());

        Ok(Self {
            llm,
            rag,
            db_path: get("HOTEL_ASSIST_DB_PATH")
                .unwrap_or_else(|| DEFAULT_DB_PATH.to_string())
                .into(),
            http_host: parse_or(&get, "HOTEL_ASSIST_HTTP_HOST", DEFAULT_HTTP_HOST)?,
            http_port: parse_or(&get, "HOTEL_ASSIST_HTTP_PORT", DEFAULT_HTTP_PORT)?,
            smtp: SmtpConfig::from_lookup(&lookup),
            history_cap: positive(&get, "HOTEL_ASSIST_HISTORY_CAP", DEFAULT_HISTORY_CAP)?,
            room_types,
            session_idle_timeout: Duration::from_secs(parse_or(
                &get,
                "HOTEL_ASSIST_SESSION_IDLE_SECS",
                3600,
            )?),
            log_dir: get("HOTEL_ASSIST_LOG_DIR").map(PathBuf::from),
        })
    }
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.into(),
    }
}

fn parse_or<T>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e: T::Err| invalid(key, format!("'{raw}': {e}"))),
        None => Ok(default),
    }
}

fn positive(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: usize,
) -> Result<usize, ConfigError> {
    let value = parse_or(get, key, default)?;
    if value == 0 {
        return Err(invalid(key, "must be greater than zero"));
    }
    Ok(value)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    fn config(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_with_only_openai_key() {
        let config = config(&[("OPENAI_API_KEY", "sk-test")]).unwrap();
        assert_eq!(config.llm.backend, LlmBackend::OpenAi);
        assert_eq!(config.llm.model, DEFAULT_OPENAI_MODEL);
        assert!(config.llm.fallback_models.is_empty());
        assert_eq!(config.rag.chunk.chunk_tokens, 500);
        assert_eq!(config.rag.chunk.overlap_tokens, 50);
        assert_eq!(config.rag.top_k, 4);
        assert_eq!(config.rag.embedder.model, "text-embedding-3-small");
        assert_eq!(config.rag.embedder.batch_size, 64);
        assert_eq!(config.history_cap, 25);
        assert_eq!(config.http_port, 8080);
        assert!(config.http_host.is_loopback());
        assert_eq!(config.room_types, vec!["Standard", "Deluxe", "Suite", "Family"]);
        assert!(config.smtp.is_none());
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn missing_openai_key_is_an_error() {
        let err = config(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "OPENAI_API_KEY"));
    }

    #[test]
    fn anthropic_backend_needs_its_own_key() {
        let err = config(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("HOTEL_ASSIST_LLM_BACKEND", "anthropic"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "ANTHROPIC_API_KEY"));

        let config = config(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("ANTHROPIC_API_KEY", "sk-ant"),
            ("HOTEL_ASSIST_LLM_BACKEND", "anthropic"),
            ("HOTEL_ASSIST_FALLBACK_MODELS", "claude-3-5-haiku-latest, ,"),
        ])
        .unwrap();
        assert_eq!(config.llm.api_key.expose_secret(), "sk-ant");
        assert_eq!(config.rag.embedder.api_key.expose_secret(), "sk-test");
        assert_eq!(config.llm.model, DEFAULT_ANTHROPIC_MODEL);
        assert_eq!(config.llm.fallback_models, vec!["claude-3-5-haiku-latest"]);
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let err = config(&[("OPENAI_API_KEY", "k"), ("HOTEL_ASSIST_HTTP_PORT", "eighty")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "HOTEL_ASSIST_HTTP_PORT"));

        let err = config(&[("OPENAI_API_KEY", "k"), ("HOTEL_ASSIST_HTTP_HOST", "localhost")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "HOTEL_ASSIST_HTTP_HOST"));

        let err = config(&[("OPENAI_API_KEY", "k"), ("HOTEL_ASSIST_TOP_K", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "HOTEL_ASSIST_TOP_K"));
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk() {
        let err = config(&[
            ("OPENAI_API_KEY", "k"),
            ("HOTEL_ASSIST_CHUNK_TOKENS", "100"),
            ("HOTEL_ASSIST_CHUNK_OVERLAP", "100"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "HOTEL_ASSIST_CHUNK_OVERLAP"));
    }

    #[test]
    fn overrides() {
        let config = config(&[
            ("OPENAI_API_KEY", "k"),
            ("HOTEL_ASSIST_ROOM_TYPES", "Twin, King"),
            ("HOTEL_ASSIST_DB_PATH", "/tmp/h.db"),
            ("HOTEL_ASSIST_LOG_DIR", "/var/log/hotel"),
            ("HOTEL_ASSIST_HTTP_HOST", "0.0.0.0"),
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_USER", "bot@example.com"),
            ("SMTP_PASSWORD", "pw"),
        ])
        .unwrap();
        assert_eq!(config.room_types, vec!["Twin", "King"]);
        assert_eq!(config.db_path, PathBuf::from("/tmp/h.db"));
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/hotel")));
        assert!(config.http_host.is_unspecified());
        assert_eq!(config.smtp.unwrap().host, "smtp.example.com");
    }
}
