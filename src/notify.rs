//! Outbound booking confirmations over SMTP via lettre.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, Message, SmtpTransport, Transport};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use crate::error::NotifyError;

/// Result of a notification attempt. Failures never abort the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotifyOutcome {
    pub success: bool,
    pub error: Option<String>,
}

impl NotifyOutcome {
    pub fn sent() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Sends a message to one recipient.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> NotifyOutcome;
}

// ── Configuration ───────────────────────────────────────────────────

/// SMTP configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub from_email: String,
    pub from_name: String,
}

impl SmtpConfig {
    /// Build config from environment variables.
    /// Returns `None` if any required value is missing (notifications disabled).
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let host = get("SMTP_HOST")?;
        let username = get("SMTP_USER")?;
        let password = get("SMTP_PASSWORD")?;
        let from_email = get("SMTP_FROM_EMAIL").unwrap_or_else(|| username.clone());
        let port: u16 = get("SMTP_PORT").and_then(|s| s.parse().ok()).unwrap_or(587);
        let from_name = get("SMTP_FROM_NAME").unwrap_or_else(|| "Hotel Assist".to_string());

        Some(Self {
            host,
            port,
            username,
            password: SecretString::from(password),
            from_email,
            from_name,
        })
    }
}

// ── SMTP notifier ───────────────────────────────────────────────────

/// STARTTLS SMTP notifier. Without configuration every send is a no-op success.
pub struct SmtpNotifier {
    config: Option<SmtpConfig>,
}

impl SmtpNotifier {
    pub fn new(config: Option<SmtpConfig>) -> Self {
        if config.is_none() {
            tracing::info!("SMTP not configured, confirmation emails disabled");
        }
        Self { config }
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }
}

/// Build the plain-text message (`From: "<name> <addr>"`).
pub fn build_message(
    config: &SmtpConfig,
    to: &str,
    subject: &str,
    body: &str,
) -> Result<Message, NotifyError> {
    let from_address: Address =
        config
            .from_email
            .parse()
            .map_err(|e: lettre::address::AddressError| NotifyError::InvalidAddress {
                address: config.from_email.clone(),
                reason: e.to_string(),
            })?;
    let to_address: Address =
        to.trim()
            .parse()
            .map_err(|e: lettre::address::AddressError| NotifyError::InvalidAddress {
                address: to.to_string(),
                reason: e.to_string(),
            })?;

    Message::builder()
        .from(Mailbox::new(Some(config.from_name.clone()), from_address))
        .to(Mailbox::new(None, to_address))
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(body.to_string())
        .map_err(|e| NotifyError::Build(e.to_string()))
}

fn send_blocking(config: &SmtpConfig, message: &Message) -> Result<(), NotifyError> {
    let creds = Credentials::new(
        config.username.clone(),
        config.password.expose_secret().to_string(),
    );

    let transport = SmtpTransport::starttls_relay(&config.host)
        .map_err(|e| NotifyError::Send(format!("SMTP relay error: {e}")))?
        .port(config.port)
        .credentials(creds)
        .build();

    transport
        .send(message)
        .map_err(|e| NotifyError::Send(format!("SMTP send failed: {e}")))?;
    Ok(())
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, to: &str, subject: &str, body: &str) -> NotifyOutcome {
        let Some(config) = self.config.clone() else {
            tracing::debug!(to, "SMTP not configured, skipping email");
            return NotifyOutcome::sent();
        };

        let message = match build_message(&config, to, subject, body) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(to, "Failed to build email: {}", e);
                return NotifyOutcome::failed(e.to_string());
            }
        };

        match tokio::task::spawn_blocking(move || send_blocking(&config, &message)).await {
            Ok(Ok(())) => {
                tracing::info!("Email sent to {to}");
                NotifyOutcome::sent()
            }
            Ok(Err(e)) => {
                tracing::warn!(to, "Email delivery failed: {}", e);
                NotifyOutcome::failed(e.to_string())
            }
            Err(e) => {
                tracing::error!("Email task panicked: {}", e);
                NotifyOutcome::failed(format!("email task failed: {e}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn full_config() -> SmtpConfig {
        SmtpConfig::from_lookup(lookup(&[
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_USER", "bot@example.com"),
            ("SMTP_PASSWORD", "hunter2"),
            ("SMTP_FROM_NAME", "Grand Hotel"),
        ]))
        .unwrap()
    }

    #[test]
    fn config_requires_host_user_password() {
        assert!(SmtpConfig::from_lookup(lookup(&[])).is_none());
        assert!(
            SmtpConfig::from_lookup(lookup(&[
                ("SMTP_HOST", "smtp.example.com"),
                ("SMTP_USER", "bot@example.com"),
            ]))
            .is_none()
        );
    }

    #[test]
    fn config_defaults() {
        let config = full_config();
        assert_eq!(config.port, 587);
        assert_eq!(config.from_email, "bot@example.com");
        assert_eq!(config.from_name, "Grand Hotel");
    }

    #[test]
    fn message_has_named_sender() {
        let message = build_message(&full_config(), "jane@example.com", "Hi", "Body").unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Grand Hotel"));
        assert!(raw.contains("<bot@example.com>"));
        assert!(raw.contains("jane@example.com"));
        assert!(raw.contains("Subject: Hi"));
    }

    #[test]
    fn message_rejects_bad_recipient() {
        let err = build_message(&full_config(), "not-an-email", "Hi", "Body").unwrap_err();
        assert!(matches!(err, NotifyError::InvalidAddress { .. }));
    }

    #[tokio::test]
    async fn unconfigured_notifier_is_silent_success() {
        let notifier = SmtpNotifier::new(None);
        assert!(!notifier.is_configured());
        let outcome = notifier.send("jane@example.com", "Hi", "Body").await;
        assert_eq!(outcome, NotifyOutcome::sent());
    }

    #[tokio::test]
    async fn bad_recipient_is_reported_not_raised() {
        let notifier = SmtpNotifier::new(Some(full_config()));
        let outcome = notifier.send("not-an-email", "Hi", "Body").await;
        assert!(!outcome.success);
        assert!(outcome.error.is_some());
    }
}
