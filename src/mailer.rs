//! Outbound email via the Brevo transactional API. The transport is a
//! plain HTTPS call with a bounded timeout; a failed send surfaces as
//! `AppError::Mail` and is never retried here.

use async_trait::async_trait;
use base64::Engine;
use serde_json::json;
use std::time::Duration;

use crate::{
    config::MailConfig,
    error::{AppError, AppResult},
};

const BREVO_ENDPOINT: &str = "https://api.brevo.com/v3/smtp/email";
const SEND_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachment: Option<Attachment>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> AppResult<()>;
}

pub struct BrevoMailer {
    http: reqwest::Client,
    api_key: String,
    from_email: String,
    from_name: String,
}

impl BrevoMailer {
    pub fn new(config: &MailConfig, api_key: String) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
        Ok(Self {
            http,
            api_key,
            from_email: config.from_email.clone(),
            from_name: config.from_name.clone(),
        })
    }
}

#[async_trait]
impl Mailer for BrevoMailer {
    async fn send(&self, email: &OutboundEmail) -> AppResult<()> {
        let mut payload = json!({
            "sender": { "name": self.from_name, "email": self.from_email },
            "to": [{ "email": email.to }],
            "subject": email.subject,
            "textContent": email.body,
        });

        if let Some(attachment) = &email.attachment {
            let encoded = base64::engine::general_purpose::STANDARD.encode(&attachment.content);
            payload["attachment"] = json!([{
                "name": attachment.filename,
                "content": encoded,
            }]);
        }

        let response = self
            .http
            .post(BREVO_ENDPOINT)
            .header("accept", "application/json")
            .header("api-key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::Mail(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Mail(format!("provider returned {status}: {body}")));
        }

        tracing::info!(to = %email.to, subject = %email.subject, "email sent");
        Ok(())
    }
}

/// Stand-in used when no API key is configured, and by tests. Records
/// nothing and always succeeds.
pub struct NoopMailer;

#[async_trait]
impl Mailer for NoopMailer {
    async fn send(&self, email: &OutboundEmail) -> AppResult<()> {
        tracing::warn!(
            to = %email.to,
            subject = %email.subject,
            "mail sending disabled, dropping message"
        );
        Ok(())
    }
}
