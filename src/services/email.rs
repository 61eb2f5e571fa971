//! Outbound email transport.
//!
//! Two modes:
//! 1. Send via the Resend HTTP API (when an API key and sender are configured)
//! 2. Disabled (every send fails with `NotConfigured`)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub const RESEND_API_URL: &str = "https://api.resend.com/emails";

const SEND_TIMEOUT_SECS: u64 = 10;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("email transport not configured: {0}")]
    NotConfigured(String),

    #[error("email request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("email provider rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[async_trait]
pub trait EmailTransport: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Single delivery attempt. Implementations must not retry.
    async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError>;
}

/// Resend API request body.
#[derive(Debug, Serialize)]
struct ResendEmailRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    text: &'a str,
    html: &'a str,
}

/// Resend API response.
#[derive(Debug, Deserialize)]
struct ResendEmailResponse {
    id: String,
}

#[derive(Clone)]
pub struct ResendTransport {
    http_client: Client,
    api_key: String,
    api_url: String,
    from_email: String,
}

impl ResendTransport {
    pub fn new(api_key: String, from_email: String, api_url: String) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(SEND_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        Self {
            http_client,
            api_key,
            api_url,
            from_email,
        }
    }
}

#[async_trait]
impl EmailTransport for ResendTransport {
    fn name(&self) -> &'static str {
        "resend"
    }

    async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        let request = ResendEmailRequest {
            from: &self.from_email,
            to: vec![message.to.as_str()],
            subject: &message.subject,
            text: &message.text,
            html: &message.html,
        };

        let response = self
            .http_client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let sent: ResendEmailResponse = response.json().await?;
        tracing::debug!(email_id = %sent.id, "email accepted by provider");
        Ok(())
    }
}

/// Transport used when mail settings are absent.
#[derive(Debug, Clone)]
pub struct DisabledTransport {
    reason: String,
}

impl DisabledTransport {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl EmailTransport for DisabledTransport {
    fn name(&self) -> &'static str {
        "disabled"
    }

    async fn send(&self, _message: &EmailMessage) -> Result<(), NotificationError> {
        Err(NotificationError::NotConfigured(self.reason.clone()))
    }
}
