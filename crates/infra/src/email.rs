//! Outgoing email.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::config::EmailConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("email request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("email provider rejected the message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<(), EmailError>;
}

/// JSON provider API (`POST {from, to, subject, text}` with a bearer key).
pub struct HttpEmailSender {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl HttpEmailSender {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into(),
            api_key: api_key.into(),
            from: from.into(),
        }
    }
}

#[derive(Serialize)]
struct ProviderPayload<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: &'a str,
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    #[tracing::instrument(skip_all, fields(to = %email.to))]
    async fn send(&self, email: OutgoingEmail) -> Result<(), EmailError> {
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&ProviderPayload {
                from: &self.from,
                to: [&email.to],
                subject: &email.subject,
                text: &email.text,
            })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            tracing::info!("email sent");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(EmailError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}

/// Logs messages instead of sending them and keeps a copy for inspection.
#[derive(Default)]
pub struct LoggingEmailSender {
    sent: RwLock<Vec<OutgoingEmail>>,
}

impl LoggingEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl EmailSender for LoggingEmailSender {
    async fn send(&self, email: OutgoingEmail) -> Result<(), EmailError> {
        tracing::info!(to = %email.to, subject = %email.subject, "email (not sent)");
        self.sent
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(email);
        Ok(())
    }
}

/// The HTTP sender when an API key is configured, otherwise the logging one.
pub fn sender_from_config(config: &EmailConfig) -> Arc<dyn EmailSender> {
    match &config.api_key {
        Some(key) => Arc::new(HttpEmailSender::new(&config.api_url, key, &config.from)),
        None => {
            tracing::warn!("EMAIL_API_KEY not set; outgoing email will only be logged");
            Arc::new(LoggingEmailSender::new())
        }
    }
}

pub fn invitation_email(
    to: &str,
    organization_name: &str,
    role: &str,
    accept_url: &str,
) -> OutgoingEmail {
    OutgoingEmail {
        to: to.to_string(),
        subject: format!("You have been invited to join {organization_name} on Miliki"),
        text: format!(
            "You have been invited to join {organization_name} as {role}.\n\n\
             Accept the invitation: {accept_url}\n\n\
             This invitation expires in 7 days."
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn logging_sender_records_messages() {
        let sender = LoggingEmailSender::new();
        sender
            .send(invitation_email("a@b.co", "Acme Homes", "manager", "http://x/accept"))
            .await
            .unwrap();
        let sent = sender.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].subject.contains("Acme Homes"));
        assert!(sent[0].text.contains("http://x/accept"));
    }
}
