//! Email transport abstraction.
//!
//! `EmailSender` is the core trait — swap in `ResendEmailSender` in
//! production, `LogEmailSender` in dev/staging (logs to tracing),
//! `FakeEmailSender` in tests.
//!
//! The trait is object-safe so callers can hold `Arc<dyn EmailSender>`.

use std::collections::HashSet;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use base64::Engine;
use tracing::info;

// =============================================================================
// Core trait
// =============================================================================

/// Fetched attachment content, ready for the provider payload
#[derive(Debug, Clone)]
pub struct EmailAttachment {
    pub filename: String,
    pub content_type: Option<String>,
    pub content: Vec<u8>,
}

/// Represents a rendered email message ready to send.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub to_name: Option<String>,
    pub subject: String,
    pub html: String,
    pub text: String,
    pub attachments: Vec<EmailAttachment>,
}

/// Provider acknowledgement for one accepted message
#[derive(Debug, Clone, Default)]
pub struct SendReceipt {
    pub message_id: Option<String>,
}

/// Abstraction over an email transport.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, msg: EmailMessage) -> Result<SendReceipt>;
}

// =============================================================================
// LogEmailSender — writes to tracing (dev / staging)
// =============================================================================

pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, msg: EmailMessage) -> Result<SendReceipt> {
        info!(
            to = %msg.to,
            subject = %msg.subject,
            attachments = msg.attachments.len(),
            "[LogEmailSender] Would send email\n---HTML---\n{}\n---TEXT---\n{}",
            msg.html,
            msg.text,
        );
        Ok(SendReceipt::default())
    }
}

// =============================================================================
// FakeEmailSender — captures sent messages in a Vec (tests)
// =============================================================================

/// Collects sent messages in memory for assertion in tests. Addresses added
/// via `fail_address` are rejected to exercise partial-failure paths.
#[derive(Default)]
pub struct FakeEmailSender {
    pub sent: Mutex<Vec<EmailMessage>>,
    fail_addresses: Mutex<HashSet<String>>,
}

impl FakeEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every send to `address` fail.
    pub fn fail_address(&self, address: impl Into<String>) {
        self.fail_addresses.lock().unwrap().insert(address.into());
    }

    pub fn sent_messages(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailSender for FakeEmailSender {
    async fn send(&self, msg: EmailMessage) -> Result<SendReceipt> {
        if self.fail_addresses.lock().unwrap().contains(&msg.to) {
            anyhow::bail!("simulated transport failure for {}", msg.to);
        }
        self.sent.lock().unwrap().push(msg);
        Ok(SendReceipt {
            message_id: Some(format!("fake-{}", self.sent.lock().unwrap().len())),
        })
    }
}

// =============================================================================
// ResendEmailSender — live Resend.com API
// =============================================================================

pub struct ResendEmailSender {
    api_key: String,
    from: String,
}

impl ResendEmailSender {
    pub fn new(api_key: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            from: from.into(),
        }
    }
}

#[async_trait]
impl EmailSender for ResendEmailSender {
    async fn send(&self, msg: EmailMessage) -> Result<SendReceipt> {
        let client = reqwest::Client::new();

        let to = match msg.to_name.as_deref() {
            Some(name) if !name.is_empty() => format!("{} <{}>", name, msg.to),
            _ => msg.to.clone(),
        };

        let attachments: Vec<serde_json::Value> = msg
            .attachments
            .iter()
            .map(|a| {
                let mut attachment = serde_json::json!({
                    "filename": a.filename,
                    "content": base64::engine::general_purpose::STANDARD.encode(&a.content),
                });
                if let Some(content_type) = &a.content_type {
                    attachment["content_type"] = serde_json::json!(content_type);
                }
                attachment
            })
            .collect();

        let mut body = serde_json::json!({
            "from": self.from,
            "to": to,
            "subject": msg.subject,
            "html": msg.html,
            "text": msg.text,
        });
        if !attachments.is_empty() {
            body["attachments"] = serde_json::Value::Array(attachments);
        }

        let response = client
            .post("https://api.resend.com/emails")
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Resend API error {}: {}", status, body));
        }

        let message_id = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|v| v.get("id").and_then(|id| id.as_str()).map(String::from));

        info!(to = %msg.to, subject = %msg.subject, "Email sent via Resend");
        Ok(SendReceipt { message_id })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn message(to: &str) -> EmailMessage {
        EmailMessage {
            to: to.into(),
            to_name: None,
            subject: "Test".into(),
            html: "<p>Test</p>".into(),
            text: "Test".into(),
            attachments: vec![],
        }
    }

    #[tokio::test]
    async fn fake_sender_captures_messages() {
        let sender = FakeEmailSender::new();
        sender.send(message("user@example.com")).await.unwrap();

        let msgs = sender.sent_messages();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].to, "user@example.com");
        assert_eq!(msgs[0].subject, "Test");
    }

    #[tokio::test]
    async fn fake_sender_fails_configured_addresses() {
        let sender = FakeEmailSender::new();
        sender.fail_address("broken@example.com");

        assert!(sender.send(message("broken@example.com")).await.is_err());
        assert!(sender.send(message("ok@example.com")).await.is_ok());
        assert_eq!(sender.sent_messages().len(), 1);
    }

    #[tokio::test]
    async fn fake_sender_returns_message_ids() {
        let sender = FakeEmailSender::new();
        let receipt = sender.send(message("user@example.com")).await.unwrap();
        assert!(receipt.message_id.is_some());
    }

    #[tokio::test]
    async fn log_sender_does_not_error() {
        let sender = LogEmailSender;
        sender.send(message("user@example.com")).await.unwrap();
    }
}
