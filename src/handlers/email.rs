//! Bulk email dispatch handler

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::db::queries;
use crate::services::delivery_log::DeliveryLog;
use crate::services::dispatcher::{self, DispatchOptions, RenderedEmail};
use crate::services::email_sender::EmailSender;
use crate::services::markup::{self, ShellOptions};
use crate::services::recipients::{self, RecipientError, RecipientSource};
use crate::services::variables;
use crate::types::{
    ErrorResponse, Recipient, Request, SendEmailRequest, SendEmailResponse, SuccessResponse,
};

/// Failures surfaced to the caller before or instead of dispatching.
/// Per-recipient transport errors are not here — those aggregate into the
/// dispatch report.
#[derive(Debug, Error)]
pub enum SendRequestError {
    #[error("template '{0}' not found")]
    TemplateNotFound(String),

    #[error("recipient source '{0}' is not allow-listed")]
    SourceNotAllowed(String),

    #[error("no recipients resolved")]
    NoRecipients,

    #[error("{0}")]
    Invalid(String),

    #[error("database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl SendRequestError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::TemplateNotFound(_) => "TEMPLATE_NOT_FOUND",
            Self::SourceNotAllowed(_) => "SOURCE_NOT_ALLOWED",
            Self::NoRecipients => "NO_RECIPIENTS",
            Self::Invalid(_) => "INVALID_REQUEST",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }
}

/// Handle email.send messages
pub async fn handle_send(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    sender: Arc<dyn EmailSender>,
    log: Arc<dyn DeliveryLog>,
    http: reqwest::Client,
    config: Config,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received email.send message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<SendEmailRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
                continue;
            }
        };

        match process_send(
            &pool,
            sender.as_ref(),
            log.as_ref(),
            &http,
            &config,
            request.payload,
        )
        .await
        {
            Ok(summary) => {
                info!(
                    sent = summary.sent,
                    total = summary.total,
                    failed = summary.errors.len(),
                    "Email dispatch finished"
                );
                let response = SuccessResponse::new(request.id, summary);
                let _ = client
                    .publish(reply, serde_json::to_vec(&response)?.into())
                    .await;
            }
            Err(e) => {
                error!("Email dispatch rejected: {}", e);
                let error = ErrorResponse::new(request.id, e.code(), e.to_string());
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
            }
        }
    }

    Ok(())
}

/// Resolve template and recipients, then dispatch in rate-limited batches.
async fn process_send(
    pool: &PgPool,
    sender: &dyn EmailSender,
    log: &dyn DeliveryLog,
    http: &reqwest::Client,
    config: &Config,
    payload: SendEmailRequest,
) -> Result<SendEmailResponse, SendRequestError> {
    // Template or inline content — fail fast before touching recipients
    let (subject, content, header_image, template_name) = match &payload.template_name {
        Some(name) => {
            let template = queries::template::get_active_template(pool, name)
                .await
                .map_err(SendRequestError::Database)?
                .ok_or_else(|| SendRequestError::TemplateNotFound(name.clone()))?;
            (
                template.subject,
                template.content,
                template.header_image,
                Some(template.name),
            )
        }
        None => {
            let subject = payload
                .subject
                .clone()
                .filter(|s| !s.trim().is_empty())
                .ok_or_else(|| {
                    SendRequestError::Invalid("subject is required without templateName".into())
                })?;
            let content = payload
                .content
                .clone()
                .filter(|c| !c.trim().is_empty())
                .ok_or_else(|| {
                    SendRequestError::Invalid("content is required without templateName".into())
                })?;
            (subject, content, None, None)
        }
    };

    // Recipient reference
    let source = match (&payload.recipients, &payload.recipient_group) {
        (Some(list), _) if !list.is_empty() => RecipientSource::Explicit(list.clone()),
        (_, Some(reference)) => RecipientSource::parse(reference).ok_or_else(|| {
            SendRequestError::Invalid(format!("unknown recipient reference '{reference}'"))
        })?,
        _ => {
            return Err(SendRequestError::Invalid(
                "recipients or recipientGroup is required".into(),
            ))
        }
    };

    let resolved = recipients::resolve_recipients(pool, &source)
        .await
        .map_err(|e| match e {
            RecipientError::SourceNotAllowed(name) => SendRequestError::SourceNotAllowed(name),
            RecipientError::NoRecipients => SendRequestError::NoRecipients,
            RecipientError::Database(e) => SendRequestError::Database(e.into()),
        })?;

    let shell = ShellOptions {
        header_image,
        suppress_unsubscribe: payload.suppress_unsubscribe,
    };
    let request_vars = payload.variables.clone().unwrap_or_default();
    let unsubscribe_base = config.unsubscribe_base_url.clone();

    let render = |recipient: &Recipient| -> RenderedEmail {
        let vars = recipient_variables(recipient, &request_vars);
        let subject = variables::resolve(&subject, &vars);
        let body = variables::resolve(&content, &vars);

        let html = markup::render_email(&body, &shell);
        let html = dispatcher::substitute_unsubscribe_url(&html, &unsubscribe_base, &recipient.email);
        let text = markup::render_plain_text(&body);

        RenderedEmail { subject, html, text }
    };

    let opts = DispatchOptions {
        batch_size: config.email_batch_size,
        batch_delay: Duration::from_millis(config.email_batch_delay_ms),
        template_name,
        source_label: source.label(),
        cancel: dispatcher::deadline_token(
            config.email_dispatch_timeout_ms.map(Duration::from_millis),
        ),
    };

    let attachments = payload.attachments.unwrap_or_default();
    let report =
        dispatcher::dispatch(&resolved, render, &attachments, sender, log, http, &opts).await;

    Ok(SendEmailResponse {
        sent: report.sent,
        total: report.total,
        errors: report.errors,
        not_attempted: report.not_attempted,
    })
}

/// Built-in per-recipient variables, overridable by the request map.
fn recipient_variables(
    recipient: &Recipient,
    request_vars: &HashMap<String, String>,
) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    vars.insert(
        "NAMN".to_string(),
        recipient.name.clone().unwrap_or_default(),
    );
    vars.insert("EPOST".to_string(), recipient.email.clone());
    for (key, value) in request_vars {
        vars.insert(key.clone(), value.clone());
    }
    vars
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_variables_cover_name_and_email() {
        let recipient = Recipient::new("anna@example.com", Some("Anna".into()));
        let vars = recipient_variables(&recipient, &HashMap::new());
        assert_eq!(vars.get("NAMN").map(String::as_str), Some("Anna"));
        assert_eq!(vars.get("EPOST").map(String::as_str), Some("anna@example.com"));
    }

    #[test]
    fn missing_name_becomes_empty_variable() {
        let recipient = Recipient::new("anna@example.com", None);
        let vars = recipient_variables(&recipient, &HashMap::new());
        assert_eq!(vars.get("NAMN").map(String::as_str), Some(""));
    }

    #[test]
    fn request_variables_override_builtins() {
        let recipient = Recipient::new("anna@example.com", Some("Anna".into()));
        let mut request_vars = HashMap::new();
        request_vars.insert("NAMN".to_string(), "Fru Svensson".to_string());
        request_vars.insert("KURS".to_string(), "Keramik".to_string());

        let vars = recipient_variables(&recipient, &request_vars);
        assert_eq!(vars.get("NAMN").map(String::as_str), Some("Fru Svensson"));
        assert_eq!(vars.get("KURS").map(String::as_str), Some("Keramik"));
    }

    #[test]
    fn error_codes_match_taxonomy() {
        assert_eq!(
            SendRequestError::TemplateNotFound("x".into()).code(),
            "TEMPLATE_NOT_FOUND"
        );
        assert_eq!(
            SendRequestError::SourceNotAllowed("x".into()).code(),
            "SOURCE_NOT_ALLOWED"
        );
        assert_eq!(SendRequestError::NoRecipients.code(), "NO_RECIPIENTS");
        assert_eq!(SendRequestError::Invalid("x".into()).code(), "INVALID_REQUEST");
    }
}
