//! Delivery record and dispatch report types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Outcome of one send attempt
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Sent,
    Failed,
}

impl DeliveryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

/// One attempted send, as handed to the delivery log.
///
/// `html` is the exact content given to the transport (after per-recipient
/// personalization and unsubscribe-URL substitution), so past sends are
/// reproducible from the log even if the source template changes later.
#[derive(Debug, Clone)]
pub struct DeliveryAttempt {
    pub recipient_email: String,
    pub recipient_name: Option<String>,
    pub subject: String,
    pub html: String,
    pub template_name: Option<String>,
    pub source_label: String,
    pub outcome: DeliveryOutcome,
    pub provider_message_id: Option<String>,
    pub error: Option<String>,
}

/// Append-only audit row persisted in `email_log`
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryRecord {
    pub id: Uuid,
    pub recipient_email: String,
    pub recipient_name: Option<String>,
    pub subject: String,
    pub html: String,
    pub template_name: Option<String>,
    pub source_label: String,
    pub outcome: String,
    pub provider_message_id: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A single per-recipient failure in a dispatch run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SendFailure {
    pub recipient: String,
    pub reason: String,
}

/// Aggregate result of one dispatch run.
///
/// `total` is the resolved recipient count regardless of outcome;
/// `not_attempted` lists recipients skipped because the run was cancelled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchReport {
    pub sent: usize,
    pub total: usize,
    pub errors: Vec<SendFailure>,
    pub not_attempted: Vec<String>,
}
