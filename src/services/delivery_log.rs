//! Append-only delivery logging.
//!
//! One record per attempted send, success or failure. Logging is
//! fire-and-forget: a failed append is reported to the operational log and
//! never affects the send result.

use std::sync::Mutex;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::error;

use crate::db::queries;
use crate::types::DeliveryAttempt;

/// Sink for delivery records.
#[async_trait]
pub trait DeliveryLog: Send + Sync {
    async fn record(&self, attempt: DeliveryAttempt);
}

// =============================================================================
// PgDeliveryLog — appends to the email_log table
// =============================================================================

pub struct PgDeliveryLog {
    pool: PgPool,
}

impl PgDeliveryLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeliveryLog for PgDeliveryLog {
    async fn record(&self, attempt: DeliveryAttempt) {
        if let Err(e) = queries::delivery_log::insert_record(&self.pool, &attempt).await {
            error!(
                recipient = %attempt.recipient_email,
                "Failed to append delivery record: {}",
                e
            );
        }
    }
}

// =============================================================================
// MemoryDeliveryLog — collects records in memory (tests)
// =============================================================================

#[derive(Default)]
pub struct MemoryDeliveryLog {
    pub records: Mutex<Vec<DeliveryAttempt>>,
}

impl MemoryDeliveryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<DeliveryAttempt> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryLog for MemoryDeliveryLog {
    async fn record(&self, attempt: DeliveryAttempt) {
        self.records.lock().unwrap().push(attempt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DeliveryOutcome;

    #[tokio::test]
    async fn memory_log_collects_attempts() {
        let log = MemoryDeliveryLog::new();
        log.record(DeliveryAttempt {
            recipient_email: "user@example.com".into(),
            recipient_name: Some("Anna".into()),
            subject: "Hej".into(),
            html: "<p>Hej</p>".into(),
            template_name: None,
            source_label: "all".into(),
            outcome: DeliveryOutcome::Sent,
            provider_message_id: Some("abc".into()),
            error: None,
        })
        .await;

        let records = log.recorded();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].outcome, DeliveryOutcome::Sent);
    }
}
