//! Delivery log queries (append-only)

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::DeliveryAttempt;

/// Append one delivery record. Never updated or deleted afterwards.
pub async fn insert_record(pool: &PgPool, attempt: &DeliveryAttempt) -> Result<Uuid> {
    let id = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO email_log (
            id, recipient_email, recipient_name, subject, html,
            template_name, source_label, outcome, provider_message_id,
            error, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW())
        "#,
    )
    .bind(id)
    .bind(&attempt.recipient_email)
    .bind(&attempt.recipient_name)
    .bind(&attempt.subject)
    .bind(&attempt.html)
    .bind(&attempt.template_name)
    .bind(&attempt.source_label)
    .bind(attempt.outcome.as_str())
    .bind(&attempt.provider_message_id)
    .bind(&attempt.error)
    .execute(pool)
    .await?;

    Ok(id)
}
