#![allow(dead_code)]
//! Recipient group queries

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::{EmailContact, EmailGroup};

/// Get a group by id
pub async fn get_group(pool: &PgPool, id: Uuid) -> Result<Option<EmailGroup>> {
    let group = sqlx::query_as::<_, EmailGroup>(
        "SELECT id, name, description, active, created_at FROM email_groups WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(group)
}

/// Subscribed contacts belonging to one group
pub async fn list_group_contacts(
    pool: &PgPool,
    group_id: Uuid,
) -> Result<Vec<EmailContact>, sqlx::Error> {
    sqlx::query_as::<_, EmailContact>(
        r#"
        SELECT
            c.id, c.email, c.name, c.phone, c.source, c.unsubscribed,
            c.metadata, c.created_at, c.updated_at
        FROM email_contacts c
        JOIN email_group_members m ON m.contact_id = c.id
        WHERE m.group_id = $1 AND c.unsubscribed = FALSE
        ORDER BY c.created_at
        "#,
    )
    .bind(group_id)
    .fetch_all(pool)
    .await
}

/// Add a contact to a group. Idempotent: re-adding an existing pair is a
/// no-op, not an error. Returns whether a new membership row was created.
pub async fn add_group_member(pool: &PgPool, group_id: Uuid, contact_id: Uuid) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO email_group_members (group_id, contact_id)
        VALUES ($1, $2)
        ON CONFLICT (group_id, contact_id) DO NOTHING
        "#,
    )
    .bind(group_id)
    .bind(contact_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}
