#![allow(dead_code)]
//! Contact queries

use anyhow::Result;
use sqlx::PgPool;

use crate::types::{ContactSource, EmailContact};

const CONTACT_COLUMNS: &str = "id, email, name, phone, source, unsubscribed, metadata, \
                               created_at, updated_at";

/// Every contact that has not unsubscribed
pub async fn list_subscribed(pool: &PgPool) -> Result<Vec<EmailContact>, sqlx::Error> {
    sqlx::query_as::<_, EmailContact>(&format!(
        "SELECT {CONTACT_COLUMNS} FROM email_contacts WHERE unsubscribed = FALSE ORDER BY created_at"
    ))
    .fetch_all(pool)
    .await
}

/// Contacts matching any of the given normalized addresses, including
/// unsubscribed ones — callers use the flag to filter.
pub async fn find_by_emails(
    pool: &PgPool,
    emails: &[String],
) -> Result<Vec<EmailContact>, sqlx::Error> {
    if emails.is_empty() {
        return Ok(vec![]);
    }

    sqlx::query_as::<_, EmailContact>(&format!(
        "SELECT {CONTACT_COLUMNS} FROM email_contacts WHERE email = ANY($1)"
    ))
    .bind(emails)
    .fetch_all(pool)
    .await
}

/// Get a contact by id
pub async fn get_contact(pool: &PgPool, id: uuid::Uuid) -> Result<Option<EmailContact>> {
    let contact = sqlx::query_as::<_, EmailContact>(&format!(
        "SELECT {CONTACT_COLUMNS} FROM email_contacts WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(contact)
}

/// Subscribed contacts carrying one origin tag
pub async fn list_by_source(
    pool: &PgPool,
    source: ContactSource,
) -> Result<Vec<EmailContact>, sqlx::Error> {
    sqlx::query_as::<_, EmailContact>(&format!(
        "SELECT {CONTACT_COLUMNS} FROM email_contacts \
         WHERE source = $1 AND unsubscribed = FALSE ORDER BY created_at"
    ))
    .bind(source.as_str())
    .fetch_all(pool)
    .await
}
