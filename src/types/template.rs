//! Email template types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Named, reusable subject + markup pair used to generate outgoing email.
///
/// Templates are soft-deleted via the `active` flag so past sends that
/// referenced them by name stay reproducible from the delivery log.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct EmailTemplate {
    pub id: Uuid,
    pub name: String,

    /// Subject line, may contain placeholders
    pub subject: String,
    /// Body in the line-oriented markup dialect (H1:/H2:/paragraphs)
    pub content: String,

    pub header_image: Option<String>,
    pub description: Option<String>,

    pub active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
