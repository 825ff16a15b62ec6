//! Contact and recipient types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Where a contact record originated
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ContactSource {
    Manual,
    Course,
    Ticket,
    Interest,
}

impl ContactSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Course => "course",
            Self::Ticket => "ticket",
            Self::Interest => "interest",
        }
    }

}

/// Structured contact metadata.
///
/// The unsubscribe flag is written only by the external unsubscribe flow;
/// this worker reads it and never clears it as a side effect of sending.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactMetadata {
    #[serde(default)]
    pub unsubscribed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Contact entity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct EmailContact {
    pub id: Uuid,

    /// Stored normalized (trimmed, lowercase); unique
    pub email: String,
    pub name: Option<String>,
    pub phone: Option<String>,

    pub source: String,
    pub unsubscribed: bool,
    pub metadata: Option<sqlx::types::Json<ContactMetadata>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A de-duplicated, unsubscribe-filtered recipient ready for dispatch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    /// Normalized address
    pub email: String,
    pub name: Option<String>,
}

impl Recipient {
    pub fn new(email: impl Into<String>, name: Option<String>) -> Self {
        Self {
            email: email.into(),
            name,
        }
    }
}

/// A row returned by a dynamic participant source (course bookings,
/// interest signups). May carry only an address; names are recovered by
/// matching against the contact store where possible.
#[derive(Debug, Clone, FromRow)]
pub struct Participant {
    pub email: String,
    pub name: Option<String>,
}
