//! Ticket order types (transactional resends)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Purchase entity whose confirmation email can be re-issued, capped by
/// `resend_count`
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TicketOrder {
    pub id: Uuid,
    pub buyer_email: String,
    pub buyer_name: Option<String>,
    pub event_name: String,
    pub event_date: Option<DateTime<Utc>>,
    pub ticket_code: String,
    pub resend_count: i32,
    pub created_at: DateTime<Utc>,
}

/// Payload of `utskick.email.resend_ticket`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResendTicketRequest {
    pub order_id: Uuid,
}

/// Response payload of `utskick.email.resend_ticket`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResendTicketResponse {
    pub resend_count: i32,
}
