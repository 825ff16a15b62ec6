//! Transactional ticket-confirmation resend handler

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use sqlx::PgPool;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::db::queries;
use crate::services::delivery_log::DeliveryLog;
use crate::services::email_sender::{EmailMessage, EmailSender};
use crate::services::markup::{self, ShellOptions};
use crate::services::resend_guard::{ResendDecision, ResendGuard};
use crate::services::variables;
use crate::types::{
    DeliveryAttempt, DeliveryOutcome, ErrorResponse, Request, ResendTicketRequest,
    ResendTicketResponse, SuccessResponse, TicketOrder,
};

/// Template used to re-render a ticket confirmation
const TICKET_TEMPLATE_NAME: &str = "Biljettbekräftelse";

/// Handle email.resend_ticket messages
pub async fn handle_resend_ticket(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    sender: Arc<dyn EmailSender>,
    log: Arc<dyn DeliveryLog>,
    config: Config,
) -> Result<()> {
    let guard = ResendGuard::new(pool.clone(), config.max_ticket_resends);

    while let Some(msg) = subscriber.next().await {
        debug!("Received email.resend_ticket message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<ResendTicketRequest> = match serde_json::from_slice(&msg.payload) {
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

        let order_id = request.payload.order_id;

        let order = match queries::ticket::get_order(&pool, order_id).await {
            Ok(Some(order)) => order,
            Ok(None) => {
                let error = ErrorResponse::new(request.id, "NOT_FOUND", "Ticket order not found");
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
                continue;
            }
            Err(e) => {
                error!("Failed to load ticket order {}: {}", order_id, e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
                continue;
            }
        };

        // Cap check before any send is attempted
        if let ResendDecision::LimitReached { count } = guard.check(order.resend_count) {
            info!(
                "Resend refused for order {} — counter at {}",
                order_id, count
            );
            let error = ErrorResponse::new(
                request.id,
                "RESEND_LIMIT_REACHED",
                format!("Maximum of {} resends reached", config.max_ticket_resends),
            );
            let _ = client
                .publish(reply, serde_json::to_vec(&error)?.into())
                .await;
            continue;
        }

        match resend_confirmation(&pool, sender.as_ref(), log.as_ref(), &guard, &order, &request)
            .await
        {
            Ok(resend_count) => {
                let response =
                    SuccessResponse::new(request.id, ResendTicketResponse { resend_count });
                let _ = client
                    .publish(reply, serde_json::to_vec(&response)?.into())
                    .await;
                debug!("Resent confirmation for order {}", order_id);
            }
            Err((code, message)) => {
                error!("Resend failed for order {}: {}", order_id, message);
                let error = ErrorResponse::new(request.id, code, message);
                let _ = client
                    .publish(reply, serde_json::to_vec(&error)?.into())
                    .await;
            }
        }
    }

    Ok(())
}

/// Render and send one confirmation, then commit the counter and audit row.
async fn resend_confirmation(
    pool: &PgPool,
    sender: &dyn EmailSender,
    log: &dyn DeliveryLog,
    guard: &ResendGuard,
    order: &TicketOrder,
    request: &Request<ResendTicketRequest>,
) -> Result<i32, (&'static str, String)> {
    let template = match queries::template::get_active_template(pool, TICKET_TEMPLATE_NAME).await {
        Ok(Some(template)) => template,
        Ok(None) => {
            return Err((
                "TEMPLATE_NOT_FOUND",
                format!("template '{TICKET_TEMPLATE_NAME}' not found"),
            ))
        }
        Err(e) => return Err(("DATABASE_ERROR", e.to_string())),
    };

    let vars = order_variables(order);
    let subject = variables::resolve(&template.subject, &vars);
    let body = variables::resolve(&template.content, &vars);

    // Transactional mail carries no unsubscribe link
    let shell = ShellOptions {
        header_image: template.header_image.clone(),
        suppress_unsubscribe: true,
    };
    let html = markup::render_email(&body, &shell);
    let text = markup::render_plain_text(&body);

    let result = sender
        .send(EmailMessage {
            to: order.buyer_email.clone(),
            to_name: order.buyer_name.clone(),
            subject: subject.clone(),
            html: html.clone(),
            text,
            attachments: vec![],
        })
        .await;

    let (outcome, message_id, send_error) = match &result {
        Ok(receipt) => (DeliveryOutcome::Sent, receipt.message_id.clone(), None),
        Err(e) => (DeliveryOutcome::Failed, None, Some(e.to_string())),
    };

    log.record(DeliveryAttempt {
        recipient_email: order.buyer_email.clone(),
        recipient_name: order.buyer_name.clone(),
        subject,
        html,
        template_name: Some(TICKET_TEMPLATE_NAME.to_string()),
        source_label: format!("ticket_resend:{}", order.id),
        outcome,
        provider_message_id: message_id,
        error: send_error.clone(),
    })
    .await;

    if let Some(reason) = send_error {
        return Err(("SEND_FAILED", reason));
    }

    // Delivery succeeded — commit counter + audit row together. A failure
    // here is an inconsistency for manual reconciliation, not a retry.
    match guard.commit(order.id, request.user_id).await {
        Ok(committed) => {
            if committed.is_none() {
                error!(
                    "INCONSISTENCY: confirmation for order {} was delivered but the \
                     resend counter was already at the cap",
                    order.id
                );
            }
            Ok(resend_count_after_commit(committed, order.resend_count))
        }
        Err(e) => {
            error!(
                "INCONSISTENCY: confirmation for order {} was delivered but the \
                 resend counter update failed: {}",
                order.id, e
            );
            Ok(resend_count_after_commit(None, order.resend_count))
        }
    }
}

/// Count reported to the caller after a delivery. When the guarded update
/// did not land (cap race or write failure) the best estimate is one past
/// the count observed before sending.
fn resend_count_after_commit(committed: Option<i32>, previous_count: i32) -> i32 {
    committed.unwrap_or(previous_count + 1)
}

fn order_variables(order: &TicketOrder) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    vars.insert(
        "NAMN".to_string(),
        order.buyer_name.clone().unwrap_or_default(),
    );
    vars.insert("EPOST".to_string(), order.buyer_email.clone());
    vars.insert("EVENEMANG".to_string(), order.event_name.clone());
    vars.insert(
        "DATUM".to_string(),
        order
            .event_date
            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default(),
    );
    vars.insert("BILJETTKOD".to_string(), order.ticket_code.clone());
    vars
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn order() -> TicketOrder {
        TicketOrder {
            id: Uuid::new_v4(),
            buyer_email: "anna@example.com".into(),
            buyer_name: Some("Anna".into()),
            event_name: "Vårkonsert".into(),
            event_date: Some(Utc.with_ymd_and_hms(2026, 5, 3, 19, 0, 0).unwrap()),
            ticket_code: "VK-0042".into(),
            resend_count: 2,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn order_variables_cover_template_placeholders() {
        let vars = order_variables(&order());
        assert_eq!(vars.get("NAMN").map(String::as_str), Some("Anna"));
        assert_eq!(vars.get("EVENEMANG").map(String::as_str), Some("Vårkonsert"));
        assert_eq!(vars.get("DATUM").map(String::as_str), Some("2026-05-03 19:00"));
        assert_eq!(vars.get("BILJETTKOD").map(String::as_str), Some("VK-0042"));
    }

    #[test]
    fn committed_count_is_reported_as_is() {
        assert_eq!(resend_count_after_commit(Some(3), 2), 3);
    }

    #[test]
    fn missed_commit_reports_one_past_the_observed_count() {
        assert_eq!(resend_count_after_commit(None, 2), 3);
    }

    #[test]
    fn confirmation_content_resolves_fully() {
        let content = "H1: {EVENEMANG}\n\nHej {NAMN}!\n\nDin biljettkod: {BILJETTKOD}";
        let out = variables::resolve(content, &order_variables(&order()));
        assert!(!out.contains('{'));
        assert!(out.contains("VK-0042"));
    }
}
