//! NATS message handlers

pub mod email;
pub mod ping;
pub mod ticket;

use std::sync::Arc;

use anyhow::Result;
use async_nats::Client;
use sqlx::PgPool;
use tokio::select;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::services::delivery_log::{DeliveryLog, PgDeliveryLog};
use crate::services::email_sender::{EmailSender, LogEmailSender, ResendEmailSender};

/// Start all message handlers
pub async fn start_handlers(client: Client, pool: PgPool, config: &Config) -> Result<()> {
    info!("Starting message handlers...");

    // Shared email transport — live provider when configured, log otherwise
    let sender: Arc<dyn EmailSender> = match &config.resend_api_key {
        Some(api_key) => Arc::new(ResendEmailSender::new(
            api_key.clone(),
            config.email_from_address.clone(),
        )),
        None => {
            warn!("RESEND_API_KEY not set — emails will be logged, not sent");
            Arc::new(LogEmailSender)
        }
    };

    let delivery_log: Arc<dyn DeliveryLog> = Arc::new(PgDeliveryLog::new(pool.clone()));
    let http = reqwest::Client::new();

    // Subjects
    let ping_sub = client.subscribe("utskick.ping").await?;
    let email_send_sub = client.subscribe("utskick.email.send").await?;
    let resend_ticket_sub = client.subscribe("utskick.email.resend_ticket").await?;

    info!("Subscribed to NATS subjects");

    // Clone for each handler
    let client_ping = client.clone();
    let client_email_send = client.clone();
    let client_resend_ticket = client.clone();

    let pool_email_send = pool.clone();
    let pool_resend_ticket = pool.clone();

    let sender_email_send = Arc::clone(&sender);
    let sender_resend_ticket = Arc::clone(&sender);

    let log_email_send = Arc::clone(&delivery_log);
    let log_resend_ticket = Arc::clone(&delivery_log);

    let config_email_send = config.clone();
    let config_resend_ticket = config.clone();

    let ping_handle = tokio::spawn(async move { ping::handle_ping(client_ping, ping_sub).await });

    let email_send_handle = tokio::spawn(async move {
        email::handle_send(
            client_email_send,
            email_send_sub,
            pool_email_send,
            sender_email_send,
            log_email_send,
            http,
            config_email_send,
        )
        .await
    });

    let resend_ticket_handle = tokio::spawn(async move {
        ticket::handle_resend_ticket(
            client_resend_ticket,
            resend_ticket_sub,
            pool_resend_ticket,
            sender_resend_ticket,
            log_resend_ticket,
            config_resend_ticket,
        )
        .await
    });

    info!("All handlers started");

    // Wait for any handler to finish (they should run forever)
    select! {
        result = ping_handle => {
            error!("Ping handler finished: {:?}", result);
        }
        result = email_send_handle => {
            error!("Email send handler finished: {:?}", result);
        }
        result = resend_ticket_handle => {
            error!("Resend ticket handler finished: {:?}", result);
        }
    }

    Ok(())
}
