//! Configuration management

use anyhow::{Context, Result};

use crate::defaults;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// NATS server URL
    pub nats_url: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Resend API key (optional — when absent, emails are logged instead of sent)
    pub resend_api_key: Option<String>,

    /// Sender address for all outgoing mail
    pub email_from_address: String,

    /// Base URL for per-recipient unsubscribe links
    pub unsubscribe_base_url: String,

    /// Number of sends dispatched concurrently per batch
    pub email_batch_size: usize,

    /// Delay between consecutive batches, in milliseconds
    pub email_batch_delay_ms: u64,

    /// Overall dispatch deadline in milliseconds; when set, a run that
    /// exceeds it is cancelled at the next batch boundary
    pub email_dispatch_timeout_ms: Option<u64>,

    /// Maximum resends allowed per ticket order
    pub max_ticket_resends: i32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let nats_url =
            std::env::var("NATS_URL").unwrap_or_else(|_| "nats://localhost:4222".to_string());

        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

        let resend_api_key = std::env::var("RESEND_API_KEY").ok().filter(|k| !k.is_empty());

        let email_from_address = std::env::var("EMAIL_FROM_ADDRESS")
            .unwrap_or_else(|_| "noreply@utskick.se".to_string());

        let unsubscribe_base_url = std::env::var("UNSUBSCRIBE_BASE_URL")
            .unwrap_or_else(|_| "https://utskick.se/avregistrera".to_string());

        let email_batch_size = match std::env::var("EMAIL_BATCH_SIZE") {
            Ok(v) => v
                .parse::<usize>()
                .context("EMAIL_BATCH_SIZE must be a positive integer")?,
            Err(_) => defaults::DEFAULT_BATCH_SIZE,
        };
        if email_batch_size == 0 {
            anyhow::bail!("EMAIL_BATCH_SIZE must be at least 1");
        }

        let email_batch_delay_ms = match std::env::var("EMAIL_BATCH_DELAY_MS") {
            Ok(v) => v
                .parse::<u64>()
                .context("EMAIL_BATCH_DELAY_MS must be a non-negative integer")?,
            Err(_) => defaults::DEFAULT_BATCH_DELAY_MS,
        };

        let email_dispatch_timeout_ms = match std::env::var("EMAIL_DISPATCH_TIMEOUT_MS") {
            Ok(v) => Some(
                v.parse::<u64>()
                    .context("EMAIL_DISPATCH_TIMEOUT_MS must be a non-negative integer")?,
            ),
            Err(_) => None,
        };

        let max_ticket_resends = match std::env::var("MAX_TICKET_RESENDS") {
            Ok(v) => v
                .parse::<i32>()
                .context("MAX_TICKET_RESENDS must be a non-negative integer")?,
            Err(_) => defaults::DEFAULT_MAX_TICKET_RESENDS,
        };

        Ok(Self {
            nats_url,
            database_url,
            resend_api_key,
            email_from_address,
            unsubscribe_base_url,
            email_batch_size,
            email_batch_delay_ms,
            email_dispatch_timeout_ms,
            max_ticket_resends,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_batch_size_uses_default_when_unset() {
        std::env::remove_var("EMAIL_BATCH_SIZE");
        std::env::set_var("DATABASE_URL", "postgres://test");

        let config = Config::from_env().unwrap();
        assert_eq!(config.email_batch_size, defaults::DEFAULT_BATCH_SIZE);
    }

    #[test]
    #[ignore] // requires --test-threads=1 due to env var race
    fn test_config_dispatch_timeout_from_env() {
        std::env::set_var("EMAIL_DISPATCH_TIMEOUT_MS", "30000");
        std::env::set_var("DATABASE_URL", "postgres://test");

        let config = Config::from_env().unwrap();
        assert_eq!(config.email_dispatch_timeout_ms, Some(30000));

        // Cleanup
        std::env::remove_var("EMAIL_DISPATCH_TIMEOUT_MS");
    }

    #[test]
    #[ignore] // requires --test-threads=1 due to env var race
    fn test_config_batch_size_from_env() {
        std::env::set_var("EMAIL_BATCH_SIZE", "25");
        std::env::set_var("DATABASE_URL", "postgres://test");

        let config = Config::from_env().unwrap();
        assert_eq!(config.email_batch_size, 25);

        // Cleanup
        std::env::remove_var("EMAIL_BATCH_SIZE");
    }

    #[test]
    #[ignore] // requires --test-threads=1 due to env var race
    fn test_config_zero_batch_size_rejected() {
        std::env::set_var("EMAIL_BATCH_SIZE", "0");
        std::env::set_var("DATABASE_URL", "postgres://test");

        assert!(Config::from_env().is_err());

        // Cleanup
        std::env::remove_var("EMAIL_BATCH_SIZE");
    }

    #[test]
    #[ignore] // requires --test-threads=1 due to env var race
    fn test_config_resend_key_none_when_empty() {
        std::env::set_var("RESEND_API_KEY", "");
        std::env::set_var("DATABASE_URL", "postgres://test");

        let config = Config::from_env().unwrap();
        assert!(config.resend_api_key.is_none());

        // Cleanup
        std::env::remove_var("RESEND_API_KEY");
    }
}
