/// Sends dispatched concurrently per batch.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Pause between consecutive batches (provider rate limit headroom).
pub const DEFAULT_BATCH_DELAY_MS: u64 = 1000;

/// Resend ceiling for a single ticket order.
pub const DEFAULT_MAX_TICKET_RESENDS: i32 = 5;

/// Footer token substituted with a per-recipient unsubscribe URL.
pub const UNSUBSCRIBE_URL_TOKEN: &str = "{UNSUBSCRIBE_URL}";
