//! Resend-cap enforcement for transactional ticket confirmations.
//!
//! The counter check happens before any send is attempted; the counter
//! increment and its audit row are committed together after a successful
//! delivery. A commit failure after delivery is logged for manual
//! reconciliation and never retried, so a retry can not double-increment.

use sqlx::PgPool;
use uuid::Uuid;

use crate::db::queries;

/// Outcome of a resend-cap check
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResendDecision {
    Allowed { count: i32 },
    LimitReached { count: i32 },
}

/// Pure cap decision, kept separate from the store access.
pub fn decide(count: i32, max_resends: i32) -> ResendDecision {
    if count >= max_resends {
        ResendDecision::LimitReached { count }
    } else {
        ResendDecision::Allowed { count }
    }
}

pub struct ResendGuard {
    pool: PgPool,
    max_resends: i32,
}

impl ResendGuard {
    pub fn new(pool: PgPool, max_resends: i32) -> Self {
        Self { pool, max_resends }
    }

    /// Check the order's current counter against the cap. `LimitReached`
    /// means the caller must not attempt delivery.
    pub fn check(&self, current_count: i32) -> ResendDecision {
        decide(current_count, self.max_resends)
    }

    /// Record a performed resend: increment the counter and insert the audit
    /// row (actor, timestamp) in one transaction. The update itself is
    /// cap-guarded; `None` means another writer already reached the cap.
    pub async fn commit(
        &self,
        order_id: Uuid,
        actor_id: Option<Uuid>,
    ) -> anyhow::Result<Option<i32>> {
        queries::ticket::record_resend(&self.pool, order_id, actor_id, self.max_resends).await
    }
}
