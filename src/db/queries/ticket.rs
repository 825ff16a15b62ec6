//! Ticket order queries

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::TicketOrder;

/// Get a ticket order by id
pub async fn get_order(pool: &PgPool, id: Uuid) -> Result<Option<TicketOrder>> {
    let order = sqlx::query_as::<_, TicketOrder>(
        r#"
        SELECT
            id, buyer_email, buyer_name, event_name, event_date,
            ticket_code, resend_count, created_at
        FROM ticket_orders
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(order)
}

/// Increment the resend counter and insert the audit row in one
/// transaction. The update is cap-guarded in SQL so two workers racing past
/// the pre-send check can not push the counter beyond the cap; `None` means
/// the counter was already at the cap. Returns the new counter value.
pub async fn record_resend(
    pool: &PgPool,
    order_id: Uuid,
    actor_id: Option<Uuid>,
    max_resends: i32,
) -> Result<Option<i32>> {
    let mut tx = pool.begin().await?;

    let row: Option<(i32,)> = sqlx::query_as(
        "UPDATE ticket_orders SET resend_count = resend_count + 1 \
         WHERE id = $1 AND resend_count < $2 RETURNING resend_count",
    )
    .bind(order_id)
    .bind(max_resends)
    .fetch_optional(&mut *tx)
    .await?;

    let Some((new_count,)) = row else {
        tx.rollback().await?;
        return Ok(None);
    };

    sqlx::query(
        "INSERT INTO ticket_resend_audit (id, order_id, actor_id, created_at) VALUES ($1, $2, $3, NOW())",
    )
    .bind(Uuid::new_v4())
    .bind(order_id)
    .bind(actor_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(Some(new_count))
}
