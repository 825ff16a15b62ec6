//! Email template queries

use anyhow::Result;
use sqlx::PgPool;
use tracing::warn;

use crate::types::EmailTemplate;

/// Look up a template by exact name with `active = true`.
///
/// Multiple active templates sharing a name is a data error; the lookup
/// fails closed and reports not-found instead of guessing.
pub async fn get_active_template(pool: &PgPool, name: &str) -> Result<Option<EmailTemplate>> {
    let matches = sqlx::query_as::<_, EmailTemplate>(
        r#"
        SELECT
            id, name, subject, content, header_image, description,
            active, created_at, updated_at
        FROM email_templates
        WHERE name = $1 AND active = TRUE
        "#,
    )
    .bind(name)
    .fetch_all(pool)
    .await?;

    match matches.len() {
        0 => Ok(None),
        1 => Ok(matches.into_iter().next()),
        n => {
            warn!(
                "Found {} active templates named '{}' — treating as not found",
                n, name
            );
            Ok(None)
        }
    }
}
