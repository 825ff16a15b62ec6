//! Dynamic participant source queries.
//!
//! Each source maps a public name to a fixed table and columns. Only names
//! present in the compiled-in allow-list can be queried; the query text is
//! assembled exclusively from these static strings, never from caller input.

use sqlx::PgPool;

use crate::types::Participant;

/// Typed accessor for one allow-listed participant source
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceAccessor {
    pub name: &'static str,
    table: &'static str,
    email_column: &'static str,
    name_column: Option<&'static str>,
}

const ALLOWED_SOURCES: &[SourceAccessor] = &[
    SourceAccessor {
        name: "course_bookings",
        table: "course_bookings",
        email_column: "participant_email",
        name_column: Some("participant_name"),
    },
    SourceAccessor {
        name: "interest_signups",
        table: "interest_signups",
        email_column: "email",
        name_column: None,
    },
    SourceAccessor {
        name: "ticket_buyers",
        table: "ticket_orders",
        email_column: "buyer_email",
        name_column: Some("buyer_name"),
    },
];

/// Look up a source name in the allow-list.
pub fn lookup_source(name: &str) -> Option<&'static SourceAccessor> {
    ALLOWED_SOURCES.iter().find(|s| s.name == name)
}

/// Fetch all participants of an allow-listed source.
pub async fn fetch_participants(
    pool: &PgPool,
    accessor: &SourceAccessor,
) -> Result<Vec<Participant>, sqlx::Error> {
    // Static identifiers only; the accessor came from ALLOWED_SOURCES
    let query = match accessor.name_column {
        Some(name_column) => format!(
            "SELECT {email} AS email, {name} AS name FROM {table} WHERE {email} IS NOT NULL",
            email = accessor.email_column,
            name = name_column,
            table = accessor.table,
        ),
        None => format!(
            "SELECT {email} AS email, NULL::text AS name FROM {table} WHERE {email} IS NOT NULL",
            email = accessor.email_column,
            table = accessor.table,
        ),
    };

    sqlx::query_as::<_, Participant>(&query).fetch_all(pool).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_sources_are_allow_listed() {
        assert!(lookup_source("course_bookings").is_some());
        assert!(lookup_source("interest_signups").is_some());
        assert!(lookup_source("ticket_buyers").is_some());
    }

    #[test]
    fn unknown_source_is_rejected() {
        assert!(lookup_source("unknown_table").is_none());
        // a free-form identifier must never reach the query builder
        assert!(lookup_source("email_contacts; DROP TABLE email_contacts").is_none());
    }
}
