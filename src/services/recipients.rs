//! Recipient reference resolution.
//!
//! Turns an abstract `RecipientSource` into a concrete, de-duplicated,
//! unsubscribe-filtered list of `Recipient`s. Dynamic participant sources
//! are reachable only through the compiled-in allow-list — an unknown name
//! is a configuration error, not a database query.

use std::collections::HashMap;

use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::db::queries;
use crate::types::{EmailContact, Recipient};

/// Abstract recipient selector
#[derive(Debug, Clone, PartialEq)]
pub enum RecipientSource {
    /// Every subscribed contact
    All,
    /// Members of one named group
    Group(Uuid),
    /// An allow-listed dynamic participant source
    Source(String),
    /// Caller-supplied addresses
    Explicit(Vec<String>),
}

impl RecipientSource {
    /// Parse the wire forms `"all"`, `"group:<uuid>"` (or a bare uuid),
    /// and `"source:<name>"`.
    pub fn parse(reference: &str) -> Option<Self> {
        let reference = reference.trim();
        if reference.eq_ignore_ascii_case("all") {
            return Some(Self::All);
        }
        if let Some(id) = reference.strip_prefix("group:") {
            return Uuid::parse_str(id.trim()).ok().map(Self::Group);
        }
        if let Some(name) = reference.strip_prefix("source:") {
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            return Some(Self::Source(name.to_string()));
        }
        Uuid::parse_str(reference).ok().map(Self::Group)
    }

    /// Label stored in delivery records
    pub fn label(&self) -> String {
        match self {
            Self::All => "all".to_string(),
            Self::Group(id) => format!("group:{id}"),
            Self::Source(name) => format!("source:{name}"),
            Self::Explicit(addrs) => format!("explicit:{}", addrs.len()),
        }
    }
}

#[derive(Debug, Error)]
pub enum RecipientError {
    #[error("recipient source '{0}' is not allow-listed")]
    SourceNotAllowed(String),

    #[error("no recipients resolved")]
    NoRecipients,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Resolve a recipient reference to a de-duplicated, unsubscribe-filtered
/// list. Guarantees no two entries share a normalized email, and returns
/// `NoRecipients` instead of an empty list.
pub async fn resolve_recipients(
    pool: &PgPool,
    source: &RecipientSource,
) -> Result<Vec<Recipient>, RecipientError> {
    let recipients = match source {
        RecipientSource::All => {
            let contacts = queries::contact::list_subscribed(pool).await?;
            dedup(contacts.into_iter().map(contact_to_recipient))
        }
        RecipientSource::Group(group_id) => {
            let contacts = queries::group::list_group_contacts(pool, *group_id).await?;
            dedup(contacts.into_iter().map(contact_to_recipient))
        }
        RecipientSource::Source(name) => {
            let accessor = queries::participant::lookup_source(name)
                .ok_or_else(|| RecipientError::SourceNotAllowed(name.clone()))?;
            let participants = queries::participant::fetch_participants(pool, accessor).await?;

            let candidates: Vec<Recipient> = participants
                .into_iter()
                .map(|p| Recipient::new(normalize_email(&p.email), p.name))
                .collect();
            filter_and_enrich(pool, candidates).await?
        }
        RecipientSource::Explicit(addresses) => {
            let candidates: Vec<Recipient> = addresses
                .iter()
                .map(|a| Recipient::new(normalize_email(a), None))
                .collect();
            filter_and_enrich(pool, candidates).await?
        }
    };

    if recipients.is_empty() {
        return Err(RecipientError::NoRecipients);
    }
    Ok(recipients)
}

/// Match candidate addresses against the contact store: recover names where
/// a contact exists and drop candidates whose contact has unsubscribed.
async fn filter_and_enrich(
    pool: &PgPool,
    candidates: Vec<Recipient>,
) -> Result<Vec<Recipient>, RecipientError> {
    let emails: Vec<String> = candidates.iter().map(|r| r.email.clone()).collect();
    let known = queries::contact::find_by_emails(pool, &emails).await?;

    Ok(filter_and_enrich_with(candidates, &known))
}

/// Store-independent part of `filter_and_enrich`: candidates whose contact
/// has unsubscribed are dropped, even when explicitly selected; candidates
/// unknown to the store are kept with only their address.
fn filter_and_enrich_with(candidates: Vec<Recipient>, known: &[EmailContact]) -> Vec<Recipient> {
    let by_email: HashMap<String, &EmailContact> =
        known.iter().map(|c| (c.email.clone(), c)).collect();

    let enriched = candidates.into_iter().filter_map(|candidate| {
        match by_email.get(&candidate.email) {
            Some(contact) if contact.unsubscribed => None,
            Some(contact) => Some(Recipient::new(
                candidate.email,
                candidate.name.or_else(|| contact.name.clone()),
            )),
            None => Some(candidate),
        }
    });

    dedup(enriched)
}

/// Trim and lowercase — the store keys contacts by this form.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// De-duplicate by normalized email, preserving first-seen order with
/// last-write-wins on the name.
fn dedup(entries: impl IntoIterator<Item = Recipient>) -> Vec<Recipient> {
    let mut order: Vec<String> = Vec::new();
    let mut by_email: HashMap<String, Recipient> = HashMap::new();

    for entry in entries {
        let email = normalize_email(&entry.email);
        if email.is_empty() {
            continue;
        }
        match by_email.get_mut(&email) {
            Some(existing) => {
                if entry.name.is_some() {
                    existing.name = entry.name;
                }
            }
            None => {
                order.push(email.clone());
                by_email.insert(email.clone(), Recipient::new(email, entry.name));
            }
        }
    }

    order
        .into_iter()
        .filter_map(|email| by_email.remove(&email))
        .collect()
}

fn contact_to_recipient(contact: EmailContact) -> Recipient {
    Recipient::new(normalize_email(&contact.email), contact.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn contact(email: &str, name: Option<&str>, unsubscribed: bool) -> EmailContact {
        EmailContact {
            id: Uuid::new_v4(),
            email: email.to_string(),
            name: name.map(String::from),
            phone: None,
            source: "manual".to_string(),
            unsubscribed,
            metadata: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn unsubscribed_contact_is_dropped_even_when_explicitly_selected() {
        let candidates = vec![
            Recipient::new("anna@example.com", None),
            Recipient::new("bo@example.com", None),
        ];
        let known = vec![contact("anna@example.com", Some("Anna"), true)];

        let out = filter_and_enrich_with(candidates, &known);

        let emails: Vec<&str> = out.iter().map(|r| r.email.as_str()).collect();
        assert_eq!(emails, vec!["bo@example.com"]);
    }

    #[test]
    fn known_contact_name_is_recovered() {
        let candidates = vec![Recipient::new("anna@example.com", None)];
        let known = vec![contact("anna@example.com", Some("Anna"), false)];

        let out = filter_and_enrich_with(candidates, &known);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name.as_deref(), Some("Anna"));
    }

    #[test]
    fn candidate_name_takes_precedence_over_store_name() {
        let candidates = vec![Recipient::new("anna@example.com", Some("Anna B".into()))];
        let known = vec![contact("anna@example.com", Some("Anna"), false)];

        let out = filter_and_enrich_with(candidates, &known);

        assert_eq!(out[0].name.as_deref(), Some("Anna B"));
    }

    #[test]
    fn unknown_candidate_is_kept_with_address_only() {
        let candidates = vec![Recipient::new("ny@example.com", None)];

        let out = filter_and_enrich_with(candidates, &[]);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].email, "ny@example.com");
        assert!(out[0].name.is_none());
    }

    #[test]
    fn parse_all_reference() {
        assert_eq!(RecipientSource::parse("all"), Some(RecipientSource::All));
        assert_eq!(RecipientSource::parse("ALL"), Some(RecipientSource::All));
    }

    #[test]
    fn parse_group_reference() {
        let id = Uuid::new_v4();
        assert_eq!(
            RecipientSource::parse(&format!("group:{id}")),
            Some(RecipientSource::Group(id))
        );
        // bare uuid is accepted as a group id
        assert_eq!(
            RecipientSource::parse(&id.to_string()),
            Some(RecipientSource::Group(id))
        );
    }

    #[test]
    fn parse_source_reference() {
        assert_eq!(
            RecipientSource::parse("source:course_bookings"),
            Some(RecipientSource::Source("course_bookings".to_string()))
        );
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(RecipientSource::parse("group:not-a-uuid"), None);
        assert_eq!(RecipientSource::parse("source:"), None);
        assert_eq!(RecipientSource::parse("whatever"), None);
    }

    #[test]
    fn normalize_trims_and_lowercases() {
        assert_eq!(normalize_email("  Anna@Example.COM "), "anna@example.com");
    }

    #[test]
    fn dedup_collapses_case_variants_to_one_entry() {
        let out = dedup(vec![
            Recipient::new("anna@example.com", Some("Anna".into())),
            Recipient::new("ANNA@example.com", None),
            Recipient::new("Anna@Example.com", Some("Anna B".into())),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].email, "anna@example.com");
        // last-write-wins on name
        assert_eq!(out[0].name.as_deref(), Some("Anna B"));
    }

    #[test]
    fn dedup_preserves_first_seen_order() {
        let out = dedup(vec![
            Recipient::new("c@example.com", None),
            Recipient::new("a@example.com", None),
            Recipient::new("C@example.com", None),
            Recipient::new("b@example.com", None),
        ]);
        let emails: Vec<&str> = out.iter().map(|r| r.email.as_str()).collect();
        assert_eq!(emails, vec!["c@example.com", "a@example.com", "b@example.com"]);
    }

    #[test]
    fn dedup_does_not_overwrite_name_with_none() {
        let out = dedup(vec![
            Recipient::new("anna@example.com", Some("Anna".into())),
            Recipient::new("anna@example.com", None),
        ]);
        assert_eq!(out[0].name.as_deref(), Some("Anna"));
    }

    #[test]
    fn source_labels() {
        assert_eq!(RecipientSource::All.label(), "all");
        assert_eq!(
            RecipientSource::Source("course_bookings".into()).label(),
            "source:course_bookings"
        );
    }
}
