//! Dispatch request/response payloads

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::SendFailure;

/// Attachment referenced by URL; fetched per send attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRef {
    pub filename: String,
    pub url: String,
    pub content_type: Option<String>,
}

/// Payload of `utskick.email.send`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailRequest {
    /// Explicit recipient addresses; takes precedence over `recipient_group`
    #[serde(default)]
    pub recipients: Option<Vec<String>>,

    /// Recipient reference: `"all"`, `"group:<uuid>"` (or bare uuid),
    /// or `"source:<name>"`
    #[serde(default)]
    pub recipient_group: Option<String>,

    /// Inline subject; ignored when `template_name` resolves
    #[serde(default)]
    pub subject: Option<String>,

    /// Inline markup content; ignored when `template_name` resolves
    #[serde(default)]
    pub content: Option<String>,

    #[serde(default)]
    pub template_name: Option<String>,

    /// Variables applied to subject and content for every recipient,
    /// merged over the built-in NAMN/EPOST pair
    #[serde(default)]
    pub variables: Option<HashMap<String, String>>,

    #[serde(default)]
    pub attachments: Option<Vec<AttachmentRef>>,

    /// Suppress the unsubscribe footer link (transactional mail)
    #[serde(default)]
    pub suppress_unsubscribe: bool,
}

/// Response payload of `utskick.email.send`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailResponse {
    pub sent: usize,
    pub total: usize,
    pub errors: Vec<SendFailure>,
    pub not_attempted: Vec<String>,
}
