//! Rate-limited batch dispatch.
//!
//! Recipients are partitioned into consecutive fixed-size batches; sends
//! within a batch run concurrently, batches run sequentially with an
//! inter-batch delay to stay under the provider rate limit. One failed send
//! never aborts its siblings or later batches; every attempt is recorded in
//! the delivery log.

use std::time::Duration;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::defaults::UNSUBSCRIBE_URL_TOKEN;
use crate::services::delivery_log::DeliveryLog;
use crate::services::email_sender::{EmailAttachment, EmailMessage, EmailSender};
use crate::types::{
    AttachmentRef, DeliveryAttempt, DeliveryOutcome, DispatchReport, Recipient, SendFailure,
};

/// Per-recipient rendered content handed to the transport
#[derive(Debug, Clone)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Dispatch parameters for one run
#[derive(Clone)]
pub struct DispatchOptions {
    pub batch_size: usize,
    pub batch_delay: Duration,
    /// Template the content came from, recorded per attempt
    pub template_name: Option<String>,
    /// Recipient-source label, recorded per attempt
    pub source_label: String,
    /// Checked at each batch boundary; completed outcomes are kept
    pub cancel: CancellationToken,
}

impl DispatchOptions {
    pub fn new(batch_size: usize, batch_delay: Duration) -> Self {
        Self {
            batch_size: batch_size.max(1),
            batch_delay,
            template_name: None,
            source_label: "explicit".to_string(),
            cancel: CancellationToken::new(),
        }
    }
}

/// Send rendered content to every recipient, in order, batch by batch.
///
/// `render` must be pure: it is called once per recipient and may not block.
/// Attachments are fetched independently per attempt; a failed fetch drops
/// only that attachment from that message.
pub async fn dispatch<F>(
    recipients: &[Recipient],
    render: F,
    attachments: &[AttachmentRef],
    sender: &dyn EmailSender,
    log: &dyn DeliveryLog,
    http: &reqwest::Client,
    opts: &DispatchOptions,
) -> DispatchReport
where
    F: Fn(&Recipient) -> RenderedEmail + Sync,
{
    let mut report = DispatchReport {
        total: recipients.len(),
        ..Default::default()
    };

    let batches: Vec<&[Recipient]> = recipients.chunks(opts.batch_size).collect();
    let batch_count = batches.len();

    for (index, batch) in batches.into_iter().enumerate() {
        if opts.cancel.is_cancelled() {
            warn!(
                "Dispatch cancelled after {} of {} batches",
                index, batch_count
            );
            report
                .not_attempted
                .extend(recipients[index * opts.batch_size..].iter().map(|r| r.email.clone()));
            break;
        }

        debug!("Dispatching batch {}/{} ({} recipients)", index + 1, batch_count, batch.len());

        let attempts = batch
            .iter()
            .map(|recipient| attempt_send(recipient, &render, attachments, sender, log, http, opts));
        let outcomes = join_all(attempts).await;

        for outcome in outcomes {
            match outcome {
                Ok(()) => report.sent += 1,
                Err(failure) => report.errors.push(failure),
            }
        }

        // Inter-batch pause, skipped after the last batch
        if index + 1 < batch_count && !opts.batch_delay.is_zero() {
            tokio::time::sleep(opts.batch_delay).await;
        }
    }

    info!(
        sent = report.sent,
        total = report.total,
        failed = report.errors.len(),
        not_attempted = report.not_attempted.len(),
        "Dispatch run complete"
    );

    report
}

/// One isolated send attempt: render, fetch attachments, submit, log.
async fn attempt_send<F>(
    recipient: &Recipient,
    render: &F,
    attachments: &[AttachmentRef],
    sender: &dyn EmailSender,
    log: &dyn DeliveryLog,
    http: &reqwest::Client,
    opts: &DispatchOptions,
) -> Result<(), SendFailure>
where
    F: Fn(&Recipient) -> RenderedEmail + Sync,
{
    let rendered = render(recipient);
    let fetched = fetch_attachments(http, attachments).await;

    let message = EmailMessage {
        to: recipient.email.clone(),
        to_name: recipient.name.clone(),
        subject: rendered.subject.clone(),
        html: rendered.html.clone(),
        text: rendered.text,
        attachments: fetched,
    };

    let result = sender.send(message).await;

    let (outcome, message_id, error) = match &result {
        Ok(receipt) => (DeliveryOutcome::Sent, receipt.message_id.clone(), None),
        Err(e) => (DeliveryOutcome::Failed, None, Some(e.to_string())),
    };

    log.record(DeliveryAttempt {
        recipient_email: recipient.email.clone(),
        recipient_name: recipient.name.clone(),
        subject: rendered.subject,
        html: rendered.html,
        template_name: opts.template_name.clone(),
        source_label: opts.source_label.clone(),
        outcome,
        provider_message_id: message_id,
        error: error.clone(),
    })
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(e) => Err(SendFailure {
            recipient: recipient.email.clone(),
            reason: e.to_string(),
        }),
    }
}

/// Fetch attachment contents by URL. A failed fetch drops only that
/// attachment and never fails the message.
async fn fetch_attachments(
    http: &reqwest::Client,
    refs: &[AttachmentRef],
) -> Vec<EmailAttachment> {
    let mut fetched = Vec::with_capacity(refs.len());

    for attachment in refs {
        match fetch_one(http, attachment).await {
            Ok(content) => fetched.push(EmailAttachment {
                filename: attachment.filename.clone(),
                content_type: attachment.content_type.clone(),
                content,
            }),
            Err(e) => {
                warn!(
                    url = %attachment.url,
                    filename = %attachment.filename,
                    "Dropping attachment, fetch failed: {}",
                    e
                );
            }
        }
    }

    fetched
}

async fn fetch_one(http: &reqwest::Client, attachment: &AttachmentRef) -> anyhow::Result<Vec<u8>> {
    let response = http.get(&attachment.url).send().await?;
    if !response.status().is_success() {
        anyhow::bail!("attachment fetch returned {}", response.status());
    }
    Ok(response.bytes().await?.to_vec())
}

/// Substitute the deferred unsubscribe token with a per-recipient URL.
/// Applied before sending so the logged HTML matches what was sent.
pub fn substitute_unsubscribe_url(html: &str, base_url: &str, email: &str) -> String {
    let url = format!("{}?email={}", base_url, urlencoding::encode(email));
    html.replace(UNSUBSCRIBE_URL_TOKEN, &url)
}

/// Cancellation token that fires after `deadline`, if one is set. The token
/// is checked at batch boundaries, so an in-flight batch still settles.
pub fn deadline_token(deadline: Option<Duration>) -> CancellationToken {
    let token = CancellationToken::new();
    if let Some(deadline) = deadline {
        let timed = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            timed.cancel();
        });
    }
    token
}
