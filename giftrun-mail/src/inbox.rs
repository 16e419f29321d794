//! Inbox query engine
//!
//! Builds a provider-specific raw search expression, pulls matching
//! messages over IMAP and filters them by arrival time on the client side.
//! The provider's search index only supports day granularity for dates and
//! may lag real delivery, so every poll attempt re-runs the remote search
//! and re-applies the arrival filter.

use crate::error::{MailError, Result};
use chrono::{DateTime, Utc};
use giftrun_core::domain::{InboxMessage, MailAttachment};
use giftrun_core::poll::{PollSpec, poll_until};
use mailparse::{DispositionType, MailHeaderMap, ParsedMail};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Connection settings for the mail provider's IMAP endpoint
#[derive(Debug, Clone)]
pub struct InboxConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Remote mailbox to search (e.g. "[Gmail]/All Mail" or "INBOX")
    pub mailbox: String,
}

/// Builds the provider raw search expression.
///
/// Combines a subject fragment, an optional attachment-presence flag and a
/// date lower bound. The date is day-granular; time-of-day filtering happens
/// client-side after fetch.
pub fn search_expression(
    subject_fragment: &str,
    since: DateTime<Utc>,
    require_attachment: bool,
) -> String {
    let day = since.format("%Y/%m/%d");
    if require_attachment {
        format!("subject:\"{subject_fragment}\" in:inbox has:attachment after:{day}")
    } else {
        format!("subject:\"{subject_fragment}\" in:inbox after:{day}")
    }
}

/// Fetch items per message: the full body as a peeked section (readable via
/// `Fetch::body()`, leaves `\Seen` untouched) plus the arrival timestamp.
const FETCH_QUERY: &str = "(BODY.PEEK[] INTERNALDATE)";

/// Which message to pick out of the fresh candidates
#[derive(Debug, Clone, Copy)]
enum MessagePick {
    /// Newest→oldest scan, first message carrying a PDF attachment
    NewestWithPdf,
    /// The single most recent match, unconditionally
    Newest,
}

/// Inbox query engine: polling search over one IMAP account
pub struct InboxEngine {
    config: Arc<InboxConfig>,
    timeout: Duration,
    interval: Duration,
}

impl InboxEngine {
    /// Creates an engine. `timeout` bounds every message wait (minutes,
    /// voucher mail is slow); `interval` is the pause between search
    /// attempts.
    pub fn new(config: InboxConfig, timeout: Duration, interval: Duration) -> Self {
        Self {
            config: Arc::new(config),
            timeout,
            interval,
        }
    }

    /// Waits for the most recent message matching `subject_fragment` that
    /// arrived strictly after `since` and carries a PDF attachment.
    pub async fn find_voucher_message(
        &self,
        subject_fragment: &str,
        since: DateTime<Utc>,
    ) -> anyhow::Result<InboxMessage> {
        let query = search_expression(subject_fragment, since, true);
        self.find_message(&query, since, MessagePick::NewestWithPdf)
            .await
    }

    /// Waits for the single most recent message matching `subject_fragment`
    /// that arrived strictly after `since`.
    pub async fn find_latest_message(
        &self,
        subject_fragment: &str,
        since: DateTime<Utc>,
    ) -> anyhow::Result<InboxMessage> {
        let query = search_expression(subject_fragment, since, false);
        self.find_message(&query, since, MessagePick::Newest).await
    }

    async fn find_message(
        &self,
        query: &str,
        since: DateTime<Utc>,
        pick: MessagePick,
    ) -> anyhow::Result<InboxMessage> {
        info!("Waiting for inbox message, query: {}", query);

        let found: Arc<Mutex<Option<InboxMessage>>> = Arc::new(Mutex::new(None));
        let spec = PollSpec::new(
            self.timeout,
            self.interval,
            format!("no inbox message matched query: {query}"),
        );

        let query = query.to_string();
        poll_until(&spec, || {
            let config = Arc::clone(&self.config);
            let query = query.clone();
            let found = Arc::clone(&found);
            async move {
                let candidates =
                    tokio::task::spawn_blocking(move || fetch_matching(&config, &query, since))
                        .await??;

                debug!("Fetched {} fresh candidate(s)", candidates.len());

                match pick_candidate(candidates, pick) {
                    Some(message) => {
                        *found.lock().unwrap() = Some(message);
                        Ok(true)
                    }
                    None => Ok(false),
                }
            }
        })
        .await?;

        let message = found
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| anyhow::anyhow!("poll succeeded without a message"))?;

        info!(
            "Matched message \"{}\" (arrived {})",
            message.subject, message.arrived_at
        );
        Ok(message)
    }
}

/// Applies the selection policy to an oldest-first candidate list.
fn pick_candidate(candidates: Vec<InboxMessage>, pick: MessagePick) -> Option<InboxMessage> {
    match pick {
        MessagePick::NewestWithPdf => candidates
            .into_iter()
            .rev()
            .find(InboxMessage::has_pdf_attachment),
        MessagePick::Newest => candidates.into_iter().next_back(),
    }
}

/// One complete search attempt: connect, search, fetch, filter, logout.
///
/// The session is acquired and released within this scope on every path.
fn fetch_matching(
    config: &InboxConfig,
    query: &str,
    since: DateTime<Utc>,
) -> Result<Vec<InboxMessage>> {
    let tls = native_tls::TlsConnector::builder().build()?;
    let client = imap::connect((config.host.as_str(), config.port), &config.host, &tls)?;
    let mut session = client
        .login(&config.user, &config.password)
        .map_err(|(e, _)| e)?;

    let result = search_and_fetch(&mut session, &config.mailbox, query, since);

    if let Err(e) = session.logout() {
        warn!("IMAP logout failed: {}", e);
    }
    result
}

fn search_and_fetch<S: std::io::Read + std::io::Write>(
    session: &mut imap::Session<S>,
    mailbox: &str,
    query: &str,
    since: DateTime<Utc>,
) -> Result<Vec<InboxMessage>> {
    session.select(mailbox)?;

    let seqs = session.search(format!("X-GM-RAW {}", quoted(query)))?;
    if seqs.is_empty() {
        return Ok(Vec::new());
    }

    // Sequence numbers ascend with age, so ascending order is oldest-first.
    let mut ordered: Vec<u32> = seqs.into_iter().collect();
    ordered.sort_unstable();
    let set = ordered
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",");

    let fetches = session.fetch(set, FETCH_QUERY)?;

    let mut messages = Vec::new();
    for fetch in fetches.iter() {
        let Some(arrived_at) = fetch.internal_date() else {
            // No arrival timestamp means the staleness invariant cannot be
            // checked; treat as stale.
            continue;
        };
        let arrived_at = arrived_at.with_timezone(&Utc);
        if arrived_at <= since {
            continue;
        }

        let Some(raw) = fetch.body() else {
            continue;
        };
        match parse_message(raw, arrived_at) {
            Ok(message) => messages.push(message),
            Err(e) => warn!("Skipping unparseable message: {}", e),
        }
    }
    Ok(messages)
}

/// Quotes a raw provider query for embedding in an IMAP search string.
fn quoted(raw: &str) -> String {
    format!("\"{}\"", raw.replace('\\', "\\\\").replace('"', "\\\""))
}

fn parse_message(rfc822: &[u8], arrived_at: DateTime<Utc>) -> Result<InboxMessage> {
    let parsed = mailparse::parse_mail(rfc822).map_err(|e| MailError::Parse(e.to_string()))?;
    let subject = parsed
        .headers
        .get_first_value("Subject")
        .unwrap_or_default();

    let mut body_text = String::new();
    let mut attachments = Vec::new();
    collect_parts(&parsed, &mut body_text, &mut attachments)?;

    Ok(InboxMessage {
        subject,
        arrived_at,
        body_text,
        attachments,
    })
}

fn collect_parts(
    part: &ParsedMail<'_>,
    body_text: &mut String,
    attachments: &mut Vec<MailAttachment>,
) -> Result<()> {
    if part.subparts.is_empty() {
        let disposition = part.get_content_disposition();
        let filename = disposition
            .params
            .get("filename")
            .cloned()
            .or_else(|| part.ctype.params.get("name").cloned());
        // Some senders ship the voucher PDF with an inline disposition; a
        // filename marks it as an attachment regardless.
        let is_attachment = disposition.disposition == DispositionType::Attachment
            || (disposition.disposition == DispositionType::Inline && filename.is_some());

        if is_attachment {
            attachments.push(MailAttachment {
                filename: filename.unwrap_or_default(),
                content_type: part.ctype.mimetype.clone(),
                data: part
                    .get_body_raw()
                    .map_err(|e| MailError::Parse(e.to_string()))?,
            });
        } else if part.ctype.mimetype.starts_with("text/plain") {
            body_text.push_str(
                &part
                    .get_body()
                    .map_err(|e| MailError::Parse(e.to_string()))?,
            );
        }
        return Ok(());
    }

    for sub in &part.subparts {
        collect_parts(sub, body_text, attachments)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_search_expression_with_attachment() {
        let since = Utc.with_ymd_and_hms(2026, 8, 28, 14, 30, 0).unwrap();
        let query = search_expression("Your voucher is ready", since, true);
        assert_eq!(
            query,
            "subject:\"Your voucher is ready\" in:inbox has:attachment after:2026/08/28"
        );
    }

    #[test]
    fn test_search_expression_without_attachment() {
        let since = Utc.with_ymd_and_hms(2026, 1, 5, 0, 0, 0).unwrap();
        let query = search_expression("One-time code", since, false);
        assert_eq!(query, "subject:\"One-time code\" in:inbox after:2026/01/05");
    }

    #[test]
    fn test_fetch_query_peeks_the_body_section() {
        // `Fetch::body()` only yields data fetched as a BODY[] section; a
        // plain RFC822 fetch would leave it None and drop every candidate.
        assert!(FETCH_QUERY.contains("BODY.PEEK[]"));
        assert!(FETCH_QUERY.contains("INTERNALDATE"));
    }

    #[test]
    fn test_quoted_escapes_embedded_quotes() {
        assert_eq!(
            quoted("subject:\"hello\" in:inbox"),
            "\"subject:\\\"hello\\\" in:inbox\""
        );
    }

    fn message(subject: &str, minute: u32, pdf: bool) -> InboxMessage {
        let attachments = if pdf {
            vec![MailAttachment {
                filename: "voucher.pdf".into(),
                content_type: "application/pdf".into(),
                data: Vec::new(),
            }]
        } else {
            Vec::new()
        };
        InboxMessage {
            subject: subject.into(),
            arrived_at: Utc.with_ymd_and_hms(2026, 8, 28, 10, minute, 0).unwrap(),
            body_text: String::new(),
            attachments,
        }
    }

    #[test]
    fn test_pick_newest_with_pdf_skips_newer_plain_mail() {
        let candidates = vec![
            message("old with pdf", 1, true),
            message("new with pdf", 2, true),
            message("newest, no pdf", 3, false),
        ];
        let picked = pick_candidate(candidates, MessagePick::NewestWithPdf).unwrap();
        assert_eq!(picked.subject, "new with pdf");
    }

    #[test]
    fn test_pick_newest_ignores_attachments() {
        let candidates = vec![
            message("old with pdf", 1, true),
            message("newest, no pdf", 2, false),
        ];
        let picked = pick_candidate(candidates, MessagePick::Newest).unwrap();
        assert_eq!(picked.subject, "newest, no pdf");
    }

    #[test]
    fn test_pick_from_empty_candidates_is_none() {
        assert!(pick_candidate(Vec::new(), MessagePick::NewestWithPdf).is_none());
    }

    #[test]
    fn test_parse_message_collects_attachments_in_order() {
        let raw = concat!(
            "Subject: Voucher delivery\r\n",
            "MIME-Version: 1.0\r\n",
            "Content-Type: multipart/mixed; boundary=\"sep\"\r\n",
            "\r\n",
            "--sep\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "Enjoy your vouchers.\r\n",
            "--sep\r\n",
            "Content-Type: application/pdf\r\n",
            "Content-Disposition: attachment; filename=\"gift card one.pdf\"\r\n",
            "Content-Transfer-Encoding: base64\r\n",
            "\r\n",
            "QUJD\r\n",
            "--sep\r\n",
            "Content-Type: application/pdf\r\n",
            "Content-Disposition: attachment; filename=\"gift card two.pdf\"\r\n",
            "Content-Transfer-Encoding: base64\r\n",
            "\r\n",
            "REVG\r\n",
            "--sep--\r\n",
        );

        let message = parse_message(raw.as_bytes(), Utc::now()).unwrap();
        assert_eq!(message.subject, "Voucher delivery");
        assert!(message.body_text.contains("Enjoy your vouchers."));
        assert_eq!(message.attachments.len(), 2);
        assert_eq!(message.attachments[0].filename, "gift card one.pdf");
        assert_eq!(message.attachments[0].data, b"ABC");
        assert_eq!(message.attachments[1].filename, "gift card two.pdf");
        assert_eq!(message.attachments[1].data, b"DEF");
        assert!(message.has_pdf_attachment());
    }

    #[test]
    fn test_parse_message_keeps_inline_part_with_filename() {
        let raw = concat!(
            "Subject: Voucher delivery\r\n",
            "MIME-Version: 1.0\r\n",
            "Content-Type: multipart/mixed; boundary=\"sep\"\r\n",
            "\r\n",
            "--sep\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "See below.\r\n",
            "--sep\r\n",
            "Content-Type: application/pdf\r\n",
            "Content-Disposition: inline; filename=\"gift card.pdf\"\r\n",
            "Content-Transfer-Encoding: base64\r\n",
            "\r\n",
            "QUJD\r\n",
            "--sep--\r\n",
        );

        let message = parse_message(raw.as_bytes(), Utc::now()).unwrap();
        assert_eq!(message.attachments.len(), 1);
        assert_eq!(message.attachments[0].filename, "gift card.pdf");
        assert!(message.has_pdf_attachment());
        // Inline text without a filename still lands in the body.
        assert!(message.body_text.contains("See below."));
    }
}
