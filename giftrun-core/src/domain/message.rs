//! Inbox message domain types
//!
//! A mail message as seen by the pipeline: arrival timestamp plus decoded
//! attachments. Arrival time is the sole staleness mechanism, no message-id
//! bookkeeping is kept between runs.

use serde::{Deserialize, Serialize};

/// A decoded mail attachment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailAttachment {
    /// Filename from the part headers; empty if the sender omitted it
    pub filename: String,
    /// Declared MIME type (e.g. "application/pdf")
    pub content_type: String,
    /// Decoded payload bytes
    pub data: Vec<u8>,
}

impl MailAttachment {
    /// True when either the filename or the declared type marks this as a PDF
    pub fn is_pdf(&self) -> bool {
        self.filename.to_lowercase().ends_with(".pdf")
            || self.content_type.to_lowercase().contains("application/pdf")
    }
}

/// A mail message matched by the inbox query engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxMessage {
    pub subject: String,
    /// Server-side arrival timestamp (IMAP INTERNALDATE)
    pub arrived_at: chrono::DateTime<chrono::Utc>,
    /// Plain-text body, empty when the message has none
    pub body_text: String,
    /// Attachments in the order they appear in the source message
    pub attachments: Vec<MailAttachment>,
}

impl InboxMessage {
    /// Staleness check: only mail that arrived strictly after `since` is
    /// eligible for a run. Equality counts as stale.
    pub fn arrived_after(&self, since: chrono::DateTime<chrono::Utc>) -> bool {
        self.arrived_at > since
    }

    pub fn has_pdf_attachment(&self) -> bool {
        self.attachments.iter().any(MailAttachment::is_pdf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn message_at(arrived_at: chrono::DateTime<chrono::Utc>) -> InboxMessage {
        InboxMessage {
            subject: "voucher".to_string(),
            arrived_at,
            body_text: String::new(),
            attachments: Vec::new(),
        }
    }

    #[test]
    fn test_arrival_strictly_after_since() {
        let since = Utc::now();

        assert!(message_at(since + Duration::seconds(1)).arrived_after(since));
        assert!(!message_at(since).arrived_after(since));
        assert!(!message_at(since - Duration::seconds(1)).arrived_after(since));
    }

    #[test]
    fn test_pdf_detection_by_name_or_type() {
        let by_name = MailAttachment {
            filename: "Voucher.PDF".to_string(),
            content_type: "application/octet-stream".to_string(),
            data: Vec::new(),
        };
        let by_type = MailAttachment {
            filename: "voucher".to_string(),
            content_type: "application/pdf; name=voucher".to_string(),
            data: Vec::new(),
        };
        let neither = MailAttachment {
            filename: "notes.txt".to_string(),
            content_type: "text/plain".to_string(),
            data: Vec::new(),
        };

        assert!(by_name.is_pdf());
        assert!(by_type.is_pdf());
        assert!(!neither.is_pdf());
    }
}
