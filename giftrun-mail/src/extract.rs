//! Document code extractor
//!
//! Locates voucher PDFs among a message's attachments, converts each to
//! plain text and pulls the redemption code out via a fixed pattern. Partial
//! extraction is acceptable: attachments that fail to parse or carry no code
//! are skipped with a warning, never an error.

use giftrun_core::domain::{InboxMessage, MailAttachment, RedemptionCode};
use regex::Regex;
use tracing::{info, warn};

/// Pattern the voucher text must contain: the literal marker `CODE:`
/// followed by an alphanumeric code with no embedded whitespace.
const CODE_PATTERN: &str = r"CODE:\s*([A-Z0-9]+)";

/// Extracts redemption codes from a voucher message.
///
/// Attachments whose lowercased filename contains `marker` and ends in
/// `.pdf` are processed independently, in the order they appear in the
/// message. Re-running extraction on the same message yields the same codes
/// in the same order. Zero codes is a valid result.
pub fn extract_codes(message: &InboxMessage, marker: &str) -> Vec<RedemptionCode> {
    extract_codes_with(message, marker, pdf_text)
}

/// Extraction with an injectable bytes→text step, so the message-level
/// behaviour is testable without real PDF payloads.
pub fn extract_codes_with<F>(message: &InboxMessage, marker: &str, to_text: F) -> Vec<RedemptionCode>
where
    F: Fn(&[u8]) -> anyhow::Result<String>,
{
    let mut codes = Vec::new();

    for attachment in voucher_attachments(message, marker) {
        let text = match to_text(&attachment.data) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to parse {}: {}", attachment.filename, e);
                continue;
            }
        };

        match code_in_text(&text) {
            Some(code) => codes.push(RedemptionCode::new(code)),
            None => warn!("No code found in file: {}", attachment.filename),
        }
    }

    info!("Extracted {} redemption code(s)", codes.len());
    codes
}

/// Supplement to the voucher path: pulls a short one-time code out of a
/// plain-text message body of the form `...#<code>`.
pub fn one_time_code(message: &InboxMessage) -> Option<String> {
    message
        .body_text
        .trim()
        .split_once('#')
        .map(|(_, code)| code.trim().to_string())
        .filter(|code| !code.is_empty())
}

fn voucher_attachments<'a>(message: &'a InboxMessage, marker: &str) -> Vec<&'a MailAttachment> {
    let marker = marker.to_lowercase();
    message
        .attachments
        .iter()
        .filter(|a| {
            let name = a.filename.to_lowercase();
            name.contains(&marker) && name.ends_with(".pdf")
        })
        .collect()
}

fn code_in_text(text: &str) -> Option<String> {
    let re = Regex::new(CODE_PATTERN).ok()?;
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn pdf_text(data: &[u8]) -> anyhow::Result<String> {
    Ok(pdf_extract::extract_text_from_mem(data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn attachment(filename: &str, text: &str) -> MailAttachment {
        MailAttachment {
            filename: filename.to_string(),
            content_type: "application/pdf".to_string(),
            data: text.as_bytes().to_vec(),
        }
    }

    fn message(attachments: Vec<MailAttachment>) -> InboxMessage {
        InboxMessage {
            subject: "Your voucher is ready".to_string(),
            arrived_at: Utc::now(),
            body_text: String::new(),
            attachments,
        }
    }

    fn utf8_text(data: &[u8]) -> anyhow::Result<String> {
        Ok(String::from_utf8_lossy(data).into_owned())
    }

    #[test]
    fn test_single_attachment_yields_its_code() {
        let msg = message(vec![attachment(
            "Gift Card English.pdf",
            "Voucher value 25\nCODE: ABC123XYZ\nEnjoy",
        )]);

        let codes = extract_codes_with(&msg, "gift card", utf8_text);
        assert_eq!(codes, vec![RedemptionCode::new("ABC123XYZ")]);
    }

    #[test]
    fn test_unreadable_attachment_is_skipped_not_fatal() {
        let msg = message(vec![
            attachment("gift card a.pdf", "nothing recognizable here"),
            attachment("gift card b.pdf", "CODE: ZZZ999"),
        ]);

        let codes = extract_codes_with(&msg, "gift card", utf8_text);
        assert_eq!(codes, vec![RedemptionCode::new("ZZZ999")]);
    }

    #[test]
    fn test_order_follows_attachment_order_and_is_idempotent() {
        let msg = message(vec![
            attachment("gift card 1.pdf", "CODE: FIRST1"),
            attachment("gift card 2.pdf", "CODE: SECOND2"),
            attachment("gift card 3.pdf", "CODE: THIRD3"),
        ]);

        let first = extract_codes_with(&msg, "gift card", utf8_text);
        let second = extract_codes_with(&msg, "gift card", utf8_text);
        assert_eq!(
            first,
            vec![
                RedemptionCode::new("FIRST1"),
                RedemptionCode::new("SECOND2"),
                RedemptionCode::new("THIRD3"),
            ]
        );
        assert_eq!(first, second);
    }

    #[test]
    fn test_filename_filter_is_case_insensitive_and_pdf_only() {
        let msg = message(vec![
            attachment("GIFT CARD English.PDF", "CODE: KEPT1"),
            attachment("gift card terms.txt", "CODE: DROPPED"),
            attachment("receipt.pdf", "CODE: DROPPED"),
        ]);

        let codes = extract_codes_with(&msg, "gift card", utf8_text);
        assert_eq!(codes, vec![RedemptionCode::new("KEPT1")]);
    }

    #[test]
    fn test_parse_failure_does_not_abort_remaining() {
        let msg = message(vec![
            attachment("gift card bad.pdf", "ignored"),
            attachment("gift card good.pdf", "CODE: OK42"),
        ]);

        let codes = extract_codes_with(&msg, "gift card", |data| {
            if data == b"ignored" {
                anyhow::bail!("malformed PDF")
            }
            utf8_text(data)
        });
        assert_eq!(codes, vec![RedemptionCode::new("OK42")]);
    }

    #[test]
    fn test_code_requires_marker_and_uppercase_alnum() {
        assert_eq!(code_in_text("CODE: ABC123"), Some("ABC123".to_string()));
        assert_eq!(code_in_text("prefix CODE:XYZ9 suffix"), Some("XYZ9".to_string()));
        assert_eq!(code_in_text("no marker at all"), None);
        assert_eq!(code_in_text("code: lowercase marker"), None);
    }

    #[test]
    fn test_one_time_code_from_body() {
        let mut msg = message(Vec::new());
        msg.body_text = "Your sign-in code is #481516\n".to_string();
        assert_eq!(one_time_code(&msg), Some("481516".to_string()));

        msg.body_text = "no delimiter here".to_string();
        assert_eq!(one_time_code(&msg), None);
    }
}
