//! Outcome report sender
//!
//! One outbound message per run: subject line indicating success or
//! failure, a short human-readable body (the raw error description on
//! failure) and every diagnostic snapshot attached. The SMTP transport is
//! built, used and dropped within the send operation.

use crate::error::{MailError, Result};
use giftrun_core::domain::RunReport;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use std::path::Path;
use tracing::{info, warn};

/// Connection settings for the outbound SMTP endpoint
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Recipient of the run reports
    pub to: String,
}

/// Sends the per-run outcome report
#[derive(Debug, Clone)]
pub struct ReportSender {
    config: SmtpConfig,
}

impl ReportSender {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    /// Sends the outcome report with all snapshots attached.
    pub async fn send(&self, report: &RunReport) -> Result<()> {
        let config = self.config.clone();
        let report = report.clone();
        tokio::task::spawn_blocking(move || send_blocking(&config, &report))
            .await
            .map_err(|e| MailError::Parse(format!("report task failed: {e}")))?
    }
}

/// Subject line for a run report: status glyph, system tag, outcome.
pub fn subject_line(report: &RunReport) -> String {
    if report.is_success() {
        format!("✅ [giftrun] {}", report.message)
    } else {
        "❌ [giftrun] Run failed".to_string()
    }
}

fn send_blocking(config: &SmtpConfig, report: &RunReport) -> Result<()> {
    let transport = SmtpTransport::starttls_relay(&config.host)?
        .port(config.port)
        .credentials(Credentials::new(
            config.user.clone(),
            config.password.clone(),
        ))
        .build();

    let body = report.message.clone();
    let mut multipart = MultiPart::mixed().singlepart(SinglePart::plain(body));

    for path in &report.snapshots {
        match snapshot_part(path) {
            Ok(part) => multipart = multipart.singlepart(part),
            // A missing snapshot must not cost us the report itself.
            Err(e) => warn!("Skipping snapshot {}: {}", path.display(), e),
        }
    }

    let email = Message::builder()
        .from(config.user.parse()?)
        .to(config.to.parse()?)
        .subject(subject_line(report))
        .multipart(multipart)?;

    transport.send(&email)?;
    info!("Report sent to {}", config.to);
    Ok(())
}

fn snapshot_part(path: &Path) -> Result<SinglePart> {
    let bytes = std::fs::read(path)?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snapshot.png".to_string());
    let content_type =
        ContentType::parse("image/png").map_err(|e| MailError::Parse(e.to_string()))?;
    Ok(Attachment::new(filename).body(bytes, content_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_subject_reflects_outcome() {
        let ok = RunReport::succeeded(Utc::now(), "Collected 2 voucher(s)", Vec::new());
        assert_eq!(subject_line(&ok), "✅ [giftrun] Collected 2 voucher(s)");

        let failed = RunReport::failed(Utc::now(), "allowance mismatch", Vec::new());
        assert_eq!(subject_line(&failed), "❌ [giftrun] Run failed");
    }
}
