//! Run controller
//!
//! Sequences one full run: seeded browser session → checkout → inbox poll →
//! code extraction → redemption → outcome report. Every error anywhere in
//! the chain is caught exactly once here, converted into a failure report,
//! and the browser session is released on every exit path. Repetition
//! across runs is an external scheduling concern; the controller never
//! retries.

use crate::checkout::{
    CdpPaymentFrame, CheckoutOrchestrator, CheckoutUi, CssNoticeDetector, StepperItemPicker,
};
use crate::config::Config;
use crate::redeem::{RedeemUi, RedemptionLoop};
use anyhow::Context;
use chrono::Utc;
use giftrun_browser::{BrowserSession, IdentitySeed, SessionConfig, SnapshotStore};
use giftrun_core::domain::{RedemptionCode, RunReport};
use giftrun_mail::{InboxConfig, InboxEngine, ReportSender, SmtpConfig, extract_codes};
use tracing::{error, info};

/// Owns one end-to-end run
pub struct RunController {
    config: Config,
    seed: IdentitySeed,
    reporter: ReportSender,
}

impl RunController {
    pub fn new(config: Config, seed: IdentitySeed) -> Self {
        let reporter = ReportSender::new(SmtpConfig {
            host: config.smtp_host(),
            port: 587,
            user: config.mail_user.clone(),
            password: config.mail_password.clone(),
            to: config.report_to.clone(),
        });
        Self {
            config,
            seed,
            reporter,
        }
    }

    /// Executes the run and reports the terminal outcome. Never panics and
    /// never lets an error escape; the report is the only failure surface.
    pub async fn execute(&self) -> RunReport {
        let started_at = Utc::now();

        let snapshots = match SnapshotStore::new(&self.config.snapshot_dir) {
            Ok(store) => store,
            Err(e) => {
                let report =
                    RunReport::failed(started_at, format!("snapshot dir unusable: {e}"), Vec::new());
                self.send_report(&report).await;
                return report;
            }
        };

        let mut session: Option<BrowserSession> = None;
        let result = self.run_pipeline(&snapshots, &mut session).await;

        let report = match result {
            Ok(message) => {
                info!("Run succeeded: {}", message);
                RunReport::succeeded(started_at, message, snapshots.files())
            }
            Err(e) => {
                error!("Run failed: {:#}", e);
                RunReport::failed(started_at, format!("{e:#}"), snapshots.files())
            }
        };

        self.send_report(&report).await;

        // Guaranteed release, success or failure.
        if let Some(session) = session.take() {
            session.close().await;
        }
        report
    }

    async fn send_report(&self, report: &RunReport) {
        if let Err(e) = self.reporter.send(report).await {
            error!("Failed to send outcome report: {:#}", e);
        }
    }

    async fn run_pipeline(
        &self,
        snapshots: &SnapshotStore,
        session_slot: &mut Option<BrowserSession>,
    ) -> anyhow::Result<String> {
        let config = &self.config;

        self.seed
            .write_seed_files(&config.seed_dir)
            .context("failed to write identity seed files")?;

        let session = BrowserSession::launch(&SessionConfig {
            headless: config.headless,
            chrome_binary: config.chrome_binary.clone(),
            seed_dir: config.seed_dir.clone(),
        })
        .await
        .context("browser launch failed")?;
        let session = session_slot.insert(session);

        session
            .seed_identity(&self.seed, &config.shop_url)
            .await
            .context("identity seeding failed")?;

        // The inbox filter keys off this instant: only mail arriving after
        // the checkout started can be this run's voucher.
        let since = Utc::now();

        let ui = CheckoutUi::default();
        let picker = StepperItemPicker;
        let benign = CssNoticeDetector {
            selectors: config.benign_notice_selectors.clone(),
        };
        let frame = CdpPaymentFrame {
            page: session.page(),
            ui: &ui,
        };
        let checkout = CheckoutOrchestrator::new(
            session.page(),
            &ui,
            snapshots,
            &picker,
            &benign,
            &frame,
            &config.item_labels,
            config.expected_total_cents,
            config.element_timeout,
            config.settle,
        );
        let outcome = checkout.run().await.context("checkout failed")?;

        if !outcome.voucher_expected {
            return Ok("Benefit already used today; no voucher expected".to_string());
        }

        let inbox = InboxEngine::new(
            InboxConfig {
                host: config.imap_host(),
                port: 993,
                user: config.mail_user.clone(),
                password: config.mail_password.clone(),
                mailbox: config.mailbox.clone(),
            },
            config.mail_timeout,
            config.mail_poll_interval,
        );
        let message = inbox
            .find_voucher_message(&config.voucher_subject, since)
            .await
            .context("voucher mail never arrived")?;

        let codes: Vec<RedemptionCode> = extract_codes(&message, &config.attachment_marker);

        let redeem_ui = RedeemUi::default();
        let redeemer = RedemptionLoop::new(
            session,
            &redeem_ui,
            snapshots,
            &config.redeem_url,
            config.element_timeout,
            config.settle,
        );
        redeemer
            .redeem_all(&codes)
            .await
            .context("redemption failed")?;

        if codes.is_empty() {
            Ok("Voucher mail arrived but contained no codes".to_string())
        } else {
            Ok(format!("Collected and redeemed {} voucher code(s)", codes.len()))
        }
    }
}
