//! Checkout orchestrator
//!
//! A linear UI state machine: dismiss the optional restore-order
//! interstitial, add both gift-card items, draft the order, switch the
//! payment method to the internal benefit card, validate the charge, submit
//! and confirm inside the payment provider frame, then classify the
//! terminal state. Every transition captures a diagnostic snapshot; any
//! step failure propagates and aborts the remaining states.

use crate::config::parse_amount_cents;
use anyhow::{Context, bail};
use async_trait::async_trait;
use giftrun_browser::{Page, SelectorStrategy, SnapshotStore, find_first, page_ops, wait_for_element};
use giftrun_core::poll::{PollSpec, poll_until};
use std::time::Duration;
use tracing::{info, warn};

/// Site-specific selectors and button texts the checkout flow drives.
///
/// Grouped here so a site redesign is a data change, not a flow change.
#[derive(Debug, Clone)]
pub struct CheckoutUi {
    /// Ordered alternatives for the restore-order interstitial's reject button
    pub restore_reject: Vec<String>,
    /// Visible text of the "view order" cart button
    pub cart_button_text: String,
    /// Visible text of the "go to checkout" button
    pub checkout_button_text: String,
    /// Currently selected payment method (click to change, read to verify)
    pub payment_method_button: String,
    /// Benefit-card entry in the payment method list
    pub benefit_method_button: String,
    pub submit_order_button: String,
    /// Embedded payment provider frame
    pub payment_frame: String,
    /// Daily allowance display inside the frame
    pub allowance_text: String,
    /// "Will also charge your credit card" notice inside the frame
    pub credit_notice: String,
    /// Payment confirmation button inside the frame
    pub confirm_payment: String,
}

impl Default for CheckoutUi {
    fn default() -> Self {
        Self {
            restore_reject: vec![
                "[data-test-id=\"restore-order-modal.reject\"] button".to_string(),
                "[data-test-id=\"restore-order-modal.reject\"]".to_string(),
            ],
            cart_button_text: "View order".to_string(),
            checkout_button_text: "Go to checkout".to_string(),
            payment_method_button: "[data-test-id=\"PaymentMethods.SelectedPaymentMethod\"]"
                .to_string(),
            benefit_method_button: "[data-payment-method-id=\"benefit-card\"]".to_string(),
            submit_order_button: "[data-test-id=\"SendOrderButton\"]".to_string(),
            payment_frame: "iframe[name=\"benefit-challenge\"]".to_string(),
            allowance_text: "#divUserInfo big".to_string(),
            credit_notice: "#hTitleOTL".to_string(),
            confirm_payment: "#btnPay".to_string(),
        }
    }
}

/// Adds one catalog item to the order by its visible label
#[async_trait]
pub trait ItemPicker: Send + Sync {
    async fn add_item(&self, page: &Page, label: &str) -> anyhow::Result<()>;
}

/// Default picker: finds the item card whose header contains the label and
/// clicks the increment control of its stepper; falls back to a plain
/// text-content click.
pub struct StepperItemPicker;

#[async_trait]
impl ItemPicker for StepperItemPicker {
    async fn add_item(&self, page: &Page, label: &str) -> anyhow::Result<()> {
        let needle = serde_json::to_string(label).unwrap_or_else(|_| "\"\"".to_string());
        let script = format!(
            r#"(() => {{
                const needle = {needle};
                const headers = Array.from(
                    document.querySelectorAll('[data-test-id="horizontal-item-card-header"]'));
                const header = headers.find(h => (h.textContent || '').includes(needle));
                if (!header) return false;
                const card = header.closest('[data-test-id="horizontal-item-card"]');
                if (!card) return false;
                const buttons = card.querySelectorAll(
                    '[data-test-id="ItemCardStepperContainer"] button');
                if (buttons.length === 0) return false;
                buttons[buttons.length - 1].click();
                return true;
            }})()"#
        );

        if page_ops::eval::<bool>(page, script).await? {
            return Ok(());
        }
        // Stepper layout absent: fall back to clicking the label itself.
        if page_ops::click_by_text(page, label).await? {
            return Ok(());
        }
        bail!("catalog item not found: {label}")
    }
}

/// Decides whether the page shows the benign "benefit already used today"
/// terminal state. The matching rule is data, swappable per deployment.
#[async_trait]
pub trait BenignNoticeDetector: Send + Sync {
    async fn detect(&self, page: &Page) -> anyhow::Result<bool>;
}

/// Detector matching any of an ordered list of CSS selectors
pub struct CssNoticeDetector {
    pub selectors: Vec<String>,
}

#[async_trait]
impl BenignNoticeDetector for CssNoticeDetector {
    async fn detect(&self, page: &Page) -> anyhow::Result<bool> {
        for selector in &self.selectors {
            if page_ops::is_visible(page, selector).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// The embedded payment provider surface: the two pre-confirmation reads
/// and the confirmation click itself.
#[async_trait]
pub trait PaymentFrame: Send + Sync {
    /// Daily allowance display text; None when the element is absent
    async fn allowance_text(&self) -> anyhow::Result<Option<String>>;
    /// Visible credit-card notice text; None when absent or hidden
    async fn credit_notice(&self) -> anyhow::Result<Option<String>>;
    async fn confirm(&self) -> anyhow::Result<()>;
}

/// Frame access over CDP, scoped by the configured selectors
pub struct CdpPaymentFrame<'a> {
    pub page: &'a Page,
    pub ui: &'a CheckoutUi,
}

#[async_trait]
impl PaymentFrame for CdpPaymentFrame<'_> {
    async fn allowance_text(&self) -> anyhow::Result<Option<String>> {
        Ok(
            page_ops::frame_text(self.page, &self.ui.payment_frame, &self.ui.allowance_text)
                .await?,
        )
    }

    async fn credit_notice(&self) -> anyhow::Result<Option<String>> {
        if !page_ops::frame_visible(self.page, &self.ui.payment_frame, &self.ui.credit_notice)
            .await?
        {
            return Ok(None);
        }
        Ok(
            page_ops::frame_text(self.page, &self.ui.payment_frame, &self.ui.credit_notice)
                .await?,
        )
    }

    async fn confirm(&self) -> anyhow::Result<()> {
        if !page_ops::frame_click(self.page, &self.ui.payment_frame, &self.ui.confirm_payment)
            .await?
        {
            bail!("payment confirmation button not found in frame");
        }
        Ok(())
    }
}

/// Validates the payment frame, then confirms. Guard order: the daily
/// allowance must equal the expected total, then any visible credit-card
/// notice must read zero. Confirmation never happens once a guard fails.
async fn verify_and_confirm(
    frame: &dyn PaymentFrame,
    expected_total_cents: u64,
) -> anyhow::Result<()> {
    let allowance = frame.allowance_text().await?.unwrap_or_default();
    if parse_amount_cents(&allowance) != Some(expected_total_cents) {
        bail!(
            "daily allowance mismatch: expected {} cents, frame reads \"{}\"",
            expected_total_cents,
            allowance.trim()
        );
    }

    if let Some(notice) = frame.credit_notice().await? {
        if parse_amount_cents(&notice).unwrap_or(0) != 0 {
            bail!(
                "payment would also charge the credit card: \"{}\"",
                notice.trim()
            );
        }
    }

    frame.confirm().await
}

/// Result of a completed checkout
#[derive(Debug, Clone, Copy)]
pub struct CheckoutOutcome {
    /// False for the benign already-used terminal state: the run completed
    /// but no voucher mail will arrive.
    pub voucher_expected: bool,
}

/// Drives the purchase UI sequence
pub struct CheckoutOrchestrator<'a> {
    page: &'a Page,
    ui: &'a CheckoutUi,
    snapshots: &'a SnapshotStore,
    picker: &'a dyn ItemPicker,
    benign: &'a dyn BenignNoticeDetector,
    frame: &'a dyn PaymentFrame,
    item_labels: &'a [String],
    expected_total_cents: u64,
    element_timeout: Duration,
    settle: Duration,
}

impl<'a> CheckoutOrchestrator<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        page: &'a Page,
        ui: &'a CheckoutUi,
        snapshots: &'a SnapshotStore,
        picker: &'a dyn ItemPicker,
        benign: &'a dyn BenignNoticeDetector,
        frame: &'a dyn PaymentFrame,
        item_labels: &'a [String],
        expected_total_cents: u64,
        element_timeout: Duration,
        settle: Duration,
    ) -> Self {
        Self {
            page,
            ui,
            snapshots,
            picker,
            benign,
            frame,
            item_labels,
            expected_total_cents,
            element_timeout,
            settle,
        }
    }

    /// Runs the full state machine. Any step failure aborts the rest.
    pub async fn run(&self) -> anyhow::Result<CheckoutOutcome> {
        self.snapshots.capture(self.page, "checkout/initial-page").await;

        self.page_ready().await.context("catalog page not ready")?;
        self.dismiss_restore_modal().await?;
        self.select_items().await.context("item selection failed")?;
        self.draft_order().await.context("order drafting failed")?;
        self.switch_payment_method()
            .await
            .context("payment method switch failed")?;
        self.validate_charge().await?;
        self.submit_and_confirm().await?;
        self.terminal_state().await
    }

    /// `Launched → PageReady`: the seeded session must have landed on the
    /// catalog that actually lists the expected items. The catalog renders
    /// client-side, so the check polls.
    async fn page_ready(&self) -> anyhow::Result<()> {
        let label = &self.item_labels[0];
        let spec = PollSpec::new(
            self.element_timeout,
            Duration::from_millis(250),
            format!("catalog never showed \"{label}\""),
        );
        let page = self.page;
        poll_until(&spec, || async move {
            Ok(page_ops::body_contains(page, label).await?)
        })
        .await?;
        info!("Catalog page ready");
        Ok(())
    }

    /// `PageReady → ModalDismissed`: the interstitial is optional; its
    /// absence means the state is already satisfied.
    async fn dismiss_restore_modal(&self) -> anyhow::Result<()> {
        let strategies: Vec<SelectorStrategy> = self
            .ui
            .restore_reject
            .iter()
            .map(|css| SelectorStrategy::new(css, Duration::from_secs(5)))
            .collect();

        match find_first(self.page, &strategies).await {
            Ok(button) => {
                button.click().await.context("reject button click failed")?;
                info!("Dismissed restore-order interstitial");
            }
            Err(_) => info!("No restore-order interstitial, continuing"),
        }
        self.snapshots.capture(self.page, "checkout/after-modal").await;
        tokio::time::sleep(self.settle).await;
        Ok(())
    }

    /// `ModalDismissed → ItemsSelected`: both items or nothing.
    async fn select_items(&self) -> anyhow::Result<()> {
        self.snapshots
            .capture(self.page, "checkout/before-item-selection")
            .await;

        for (i, label) in self.item_labels.iter().enumerate() {
            self.picker.add_item(self.page, label).await?;
            info!("Added item \"{}\"", label);
            self.snapshots
                .capture(self.page, &format!("checkout/after-item-{i}"))
                .await;
        }
        Ok(())
    }

    /// `ItemsSelected → OrderDrafted`: open the cart, proceed to checkout.
    async fn draft_order(&self) -> anyhow::Result<()> {
        if !page_ops::click_by_text(self.page, &self.ui.cart_button_text).await? {
            bail!("cart button not found: {}", self.ui.cart_button_text);
        }
        tokio::time::sleep(self.settle).await;

        if !page_ops::click_by_text(self.page, &self.ui.checkout_button_text).await? {
            bail!("checkout button not found: {}", self.ui.checkout_button_text);
        }
        tokio::time::sleep(self.settle).await;
        self.snapshots.capture(self.page, "checkout/order-drafted").await;
        Ok(())
    }

    /// `OrderDrafted → PaymentMethodSwitched`
    async fn switch_payment_method(&self) -> anyhow::Result<()> {
        let selected = wait_for_element(
            self.page,
            &self.ui.payment_method_button,
            self.element_timeout,
        )
        .await?;
        selected.click().await.context("payment method open failed")?;

        let benefit = wait_for_element(
            self.page,
            &self.ui.benefit_method_button,
            self.element_timeout,
        )
        .await?;
        benefit.click().await.context("benefit method click failed")?;
        info!("Switched payment method to benefit card");

        tokio::time::sleep(self.settle).await;
        self.snapshots.capture(self.page, "checkout/payment-method").await;
        Ok(())
    }

    /// `PaymentMethodSwitched → AllowanceValidated`: the displayed charge
    /// must equal the expected fixed total. Prevents wrong-amount submission.
    async fn validate_charge(&self) -> anyhow::Result<()> {
        let displayed = page_ops::text_of(self.page, &self.ui.payment_method_button)
            .await?
            .unwrap_or_default();
        let cents = parse_amount_cents(&displayed);

        if cents != Some(self.expected_total_cents) {
            bail!(
                "charge mismatch: expected {} cents, display reads \"{}\"",
                self.expected_total_cents,
                displayed.trim()
            );
        }
        info!("Charge amount verified ({} cents)", self.expected_total_cents);
        Ok(())
    }

    /// `AllowanceValidated → PaymentSubmitted`: submit, then run the frame
    /// guards via [`verify_and_confirm`]. Failing a guard would spend real
    /// money, so the confirmation click is strictly last.
    async fn submit_and_confirm(&self) -> anyhow::Result<()> {
        let submit = wait_for_element(
            self.page,
            &self.ui.submit_order_button,
            self.element_timeout,
        )
        .await?;
        submit.click().await.context("order submission failed")?;
        info!("Order submitted, waiting for payment frame");
        tokio::time::sleep(self.settle).await;

        self.snapshots.capture(self.page, "checkout/payment-frame").await;

        verify_and_confirm(self.frame, self.expected_total_cents).await?;
        info!("Payment confirmed");
        Ok(())
    }

    /// `PaymentSubmitted → Done`: the already-used notice is an expected,
    /// non-error outcome meaning no new voucher will arrive.
    async fn terminal_state(&self) -> anyhow::Result<CheckoutOutcome> {
        tokio::time::sleep(self.settle).await;
        self.snapshots.capture(self.page, "checkout/terminal").await;

        let already_used = self.benign.detect(self.page).await.unwrap_or_else(|e| {
            warn!("Benign-notice detection failed, assuming voucher expected: {}", e);
            false
        });

        if already_used {
            info!("Benefit already used today; no voucher expected");
        } else {
            info!("Checkout complete; voucher mail expected");
        }
        Ok(CheckoutOutcome {
            voucher_expected: !already_used,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FrameFixture {
        allowance: Option<String>,
        notice: Option<String>,
        confirmed: AtomicBool,
    }

    impl FrameFixture {
        fn new(allowance: Option<&str>, notice: Option<&str>) -> Self {
            Self {
                allowance: allowance.map(str::to_string),
                notice: notice.map(str::to_string),
                confirmed: AtomicBool::new(false),
            }
        }

        fn confirmed(&self) -> bool {
            self.confirmed.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PaymentFrame for FrameFixture {
        async fn allowance_text(&self) -> anyhow::Result<Option<String>> {
            Ok(self.allowance.clone())
        }

        async fn credit_notice(&self) -> anyhow::Result<Option<String>> {
            Ok(self.notice.clone())
        }

        async fn confirm(&self) -> anyhow::Result<()> {
            self.confirmed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_matching_allowance_and_zero_notice_confirms() {
        let frame = FrameFixture::new(
            Some("₪55.00"),
            Some("your credit card will be charged: 0"),
        );
        verify_and_confirm(&frame, 5500).await.unwrap();
        assert!(frame.confirmed());
    }

    #[tokio::test]
    async fn test_absent_credit_notice_is_accepted() {
        let frame = FrameFixture::new(Some("55.00"), None);
        verify_and_confirm(&frame, 5500).await.unwrap();
        assert!(frame.confirmed());
    }

    #[tokio::test]
    async fn test_allowance_mismatch_aborts_before_confirmation() {
        let frame = FrameFixture::new(Some("₪40.00"), None);
        let err = verify_and_confirm(&frame, 5500).await.unwrap_err();
        assert!(err.to_string().contains("allowance mismatch"));
        assert!(!frame.confirmed());
    }

    #[tokio::test]
    async fn test_missing_allowance_aborts_before_confirmation() {
        let frame = FrameFixture::new(None, None);
        assert!(verify_and_confirm(&frame, 5500).await.is_err());
        assert!(!frame.confirmed());
    }

    #[tokio::test]
    async fn test_nonzero_credit_notice_aborts_before_confirmation() {
        let frame = FrameFixture::new(Some("55.00"), Some("will also be charged 12.50"));
        let err = verify_and_confirm(&frame, 5500).await.unwrap_err();
        assert!(err.to_string().contains("credit card"));
        assert!(!frame.confirmed());
    }
}
