//! Redemption loop
//!
//! Feeds extracted codes back into the site's redeem form, strictly in
//! extraction order. The loop is one unit of work: a failure on one code
//! aborts the remainder. An empty code sequence performs zero navigations.

use anyhow::{Context, bail};
use giftrun_browser::{BrowserSession, SnapshotStore, page_ops, wait_for_element};
use giftrun_core::domain::RedemptionCode;
use std::time::Duration;
use tracing::info;

/// Selectors of the redemption form
#[derive(Debug, Clone)]
pub struct RedeemUi {
    pub input: String,
    pub submit: String,
}

impl Default for RedeemUi {
    fn default() -> Self {
        Self {
            input: "[data-test-id=\"redeem-code-input\"]".to_string(),
            submit: "button[data-localization-key=\"user.redeem\"]".to_string(),
        }
    }
}

/// Drives the redemption UI once per code
pub struct RedemptionLoop<'a> {
    session: &'a BrowserSession,
    ui: &'a RedeemUi,
    snapshots: &'a SnapshotStore,
    redeem_url: &'a str,
    element_timeout: Duration,
    settle: Duration,
}

impl<'a> RedemptionLoop<'a> {
    pub fn new(
        session: &'a BrowserSession,
        ui: &'a RedeemUi,
        snapshots: &'a SnapshotStore,
        redeem_url: &'a str,
        element_timeout: Duration,
        settle: Duration,
    ) -> Self {
        Self {
            session,
            ui,
            snapshots,
            redeem_url,
            element_timeout,
            settle,
        }
    }

    /// Redeems every code in order, snapshotting each outcome by position.
    pub async fn redeem_all(&self, codes: &[RedemptionCode]) -> anyhow::Result<()> {
        for (i, code) in codes.iter().enumerate() {
            self.redeem_one(i, code)
                .await
                .with_context(|| format!("redemption of code #{i} failed"))?;
        }
        info!("Redeemed {} code(s)", codes.len());
        Ok(())
    }

    async fn redeem_one(&self, index: usize, code: &RedemptionCode) -> anyhow::Result<()> {
        let page = self.session.page();

        self.session.navigate(self.redeem_url).await?;
        let landed = page.url().await?.unwrap_or_default();
        if !landed.starts_with(self.redeem_url) {
            bail!("redeem navigation landed on {landed}");
        }

        wait_for_element(page, &self.ui.input, self.element_timeout).await?;
        page_ops::fill(page, &self.ui.input, code.as_str()).await?;

        let submit = wait_for_element(page, &self.ui.submit, self.element_timeout).await?;
        submit.click().await.context("redeem submit failed")?;

        tokio::time::sleep(self.settle).await;
        self.snapshots
            .capture(page, &format!("redeem/{index}"))
            .await;
        info!("Submitted redemption code #{index}");
        Ok(())
    }
}
