//! Giftrun Runner
//!
//! One process = one run of the purchase/redemption pipeline:
//! - Configuration: everything from environment variables, validated up front
//! - Checkout: drive the purchase UI with a seeded, pre-authenticated session
//! - Inbox: poll for the voucher confirmation mail
//! - Extraction: PDF attachments → redemption codes
//! - Redemption: feed each code back into the site
//! - Report: one outcome mail per run with all diagnostic snapshots attached
//!
//! Scheduling of recurring runs is external (CI dispatch); the process
//! exits non-zero when the run failed.

mod checkout;
mod config;
mod controller;
mod redeem;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::controller::RunController;
use giftrun_browser::IdentitySeed;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "giftrun_runner=info,giftrun_mail=info,giftrun_browser=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting giftrun runner");

    // Precondition failures abort before any run begins; only errors past
    // this point are converted into failure reports.
    let config = Config::from_env().context("configuration incomplete")?;
    config.validate()?;
    info!(
        "Loaded configuration: provider={}, shop={}",
        config.mail_provider, config.shop_url
    );

    let seed = IdentitySeed::decode(&config.cookies_b64, &config.storage_b64)
        .context("identity seed is malformed")?;
    info!(
        "Decoded identity seed ({} cookie(s), {} storage entr(ies))",
        seed.cookies.len(),
        seed.storage.len()
    );

    let controller = RunController::new(config, seed);
    let report = controller.execute().await;

    info!("Run finished: {:?}: {}", report.status, report.message);
    if !report.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
