//! Runner configuration
//!
//! Defines all configurable parameters for one run: mail account, shop
//! URLs, item selection, expected charge, polling bounds and diagnostic
//! paths. Everything is passed explicitly into the components at
//! construction; no ambient process state past this module.

use std::path::PathBuf;
use std::time::Duration;

/// Runner configuration
///
/// All timeouts and intervals are configurable to allow tuning for
/// different deployments (the voucher mail can take minutes to arrive).
#[derive(Debug, Clone)]
pub struct Config {
    /// Mail provider name; IMAP/SMTP hosts are derived as
    /// `imap.<provider>.com` / `smtp.<provider>.com`
    pub mail_provider: String,
    pub mail_user: String,
    pub mail_password: String,
    /// Recipient of the outcome reports
    pub report_to: String,
    /// Remote mailbox searched for the voucher mail
    pub mailbox: String,

    /// Base64 blob: serialized cookie list captured from a logged-in session
    pub cookies_b64: String,
    /// Base64 blob: serialized local-storage map from the same session
    pub storage_b64: String,

    /// Catalog page listing the gift-card items
    pub shop_url: String,
    /// Redemption form page
    pub redeem_url: String,
    /// Visible labels of the two items added to the order
    pub item_labels: Vec<String>,
    /// Total the benefit card is expected to be charged, in cents
    pub expected_total_cents: u64,

    /// Subject fragment of the voucher confirmation mail
    pub voucher_subject: String,
    /// Case-insensitive filename fragment marking a voucher PDF
    pub attachment_marker: String,

    /// Deadline for the voucher mail to appear in the inbox
    pub mail_timeout: Duration,
    /// Pause between inbox search attempts
    pub mail_poll_interval: Duration,
    /// Deadline for any single selector strategy
    pub element_timeout: Duration,
    /// Pause after UI actions for the page to settle
    pub settle: Duration,

    /// Selectors whose visibility marks the benign "benefit already used
    /// today" terminal state
    pub benign_notice_selectors: Vec<String>,

    pub headless: bool,
    pub chrome_binary: Option<PathBuf>,
    pub snapshot_dir: PathBuf,
    /// Directory the decoded identity-seed files are written to
    pub seed_dir: PathBuf,
}

impl Config {
    /// Creates a configuration with defaults for everything but the
    /// account- and site-specific values.
    pub fn new(
        mail_provider: String,
        mail_user: String,
        mail_password: String,
        report_to: String,
        cookies_b64: String,
        storage_b64: String,
        shop_url: String,
        redeem_url: String,
    ) -> Self {
        Self {
            mail_provider,
            mail_user,
            mail_password,
            report_to,
            mailbox: "[Gmail]/All Mail".to_string(),
            cookies_b64,
            storage_b64,
            shop_url,
            redeem_url,
            item_labels: vec!["Gift Card - 25".to_string(), "Gift Card - 30".to_string()],
            expected_total_cents: 5500,
            voucher_subject: "Your gift card is ready".to_string(),
            attachment_marker: "gift card".to_string(),
            mail_timeout: Duration::from_secs(120),
            mail_poll_interval: Duration::from_millis(1500),
            element_timeout: Duration::from_secs(10),
            settle: Duration::from_millis(2000),
            benign_notice_selectors: vec!["[data-test-id=\"benefit-already-used\"]".to_string()],
            headless: true,
            chrome_binary: None,
            snapshot_dir: PathBuf::from("screenshots"),
            seed_dir: PathBuf::from(".session"),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Required:
    /// - MAIL_PROVIDER, MAIL_USER, MAIL_PASSWORD, REPORT_TO
    /// - SHOP_COOKIES_B64, SHOP_STORAGE_B64
    /// - SHOP_URL, REDEEM_URL
    ///
    /// Optional (defaults in parentheses):
    /// - MAILBOX ("[Gmail]/All Mail"), ITEM_LABELS (comma-separated),
    ///   EXPECTED_TOTAL ("55.00"), VOUCHER_SUBJECT, ATTACHMENT_MARKER,
    ///   MAIL_TIMEOUT_SECS (120), MAIL_POLL_INTERVAL_MS (1500),
    ///   ELEMENT_TIMEOUT_SECS (10), SETTLE_MS (2000),
    ///   BENIGN_NOTICE_SELECTORS (comma-separated), HEADLESS (true),
    ///   CHROME_BIN, SNAPSHOT_DIR ("screenshots"), SEED_DIR (".session")
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::new(
            require_env("MAIL_PROVIDER")?,
            require_env("MAIL_USER")?,
            require_env("MAIL_PASSWORD")?,
            require_env("REPORT_TO")?,
            require_env("SHOP_COOKIES_B64")?,
            require_env("SHOP_STORAGE_B64")?,
            require_env("SHOP_URL")?,
            require_env("REDEEM_URL")?,
        );

        if let Ok(mailbox) = std::env::var("MAILBOX") {
            config.mailbox = mailbox;
        }
        if let Ok(labels) = std::env::var("ITEM_LABELS") {
            config.item_labels = split_list(&labels);
        }
        if let Ok(total) = std::env::var("EXPECTED_TOTAL") {
            config.expected_total_cents = parse_amount_cents(&total)
                .ok_or_else(|| anyhow::anyhow!("EXPECTED_TOTAL is not a valid amount: {total}"))?;
        }
        if let Ok(subject) = std::env::var("VOUCHER_SUBJECT") {
            config.voucher_subject = subject;
        }
        if let Ok(marker) = std::env::var("ATTACHMENT_MARKER") {
            config.attachment_marker = marker;
        }
        if let Some(secs) = env_u64("MAIL_TIMEOUT_SECS") {
            config.mail_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = env_u64("MAIL_POLL_INTERVAL_MS") {
            config.mail_poll_interval = Duration::from_millis(ms);
        }
        if let Some(secs) = env_u64("ELEMENT_TIMEOUT_SECS") {
            config.element_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = env_u64("SETTLE_MS") {
            config.settle = Duration::from_millis(ms);
        }
        if let Ok(selectors) = std::env::var("BENIGN_NOTICE_SELECTORS") {
            config.benign_notice_selectors = split_list(&selectors);
        }
        if let Ok(headless) = std::env::var("HEADLESS") {
            config.headless = headless != "false" && headless != "0";
        }
        if let Ok(bin) = std::env::var("CHROME_BIN") {
            config.chrome_binary = Some(PathBuf::from(bin));
        }
        if let Ok(dir) = std::env::var("SNAPSHOT_DIR") {
            config.snapshot_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("SEED_DIR") {
            config.seed_dir = PathBuf::from(dir);
        }

        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.mail_provider.is_empty() || self.mail_user.is_empty() {
            anyhow::bail!("mail account must be configured");
        }
        if self.report_to.is_empty() {
            anyhow::bail!("report recipient must be configured");
        }
        if !self.shop_url.starts_with("http://") && !self.shop_url.starts_with("https://") {
            anyhow::bail!("shop_url must start with http:// or https://");
        }
        if !self.redeem_url.starts_with("http://") && !self.redeem_url.starts_with("https://") {
            anyhow::bail!("redeem_url must start with http:// or https://");
        }
        if self.item_labels.len() != 2 {
            anyhow::bail!("exactly two item labels are required");
        }
        if self.expected_total_cents == 0 {
            anyhow::bail!("expected_total_cents must be greater than 0");
        }
        if self.mail_poll_interval >= self.mail_timeout {
            anyhow::bail!("mail_poll_interval must be shorter than mail_timeout");
        }
        Ok(())
    }

    pub fn imap_host(&self) -> String {
        format!("imap.{}.com", self.mail_provider)
    }

    pub fn smtp_host(&self) -> String {
        format!("smtp.{}.com", self.mail_provider)
    }
}

fn require_env(name: &str) -> anyhow::Result<String> {
    std::env::var(name).map_err(|_| anyhow::anyhow!("{name} environment variable not set"))
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Extracts the first monetary amount in `text` as integer cents.
///
/// Tolerates currency symbols, directional marks and surrounding words;
/// reads at most two fraction digits ("55" → 5500, "₪55.0" → 5500,
/// "55.00 NIS" → 5500).
pub fn parse_amount_cents(text: &str) -> Option<u64> {
    let mut whole = String::new();
    let mut frac: Option<String> = None;
    let mut seen = false;

    for ch in text.chars() {
        if ch.is_ascii_digit() {
            seen = true;
            match &mut frac {
                Some(f) => f.push(ch),
                None => whole.push(ch),
            }
        } else if ch == '.' && seen && frac.is_none() {
            frac = Some(String::new());
        } else if seen {
            break;
        }
    }
    if !seen {
        return None;
    }

    let whole: u64 = whole.parse().ok()?;
    let frac = frac.unwrap_or_default();
    let cents = match frac.len() {
        0 => 0,
        1 => frac.parse::<u64>().ok()? * 10,
        _ => frac[..2].parse::<u64>().ok()?,
    };
    Some(whole * 100 + cents)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config::new(
            "gmail".to_string(),
            "runner@example.com".to_string(),
            "secret".to_string(),
            "owner@example.com".to_string(),
            "Y29va2llcw==".to_string(),
            "c3RvcmFnZQ==".to_string(),
            "https://shop.example/giftcards".to_string(),
            "https://shop.example/me/redeem-code".to_string(),
        )
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = test_config();
        assert_eq!(config.mail_timeout, Duration::from_secs(120));
        assert_eq!(config.mail_poll_interval, Duration::from_millis(1500));
        assert_eq!(config.expected_total_cents, 5500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_derived_hosts() {
        let config = test_config();
        assert_eq!(config.imap_host(), "imap.gmail.com");
        assert_eq!(config.smtp_host(), "smtp.gmail.com");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = test_config();
        config.shop_url = "not-a-url".to_string();
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.item_labels = vec!["only one".to_string()];
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.mail_poll_interval = config.mail_timeout;
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.expected_total_cents = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_amount_cents() {
        assert_eq!(parse_amount_cents("55"), Some(5500));
        assert_eq!(parse_amount_cents("₪55.0"), Some(5500));
        assert_eq!(parse_amount_cents("will be charged 55.00 NIS"), Some(5500));
        assert_eq!(parse_amount_cents("(your credit card will be charged: 0)"), Some(0));
        assert_eq!(parse_amount_cents("12.345"), Some(1234));
        assert_eq!(parse_amount_cents("no amount here"), None);
    }

    #[test]
    fn test_split_list_trims_and_drops_empties() {
        assert_eq!(
            split_list("Gift Card - 25, Gift Card - 30,"),
            vec!["Gift Card - 25".to_string(), "Gift Card - 30".to_string()]
        );
    }
}
