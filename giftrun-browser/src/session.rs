//! Browser session lifecycle and identity seeding
//!
//! The pipeline never logs in. Authentication state is supplied externally
//! as two base64 blobs (serialized cookie list, serialized local-storage
//! map), decoded at startup, written to transient files and injected into
//! the page context before the first real navigation.

use crate::{BrowserError, Result};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use chromiumoxide::cdp::browser_protocol::network::{
    CookieParam, CookieSameSite, SetCookiesParams,
};
use chromiumoxide::cdp::browser_protocol::page::ReloadParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Launch settings for the browser session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub headless: bool,
    /// Explicit chrome binary; autodetected when None
    pub chrome_binary: Option<PathBuf>,
    /// Directory the decoded identity-seed files are written to
    pub seed_dir: PathBuf,
}

/// One cookie from the externally captured session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedCookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub secure: bool,
}

/// Externally captured authentication state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentitySeed {
    pub cookies: Vec<SeedCookie>,
    pub storage: HashMap<String, serde_json::Value>,
}

impl IdentitySeed {
    /// Decodes the two seed blobs. Malformed input (non-base64, non-JSON)
    /// is a hard startup error.
    pub fn decode(cookies_b64: &str, storage_b64: &str) -> Result<Self> {
        let cookies = decode_blob(cookies_b64, "cookie list")?;
        let storage = decode_blob(storage_b64, "local storage map")?;
        Ok(Self { cookies, storage })
    }

    /// Writes the decoded seed to transient files under `dir`.
    pub fn write_seed_files(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        std::fs::write(
            dir.join("session.cookies.json"),
            serde_json::to_vec_pretty(&self.cookies)
                .map_err(|e| BrowserError::Seed(e.to_string()))?,
        )?;
        std::fs::write(
            dir.join("session.localstorage.json"),
            serde_json::to_vec_pretty(&self.storage)
                .map_err(|e| BrowserError::Seed(e.to_string()))?,
        )?;
        Ok(())
    }
}

fn decode_blob<T: serde::de::DeserializeOwned>(b64: &str, what: &str) -> Result<T> {
    let bytes = BASE64
        .decode(b64.trim())
        .map_err(|e| BrowserError::Seed(format!("{what} is not valid base64: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| BrowserError::Seed(format!("{what} is not valid JSON: {e}")))
}

/// Script that replays a local-storage map into the current origin.
fn storage_script(storage: &HashMap<String, serde_json::Value>) -> Result<String> {
    let data = serde_json::to_string(storage).map_err(|e| BrowserError::Seed(e.to_string()))?;
    Ok(format!(
        r#"(() => {{
            const data = {data};
            for (const [k, v] of Object.entries(data)) {{
                localStorage.setItem(k, typeof v === "string" ? v : JSON.stringify(v));
            }}
            return true;
        }})()"#
    ))
}

/// An exclusively owned browser session with one page
pub struct BrowserSession {
    browser: Browser,
    handler_task: tokio::task::JoinHandle<()>,
    page: Page,
}

impl BrowserSession {
    /// Launches the browser and opens the single page the run drives.
    pub async fn launch(config: &SessionConfig) -> Result<Self> {
        let mut builder = BrowserConfig::builder();
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(bin) = &config.chrome_binary {
            builder = builder.chrome_executable(bin);
        }
        let browser_config = builder.build().map_err(BrowserError::Launch)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        // The websocket handler must be polled for the session to make progress.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser.new_page("about:blank").await?;
        info!("Browser session launched");

        Ok(Self {
            browser,
            handler_task,
            page,
        })
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Injects the identity seed and lands on `url` with it applied:
    /// cookies first (sameSite forced to Lax), then a navigation, then the
    /// local-storage replay, then a reload so the app boots authenticated.
    pub async fn seed_identity(&self, seed: &IdentitySeed, url: &str) -> Result<()> {
        let mut cookies = Vec::with_capacity(seed.cookies.len());
        for cookie in &seed.cookies {
            let mut builder = CookieParam::builder()
                .name(&cookie.name)
                .value(&cookie.value)
                .secure(cookie.secure)
                .same_site(CookieSameSite::Lax);
            if let Some(domain) = &cookie.domain {
                builder = builder.domain(domain);
            }
            if let Some(path) = &cookie.path {
                builder = builder.path(path);
            }
            cookies.push(builder.build().map_err(BrowserError::Seed)?);
        }
        self.page.execute(SetCookiesParams::new(cookies)).await?;
        info!("Injected {} cookie(s)", seed.cookies.len());

        self.navigate(url).await?;
        self.page.evaluate(storage_script(&seed.storage)?).await?;
        self.page.execute(ReloadParams::default()).await?;
        self.page.wait_for_navigation().await?;
        info!("Replayed {} local-storage entr(ies)", seed.storage.len());
        Ok(())
    }

    pub async fn navigate(&self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| BrowserError::NavigateFailed {
                url: url.to_string(),
                details: e.to_string(),
            })?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| BrowserError::NavigateFailed {
                url: url.to_string(),
                details: e.to_string(),
            })?;
        Ok(())
    }

    /// Closes the session. Consumes self so the session is released exactly
    /// once; close failures are logged, never propagated.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("Failed to close browser cleanly: {}", e);
        }
        self.handler_task.abort();
        info!("Browser session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b64(json: &str) -> String {
        BASE64.encode(json)
    }

    #[test]
    fn test_decode_round_trips_cookies_and_storage() {
        let cookies = b64(r#"[{"name":"sid","value":"abc","domain":".shop.example","path":"/"}]"#);
        let storage = b64(r#"{"token":"xyz","flags":{"beta":true}}"#);

        let seed = IdentitySeed::decode(&cookies, &storage).unwrap();
        assert_eq!(seed.cookies.len(), 1);
        assert_eq!(seed.cookies[0].name, "sid");
        assert_eq!(seed.cookies[0].domain.as_deref(), Some(".shop.example"));
        assert_eq!(seed.storage["token"], serde_json::json!("xyz"));
    }

    #[test]
    fn test_decode_rejects_bad_base64_and_bad_json() {
        let good = b64("[]");
        let err = IdentitySeed::decode("%%%not-base64%%%", &b64("{}")).unwrap_err();
        assert!(err.to_string().contains("base64"));

        let err = IdentitySeed::decode(&good, &b64("not json at all")).unwrap_err();
        assert!(err.to_string().contains("JSON"));
    }

    #[test]
    fn test_storage_script_replays_every_entry() {
        let mut storage = HashMap::new();
        storage.insert("token".to_string(), serde_json::json!("abc"));
        let script = storage_script(&storage).unwrap();
        assert!(script.contains("localStorage.setItem"));
        assert!(script.contains("\"token\":\"abc\""));
    }
}
