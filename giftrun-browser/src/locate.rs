//! Ordered selector strategies
//!
//! Site-specific selectors are brittle, so each element lookup is an
//! explicit ordered list of strategies, tried in turn, each with its own
//! short timeout. No implicit fallback chaining; the failure names every
//! selector that was tried.

use crate::{BrowserError, Result};
use chromiumoxide::{Element, Page};
use giftrun_core::poll::{PollSpec, poll_until};
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

const PROBE_INTERVAL: Duration = Duration::from_millis(250);

/// One way to find an element, with its own deadline
#[derive(Debug, Clone)]
pub struct SelectorStrategy {
    pub css: String,
    pub timeout: Duration,
}

impl SelectorStrategy {
    pub fn new(css: impl Into<String>, timeout: Duration) -> Self {
        Self {
            css: css.into(),
            timeout,
        }
    }
}

/// Tries each strategy in order; first match wins.
pub async fn find_first(page: &Page, strategies: &[SelectorStrategy]) -> Result<Element> {
    for strategy in strategies {
        match wait_for_element(page, &strategy.css, strategy.timeout).await {
            Ok(element) => return Ok(element),
            Err(_) => debug!(
                "Selector \"{}\" did not match within {:?}",
                strategy.css, strategy.timeout
            ),
        }
    }

    Err(BrowserError::ElementNotFound {
        tried: strategies
            .iter()
            .map(|s| s.css.as_str())
            .collect::<Vec<_>>()
            .join(", "),
    })
}

/// Waits for a single selector to match, bounded by `timeout`.
pub async fn wait_for_element(page: &Page, css: &str, timeout: Duration) -> Result<Element> {
    let found: Mutex<Option<Element>> = Mutex::new(None);
    let spec = PollSpec::new(timeout, PROBE_INTERVAL, format!("element not found: {css}"));

    let slot = &found;
    let polled = poll_until(&spec, || async move {
        match page.find_element(css).await {
            Ok(element) => {
                *slot.lock().unwrap() = Some(element);
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    })
    .await;

    match polled {
        Ok(()) => found
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| BrowserError::ElementNotFound {
                tried: css.to_string(),
            }),
        Err(_) => Err(BrowserError::ElementNotFound {
            tried: css.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_construction() {
        let s = SelectorStrategy::new("[data-test-id=\"x\"]", Duration::from_secs(5));
        assert_eq!(s.css, "[data-test-id=\"x\"]");
        assert_eq!(s.timeout, Duration::from_secs(5));
    }
}
