//! Condition poller
//!
//! Bounded retry-until-true primitive. Every wait on an external
//! asynchronous channel in the system (inbox arrival, element appearance)
//! is expressed as one probe closure plugged into [`poll_until`]. The
//! channels involved offer no push notification, so the poller busy-waits
//! with a fixed interval and a hard deadline.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

/// Configuration for one bounded retry loop
///
/// Caller obligation: `interval < timeout`. Violations are not validated;
/// they degrade the loop to a single evaluation.
#[derive(Debug, Clone)]
pub struct PollSpec {
    pub timeout: Duration,
    pub interval: Duration,
    /// Message carried by the timeout error, naming what was being waited for
    pub on_timeout: String,
}

impl PollSpec {
    pub fn new(timeout: Duration, interval: Duration, on_timeout: impl Into<String>) -> Self {
        Self {
            timeout,
            interval,
            on_timeout: on_timeout.into(),
        }
    }
}

/// Raised when the probe never returned true within the deadline
///
/// Callers decide whether a timeout is fatal; the poller itself never
/// retries past the deadline.
#[derive(Debug, Error)]
#[error("condition not met within {timeout:?}: {message}")]
pub struct PollTimeout {
    pub timeout: Duration,
    pub message: String,
}

/// Repeatedly evaluates `probe` until it returns true or the deadline elapses.
///
/// The probe is evaluated immediately; on false, the poller sleeps
/// `spec.interval` and re-evaluates until elapsed wall-clock time exceeds
/// `spec.timeout`, then fails with [`PollTimeout`] carrying
/// `spec.on_timeout`. A probe error aborts the loop immediately: errors are
/// hard failures (e.g. a dead IMAP connection), not "false yet".
pub async fn poll_until<F, Fut>(spec: &PollSpec, mut probe: F) -> anyhow::Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<bool>>,
{
    let started = Instant::now();

    loop {
        if probe().await? {
            return Ok(());
        }

        if started.elapsed() > spec.timeout {
            return Err(PollTimeout {
                timeout: spec.timeout,
                message: spec.on_timeout.clone(),
            }
            .into());
        }

        debug!("Condition not met, retrying in {:?}", spec.interval);
        tokio::time::sleep(spec.interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_spec(timeout_ms: u64, message: &str) -> PollSpec {
        PollSpec::new(
            Duration::from_millis(timeout_ms),
            Duration::from_millis(5),
            message,
        )
    }

    #[tokio::test]
    async fn test_immediate_success_polls_once() {
        let calls = AtomicUsize::new(0);

        let result = poll_until(&fast_spec(100, "never"), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_succeeds_once_condition_becomes_true() {
        let calls = AtomicUsize::new(0);

        let result = poll_until(&fast_spec(500, "never"), || async {
            Ok(calls.fetch_add(1, Ordering::SeqCst) >= 3)
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_timeout_carries_configured_message() {
        let result = poll_until(&fast_spec(20, "mail for query X"), || async { Ok(false) }).await;

        let err = result.unwrap_err();
        let timeout = err
            .downcast_ref::<PollTimeout>()
            .expect("expected a PollTimeout");
        assert_eq!(timeout.message, "mail for query X");
        assert!(err.to_string().contains("mail for query X"));
    }

    #[tokio::test]
    async fn test_probe_error_aborts_immediately() {
        let calls = AtomicUsize::new(0);

        let result = poll_until(&fast_spec(500, "never"), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("connection refused")
        })
        .await;

        let err = result.unwrap_err();
        assert!(err.to_string().contains("connection refused"));
        assert!(err.downcast_ref::<PollTimeout>().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
