//! Giftrun Browser
//!
//! Thin wrapper over a CDP browser session for the purchase/redemption
//! pipeline: launch and teardown, authenticated-identity seeding (cookies
//! plus local storage), ordered-selector element location, page helpers for
//! text/frame interaction, and the diagnostic snapshot store.
//!
//! The session is exclusively owned by the current run and closed exactly
//! once, on every exit path.

pub mod locate;
pub mod page_ops;
pub mod session;
pub mod snapshot;

pub use chromiumoxide::{Element, Page};
pub use locate::{SelectorStrategy, find_first, wait_for_element};
pub use session::{BrowserSession, IdentitySeed, SessionConfig};
pub use snapshot::SnapshotStore;

use thiserror::Error;

/// Result type alias for browser operations
pub type Result<T> = std::result::Result<T, BrowserError>;

/// Errors that can occur while driving the browser
#[derive(Debug, Error)]
pub enum BrowserError {
    /// Browser process could not be started
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    /// Navigation did not reach the requested URL
    #[error("Failed to navigate to {url}: {details}")]
    NavigateFailed { url: String, details: String },

    /// No selector strategy matched within its timeout
    #[error("No element matched any of: {tried}")]
    ElementNotFound { tried: String },

    /// Identity seed blob was not valid base64/JSON
    #[error("Invalid identity seed: {0}")]
    Seed(String),

    /// In-page script result could not be decoded
    #[error("Script evaluation failed: {0}")]
    Script(String),

    /// Underlying CDP call failed
    #[error("Browser call failed: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),

    /// Snapshot or seed file I/O failed
    #[error("Browser I/O failed: {0}")]
    Io(#[from] std::io::Error),
}
