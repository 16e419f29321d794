//! Error types for the mail crate

use thiserror::Error;

/// Result type alias for mail operations
pub type Result<T> = std::result::Result<T, MailError>;

/// Errors that can occur while talking to the mail provider
#[derive(Debug, Error)]
pub enum MailError {
    /// IMAP protocol or connection failure
    #[error("IMAP operation failed: {0}")]
    Imap(#[from] imap::Error),

    /// TLS setup failure
    #[error("TLS setup failed: {0}")]
    Tls(#[from] native_tls::Error),

    /// SMTP transport failure
    #[error("SMTP send failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    /// Outbound message assembly failure
    #[error("Failed to build report message: {0}")]
    Message(#[from] lettre::error::Error),

    /// Malformed sender or recipient address
    #[error("Invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// Fetched message could not be parsed
    #[error("Failed to parse message: {0}")]
    Parse(String),

    /// Attachment file could not be read
    #[error("Attachment I/O failed: {0}")]
    Io(#[from] std::io::Error),
}
