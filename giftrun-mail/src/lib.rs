//! Giftrun Mail
//!
//! The email side of the pipeline:
//! - Inbox query engine: provider search expressions, polling fetch, and
//!   client-side arrival filtering over IMAP
//! - Document code extractor: PDF attachments → text → redemption codes
//! - Report sender: one outbound SMTP message per run with every diagnostic
//!   snapshot attached
//!
//! The IMAP and SMTP clients are blocking; callers run on tokio, so every
//! remote operation is pushed through `spawn_blocking`.

pub mod error;
pub mod extract;
pub mod inbox;
pub mod report;

pub use error::{MailError, Result};
pub use extract::{extract_codes, one_time_code};
pub use inbox::{InboxConfig, InboxEngine, search_expression};
pub use report::{ReportSender, SmtpConfig};
