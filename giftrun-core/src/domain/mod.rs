//! Domain types for the giftrun pipeline

pub mod code;
pub mod message;
pub mod run;

pub use code::RedemptionCode;
pub use message::{InboxMessage, MailAttachment};
pub use run::{RunReport, RunStatus};
