//! Giftrun Core
//!
//! Core types and abstractions for the giftrun purchase/redemption pipeline.
//!
//! This crate contains:
//! - Domain types: Core business entities (RunReport, InboxMessage, RedemptionCode)
//! - Poll: the bounded retry-until-true primitive every external-channel wait
//!   in the system is built on

pub mod domain;
pub mod poll;
