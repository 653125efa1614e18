//! Core business logic for fintrack
//!
//! - recurring: the recurring-transaction engine and sweep
//! - stats: totals, category breakdowns, month-over-month comparison
//! - budget: budget caps and the monthly overview
//! - auth: registration, sessions, refresh-token rotation
//! - ai: provider client, chat, transaction parsing, insights
//! - email: bank-email import
//! - export: CSV rendering

pub mod ai;
pub mod auth;
pub mod budget;
pub mod email;
pub mod error;
pub mod export;
pub mod recurring;
pub mod stats;

pub use error::{CoreError, CoreResult};
