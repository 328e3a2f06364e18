//! Student Finance Portal Client
//!
//! Network half of the payment and reconciliation workflows. Every operation
//! runs the matching `payment_core` validation first; input that fails it is
//! returned as [`ClientError::Validation`] and no request is made.
//!
//! # Operations
//!
//! - **Payments**: card and bank-transfer submission, balance, history
//! - **Verification**: finance review of pending bank transfers
//! - **Bank**: feed sync, manual entry, unmatched listing, matching
//! - **Collections**: reminders, penalties and registration blocks

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, missing_debug_implementations)]

pub mod api;
pub mod auth;
pub mod bank;
pub mod collections;
pub mod config;
pub mod error;
pub mod metrics;
pub mod payments;
pub mod verification;

// Re-exports
pub use api::FinanceApi;
pub use auth::AuthClient;
pub use bank::{BankImporter, MatchResult, TransactionMatcher};
pub use collections::CollectionsClient;
pub use config::Config;
pub use error::{ClientError, Result};
pub use payments::{ConfirmedPayment, PaymentClient, PaymentHistory, Receipt, StudentStatus};
pub use verification::{PendingPayments, ReviewOutcome, VerificationClient};
