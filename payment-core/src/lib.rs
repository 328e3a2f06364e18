//! Student Finance Portal Payment Core
//!
//! Validation and bookkeeping for student payments and bank reconciliation.
//! Nothing in this crate touches the network: every check here runs before a
//! request is built, and a rejected input never produces one.
//!
//! # Components
//!
//! - **Card validation**: Luhn checksum, brand detection, expiry and CVV rules
//! - **Payment intents**: immutable submissions with collision-free references
//! - **Reconciliation**: manual bank entries, match targets, matched-state book
//! - **Collections**: reminder, penalty and block actions over target sets
//! - **Sessions**: role-checked session object behind an explicit provider
//!
//! # Invariants
//!
//! - A constructed `CardInput` has 16 Luhn-valid digits and a supported brand
//! - A `PaymentIntent` is never modified after it is built
//! - A matched bank transaction is never matched again
//! - Money is `rust_decimal::Decimal` end to end

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, missing_debug_implementations)]

pub mod card;
pub mod collections;
pub mod error;
pub mod fees;
pub mod intent;
pub mod proof;
pub mod reconciliation;
pub mod session;
pub mod types;

// Re-exports
pub use card::{validate_card, CardInput, RawCardFields};
pub use collections::{ActionKind, CollectionsAction, CollectionsOutcome, TargetSet};
pub use error::{CardNumberIssue, Field, FieldErrors, Result, SessionError, ValidationError};
pub use fees::{dues_balance, FeeBreakdown, FeeCalculator};
pub use intent::{build_intent, check_bank_transfer, BankTransferFields, PaymentDetails, PaymentIntent};
pub use proof::{ProofDocument, MAX_PROOF_BYTES};
pub use reconciliation::{
    ImportSummary, ManualBankEntry, MatchBody, MatchRequest, MatchStateError, MatchTarget, RawManualEntry,
    ReconciliationBook, ReconciliationStats,
};
pub use session::{LoginResponse, Role, Session, SessionProvider, SessionUser};
pub use types::{
    CardBrand, ImportedBankTransaction, MatchState, PaymentChannel, PaymentMethod, PaymentRecord, PaymentStatus,
};
