//! Payment intent construction
//!
//! A [`PaymentIntent`] is built once validation has passed, sent once, and
//! never modified. Retrying is always an explicit user action.

use crate::card::CardInput;
use crate::error::{Field, FieldErrors, ValidationError};
use crate::proof::ProofDocument;
use crate::types::{PaymentChannel, PaymentMethod};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::debug;

/// Shortest bank-transfer reference accepted
pub const MIN_REFERENCE_LENGTH: usize = 3;

static LAST_REFERENCE_STAMP: AtomicI64 = AtomicI64::new(0);

/// User-supplied bank transfer details
#[derive(Debug, Clone, Default)]
pub struct BankTransferFields {
    pub reference_number: String,
    pub proof_document: Option<ProofDocument>,
}

/// Validated method-specific input
#[derive(Debug, Clone)]
pub enum PaymentDetails {
    Card(CardInput),
    BankTransfer(BankTransferFields),
}

impl PaymentDetails {
    pub fn method(&self) -> PaymentMethod {
        match self {
            PaymentDetails::Card(_) => PaymentMethod::Card,
            PaymentDetails::BankTransfer(_) => PaymentMethod::BankTransfer,
        }
    }
}

/// Normalized payment submission
#[derive(Debug, Clone)]
pub struct PaymentIntent {
    amount: Decimal,
    method: PaymentMethod,
    reference_number: String,
    proof_document: Option<ProofDocument>,
    card_last4: Option<String>,
    initiated_at: DateTime<Utc>,
}

impl PaymentIntent {
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn method(&self) -> PaymentMethod {
        self.method
    }

    pub fn channel(&self) -> PaymentChannel {
        self.method.channel()
    }

    pub fn reference_number(&self) -> &str {
        &self.reference_number
    }

    pub fn proof_document(&self) -> Option<&ProofDocument> {
        self.proof_document.as_ref()
    }

    /// Last four card digits; `None` for bank transfers
    pub fn card_last4(&self) -> Option<&str> {
        self.card_last4.as_deref()
    }

    /// When the user committed to paying, not when the backend settled
    pub fn initiated_at(&self) -> DateTime<Utc> {
        self.initiated_at
    }
}

/// Strictly increasing millisecond stamp, never behind `now`
fn next_reference_stamp(now: DateTime<Utc>) -> i64 {
    let wanted = now.timestamp_millis();
    let mut last = LAST_REFERENCE_STAMP.load(Ordering::Relaxed);
    loop {
        let next = wanted.max(last + 1);
        match LAST_REFERENCE_STAMP.compare_exchange_weak(last, next, Ordering::SeqCst, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(observed) => last = observed,
        }
    }
}

/// Reference for a card payment: `PAY-<stamp>-<last4>`
pub fn card_reference(now: DateTime<Utc>, last4: &str) -> String {
    format!("PAY-{}-{}", next_reference_stamp(now), last4)
}

/// Reference and proof checks for a bank transfer
///
/// Needs no amount, so callers can run it before looking up the balance.
pub fn check_bank_transfer(fields: &BankTransferFields) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    add_bank_transfer_errors(fields, &mut errors);
    errors.into_result(|| ())
}

fn add_bank_transfer_errors(fields: &BankTransferFields, errors: &mut FieldErrors) {
    if fields.reference_number.trim().chars().count() < MIN_REFERENCE_LENGTH {
        errors.add(
            Field::ReferenceNumber,
            ValidationError::MissingReference {
                min: MIN_REFERENCE_LENGTH,
            },
        );
    }
    if fields.proof_document.is_none() {
        errors.add(Field::ProofDocument, ValidationError::MissingProof);
    }
}

/// Build an intent from validated details
///
/// `amount` is the outstanding balance being paid and `initiated_at` the
/// client clock at the moment the user pressed pay.
pub fn build_intent(
    details: PaymentDetails,
    amount: Decimal,
    initiated_at: DateTime<Utc>,
) -> Result<PaymentIntent, FieldErrors> {
    let mut errors = FieldErrors::new();

    if amount <= Decimal::ZERO {
        errors.add(Field::Amount, ValidationError::NoBalanceDue);
    }

    let method = details.method();
    let (reference_number, proof_document, card_last4) = match details {
        PaymentDetails::Card(card) => {
            let last4 = card.last4().to_string();
            (card_reference(initiated_at, &last4), None, Some(last4))
        }
        PaymentDetails::BankTransfer(fields) => {
            add_bank_transfer_errors(&fields, &mut errors);
            (fields.reference_number.trim().to_string(), fields.proof_document, None)
        }
    };

    if !errors.is_empty() {
        debug!("Payment intent rejected locally: {}", errors);
        return Err(errors);
    }

    Ok(PaymentIntent {
        amount,
        method,
        reference_number,
        proof_document,
        card_last4,
        initiated_at,
    })
}
