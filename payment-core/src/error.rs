//! Error types for local (pre-network) validation
//!
//! Validation never aborts on the first problem: every check that fails is
//! recorded against the form field it belongs to, so the caller can render a
//! message next to each input.

use crate::types::CardBrand;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Result type for core operations that only fail on a single field
pub type Result<T> = std::result::Result<T, ValidationError>;

/// Why a card number was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CardNumberIssue {
    /// Not exactly 16 digits after stripping separators
    Length,
    /// Contains something other than digits and separators
    NonNumeric,
    /// Luhn checksum failed
    Checksum,
    /// Leading digits match no supported network
    UnknownBrand,
}

impl fmt::Display for CardNumberIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CardNumberIssue::Length => write!(f, "card number must be 16 digits"),
            CardNumberIssue::NonNumeric => write!(f, "card number must contain only digits"),
            CardNumberIssue::Checksum => write!(f, "card number checksum is invalid"),
            CardNumberIssue::UnknownBrand => write!(f, "card type is not supported"),
        }
    }
}

/// A single field-level validation failure
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ValidationError {
    #[error("Invalid card number: {0}")]
    CardNumber(CardNumberIssue),

    #[error("Invalid expiry date: {0}")]
    InvalidExpiry(String),

    #[error("Card has expired")]
    ExpiredCard,

    #[error("CVV must be {expected} digits for {brand}")]
    InvalidCvv { brand: CardBrand, expected: usize },

    #[error("Enter the cardholder's full name")]
    InvalidName,

    #[error("A proof of payment document is required for bank transfers")]
    MissingProof,

    #[error("Proof document is too large: {size} bytes (max {max})")]
    ProofTooLarge { size: usize, max: usize },

    #[error("Unsupported proof document type: {0} (allowed: pdf, png, jpg, jpeg)")]
    UnsupportedProofType(String),

    #[error("Reference number must be at least {min} characters")]
    MissingReference { min: usize },

    #[error("No outstanding balance to pay")]
    NoBalanceDue,

    #[error("Please enter a valid amount")]
    InvalidAmount,

    #[error("Bank reference is required")]
    MissingBankReference,

    #[error("A valid date (YYYY-MM-DD) is required")]
    MissingDate,

    #[error("Please enter a valid payment ID")]
    InvalidPaymentId,

    #[error("Please enter a valid student ID")]
    InvalidStudentId,

    #[error("Please enter a valid penalty amount: {0}")]
    InvalidPenaltyAmount(String),

    #[error("Please provide a rejection reason")]
    MissingRejectionReason,

    #[error("Select at least one student")]
    EmptyTargetSet,
}

/// Form field a validation error is reported against
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    CardNumber,
    Expiry,
    Cvv,
    HolderName,
    Amount,
    ReferenceNumber,
    ProofDocument,
    BankRef,
    Date,
    PaymentId,
    StudentId,
    PenaltyAmount,
    Reason,
    Students,
}

impl Field {
    /// Key used when rendering errors next to form inputs
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::CardNumber => "card_number",
            Field::Expiry => "expiry",
            Field::Cvv => "cvv",
            Field::HolderName => "holder_name",
            Field::Amount => "amount",
            Field::ReferenceNumber => "reference_number",
            Field::ProofDocument => "proof_document",
            Field::BankRef => "bank_ref",
            Field::Date => "date",
            Field::PaymentId => "payment_id",
            Field::StudentId => "student_id",
            Field::PenaltyAmount => "penalty_amount",
            Field::Reason => "reason",
            Field::Students => "students",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field-keyed collection of validation failures
///
/// Holds at most one error per field; the first recorded error for a field
/// wins, matching the order in which checks run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldErrors {
    errors: BTreeMap<Field, ValidationError>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection holding exactly one error
    pub fn single(field: Field, error: ValidationError) -> Self {
        let mut errors = Self::new();
        errors.add(field, error);
        errors
    }

    pub fn add(&mut self, field: Field, error: ValidationError) {
        self.errors.entry(field).or_insert(error);
    }

    /// Record the error of a failed check, discarding the success value
    pub fn capture<T>(&mut self, field: Field, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                self.add(field, error);
                None
            }
        }
    }

    pub fn get(&self, field: Field) -> Option<&ValidationError> {
        self.errors.get(&field)
    }

    pub fn contains(&self, field: Field) -> bool {
        self.errors.contains_key(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &ValidationError)> {
        self.errors.iter().map(|(field, error)| (*field, error))
    }

    /// `Ok(value)` when nothing was recorded, otherwise the collected errors
    pub fn into_result<T>(self, value: impl FnOnce() -> T) -> std::result::Result<T, FieldErrors> {
        if self.errors.is_empty() {
            Ok(value())
        } else {
            Err(self)
        }
    }

    /// Messages keyed by field name, ready for rendering
    pub fn messages(&self) -> BTreeMap<&'static str, String> {
        self.errors
            .iter()
            .map(|(field, error)| (field.as_str(), error.to_string()))
            .collect()
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, error) in &self.errors {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", field, error)?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for FieldErrors {}

/// Session lifecycle and access failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Authentication required")]
    NotAuthenticated,

    #[error("Session token is empty")]
    EmptyToken,

    #[error("Role {role:?} is inconsistent with admin flag {is_admin}")]
    RoleMismatch { role: crate::session::Role, is_admin: bool },

    #[error("Access denied: {required:?} portal is not accessible with {actual:?} credentials")]
    AccessDenied {
        required: crate::session::Role,
        actual: crate::session::Role,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_error_per_field_wins() {
        let mut errors = FieldErrors::new();
        errors.add(Field::Cvv, ValidationError::InvalidName);
        errors.add(
            Field::Cvv,
            ValidationError::InvalidCvv {
                brand: CardBrand::Visa,
                expected: 3,
            },
        );

        assert_eq!(errors.len(), 1);
        assert_eq!(errors.get(Field::Cvv), Some(&ValidationError::InvalidName));
    }

    #[test]
    fn test_messages_are_keyed_by_field_name() {
        let mut errors = FieldErrors::new();
        errors.add(Field::Expiry, ValidationError::ExpiredCard);
        errors.add(Field::HolderName, ValidationError::InvalidName);

        let messages = errors.messages();
        assert_eq!(messages["expiry"], "Card has expired");
        assert!(messages.contains_key("holder_name"));
        assert_eq!(
            errors.to_string(),
            "expiry: Card has expired; holder_name: Enter the cardholder's full name"
        );
    }

    #[test]
    fn test_into_result() {
        let ok: std::result::Result<u8, FieldErrors> = FieldErrors::new().into_result(|| 7);
        assert_eq!(ok, Ok(7));

        let err = FieldErrors::single(Field::Amount, ValidationError::NoBalanceDue).into_result(|| 7);
        assert!(err.is_err());
    }
}
