//! Bank reconciliation: manual transaction entry, import summaries, match
//! targets and the operator's view of imported transactions

use crate::error::{Field, FieldErrors, ValidationError};
use crate::types::{ImportedBankTransaction, MatchState, PaymentChannel};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use thiserror::Error;

/// Manual bank transaction entry as typed by a finance operator
#[derive(Debug, Clone, Default)]
pub struct RawManualEntry {
    pub bank_ref: String,
    pub amount: String,
    pub date: String,
    pub description: String,
}

/// Validated manual bank transaction, ready to submit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManualBankEntry {
    pub bank_ref: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub date: NaiveDate,
    pub description: String,
}

/// Parse a strictly positive decimal amount
pub fn parse_positive_amount(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw.trim())
        .ok()
        .filter(|amount| *amount > Decimal::ZERO)
}

/// Parse a strictly positive integer id
pub fn parse_positive_id(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok().filter(|id| *id > 0)
}

impl RawManualEntry {
    pub fn validate(&self) -> Result<ManualBankEntry, FieldErrors> {
        let mut errors = FieldErrors::new();

        let bank_ref = self.bank_ref.trim();
        if bank_ref.is_empty() {
            errors.add(Field::BankRef, ValidationError::MissingBankReference);
        }

        let amount = parse_positive_amount(&self.amount);
        if amount.is_none() {
            errors.add(Field::Amount, ValidationError::InvalidAmount);
        }

        let date = NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d").ok();
        if date.is_none() {
            errors.add(Field::Date, ValidationError::MissingDate);
        }

        match (amount, date) {
            (Some(amount), Some(date)) if errors.is_empty() => Ok(ManualBankEntry {
                bank_ref: bank_ref.to_string(),
                amount,
                date,
                description: self.description.trim().to_string(),
            }),
            _ => Err(errors),
        }
    }
}

/// Aggregate counts reported by a bank import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImportSummary {
    pub imported_count: u64,
    #[serde(alias = "auto_matched_count")]
    pub auto_matched: u64,
    #[serde(alias = "unmatched_count")]
    pub unmatched: u64,
}

impl ImportSummary {
    /// Transactions an operator still has to match by hand
    pub fn needs_manual_review(&self) -> u64 {
        self.unmatched
    }

    /// Whether auto-matched and unmatched add up to the import total
    pub fn is_consistent(&self) -> bool {
        self.auto_matched.checked_add(self.unmatched) == Some(self.imported_count)
    }

    pub fn message(&self) -> String {
        match self.unmatched {
            0 => "All transactions have been successfully matched!".to_string(),
            1 => "1 transaction requires manual matching.".to_string(),
            n => format!("{} transactions require manual matching.", n),
        }
    }
}

/// What an unmatched transaction should be bound to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchTarget {
    /// An existing payment record
    Existing { payment_id: i64 },
    /// A new payment for a student; method defaults to bank transfer
    New {
        student_id: i64,
        payment_method: Option<PaymentChannel>,
    },
}

/// Operator request to match one transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRequest {
    pub transaction_id: i64,
    pub target: MatchTarget,
    pub notes: Option<String>,
}

/// Wire body for the match endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MatchBody {
    Existing {
        payment_id: i64,
        notes: String,
    },
    New {
        create_payment: bool,
        student_id: i64,
        payment_method: PaymentChannel,
        notes: String,
    },
}

impl MatchRequest {
    pub fn existing(transaction_id: i64, payment_id: i64) -> Self {
        Self {
            transaction_id,
            target: MatchTarget::Existing { payment_id },
            notes: None,
        }
    }

    pub fn new_payment(transaction_id: i64, student_id: i64) -> Self {
        Self {
            transaction_id,
            target: MatchTarget::New {
                student_id,
                payment_method: None,
            },
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_method(mut self, method: PaymentChannel) -> Self {
        if let MatchTarget::New { payment_method, .. } = &mut self.target {
            *payment_method = Some(method);
        }
        self
    }

    /// Check ids and build the request body
    pub fn to_body(&self) -> Result<MatchBody, FieldErrors> {
        let notes = self.notes.as_deref().unwrap_or_default().trim().to_string();

        match self.target {
            MatchTarget::Existing { payment_id } => {
                if payment_id <= 0 {
                    return Err(FieldErrors::single(Field::PaymentId, ValidationError::InvalidPaymentId));
                }
                Ok(MatchBody::Existing { payment_id, notes })
            }
            MatchTarget::New {
                student_id,
                payment_method,
            } => {
                if student_id <= 0 {
                    return Err(FieldErrors::single(Field::StudentId, ValidationError::InvalidStudentId));
                }
                Ok(MatchBody::New {
                    create_payment: true,
                    student_id,
                    payment_method: payment_method.unwrap_or_default(),
                    notes,
                })
            }
        }
    }
}

/// Why a transaction cannot be matched
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchStateError {
    #[error("Bank transaction {0} is not in the reconciliation book")]
    UnknownTransaction(i64),

    #[error("Bank transaction {0} is already matched")]
    AlreadyMatched(i64),
}

/// Counts over the reconciliation book, one per transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ReconciliationStats {
    pub total: usize,
    pub auto_matched: usize,
    pub manually_matched: usize,
    pub unmatched: usize,
    pub unmatched_amount: Decimal,
}

/// Operator's view of imported transactions, keyed by transaction id
///
/// Matching is terminal: a transaction leaves the needs-attention set once and
/// later attempts are refused, so aggregate counts never double up.
#[derive(Debug, Clone, Default)]
pub struct ReconciliationBook {
    transactions: BTreeMap<i64, ImportedBankTransaction>,
}

impl ReconciliationBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_transactions(transactions: impl IntoIterator<Item = ImportedBankTransaction>) -> Self {
        let mut book = Self::new();
        for transaction in transactions {
            book.insert(transaction);
        }
        book
    }

    /// Add or refresh a transaction; a matched entry is never reopened
    pub fn insert(&mut self, transaction: ImportedBankTransaction) {
        match self.transactions.get(&transaction.id) {
            Some(existing) if existing.match_state.is_matched() => {}
            _ => {
                self.transactions.insert(transaction.id, transaction);
            }
        }
    }

    pub fn get(&self, transaction_id: i64) -> Option<&ImportedBankTransaction> {
        self.transactions.get(&transaction_id)
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn ensure_matchable(&self, transaction_id: i64) -> Result<(), MatchStateError> {
        match self.transactions.get(&transaction_id) {
            None => Err(MatchStateError::UnknownTransaction(transaction_id)),
            Some(tx) if tx.match_state.is_matched() => Err(MatchStateError::AlreadyMatched(transaction_id)),
            Some(_) => Ok(()),
        }
    }

    pub fn mark_matched(
        &mut self,
        transaction_id: i64,
    ) -> Result<&ImportedBankTransaction, MatchStateError> {
        self.ensure_matchable(transaction_id)?;
        let transaction = self
            .transactions
            .get_mut(&transaction_id)
            .ok_or(MatchStateError::UnknownTransaction(transaction_id))?;
        transaction.match_state = MatchState::Matched;
        Ok(transaction)
    }

    /// Unmatched transactions, oldest first
    pub fn needs_attention(&self) -> Vec<&ImportedBankTransaction> {
        let mut pending: Vec<_> = self
            .transactions
            .values()
            .filter(|tx| tx.match_state == MatchState::Unmatched)
            .collect();
        pending.sort_by_key(|tx| (tx.date, tx.id));
        pending
    }

    pub fn stats(&self) -> ReconciliationStats {
        self.transactions
            .values()
            .fold(ReconciliationStats::default(), |mut stats, tx| {
                stats.total += 1;
                match tx.match_state {
                    MatchState::AutoMatched => stats.auto_matched += 1,
                    MatchState::Matched => stats.manually_matched += 1,
                    MatchState::Unmatched => {
                        stats.unmatched += 1;
                        stats.unmatched_amount += tx.amount;
                    }
                }
                stats
            })
    }
}
