//! Finance review of bank-transfer payments

use crate::api::{local, FinanceApi};
use crate::error::Result;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use payment_core::types::timestamp;
use payment_core::{Field, FieldErrors, PaymentChannel, PaymentStatus, Role, SessionError, ValidationError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Bank transfer waiting for a finance decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingPayment {
    pub id: i64,
    #[serde(default)]
    pub student_id: Option<i64>,
    #[serde(default)]
    pub student_name: Option<String>,
    pub amount: Decimal,
    #[serde(default)]
    pub payment_method: Option<PaymentChannel>,
    #[serde(default)]
    pub reference_number: Option<String>,
    #[serde(default, with = "timestamp::option")]
    pub payment_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub proof_document: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingPayments {
    #[serde(default)]
    pub pending_payments: Vec<PendingPayment>,
    #[serde(default)]
    pub count: usize,
}

/// Backend acknowledgement of a verify or reject
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReviewOutcome {
    #[serde(default, alias = "msg")]
    pub message: Option<String>,
    #[serde(default)]
    pub status: Option<PaymentStatus>,
}

#[derive(Debug, Serialize)]
struct RejectRequest<'a> {
    reason: &'a str,
}

fn check_payment_id(payment_id: i64) -> std::result::Result<i64, FieldErrors> {
    if payment_id <= 0 {
        return Err(FieldErrors::single(Field::PaymentId, ValidationError::InvalidPaymentId));
    }
    Ok(payment_id)
}

/// Finance-only review operations
#[derive(Debug, Clone)]
pub struct VerificationClient {
    api: FinanceApi,
}

impl VerificationClient {
    pub fn new(api: FinanceApi) -> Self {
        Self { api }
    }

    pub async fn pending(&self) -> Result<PendingPayments> {
        self.api.ensure_role(Role::Finance)?;
        self.api.get_json("pending_payments", "/payments/pending").await
    }

    pub async fn verify(&self, payment_id: i64) -> Result<ReviewOutcome> {
        self.api.ensure_role(Role::Finance)?;
        let payment_id = local("verify_payment", check_payment_id(payment_id))?;

        let outcome: Option<ReviewOutcome> = self
            .api
            .post_json::<(), _>("verify_payment", &format!("/payments/{}/verify", payment_id), None)
            .await?;

        info!(payment_id, "Payment verified");
        Ok(outcome.unwrap_or_default())
    }

    /// Reject with a reason the student will see
    pub async fn reject(&self, payment_id: i64, reason: &str) -> Result<ReviewOutcome> {
        self.api.ensure_role(Role::Finance)?;

        let mut errors = FieldErrors::new();
        if payment_id <= 0 {
            errors.add(Field::PaymentId, ValidationError::InvalidPaymentId);
        }
        let reason = reason.trim();
        if reason.is_empty() {
            errors.add(Field::Reason, ValidationError::MissingRejectionReason);
        }
        local("reject_payment", errors.into_result(|| ()))?;

        let outcome: Option<ReviewOutcome> = self
            .api
            .post_json(
                "reject_payment",
                &format!("/payments/{}/reject", payment_id),
                Some(&RejectRequest { reason }),
            )
            .await?;

        info!(payment_id, "Payment rejected");
        Ok(outcome.unwrap_or_default())
    }

    /// Proof document bytes for a payment
    ///
    /// The token goes in the query string as well, matching how the document
    /// viewer requests it.
    pub async fn fetch_proof(&self, payment_id: i64) -> Result<Bytes> {
        self.api.ensure_role(Role::Finance)?;
        let payment_id = local("fetch_proof", check_payment_id(payment_id))?;

        let token = self.api.bearer().ok_or(SessionError::NotAuthenticated)?;
        self.api
            .get_bytes(
                "fetch_proof",
                &format!("/payments/{}/proof", payment_id),
                &[("token", token.as_str())],
            )
            .await
    }
}
