//! Student payment submission, balance and history

use crate::api::{local, FinanceApi};
use crate::error::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use payment_core::intent::build_intent;
use payment_core::types::timestamp;
use payment_core::{
    validate_card, BankTransferFields, PaymentDetails, PaymentIntent, PaymentRecord, PaymentStatus, RawCardFields,
    Role,
};
use reqwest::multipart::{Form, Part};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// JSON body for a payment without an attachment
#[derive(Debug, Serialize)]
struct SubmitPaymentRequest<'a> {
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
    payment_method: &'static str,
    reference_number: &'a str,
    payment_date: String,
}

/// Payment as confirmed by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmedPayment {
    #[serde(alias = "payment_id")]
    pub id: i64,
    pub amount: Decimal,
    #[serde(default, with = "timestamp::option")]
    pub payment_date: Option<DateTime<Utc>>,
    pub status: PaymentStatus,
    #[serde(default)]
    pub remaining_dues: Option<Decimal>,
    #[serde(default, alias = "msg", skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// What the receipt screen shows after a successful submission
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Receipt {
    pub payment: ConfirmedPayment,
    pub method_label: &'static str,
    pub card_last4: Option<String>,
    pub initiated_at: DateTime<Utc>,
}

impl Receipt {
    fn new(payment: ConfirmedPayment, intent: &PaymentIntent) -> Self {
        Receipt {
            payment,
            method_label: intent.method().label(),
            card_last4: intent.card_last4().map(str::to_string),
            initiated_at: intent.initiated_at(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: i64,
    pub course_id: i64,
    #[serde(default)]
    pub course_name: Option<String>,
    #[serde(default)]
    pub credits: Option<u32>,
    #[serde(default)]
    pub course_fee: Option<Decimal>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Enrollment and outstanding balance of the logged-in student
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentStatus {
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub username: Option<String>,
    pub dues_balance: Decimal,
    #[serde(default)]
    pub enrollments: Vec<Enrollment>,
    #[serde(default)]
    pub total_course_fees: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentHistory {
    pub total_paid: Decimal,
    #[serde(default)]
    pub payments: Vec<PaymentRecord>,
}

impl PaymentHistory {
    /// Sum of payments finance has accepted
    pub fn verified_total(&self) -> Decimal {
        self.payments
            .iter()
            .filter(|payment| payment.is_verified())
            .map(|payment| payment.amount)
            .sum()
    }
}

/// Student-facing payment operations
#[derive(Debug, Clone)]
pub struct PaymentClient {
    api: FinanceApi,
}

impl PaymentClient {
    pub fn new(api: FinanceApi) -> Self {
        Self { api }
    }

    /// Send a built intent once
    ///
    /// Bank transfers go as multipart with the proof attached. Nothing is
    /// retried; on failure the balance is left as it was.
    pub async fn submit(&self, intent: &PaymentIntent) -> Result<Receipt> {
        self.api.ensure_role(Role::Student)?;

        let payment_date = intent.initiated_at().to_rfc3339_opts(SecondsFormat::Millis, true);

        let result: Result<ConfirmedPayment> = match intent.proof_document() {
            Some(proof) => {
                let part = Part::stream(proof.content().clone())
                    .file_name(proof.file_name().to_string())
                    .mime_str(proof.content_type().mime())?;
                let form = Form::new()
                    .text("amount", intent.amount().to_string())
                    .text("payment_method", intent.channel().as_str())
                    .text("reference_number", intent.reference_number().to_string())
                    .text("payment_date", payment_date)
                    .part("proof_document", part);
                self.api.post_multipart("submit_payment", "/payments", form).await
            }
            None => {
                let body = SubmitPaymentRequest {
                    amount: intent.amount(),
                    payment_method: intent.channel().as_str(),
                    reference_number: intent.reference_number(),
                    payment_date,
                };
                self.api.post_json("submit_payment", "/payments", Some(&body)).await
            }
        };

        match result {
            Ok(payment) => {
                info!(
                    payment_id = payment.id,
                    method = intent.method().label(),
                    "Payment of {} submitted ({:?})",
                    payment.amount,
                    payment.status
                );
                Ok(Receipt::new(payment, intent))
            }
            Err(e) => {
                warn!(method = intent.method().label(), "Payment submission failed: {}", e);
                Err(e)
            }
        }
    }

    /// Validate card fields, build the intent and submit it
    ///
    /// `now` is the moment the user pressed pay; its date is also the "today"
    /// the expiry is checked against.
    pub async fn pay_card(&self, card: &RawCardFields, amount: Decimal, now: DateTime<Utc>) -> Result<Receipt> {
        let intent = local(
            "submit_payment",
            validate_card(card, now.date_naive())
                .and_then(|card| build_intent(PaymentDetails::Card(card), amount, now)),
        )?;
        self.submit(&intent).await
    }

    pub async fn pay_bank_transfer(
        &self,
        fields: BankTransferFields,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Receipt> {
        let intent = local(
            "submit_payment",
            build_intent(PaymentDetails::BankTransfer(fields), amount, now),
        )?;
        self.submit(&intent).await
    }

    pub async fn status(&self) -> Result<StudentStatus> {
        self.api.ensure_role(Role::Student)?;
        self.api.get_json("student_status", "/students/status").await
    }

    /// Outstanding balance to feed the intent builder
    pub async fn outstanding_balance(&self) -> Result<Decimal> {
        Ok(self.status().await?.dues_balance)
    }

    pub async fn history(&self) -> Result<PaymentHistory> {
        self.api.ensure_role(Role::Student)?;
        self.api.get_json("payment_history", "/students/payments").await
    }
}
