//! Core domain types for the student finance portal

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the student chose to pay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Card,
    BankTransfer,
}

impl PaymentMethod {
    /// Channel the backend records this method under
    pub fn channel(&self) -> PaymentChannel {
        match self {
            PaymentMethod::Card => PaymentChannel::Online,
            PaymentMethod::BankTransfer => PaymentChannel::BankTransfer,
        }
    }

    /// Human-readable label shown on receipts
    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::BankTransfer => "bank transfer",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Payment method as recorded by the finance backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentChannel {
    Online,
    #[default]
    BankTransfer,
    Manual,
}

impl PaymentChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentChannel::Online => "ONLINE",
            PaymentChannel::BankTransfer => "BANK_TRANSFER",
            PaymentChannel::Manual => "MANUAL",
        }
    }
}

impl fmt::Display for PaymentChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Card network, detected from the leading digits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CardBrand {
    Visa,
    Mastercard,
    Amex,
    Discover,
    Unknown,
}

impl CardBrand {
    /// Required CVV length for this network
    pub fn cvv_length(&self) -> usize {
        match self {
            CardBrand::Amex => 4,
            CardBrand::Visa | CardBrand::Mastercard | CardBrand::Discover | CardBrand::Unknown => 3,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, CardBrand::Unknown)
    }
}

impl fmt::Display for CardBrand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CardBrand::Visa => write!(f, "Visa"),
            CardBrand::Mastercard => write!(f, "Mastercard"),
            CardBrand::Amex => write!(f, "American Express"),
            CardBrand::Discover => write!(f, "Discover"),
            CardBrand::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Verification state of a server-side payment record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    /// Card payments arrive as `RECEIVED`; they count as verified
    #[serde(alias = "RECEIVED")]
    Verified,
    Rejected,
}

/// Payment record owned by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: i64,
    #[serde(default)]
    pub student_id: Option<i64>,
    pub amount: Decimal,
    pub status: PaymentStatus,
    #[serde(default)]
    pub payment_method: Option<PaymentChannel>,
    #[serde(default)]
    pub reference_number: Option<String>,
    #[serde(default, alias = "proof_document")]
    pub proof_document_ref: Option<String>,
    #[serde(default, alias = "payment_date", with = "timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,
}

impl PaymentRecord {
    pub fn is_verified(&self) -> bool {
        self.status == PaymentStatus::Verified
    }
}

/// Reconciliation state of an imported bank transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchState {
    /// Matched by the backend during import
    AutoMatched,
    /// Awaiting a finance operator
    Unmatched,
    /// Matched by an operator after import
    Matched,
}

impl MatchState {
    pub fn is_matched(&self) -> bool {
        !matches!(self, MatchState::Unmatched)
    }
}

/// Transaction imported from the bank feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedBankTransaction {
    pub id: i64,
    pub bank_ref: String,
    pub amount: Decimal,
    pub date: NaiveDate,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(alias = "status")]
    pub match_state: MatchState,
}

/// Lenient timestamp parsing for backend dates
///
/// The backend emits ISO-8601 strings with or without an offset; values
/// without one are taken as UTC.
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};

    pub fn parse(value: &str) -> Option<DateTime<Utc>> {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
            return Some(parsed.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match value {
                Some(ts) => serializer.serialize_some(&ts.to_rfc3339()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let raw: Option<String> = Option::deserialize(deserializer)?;
            match raw {
                None => Ok(None),
                Some(value) => super::parse(&value)
                    .map(Some)
                    .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", value))),
            }
        }
    }
}
