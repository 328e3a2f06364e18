//! Enrollment fees and the dues balance derived from them

use crate::types::PaymentRecord;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Days between enrollment and the payment due date
pub const DEFAULT_DAYS_UNTIL_DUE: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeCategory {
    Tuition,
    Bus,
}

/// One configured fee, as maintained by the finance office
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeItem {
    pub name: String,
    pub category: FeeCategory,
    pub amount: Decimal,
    #[serde(default)]
    pub is_per_credit: bool,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub display_order: i32,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    pub name: String,
    pub credits: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeeLine {
    pub category: FeeCategory,
    pub name: String,
    pub amount: Decimal,
    pub quantity: u32,
    pub is_per_credit: bool,
    pub subtotal: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeeBreakdown {
    /// Per-credit tuition, already multiplied by credits
    pub tuition_fees: Decimal,
    /// Fixed tuition-category fees
    pub registration_fees: Decimal,
    pub bus_fees: Decimal,
    pub total: Decimal,
    pub total_credits: u32,
    pub lines: Vec<FeeLine>,
    pub courses: Vec<Course>,
}

impl fmt::Display for FeeBreakdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Fee Breakdown:")?;
        for line in &self.lines {
            if line.is_per_credit {
                writeln!(
                    f,
                    "  - {} ({} credits x ${:.2}): ${:.2}",
                    line.name, line.quantity, line.amount, line.subtotal
                )?;
            } else {
                writeln!(f, "  - {}: ${:.2}", line.name, line.subtotal)?;
            }
        }
        write!(f, "Total: ${:.2}", self.total)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FeeCalculator;

impl FeeCalculator {
    /// Fees owed for enrolling in `courses`
    ///
    /// Inactive items are ignored and the rest are applied in display order.
    /// Bus fees only apply when `include_bus` is set.
    pub fn calculate(fees: &[FeeItem], courses: &[Course], include_bus: bool) -> FeeBreakdown {
        let total_credits: u32 = courses.iter().map(|course| course.credits).sum();

        let mut active: Vec<&FeeItem> = fees.iter().filter(|fee| fee.is_active).collect();
        active.sort_by_key(|fee| fee.display_order);

        let mut tuition_fees = Decimal::ZERO;
        let mut registration_fees = Decimal::ZERO;
        let mut bus_fees = Decimal::ZERO;
        let mut lines = Vec::new();

        for fee in active.iter().filter(|fee| fee.category == FeeCategory::Tuition) {
            let line = if fee.is_per_credit {
                let subtotal = fee.amount * Decimal::from(total_credits);
                tuition_fees += subtotal;
                FeeLine {
                    category: FeeCategory::Tuition,
                    name: fee.name.clone(),
                    amount: fee.amount,
                    quantity: total_credits,
                    is_per_credit: true,
                    subtotal,
                }
            } else {
                registration_fees += fee.amount;
                Self::fixed_line(fee)
            };
            lines.push(line);
        }

        if include_bus {
            for fee in active.iter().filter(|fee| fee.category == FeeCategory::Bus) {
                bus_fees += fee.amount;
                lines.push(Self::fixed_line(fee));
            }
        }

        FeeBreakdown {
            tuition_fees,
            registration_fees,
            bus_fees,
            total: tuition_fees + registration_fees + bus_fees,
            total_credits,
            lines,
            courses: courses.to_vec(),
        }
    }

    fn fixed_line(fee: &FeeItem) -> FeeLine {
        FeeLine {
            category: fee.category,
            name: fee.name.clone(),
            amount: fee.amount,
            quantity: 1,
            is_per_credit: false,
            subtotal: fee.amount,
        }
    }

    pub fn payment_due_date(enrolled_at: DateTime<Utc>, days_until_due: i64) -> DateTime<Utc> {
        enrolled_at + Duration::days(days_until_due)
    }
}

/// Outstanding balance: fees minus verified payments
///
/// Pending and rejected payments do not count. The result is not floored,
/// so an overpayment comes out negative.
pub fn dues_balance(total_fees: Decimal, payments: &[PaymentRecord]) -> Decimal {
    let paid: Decimal = payments
        .iter()
        .filter(|payment| payment.is_verified())
        .map(|payment| payment.amount)
        .sum();
    total_fees - paid
}
