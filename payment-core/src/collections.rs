//! Collections actions against students with overdue balances
//!
//! Reminder, penalty and block share one shape: a kind, the students it
//! targets and, for penalties, an amount. A single student goes to the
//! individual endpoint, several go to the bulk endpoint.
//!
//! Actions are not idempotent. Applying a penalty twice charges it twice.

use crate::error::{Field, FieldErrors, Result, ValidationError};
use crate::reconciliation::parse_positive_amount;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Penalty suggested to the operator
pub const DEFAULT_PENALTY_AMOUNT: Decimal = Decimal::from_parts(50, 0, 0, false, 0);

/// Days overdue after which blocking registration is policy
pub const BLOCK_OVERDUE_THRESHOLD_DAYS: i64 = 7;

/// Whether policy allows blocking a student this far overdue
///
/// Advisory only; [`CollectionsAction::block`] does not check it.
pub fn is_block_eligible(days_overdue: i64) -> bool {
    days_overdue > BLOCK_OVERDUE_THRESHOLD_DAYS
}

/// Penalty amount as typed into the collections form
pub fn parse_penalty_amount(raw: &str) -> Result<Decimal> {
    parse_positive_amount(raw).ok_or_else(|| ValidationError::InvalidPenaltyAmount(raw.trim().to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Reminder,
    Penalty,
    Block,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Reminder => "reminder",
            ActionKind::Penalty => "penalty",
            ActionKind::Block => "block",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Students an action applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSet {
    Single(i64),
    Many(Vec<i64>),
}

impl TargetSet {
    pub fn len(&self) -> usize {
        match self {
            TargetSet::Single(_) => 1,
            TargetSet::Many(ids) => ids.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_bulk(&self) -> bool {
        matches!(self, TargetSet::Many(_))
    }
}

/// Request body shared by individual and bulk endpoints
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionsBody {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub student_ids: Vec<i64>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub penalty_amount: Option<Decimal>,
}

/// A validated collections action
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionsAction {
    kind: ActionKind,
    targets: TargetSet,
    penalty_amount: Option<Decimal>,
}

impl CollectionsAction {
    pub fn reminder(targets: TargetSet) -> std::result::Result<Self, FieldErrors> {
        Self::build(ActionKind::Reminder, targets, None)
    }

    pub fn block(targets: TargetSet) -> std::result::Result<Self, FieldErrors> {
        Self::build(ActionKind::Block, targets, None)
    }

    /// Penalty with the amount exactly as typed by the operator
    pub fn penalty(targets: TargetSet, raw_amount: &str) -> std::result::Result<Self, FieldErrors> {
        let mut errors = FieldErrors::new();
        let amount = errors.capture(Field::PenaltyAmount, parse_penalty_amount(raw_amount));

        match Self::build(ActionKind::Penalty, targets, amount) {
            Ok(action) if errors.is_empty() => Ok(action),
            Ok(_) => Err(errors),
            Err(target_errors) => {
                for (field, error) in target_errors.iter() {
                    errors.add(field, error.clone());
                }
                Err(errors)
            }
        }
    }

    fn build(
        kind: ActionKind,
        targets: TargetSet,
        penalty_amount: Option<Decimal>,
    ) -> std::result::Result<Self, FieldErrors> {
        let targets = match targets {
            TargetSet::Single(id) if id <= 0 => {
                return Err(FieldErrors::single(Field::StudentId, ValidationError::InvalidStudentId));
            }
            TargetSet::Single(id) => TargetSet::Single(id),
            TargetSet::Many(ids) => {
                if ids.iter().any(|id| *id <= 0) {
                    return Err(FieldErrors::single(Field::Students, ValidationError::InvalidStudentId));
                }
                if ids.is_empty() {
                    return Err(FieldErrors::single(Field::Students, ValidationError::EmptyTargetSet));
                }
                TargetSet::Many(ids)
            }
        };

        Ok(Self {
            kind,
            targets,
            penalty_amount,
        })
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn targets(&self) -> &TargetSet {
        &self.targets
    }

    pub fn penalty_amount(&self) -> Option<Decimal> {
        self.penalty_amount
    }

    /// Endpoint path relative to the API base
    pub fn path(&self) -> String {
        match &self.targets {
            TargetSet::Single(id) => format!("/students/{}/{}", id, self.kind),
            TargetSet::Many(_) => format!("/students/bulk/{}", self.kind),
        }
    }

    pub fn body(&self) -> CollectionsBody {
        let student_ids = match &self.targets {
            TargetSet::Single(_) => Vec::new(),
            TargetSet::Many(ids) => ids.clone(),
        };
        CollectionsBody {
            student_ids,
            penalty_amount: self.penalty_amount,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReminderResult {
    #[serde(default)]
    sent_count: u64,
    #[serde(default)]
    failed_count: u64,
}

#[derive(Debug, Deserialize)]
struct PenaltyResult {
    #[serde(default)]
    applied_count: u64,
    #[serde(default, alias = "total_penalties")]
    total_penalty_amount: Decimal,
}

#[derive(Debug, Deserialize)]
struct BlockResult {
    #[serde(default)]
    blocked_count: u64,
}

#[derive(Debug, Deserialize)]
struct IndividualResult {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default, alias = "msg")]
    message: Option<String>,
}

fn default_success() -> bool {
    true
}

/// Result of one collections action, shaped by its kind and granularity
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CollectionsOutcome {
    Reminders {
        sent_count: u64,
        failed_count: u64,
    },
    Penalties {
        applied_count: u64,
        total_penalty_amount: Decimal,
    },
    Blocks {
        blocked_count: u64,
    },
    Individual {
        kind: ActionKind,
        student_id: i64,
        success: bool,
        message: Option<String>,
    },
}

impl CollectionsOutcome {
    /// Interpret a successful backend response for `action`
    pub fn from_response(
        action: &CollectionsAction,
        body: serde_json::Value,
    ) -> std::result::Result<Self, serde_json::Error> {
        let outcome = match (&action.targets, action.kind) {
            (TargetSet::Single(student_id), kind) => {
                let result: IndividualResult = if body.is_null() {
                    IndividualResult {
                        success: true,
                        message: None,
                    }
                } else {
                    serde_json::from_value(body)?
                };
                CollectionsOutcome::Individual {
                    kind,
                    student_id: *student_id,
                    success: result.success,
                    message: result.message,
                }
            }
            (TargetSet::Many(_), ActionKind::Reminder) => {
                let result: ReminderResult = serde_json::from_value(body)?;
                CollectionsOutcome::Reminders {
                    sent_count: result.sent_count,
                    failed_count: result.failed_count,
                }
            }
            (TargetSet::Many(_), ActionKind::Penalty) => {
                let result: PenaltyResult = serde_json::from_value(body)?;
                CollectionsOutcome::Penalties {
                    applied_count: result.applied_count,
                    total_penalty_amount: result.total_penalty_amount,
                }
            }
            (TargetSet::Many(_), ActionKind::Block) => {
                let result: BlockResult = serde_json::from_value(body)?;
                CollectionsOutcome::Blocks {
                    blocked_count: result.blocked_count,
                }
            }
        };
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_penalty_amount() {
        assert_eq!(parse_penalty_amount("75.50"), Ok(dec!(75.50)));
        assert_eq!(parse_penalty_amount("50"), Ok(DEFAULT_PENALTY_AMOUNT));
        for bad in ["0", "-5", "abc", ""] {
            assert!(matches!(
                parse_penalty_amount(bad),
                Err(ValidationError::InvalidPenaltyAmount(_))
            ));
        }
    }

    #[test]
    fn test_block_threshold() {
        assert!(!is_block_eligible(7));
        assert!(is_block_eligible(8));
    }

    #[test]
    fn test_paths_by_granularity() {
        let single = CollectionsAction::reminder(TargetSet::Single(12)).unwrap();
        assert_eq!(single.path(), "/students/12/reminder");
        assert_eq!(serde_json::to_value(single.body()).unwrap(), json!({}));

        let bulk = CollectionsAction::block(TargetSet::Many(vec![3, 4])).unwrap();
        assert_eq!(bulk.path(), "/students/bulk/block");
        assert_eq!(serde_json::to_value(bulk.body()).unwrap(), json!({"student_ids": [3, 4]}));
    }

    #[test]
    fn test_penalty_body_forwards_amount() {
        let action = CollectionsAction::penalty(TargetSet::Many(vec![1, 2, 3]), "75.50").unwrap();
        assert_eq!(action.penalty_amount(), Some(dec!(75.50)));
        assert_eq!(
            serde_json::to_value(action.body()).unwrap(),
            json!({"student_ids": [1, 2, 3], "penalty_amount": 75.5})
        );

        let single = CollectionsAction::penalty(TargetSet::Single(9), "50").unwrap();
        assert_eq!(single.path(), "/students/9/penalty");
        assert_eq!(serde_json::to_value(single.body()).unwrap(), json!({"penalty_amount": 50.0}));
    }

    #[test]
    fn test_invalid_penalty_amount() {
        for bad in ["0", "-5", "abc"] {
            let errors = CollectionsAction::penalty(TargetSet::Single(9), bad).unwrap_err();
            assert!(matches!(
                errors.get(Field::PenaltyAmount),
                Some(ValidationError::InvalidPenaltyAmount(_))
            ));
        }
    }

    #[test]
    fn test_invalid_targets() {
        let errors = CollectionsAction::reminder(TargetSet::Many(vec![])).unwrap_err();
        assert_eq!(errors.get(Field::Students), Some(&ValidationError::EmptyTargetSet));

        let errors = CollectionsAction::block(TargetSet::Single(0)).unwrap_err();
        assert_eq!(errors.get(Field::StudentId), Some(&ValidationError::InvalidStudentId));

        let errors = CollectionsAction::penalty(TargetSet::Many(vec![-1]), "abc").unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_outcomes_by_kind() {
        let remind = CollectionsAction::reminder(TargetSet::Many(vec![1, 2, 3])).unwrap();
        assert_eq!(
            CollectionsOutcome::from_response(&remind, json!({"sent_count": 2, "failed_count": 1})).unwrap(),
            CollectionsOutcome::Reminders {
                sent_count: 2,
                failed_count: 1
            }
        );

        let penalty = CollectionsAction::penalty(TargetSet::Many(vec![1, 2]), "50").unwrap();
        assert_eq!(
            CollectionsOutcome::from_response(&penalty, json!({"applied_count": 2, "total_penalties": 100.0}))
                .unwrap(),
            CollectionsOutcome::Penalties {
                applied_count: 2,
                total_penalty_amount: dec!(100)
            }
        );

        let block = CollectionsAction::block(TargetSet::Many(vec![1])).unwrap();
        assert_eq!(
            CollectionsOutcome::from_response(&block, json!({})).unwrap(),
            CollectionsOutcome::Blocks { blocked_count: 0 }
        );

        let single = CollectionsAction::block(TargetSet::Single(5)).unwrap();
        assert_eq!(
            CollectionsOutcome::from_response(&single, json!({"msg": "Registration blocked"})).unwrap(),
            CollectionsOutcome::Individual {
                kind: ActionKind::Block,
                student_id: 5,
                success: true,
                message: Some("Registration blocked".to_string())
            }
        );
    }
}
