//! Reminder, penalty and block actions against students

use crate::api::FinanceApi;
use crate::error::{ClientError, Result};
use payment_core::{ActionKind, CollectionsAction, CollectionsOutcome, Role};
use tracing::info;

#[derive(Debug, Clone)]
pub struct CollectionsClient {
    api: FinanceApi,
}

impl CollectionsClient {
    pub fn new(api: FinanceApi) -> Self {
        Self { api }
    }

    /// Send one action
    ///
    /// Fire and forget: a failure is reported as the backend phrased it and
    /// nothing is retried. Sending the same penalty twice charges twice.
    pub async fn execute(&self, action: &CollectionsAction) -> Result<CollectionsOutcome> {
        self.api.ensure_role(Role::Finance)?;

        let operation = match (action.kind(), action.targets().is_bulk()) {
            (ActionKind::Reminder, true) => "bulk_reminder",
            (ActionKind::Penalty, true) => "bulk_penalty",
            (ActionKind::Block, true) => "bulk_block",
            (ActionKind::Reminder, false) => "student_reminder",
            (ActionKind::Penalty, false) => "student_penalty",
            (ActionKind::Block, false) => "student_block",
        };

        let response: serde_json::Value = self
            .api
            .post_json(operation, &action.path(), Some(&action.body()))
            .await?;

        let outcome = CollectionsOutcome::from_response(action, response)
            .map_err(|e| ClientError::Decode(e.to_string()))?;

        info!(
            kind = %action.kind(),
            targets = action.targets().len(),
            "Collections action applied: {:?}",
            outcome
        );
        Ok(outcome)
    }
}
