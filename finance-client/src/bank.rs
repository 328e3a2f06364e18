//! Bank import and transaction matching
//!
//! The importer only reports counts. Transaction-level detail comes from the
//! unmatched listing, which feeds the matcher's [`ReconciliationBook`].

use crate::api::{local, FinanceApi};
use crate::error::{ClientError, Result};
use crate::metrics;
use parking_lot::Mutex;
use payment_core::{
    ImportSummary, ImportedBankTransaction, MatchRequest, MatchStateError, RawManualEntry, ReconciliationBook,
    ReconciliationStats, Role,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct UnmatchedTransactions {
    #[serde(default)]
    transactions: Vec<ImportedBankTransaction>,
}

/// Backend acknowledgement of a match
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MatchResult {
    #[serde(default, alias = "msg")]
    pub message: Option<String>,
    #[serde(default)]
    pub payment_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct BankImporter {
    api: FinanceApi,
}

impl BankImporter {
    pub fn new(api: FinanceApi) -> Self {
        Self { api }
    }

    /// Bulk sync against the bank feed
    pub async fn sync(&self) -> Result<ImportSummary> {
        self.api.ensure_role(Role::Finance)?;
        let summary: ImportSummary = self.api.post_json::<(), _>("bank_sync", "/bank/sync", None).await?;
        log_summary(&summary);
        Ok(summary)
    }

    /// Record one transaction typed in by an operator
    pub async fn import_manual(&self, entry: &RawManualEntry) -> Result<ImportSummary> {
        self.api.ensure_role(Role::Finance)?;
        let entry = local("bank_manual_import", entry.validate())?;

        let summary: ImportSummary = self
            .api
            .post_json("bank_manual_import", "/bank/sync", Some(&entry))
            .await?;
        info!(bank_ref = %entry.bank_ref, "Manual bank transaction recorded");
        log_summary(&summary);
        Ok(summary)
    }

    /// Manual entry when one is given, bulk sync otherwise
    pub async fn import_batch(&self, manual_entry: Option<&RawManualEntry>) -> Result<ImportSummary> {
        match manual_entry {
            Some(entry) => self.import_manual(entry).await,
            None => self.sync().await,
        }
    }

    pub async fn unmatched(&self) -> Result<Vec<ImportedBankTransaction>> {
        self.api.ensure_role(Role::Finance)?;
        let listing: UnmatchedTransactions = self
            .api
            .get_json("unmatched_transactions", "/bank-transactions/unmatched")
            .await?;
        Ok(listing.transactions)
    }
}

fn log_summary(summary: &ImportSummary) {
    if !summary.is_consistent() {
        warn!(
            imported = summary.imported_count,
            auto_matched = summary.auto_matched,
            unmatched = summary.unmatched,
            "Import counts do not add up"
        );
    }
    info!(
        imported = summary.imported_count,
        auto_matched = summary.auto_matched,
        unmatched = summary.unmatched,
        "{}",
        summary.message()
    );
}

/// Binds unmatched transactions to payments
///
/// Keeps its own book of transactions it has seen so a transaction matched
/// here is refused locally on a second attempt.
#[derive(Debug, Clone)]
pub struct TransactionMatcher {
    importer: BankImporter,
    api: FinanceApi,
    book: Arc<Mutex<ReconciliationBook>>,
}

impl TransactionMatcher {
    pub fn new(api: FinanceApi) -> Self {
        Self {
            importer: BankImporter::new(api.clone()),
            api,
            book: Arc::new(Mutex::new(ReconciliationBook::new())),
        }
    }

    /// Pull the unmatched listing into the book
    pub async fn refresh(&self) -> Result<ReconciliationStats> {
        let transactions = self.importer.unmatched().await?;
        let mut book = self.book.lock();
        for transaction in transactions {
            book.insert(transaction);
        }
        Ok(book.stats())
    }

    pub fn stats(&self) -> ReconciliationStats {
        self.book.lock().stats()
    }

    /// Unmatched transactions in the book, oldest first
    pub fn needs_attention(&self) -> Vec<ImportedBankTransaction> {
        self.book.lock().needs_attention().into_iter().cloned().collect()
    }

    /// Match one transaction
    ///
    /// Ids are checked and a transaction the book already holds as matched is
    /// refused before anything is sent. A transaction the book has not seen
    /// is left to the backend.
    pub async fn match_transaction(&self, request: &MatchRequest) -> Result<MatchResult> {
        self.api.ensure_role(Role::Finance)?;

        let transaction_id = request.transaction_id;
        if transaction_id <= 0 {
            metrics::record_local_rejection("match_transaction");
            return Err(ClientError::UnknownTransaction(transaction_id));
        }

        let body = local("match_transaction", request.to_body())?;

        if let Err(MatchStateError::AlreadyMatched(id)) = self.book.lock().ensure_matchable(transaction_id) {
            metrics::record_local_rejection("match_transaction");
            warn!(transaction_id = id, "Refusing to rematch transaction");
            return Err(ClientError::AlreadyMatched(id));
        }

        let result: Option<MatchResult> = self
            .api
            .post_json(
                "match_transaction",
                &format!("/bank-transactions/{}/match", transaction_id),
                Some(&body),
            )
            .await?;

        // Another caller may have matched it while the request was out
        if let Err(MatchStateError::AlreadyMatched(_)) = self.book.lock().mark_matched(transaction_id) {
            warn!(transaction_id, "Transaction was matched concurrently");
        }

        info!(transaction_id, "Bank transaction matched");
        Ok(result.unwrap_or_default())
    }
}
