/// Transaction type definitions
///
/// The request a caller submits, the aggregate a single execution unit owns
/// while it runs, and the result snapshots handed back to callers.

use crate::transaction::activities::{ActivityError, ActivityOptions, ActivityRunner};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status text reported by a successful early-return update
pub const INIT_SUCCESSFUL: &str = "Initialization successful";
/// Terminal status text when the transfer went through
pub const TRANSACTION_COMPLETED: &str = "Transaction completed";
/// Terminal status text when the transfer was rolled back after a failed init
pub const TRANSACTION_CANCELLED: &str = "Transaction cancelled";

/// An account transfer to execute
///
/// Only field presence is checked at this level; the init step decides
/// whether an amount is acceptable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub source_account: String,
    pub target_account: String,
    /// Amount in cents
    pub amount: i64,
}

impl TransactionRequest {
    pub fn new(source_account: impl Into<String>, target_account: impl Into<String>, amount: i64) -> Self {
        Self {
            source_account: source_account.into(),
            target_account: target_account.into(),
            amount,
        }
    }
}

/// Semantic state of a transaction inside one execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Minted,
    Initialized,
    InitFailed,
    Completed,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Minted => "minted",
            TransactionStatus::Initialized => "initialized",
            TransactionStatus::InitFailed => "init_failed",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The aggregate one execution unit owns for its whole lifetime
///
/// Created by the mint step, mutated by init and finalize, dropped when the
/// unit reaches a terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub id: String,
    pub status: TransactionStatus,
}

impl Transaction {
    pub fn minted(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: TransactionStatus::Minted,
        }
    }

    pub fn with_status(mut self, status: TransactionStatus) -> Self {
        self.status = status;
        self
    }

    /// Drive the transaction to its terminal result
    ///
    /// A recorded init error turns finalization into a cancellation; otherwise
    /// the transfer is completed. Failure of either step is returned to the
    /// caller and is fatal to the execution.
    pub async fn finalize(
        self,
        runner: &ActivityRunner,
        request: &TransactionRequest,
        init_error: Option<&ActivityError>,
    ) -> Result<TxResult, ActivityError> {
        let options = ActivityOptions::finalize();

        match init_error {
            Some(error) => {
                tracing::warn!(
                    "Cancelling transaction {} ({} -> {}) due to init error: {}",
                    self.id,
                    request.source_account,
                    request.target_account,
                    error
                );
                let tx = runner
                    .run("cancel_transaction", options, move |activities| async move {
                        activities.cancel_transaction(self).await
                    })
                    .await?;
                Ok(TxResult::new(tx.id, TRANSACTION_CANCELLED))
            }
            None => {
                tracing::info!(
                    "Completing transaction {} ({} -> {}, amount {})",
                    self.id,
                    request.source_account,
                    request.target_account,
                    request.amount
                );
                let tx = runner
                    .run("complete_transaction", options, move |activities| async move {
                        activities.complete_transaction(self).await
                    })
                    .await?;
                Ok(TxResult::new(tx.id, TRANSACTION_COMPLETED))
            }
        }
    }
}

/// Immutable snapshot of a transaction, as reported to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxResult {
    pub transaction_id: String,
    pub status: String,
}

impl TxResult {
    pub fn new(transaction_id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            status: status.into(),
        }
    }

    /// Update result recorded when the init step failed
    pub fn init_failed(transaction_id: impl Into<String>, error: &impl fmt::Display) -> Self {
        Self::new(transaction_id, format!("Initialization failed: {}", error))
    }
}
