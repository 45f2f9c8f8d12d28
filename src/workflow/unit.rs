/// Transaction execution unit
///
/// One instance runs one transaction through mint, init and finalize. The
/// main path is the only writer of unit state; `return_init_result` is a
/// second entry point that only reads, blocking until init has finished.

use crate::transaction::{
    types::INIT_SUCCESSFUL, ActivityError, ActivityOptions, ActivityRunner, TransactionRequest, TransactionStatus,
    TxResult,
};
use crate::workflow::registry::VariantDescriptor;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

/// Lifecycle of an execution unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    New,
    Minted,
    InitInProgress,
    InitDone,
    Finalizing,
    Completed,
    Failed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Completed | Phase::Failed)
    }

    /// Whether the early-return handoff has already happened
    pub fn is_init_done(self) -> bool {
        !matches!(self, Phase::New | Phase::Minted | Phase::InitInProgress)
    }
}

/// Init error as re-raised to an early-return caller
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct InitFailure {
    /// Empty when the transaction id could not be minted
    pub transaction_id: String,
    pub message: String,
}

impl InitFailure {
    /// The failure rendered as the update result callers record
    pub fn to_tx_result(&self) -> TxResult {
        TxResult::init_failed(&self.transaction_id, &self.message)
    }
}

/// Fatal unit failure; the unit ends in `Phase::Failed`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("minting a transaction id failed: {0}")]
    Mint(ActivityError),

    #[error("finalizing transaction {transaction_id} failed: {source}")]
    Finalize {
        transaction_id: String,
        #[source]
        source: ActivityError,
    },
}

/// What the init phase left behind for the accessor
#[derive(Debug, Clone)]
struct InitRecord {
    update_result: TxResult,
    error: Option<ActivityError>,
}

/// A single run of the three-phase transaction
#[derive(Debug)]
pub struct TransactionWorkflow {
    descriptor: &'static VariantDescriptor,
    phase: watch::Sender<Phase>,
    init: watch::Sender<Option<InitRecord>>,
}

impl TransactionWorkflow {
    pub fn new(descriptor: &'static VariantDescriptor) -> Self {
        let (phase, _) = watch::channel(Phase::New);
        let (init, _) = watch::channel(None);
        Self {
            descriptor,
            phase,
            init,
        }
    }

    pub fn descriptor(&self) -> &'static VariantDescriptor {
        self.descriptor
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    fn enter(&self, phase: Phase) {
        let previous = self.phase.send_replace(phase);
        tracing::debug!("🔄 {} unit: {:?} -> {:?}", self.descriptor.name, previous, phase);
    }

    /// Main execution path
    ///
    /// An init failure is recorded and handed to finalize rather than aborting
    /// the unit. Only mint and finalize failures are fatal.
    pub async fn process_transaction(
        &self,
        runner: &ActivityRunner,
        request: TransactionRequest,
    ) -> Result<TxResult, WorkflowError> {
        let mint_request = request.clone();
        let minted = runner
            .run("mint_transaction_id", ActivityOptions::init(), move |activities| async move {
                activities.mint_transaction_id(&mint_request).await
            })
            .await;

        let tx = match minted {
            Ok(tx) => tx,
            Err(error) => {
                tracing::error!("❌ Minting transaction id failed: {}", error);
                // release early-return callers before failing
                self.latch(InitRecord {
                    update_result: TxResult::init_failed("", &error),
                    error: Some(error.clone()),
                });
                self.enter(Phase::Failed);
                return Err(WorkflowError::Mint(error));
            }
        };
        self.enter(Phase::Minted);

        self.enter(Phase::InitInProgress);
        let init_request = request.clone();
        let attempt = tx.clone();
        let initialized = runner
            .run("init_transaction", ActivityOptions::init(), move |activities| async move {
                activities.init_transaction(&init_request, attempt).await
            })
            .await;

        let (tx, init_error) = match initialized {
            Ok(tx) => {
                self.latch(InitRecord {
                    update_result: TxResult::new(&tx.id, INIT_SUCCESSFUL),
                    error: None,
                });
                (tx, None)
            }
            Err(error) => {
                tracing::info!("Initialization of transaction {} failed: {}", tx.id, error);
                self.latch(InitRecord {
                    update_result: TxResult::init_failed(&tx.id, &error),
                    error: Some(error.clone()),
                });
                (tx.with_status(TransactionStatus::InitFailed), Some(error))
            }
        };
        self.enter(Phase::InitDone);

        self.enter(Phase::Finalizing);
        let transaction_id = tx.id.clone();
        match tx.finalize(runner, &request, init_error.as_ref()).await {
            Ok(result) => {
                self.enter(Phase::Completed);
                Ok(result)
            }
            Err(source) => {
                tracing::error!("❌ Finalizing transaction {} failed: {}", transaction_id, source);
                self.enter(Phase::Failed);
                Err(WorkflowError::Finalize {
                    transaction_id,
                    source,
                })
            }
        }
    }

    /// The single irrevocable handoff to early-return callers
    fn latch(&self, record: InitRecord) {
        self.init.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(record);
            true
        });
    }

    /// Early-return accessor
    ///
    /// Suspends until init has finished, then returns the update result or
    /// re-raises the init error. Never writes unit state.
    pub async fn return_init_result(&self) -> Result<TxResult, InitFailure> {
        let mut init = self.init.subscribe();
        let record = match init.wait_for(Option::is_some).await {
            Ok(latched) => (*latched).clone(),
            Err(_) => None,
        };

        match record {
            Some(InitRecord {
                update_result,
                error: None,
            }) => Ok(update_result),
            Some(InitRecord {
                update_result,
                error: Some(error),
            }) => {
                tracing::info!("Initialization failed.");
                Err(InitFailure {
                    transaction_id: update_result.transaction_id,
                    message: error.to_string(),
                })
            }
            None => Err(InitFailure {
                transaction_id: String::new(),
                message: "execution closed before initialization finished".to_string(),
            }),
        }
    }

    /// Update result recorded by init, if init has finished
    pub fn update_result(&self) -> Option<TxResult> {
        self.init
            .borrow()
            .as_ref()
            .map(|record| record.update_result.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{ActivityDelays, DispatchMode, SimulatedActivities, Transaction, TransactionActivities};
    use crate::transaction::types::{TRANSACTION_CANCELLED, TRANSACTION_COMPLETED};
    use crate::workflow::registry::Variant;
    use async_trait::async_trait;
    use std::{sync::Arc, time::Duration};

    fn runner(activities: Arc<dyn TransactionActivities>) -> ActivityRunner {
        ActivityRunner::new(activities, DispatchMode::Local, Duration::ZERO)
    }

    fn simulated() -> Arc<dyn TransactionActivities> {
        Arc::new(SimulatedActivities::new(ActivityDelays::none()))
    }

    /// Completion always fails
    struct BrokenSettlement;

    #[async_trait]
    impl TransactionActivities for BrokenSettlement {
        async fn mint_transaction_id(&self, _request: &TransactionRequest) -> Result<Transaction, ActivityError> {
            Ok(Transaction::minted("tx-broken"))
        }

        async fn init_transaction(
            &self,
            _request: &TransactionRequest,
            tx: Transaction,
        ) -> Result<Transaction, ActivityError> {
            Ok(tx.with_status(TransactionStatus::Initialized))
        }

        async fn cancel_transaction(&self, tx: Transaction) -> Result<Transaction, ActivityError> {
            Ok(tx)
        }

        async fn complete_transaction(&self, _tx: Transaction) -> Result<Transaction, ActivityError> {
            Err(ActivityError::Rejected("ledger unavailable".to_string()))
        }
    }

    /// The id service is down, so no transaction id can be minted
    struct UnavailableMint;

    #[async_trait]
    impl TransactionActivities for UnavailableMint {
        async fn mint_transaction_id(&self, _request: &TransactionRequest) -> Result<Transaction, ActivityError> {
            Err(ActivityError::Rejected("id service down".to_string()))
        }

        async fn init_transaction(
            &self,
            _request: &TransactionRequest,
            tx: Transaction,
        ) -> Result<Transaction, ActivityError> {
            Ok(tx)
        }

        async fn cancel_transaction(&self, tx: Transaction) -> Result<Transaction, ActivityError> {
            Ok(tx)
        }

        async fn complete_transaction(&self, tx: Transaction) -> Result<Transaction, ActivityError> {
            Ok(tx)
        }
    }

    #[tokio::test]
    async fn test_successful_run_reports_init_then_completion() {
        let unit = Arc::new(TransactionWorkflow::new(
            Variant::UpdateWithStartLocalActivities.descriptor(),
        ));
        let accessor = {
            let unit = Arc::clone(&unit);
            tokio::spawn(async move { unit.return_init_result().await })
        };

        let result = unit
            .process_transaction(&runner(simulated()), TransactionRequest::new("Bob", "Alice", 1000))
            .await
            .unwrap();
        let update = accessor.await.unwrap().unwrap();

        assert_eq!(update.status, INIT_SUCCESSFUL);
        assert_eq!(result.status, TRANSACTION_COMPLETED);
        assert_eq!(update.transaction_id, result.transaction_id);
        assert_eq!(unit.phase(), Phase::Completed);
    }

    #[tokio::test]
    async fn test_init_failure_is_reraised_but_unit_still_finishes() {
        let unit = Arc::new(TransactionWorkflow::new(
            Variant::UpdateWithStartRegularActivities.descriptor(),
        ));
        let accessor = {
            let unit = Arc::clone(&unit);
            tokio::spawn(async move { unit.return_init_result().await })
        };

        let result = unit
            .process_transaction(&runner(simulated()), TransactionRequest::new("Bob", "Alice", -5))
            .await
            .unwrap();
        let failure = accessor.await.unwrap().unwrap_err();

        assert_eq!(failure.message, "invalid Amount");
        assert_eq!(failure.transaction_id, result.transaction_id);
        assert_eq!(result.status, TRANSACTION_CANCELLED);
        assert_eq!(
            unit.update_result().unwrap().status,
            "Initialization failed: invalid Amount"
        );
        assert_eq!(unit.phase(), Phase::Completed);
    }

    #[tokio::test]
    async fn test_mint_failure_releases_accessor_and_fails_unit() {
        let unit = Arc::new(TransactionWorkflow::new(
            Variant::UpdateWithStartRegularActivities.descriptor(),
        ));
        let accessor = {
            let unit = Arc::clone(&unit);
            tokio::spawn(async move { unit.return_init_result().await })
        };

        let err = unit
            .process_transaction(&runner(Arc::new(UnavailableMint)), TransactionRequest::new("Bob", "Alice", 1000))
            .await
            .unwrap_err();
        let failure = accessor.await.unwrap().unwrap_err();

        assert!(matches!(err, WorkflowError::Mint(ActivityError::Rejected(ref message)) if message == "id service down"));
        assert_eq!(failure.transaction_id, "");
        assert_eq!(failure.message, "id service down");
        assert_eq!(
            unit.update_result().unwrap().status,
            "Initialization failed: id service down"
        );
        assert_eq!(unit.phase(), Phase::Failed);
    }

    #[tokio::test]
    async fn test_accessor_called_after_init_returns_immediately() {
        let unit = TransactionWorkflow::new(Variant::UpdateWithStartLocalActivities.descriptor());
        unit.process_transaction(&runner(simulated()), TransactionRequest::new("Bob", "Alice", 1))
            .await
            .unwrap();

        let first = unit.return_init_result().await.unwrap();
        let second = unit.return_init_result().await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_finalize_failure_is_fatal() {
        let unit = TransactionWorkflow::new(Variant::UpdateWithStartLocalActivities.descriptor());

        let err = unit
            .process_transaction(&runner(Arc::new(BrokenSettlement)), TransactionRequest::new("Bob", "Alice", 1))
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::Finalize { ref transaction_id, .. } if transaction_id == "tx-broken"));
        assert_eq!(unit.phase(), Phase::Failed);
        // init itself succeeded, so the accessor still reports success
        assert_eq!(unit.return_init_result().await.unwrap().status, INIT_SUCCESSFUL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_accessor_waits_for_init() {
        let unit = Arc::new(TransactionWorkflow::new(
            Variant::UpdateWithStartLocalActivities.descriptor(),
        ));
        let slow: Arc<dyn TransactionActivities> = Arc::new(SimulatedActivities::new(ActivityDelays {
            init: Duration::from_millis(200),
            ..ActivityDelays::none()
        }));
        let main = {
            let unit = Arc::clone(&unit);
            tokio::spawn(async move {
                unit.process_transaction(&runner(slow), TransactionRequest::new("Bob", "Alice", 1))
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!unit.phase().is_init_done());
        assert!(unit.update_result().is_none());

        let update = unit.return_init_result().await.unwrap();
        assert_eq!(update.status, INIT_SUCCESSFUL);
        assert!(unit.phase().is_init_done());
        main.await.unwrap().unwrap();
    }
}
