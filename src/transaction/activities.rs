/// Transaction business steps and how they are executed
///
/// The steps themselves are placeholders for a real account transfer; what
/// matters is where they run (inline on the unit's task, or handed to a
/// separate worker task) and how long they are allowed to take.

use crate::transaction::types::{Transaction, TransactionRequest, TransactionStatus};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{future::Future, sync::Arc, time::Duration};
use thiserror::Error;

/// Failure of a single business step
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActivityError {
    /// The step ran and refused the transaction
    #[error("{0}")]
    Rejected(String),

    /// The step did not finish within its options' timeout
    #[error("activity {activity} timed out after {timeout:?}")]
    Timeout {
        activity: &'static str,
        timeout: Duration,
    },

    /// The step never produced a result (its task was lost)
    #[error("activity {activity} was lost before completing: {reason}")]
    Lost {
        activity: &'static str,
        reason: String,
    },
}

/// The four steps of a transfer
#[async_trait]
pub trait TransactionActivities: Send + Sync + 'static {
    /// Assign a fresh transaction id for the request
    async fn mint_transaction_id(&self, request: &TransactionRequest) -> Result<Transaction, ActivityError>;

    /// Reserve funds; fails for amounts the transfer cannot accept
    async fn init_transaction(
        &self,
        request: &TransactionRequest,
        tx: Transaction,
    ) -> Result<Transaction, ActivityError>;

    /// Roll back an initialized or half-initialized transaction
    async fn cancel_transaction(&self, tx: Transaction) -> Result<Transaction, ActivityError>;

    /// Settle the transfer
    async fn complete_transaction(&self, tx: Transaction) -> Result<Transaction, ActivityError>;
}

/// Simulated latency of each business step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityDelays {
    pub mint: Duration,
    pub init: Duration,
    pub cancel: Duration,
    pub complete: Duration,
}

impl Default for ActivityDelays {
    fn default() -> Self {
        Self {
            mint: Duration::from_millis(10),
            init: Duration::from_millis(10),
            cancel: Duration::from_millis(10),
            complete: Duration::from_millis(100),
        }
    }
}

impl ActivityDelays {
    /// No artificial latency at all
    pub fn none() -> Self {
        Self {
            mint: Duration::ZERO,
            init: Duration::ZERO,
            cancel: Duration::ZERO,
            complete: Duration::ZERO,
        }
    }
}

/// Placeholder transfer implementation with configurable latency
#[derive(Debug, Clone, Default)]
pub struct SimulatedActivities {
    delays: ActivityDelays,
}

impl SimulatedActivities {
    pub fn new(delays: ActivityDelays) -> Self {
        Self { delays }
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

#[async_trait]
impl TransactionActivities for SimulatedActivities {
    async fn mint_transaction_id(&self, request: &TransactionRequest) -> Result<Transaction, ActivityError> {
        pause(self.delays.mint).await;
        let tx = Transaction::minted(uuid::Uuid::new_v4().to_string());
        tracing::info!(
            "Transaction ID registered: {} ({} -> {})",
            tx.id,
            request.source_account,
            request.target_account
        );
        Ok(tx)
    }

    async fn init_transaction(
        &self,
        request: &TransactionRequest,
        tx: Transaction,
    ) -> Result<Transaction, ActivityError> {
        if request.amount <= 0 {
            return Err(ActivityError::Rejected("invalid Amount".to_string()));
        }
        pause(self.delays.init).await;
        tracing::info!("Transaction initialized: {}", tx.id);
        Ok(tx.with_status(TransactionStatus::Initialized))
    }

    async fn cancel_transaction(&self, tx: Transaction) -> Result<Transaction, ActivityError> {
        pause(self.delays.cancel).await;
        tracing::info!("Transaction cancelled: {}", tx.id);
        Ok(tx.with_status(TransactionStatus::Cancelled))
    }

    async fn complete_transaction(&self, tx: Transaction) -> Result<Transaction, ActivityError> {
        pause(self.delays.complete).await;
        tracing::info!("Transaction completed: {}", tx.id);
        Ok(tx.with_status(TransactionStatus::Completed))
    }
}

/// Where a unit's steps execute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Inline on the unit's own task, no extra round trip
    Local,
    /// Handed to a separate worker task, paying a dispatch hop
    Remote,
}

/// Per-step execution limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityOptions {
    pub timeout: Duration,
}

impl ActivityOptions {
    /// Mint and init: short, so a slow init surfaces quickly to the early-return caller
    pub fn init() -> Self {
        Self {
            timeout: Duration::from_secs(5),
        }
    }

    /// Cancel and complete run in the background and may take longer
    pub fn finalize() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

/// Executes business steps for one unit according to its dispatch mode
#[derive(Clone)]
pub struct ActivityRunner {
    activities: Arc<dyn TransactionActivities>,
    mode: DispatchMode,
    remote_hop: Duration,
}

impl std::fmt::Debug for ActivityRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityRunner")
            .field("activities", &"<TransactionActivities>")
            .field("mode", &self.mode)
            .field("remote_hop", &self.remote_hop)
            .finish()
    }
}

impl ActivityRunner {
    pub fn new(activities: Arc<dyn TransactionActivities>, mode: DispatchMode, remote_hop: Duration) -> Self {
        Self {
            activities,
            mode,
            remote_hop,
        }
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Run one step under `options`
    ///
    /// No retries happen here. A remote step that exceeds its timeout is
    /// aborted; a local one is dropped at its next suspension point.
    pub async fn run<T, F, Fut>(&self, activity: &'static str, options: ActivityOptions, step: F) -> Result<T, ActivityError>
    where
        T: Send + 'static,
        F: FnOnce(Arc<dyn TransactionActivities>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, ActivityError>> + Send + 'static,
    {
        let timed_out = || ActivityError::Timeout {
            activity,
            timeout: options.timeout,
        };
        let call = step(Arc::clone(&self.activities));

        match self.mode {
            DispatchMode::Local => tokio::time::timeout(options.timeout, call)
                .await
                .map_err(|_| timed_out())?,
            DispatchMode::Remote => {
                let hop = self.remote_hop;
                let mut handle = tokio::spawn(async move {
                    pause(hop).await;
                    call.await
                });
                match tokio::time::timeout(options.timeout, &mut handle).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(join_error)) => Err(ActivityError::Lost {
                        activity,
                        reason: join_error.to_string(),
                    }),
                    Err(_) => {
                        handle.abort();
                        Err(timed_out())
                    }
                }
            }
        }
    }
}
