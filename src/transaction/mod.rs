/// Transaction domain
///
/// Request/result types for account transfers and the business steps an
/// execution unit drives them through.

// Request, aggregate and result snapshot types
pub mod types;

// Business steps plus local/remote step execution
pub mod activities;

pub use activities::{
    ActivityDelays, ActivityError, ActivityOptions, ActivityRunner, DispatchMode, SimulatedActivities,
    TransactionActivities,
};
pub use types::{Transaction, TransactionRequest, TransactionStatus, TxResult};
