/// Latency optimization: early-return transaction execution
///
/// This library runs account transfers as three-phase durable executions and
/// hands callers a usable result as soon as the init phase is done, while the
/// execution carries on to its terminal state.

// Core configuration and setup
pub mod config;

// Transaction domain - request, aggregate, results and the activities that move money
pub mod transaction;

// Workflow layer - execution unit state machine and the variant registry
pub mod workflow;

// Runtime - backend seam, in-process engine and the worker polling it
pub mod runtime;

// Early-return client - the coordination protocol and its result records
pub mod client;

// Result store - lock-free aggregation of results per request id
pub mod store;

// HTTP API layer - run, result and diagnostics endpoints
pub mod api;

// Server setup and initialization
pub mod server;

// Re-export commonly used types for external consumers
pub use client::{EarlyReturnClient, ExecutionResult, ExecutionStatus};
pub use config::Config;
pub use server::{create_app, create_app_with_activities, start_server};
pub use store::{AggregatedResponse, ResultsStore};
pub use transaction::{TransactionRequest, TxResult};
pub use workflow::{Variant, TransactionWorkflow};
