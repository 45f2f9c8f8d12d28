/// Workflow layer
///
/// The execution unit state machine and the registry of variants it can run
/// as:
/// - Variant table (early return, local/remote steps, eager start)
/// - Three-phase unit with its early-return accessor

// Closed set of execution variants and their lookup
pub mod registry;

// Mint -> init -> finalize unit with the init latch
pub mod unit;

// Re-export commonly used types
pub use registry::{UnknownVariant, Variant, VariantDescriptor};
pub use unit::{InitFailure, Phase, TransactionWorkflow, WorkflowError};
