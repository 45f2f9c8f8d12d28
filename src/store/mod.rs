/// Result storage
///
/// In-memory, process-lifetime aggregation of execution results keyed by the
/// caller-chosen request id.

// Lock-free aggregation store
pub mod results;

pub use results::{AggregatedResponse, ResultsStore};
