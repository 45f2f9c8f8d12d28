/// Lock-free result aggregation store using ArcSwap
///
/// Groups execution results under the caller-chosen request id. Every append
/// swaps the whole map pointer with a compare-and-swap loop, so concurrent
/// iterations of one request never lose an entry and readers never block.

use crate::client::ExecutionResult;
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};

/// All results recorded for one request id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedResponse {
    /// Iteration count of the most recent request under this id
    pub iterations: u32,
    /// Variant name of the most recent request under this id
    #[serde(rename = "scenario")]
    pub workflow_type: String,
    pub workflow_id: String,
    /// In completion order
    pub results: Vec<ExecutionResult>,
}

impl AggregatedResponse {
    fn new(workflow_id: &str, iterations: u32, workflow_type: &str) -> Self {
        Self {
            iterations,
            workflow_type: workflow_type.to_string(),
            workflow_id: workflow_id.to_string(),
            results: Vec::new(),
        }
    }

    /// Timestamp of the newest result, empty when there is none
    pub fn latest_timestamp(&self) -> &str {
        self.results
            .iter()
            .map(|result| result.execution_timestamp.as_str())
            .max()
            .unwrap_or("")
    }
}

/// Process-lifetime store of aggregated responses
///
/// Key: request id, Value: shared snapshot of its aggregated response.
#[derive(Debug, Default)]
pub struct ResultsStore {
    responses: ArcSwap<HashMap<String, Arc<AggregatedResponse>>>,
}

impl ResultsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one execution result under a request id
    ///
    /// The closure may run more than once under contention; it only ever
    /// builds a fresh map from the snapshot it is given.
    pub fn append(&self, request_id: &str, iterations: u32, workflow_type: &str, result: ExecutionResult) {
        self.responses.rcu(|current| {
            let mut next = (**current).clone();
            let mut response = match next.get(request_id) {
                Some(existing) => (**existing).clone(),
                None => AggregatedResponse::new(request_id, iterations, workflow_type),
            };
            response.iterations = iterations;
            response.workflow_type = workflow_type.to_string();
            response.results.push(result.clone());
            next.insert(request_id.to_string(), Arc::new(response));
            next
        });

        tracing::debug!("📝 Recorded result for {}", request_id);
    }

    pub fn get(&self, request_id: &str) -> Option<AggregatedResponse> {
        self.responses
            .load()
            .get(request_id)
            .map(|response| (**response).clone())
    }

    /// Every aggregated response, in no particular order
    pub fn list_all(&self) -> Vec<AggregatedResponse> {
        self.responses
            .load()
            .values()
            .map(|response| (**response).clone())
            .collect()
    }

    /// The `limit` responses with the newest results, newest first
    pub fn list_recent(&self, limit: usize) -> Vec<AggregatedResponse> {
        let snapshot = self.responses.load();
        let mut responses: Vec<&Arc<AggregatedResponse>> = snapshot.values().collect();
        responses.sort_by(|a, b| b.latest_timestamp().cmp(a.latest_timestamp()));
        responses
            .into_iter()
            .take(limit)
            .map(|response| (**response).clone())
            .collect()
    }

    /// Forget one request id; returns whether anything was removed
    pub fn clear(&self, request_id: &str) -> bool {
        let previous = self.responses.rcu(|current| {
            let mut next = (**current).clone();
            next.remove(request_id);
            next
        });

        let removed = previous.contains_key(request_id);
        if removed {
            tracing::info!("🗑️ Cleared results for {}", request_id);
        }
        removed
    }

    pub fn clear_all(&self) {
        let previous = self.responses.swap(Arc::new(HashMap::new()));
        tracing::info!("🗑️ Cleared results of {} requests", previous.len());
    }
}
