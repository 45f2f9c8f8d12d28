//! HTTP surface tests: a real server on an ephemeral port, driven with reqwest.

use latency_optimization::{
    config::Config,
    create_app_with_activities,
    transaction::{ActivityDelays, SimulatedActivities},
};
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;

async fn spawn_server(overrides: &[(&str, &str)]) -> String {
    spawn_server_with(overrides, ActivityDelays::none()).await
}

async fn spawn_server_with(overrides: &[(&str, &str)], delays: ActivityDelays) -> String {
    let config = Config::from_lookup(|key| {
        overrides
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| value.to_string())
            .or_else(|| match key {
                "BACKEND_DISPATCH_DELAY_MS" => Some("1".to_string()),
                "BACKEND_REMOTE_ACTIVITY_HOP_MS" => Some("1".to_string()),
                "CALLER_API_TIMEOUT_SECS" => Some("10".to_string()),
                _ => None,
            })
    });
    let activities = Arc::new(SimulatedActivities::new(delays));
    let app = create_app_with_activities(config, activities).await.unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service()).await.unwrap();
    });

    format!("http://{}", addr)
}

fn run_body(id: &str, wf_type: &str, iterations: u32, amount: i64) -> Value {
    json!({
        "id": id,
        "wf_type": wf_type,
        "iterations": iterations,
        "params": { "sourceAccount": "Bob", "targetAccount": "Alice", "amount": amount }
    })
}

#[tokio::test]
async fn test_run_workflow_aggregates_every_iteration() {
    let base = spawn_server(&[]).await;
    let http = reqwest::Client::new();

    let response = http
        .post(format!("{}/runWorkflow", base))
        .json(&run_body("t1", "UpdateWithStartRegularActivities", 2, 1000))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["workflowId"], "t1");
    assert_eq!(body["scenario"], "UpdateWithStartRegularActivities");
    assert_eq!(body["iterations"], 2);

    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    let mut ids: Vec<&str> = results.iter().map(|r| r["workflowId"].as_str().unwrap()).collect();
    ids.sort();
    assert_eq!(ids, vec!["t1-iteration-1", "t1-iteration-2"]);
    for result in results {
        assert_eq!(result["executionStatus"], "COMPLETED");
        assert_eq!(result["updateResult"]["status"], "Initialization successful");
        assert_eq!(result["workflowResult"]["status"], "Transaction completed");
        assert!(result["workflowResponseLatencyMs"].as_f64().unwrap() >= result["updateResponseLatencyMs"].as_f64().unwrap());
    }

    let fetched: Value = http
        .get(format!("{}/workflows/t1", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["results"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_same_id_can_be_run_again() {
    let base = spawn_server(&[]).await;
    let http = reqwest::Client::new();

    for _ in 0..2 {
        let response = http
            .post(format!("{}/runWorkflow", base))
            .json(&run_body("again", "UpdateWithStartLocalActivities", 2, 1000))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    let body: Value = http
        .get(format!("{}/workflows/again", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 4);
    for result in results {
        assert_eq!(result["executionStatus"], "COMPLETED", "{}", result);
    }
}

#[tokio::test]
async fn test_results_are_recorded_after_caller_gives_up() {
    let delays = ActivityDelays {
        complete: Duration::from_millis(300),
        ..ActivityDelays::none()
    };
    let base = spawn_server_with(&[], delays).await;

    let impatient = reqwest::Client::builder()
        .timeout(Duration::from_millis(100))
        .build()
        .unwrap();
    let sent = impatient
        .post(format!("{}/runWorkflow", base))
        .json(&run_body("d1", "UpdateWithStartLocalActivities", 2, 1000))
        .send()
        .await;
    assert!(sent.is_err());

    tokio::time::sleep(Duration::from_millis(1000)).await;

    let http = reqwest::Client::new();
    let response = http.get(format!("{}/workflows/d1", base)).send().await.unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    for result in results {
        assert_eq!(result["executionStatus"], "COMPLETED");
    }
}

#[tokio::test]
async fn test_rejected_requests_do_not_touch_the_store() {
    let base = spawn_server(&[]).await;
    let http = reqwest::Client::new();

    let unknown = http
        .post(format!("{}/runWorkflow", base))
        .json(&run_body("t1", "MoneyTransferWorkflow", 1, 1000))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), 400);
    assert_eq!(unknown.text().await.unwrap(), "Invalid workflow type: MoneyTransferWorkflow");

    let malformed = http
        .post(format!("{}/runWorkflow", base))
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(malformed.status(), 400);

    let zero = http
        .post(format!("{}/runWorkflow", base))
        .json(&run_body("t1", "RegularActivities", 0, 1000))
        .send()
        .await
        .unwrap();
    assert_eq!(zero.status(), 400);

    let missing = http.get(format!("{}/workflows/t1", base)).send().await.unwrap();
    assert_eq!(missing.status(), 404);
    assert_eq!(missing.text().await.unwrap(), "Workflow not found");

    let all: Value = http
        .get(format!("{}/workflows", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(all.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_listing_limits_and_clearing() {
    let base = spawn_server(&[]).await;
    let http = reqwest::Client::new();

    for id in ["first", "second", "third"] {
        let response = http
            .post(format!("{}/runWorkflow", base))
            .json(&run_body(id, "LocalActivities", 1, 1000))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    let recent: Value = http
        .get(format!("{}/workflows?limit=2", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let recent_ids: Vec<&str> = recent
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["workflowId"].as_str().unwrap())
        .collect();
    assert_eq!(recent_ids, vec!["third", "second"]);

    let invalid_limit: Value = http
        .get(format!("{}/workflows?limit=lots", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(invalid_limit.as_array().unwrap().len(), 3);

    let cleared = http.delete(format!("{}/workflows/first", base)).send().await.unwrap();
    assert_eq!(cleared.status(), 200);
    let gone = http.get(format!("{}/workflows/first", base)).send().await.unwrap();
    assert_eq!(gone.status(), 404);

    http.delete(format!("{}/workflows", base)).send().await.unwrap();
    let all: Value = http
        .get(format!("{}/workflows", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(all.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_diagnostics_endpoints() {
    let base = spawn_server(&[
        ("TEMPORAL_TASK_QUEUE", "DiagnosticsQueue"),
        ("TEMPORAL_CONNECTION_MTLS_CERT_CHAIN_FILE", "/certs/chain.pem"),
        ("TEMPORAL_CONNECTION_MTLS_KEY_FILE", "/certs/client.key"),
        ("WORKFLOW_ID_PREFIX", "diag-"),
    ])
    .await;
    let http = reqwest::Client::new();

    let health = http.get(format!("{}/healthz", base)).send().await.unwrap();
    assert_eq!(health.text().await.unwrap(), "ok");

    let worker: Value = http
        .get(format!("{}/workerstatus", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(worker, json!({ "status": "running", "taskQueue": "DiagnosticsQueue" }));

    let info: Value = http.get(&base).send().await.unwrap().json().await.unwrap();
    assert_eq!(info["namespace"], "default");
    assert_eq!(info["address"], "localhost:7233");
    assert_eq!(info["taskQueue"], "DiagnosticsQueue");
    assert_eq!(info["certPath"], "/certs/chain.pem");
    assert_eq!(info["keyPath"], "/certs/client.key");

    http.post(format!("{}/runWorkflow", base))
        .json(&run_body("t1", "UpdateWithStartLocalActivities", 1, 1000))
        .send()
        .await
        .unwrap();
    let execution: Value = http
        .get(format!("{}/executions/t1-iteration-1", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(execution["workflowId"], "diag-t1-iteration-1");
    assert_eq!(execution["phase"], "COMPLETED");
    assert_eq!(execution["variant"], "UpdateWithStartLocalActivities");
    assert_eq!(execution["updateResult"]["status"], "Initialization successful");

    let unknown = http
        .get(format!("{}/executions/nope", base))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), 404);
}
