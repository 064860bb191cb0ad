//! HTTP client for end-to-end tests
//!
//! Wraps reqwest with one method per orchestrator endpoint.
//! When API routes or request formats change, update only this file.

use super::constants::*;
use reqwest::Response;
use serde_json::{json, Value};
use std::time::Duration;

pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

#[allow(dead_code)]
impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    pub async fn home(&self) -> Response {
        self.client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .expect("Home request failed")
    }

    // ========================================================================
    // Orchestration
    // ========================================================================

    pub async fn orchestrate(&self, body: &Value) -> Response {
        self.client
            .post(format!("{}/v1/orchestrate", self.base_url))
            .json(body)
            .send()
            .await
            .expect("Orchestrate request failed")
    }

    pub async fn orchestrate_raw(&self, body: &str) -> Response {
        self.client
            .post(format!("{}/v1/orchestrate", self.base_url))
            .header("content-type", "application/json")
            .body(body.to_string())
            .send()
            .await
            .expect("Orchestrate request failed")
    }

    /// `get_id` call for the default workflow step
    pub async fn submit_job(&self, execution_id: &str) -> Response {
        self.orchestrate(&job_request("get_id", execution_id, None))
            .await
    }

    /// `get_status` call for the default workflow step
    pub async fn poll_job(&self, execution_id: &str, handle: &str) -> Response {
        self.orchestrate(&job_request("get_status", execution_id, Some(handle)))
            .await
    }

    // ========================================================================
    // Pipelines
    // ========================================================================

    pub async fn trigger_pipeline(&self, body: &Value) -> Response {
        self.client
            .post(format!("{}/v1/pipelines/trigger", self.base_url))
            .json(body)
            .send()
            .await
            .expect("Trigger request failed")
    }

    // ========================================================================
    // Scheduling
    // ========================================================================

    pub async fn post_change_event(&self, body: &Value) -> Response {
        self.client
            .post(format!("{}/v1/scheduling/events", self.base_url))
            .json(body)
            .send()
            .await
            .expect("Change event request failed")
    }

    // ========================================================================
    // Audit
    // ========================================================================

    pub async fn list_audit(&self, query: &[(&str, &str)]) -> Response {
        self.client
            .get(format!("{}/v1/audit", self.base_url))
            .query(query)
            .send()
            .await
            .expect("Audit request failed")
    }
}

/// Orchestration body as the workflow engine sends it.
pub fn job_request(call_type: &str, execution_id: &str, handle: Option<&str>) -> Value {
    let mut body = json!({
        "call_type": call_type,
        "workflow_name": WORKFLOW_NAME,
        "job_name": JOB_NAME,
        "execution_id": execution_id,
        "query_variables": {
            "start_date": "2024-03-14",
            "end_date": "2024-03-14"
        },
        "workflow_properties": {"dataset": "sales", "region": "eu"},
        "step_properties": "{\"region\": \"us\"}",
        "function_url_to_call": EXECUTOR_URL
    });
    if let Some(handle) = handle {
        body["async_job_id"] = json!(handle);
    }
    body
}

/// Schedule document in the change feed's typed-value shape.
pub fn schedule_document(workflow_name: &str, cron: &str, status: &str) -> Value {
    json!({
        "name": format!("{}/{}", DOCUMENTS_ROOT, workflow_name),
        "fields": {
            "crond_expression": {"stringValue": cron},
            "time_zone": {"stringValue": "Europe/Paris"},
            "date_format": {"stringValue": "%Y-%m-%d"},
            "workflow_status": {"stringValue": status},
            "workflow_properties": {"stringValue": "{\"dataset\": \"sales\"}"}
        }
    })
}
