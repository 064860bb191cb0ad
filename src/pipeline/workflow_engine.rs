use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use thiserror::Error;
use tracing::debug;

use crate::config::WorkflowsSettings;

#[derive(Debug, Error)]
pub enum WorkflowEngineError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("workflow engine rejected the execution ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("unexpected workflow engine response: {0}")]
    InvalidResponse(String),
}

/// Starts executions of named workflows.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait WorkflowEngine: Send + Sync {
    /// Starts `workflow_name` with `argument` and returns the execution id.
    async fn start_execution(
        &self,
        workflow_name: &str,
        argument: &JsonValue,
    ) -> Result<String, WorkflowEngineError>;
}

/// Client for the workflow executions REST API.
pub struct HttpWorkflowEngine {
    client: Client,
    settings: WorkflowsSettings,
    api_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExecutionResponse {
    name: String,
}

impl HttpWorkflowEngine {
    pub fn new(
        settings: WorkflowsSettings,
        api_token: Option<String>,
        timeout_sec: u64,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_sec))
            .build()?;
        Ok(Self {
            client,
            settings,
            api_token,
        })
    }

    fn executions_url(&self, workflow_name: &str) -> String {
        format!(
            "{}/projects/{}/locations/{}/workflows/{}/executions",
            self.settings.api_base_url.trim_end_matches('/'),
            self.settings.project_id,
            self.settings.location,
            workflow_name
        )
    }
}

/// The execution id is the last segment of the execution's resource name.
fn execution_id_from_name(name: &str) -> Option<&str> {
    name.rsplit('/').next().filter(|id| !id.is_empty())
}

#[async_trait]
impl WorkflowEngine for HttpWorkflowEngine {
    async fn start_execution(
        &self,
        workflow_name: &str,
        argument: &JsonValue,
    ) -> Result<String, WorkflowEngineError> {
        let url = self.executions_url(workflow_name);
        // The executions API takes the argument as a JSON-encoded string.
        let body = json!({ "argument": argument.to_string() });
        let mut request = self.client.post(&url).json(&body);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| WorkflowEngineError::Transport(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| WorkflowEngineError::Transport(e.to_string()))?;
        debug!("POST {} answered {}: {}", url, status, text);

        if !status.is_success() {
            return Err(WorkflowEngineError::Rejected {
                status: status.as_u16(),
                message: text,
            });
        }
        let execution: ExecutionResponse = serde_json::from_str(&text)
            .map_err(|e| WorkflowEngineError::InvalidResponse(e.to_string()))?;
        execution_id_from_name(&execution.name)
            .map(str::to_string)
            .ok_or(WorkflowEngineError::InvalidResponse(execution.name))
    }
}
