//! Backend adapters: the submit/poll seam towards the compute backends.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::debug;

use super::models::{JobHandle, JobSpec};

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("rejected job spec: {0}")]
    RejectedSpec(String),
    #[error("job not found: {0}")]
    NotFound(String),
}

/// Submit/poll contract of one compute backend.
///
/// `target` identifies the executor endpoint the request asked for.
/// Both calls return the backend's raw answer: `submit` usually returns a
/// job handle, `poll` a raw status string.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    async fn submit(&self, target: &str, spec: &JobSpec) -> Result<String, AdapterError>;

    async fn poll(
        &self,
        target: &str,
        spec: &JobSpec,
        handle: &JobHandle,
    ) -> Result<String, AdapterError>;
}

/// Adapter for executor functions reachable over HTTP.
///
/// The executor receives the job spec as a JSON body (plus `job_id` when
/// polling) and answers with a plain-text handle or status. Failures inside
/// the executor come back as a JSON object carrying an `error` key.
pub struct HttpBackendAdapter {
    client: Client,
    auth_token: Option<String>,
}

impl HttpBackendAdapter {
    /// Create a new adapter.
    ///
    /// # Arguments
    /// * `timeout_sec` - Per-request timeout enforced by the HTTP client
    /// * `auth_token` - Optional bearer token sent to every executor
    pub fn new(timeout_sec: u64, auth_token: Option<String>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_sec))
            .build()?;
        Ok(Self { client, auth_token })
    }

    async fn call(&self, target: &str, body: &JsonValue) -> Result<(StatusCode, String), AdapterError> {
        let mut request = self.client.post(target).json(body);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;
        debug!("Executor {} answered {}: {}", target, status, text);
        Ok((status, text))
    }
}

/// What an executor's 2xx body turned out to be.
#[derive(Debug, PartialEq)]
enum ExecutorReply {
    Text(String),
    Error { kind: String, message: String },
}

fn parse_executor_reply(body: &str) -> ExecutorReply {
    let trimmed = body.trim();
    match serde_json::from_str::<JsonValue>(trimmed) {
        Ok(JsonValue::String(s)) => ExecutorReply::Text(s),
        Ok(JsonValue::Object(map)) if map.contains_key("error") => ExecutorReply::Error {
            kind: json_to_text(&map["error"]),
            message: map.get("message").map(json_to_text).unwrap_or_default(),
        },
        _ => ExecutorReply::Text(trimmed.to_string()),
    }
}

fn json_to_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn spec_body(spec: &JobSpec, handle: Option<&JobHandle>) -> Result<JsonValue, AdapterError> {
    let mut body =
        serde_json::to_value(spec).map_err(|e| AdapterError::RejectedSpec(e.to_string()))?;
    if let (Some(handle), JsonValue::Object(map)) = (handle, &mut body) {
        map.insert("job_id".to_string(), JsonValue::String(handle.to_string()));
    }
    Ok(body)
}

#[async_trait]
impl BackendAdapter for HttpBackendAdapter {
    async fn submit(&self, target: &str, spec: &JobSpec) -> Result<String, AdapterError> {
        let (status, text) = self.call(target, &spec_body(spec, None)?).await?;
        if status.is_client_error() {
            return Err(AdapterError::RejectedSpec(format!("{}: {}", status, text)));
        }
        if !status.is_success() {
            return Err(AdapterError::Transport(format!("{}: {}", status, text)));
        }
        match parse_executor_reply(&text) {
            ExecutorReply::Text(reply) => Ok(reply),
            ExecutorReply::Error { kind, message } => {
                Err(AdapterError::RejectedSpec(format!("{}: {}", kind, message)))
            }
        }
    }

    async fn poll(
        &self,
        target: &str,
        spec: &JobSpec,
        handle: &JobHandle,
    ) -> Result<String, AdapterError> {
        let (status, text) = self.call(target, &spec_body(spec, Some(handle))?).await?;
        if status == StatusCode::NOT_FOUND {
            return Err(AdapterError::NotFound(handle.to_string()));
        }
        if !status.is_success() {
            return Err(AdapterError::Transport(format!("{}: {}", status, text)));
        }
        match parse_executor_reply(&text) {
            ExecutorReply::Text(reply) => Ok(reply),
            ExecutorReply::Error { kind, .. } if kind.contains("NotFound") => {
                Err(AdapterError::NotFound(handle.to_string()))
            }
            // The job itself failed: hand the raw text on so it gets recorded.
            ExecutorReply::Error { .. } => Ok(text.trim().to_string()),
        }
    }
}
