//! Client side of the external scheduling service.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::{Client, Method, StatusCode};
use serde_json::{json, Value as JsonValue};
use thiserror::Error;
use tracing::debug;

use super::resource::SchedulerJobSpec;
use crate::config::SchedulingSettings;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler job {0} already exists")]
    AlreadyExists(String),
    #[error("scheduler job {0} not found")]
    NotFound(String),
    #[error("scheduler job {0} is already in the requested state")]
    AlreadyInState(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("scheduling service rejected the call ({status}): {message}")]
    Rejected { status: u16, message: String },
}

/// Operations on recurring triggers, addressed by full resource name.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait SchedulerService: Send + Sync {
    async fn create_job(&self, job: &SchedulerJobSpec) -> Result<(), SchedulerError>;
    async fn update_job(&self, job: &SchedulerJobSpec) -> Result<(), SchedulerError>;
    async fn delete_job(&self, name: &str) -> Result<(), SchedulerError>;
    async fn pause_job(&self, name: &str) -> Result<(), SchedulerError>;
    async fn resume_job(&self, name: &str) -> Result<(), SchedulerError>;
}

/// Client for the scheduling service REST API (v1 resource shape).
pub struct HttpSchedulerService {
    client: Client,
    settings: SchedulingSettings,
    api_token: Option<String>,
}

impl HttpSchedulerService {
    pub fn new(
        settings: SchedulingSettings,
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

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.settings.api_base_url.trim_end_matches('/'),
            path
        )
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        job_name: &str,
        body: Option<JsonValue>,
    ) -> Result<(), SchedulerError> {
        let url = self.url(path);
        let mut request = self.client.request(method.clone(), &url);
        if let Some(body) = &body {
            request = request.json(body);
        }
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| SchedulerError::Transport(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SchedulerError::Transport(e.to_string()))?;
        debug!("{} {} answered {}", method, url, status);
        map_response(status, &text, job_name)
    }
}

fn map_response(status: StatusCode, body: &str, job_name: &str) -> Result<(), SchedulerError> {
    if status.is_success() {
        return Ok(());
    }
    match status {
        StatusCode::CONFLICT => Err(SchedulerError::AlreadyExists(job_name.to_string())),
        StatusCode::NOT_FOUND => Err(SchedulerError::NotFound(job_name.to_string())),
        StatusCode::BAD_REQUEST if body.contains("FAILED_PRECONDITION") => {
            Err(SchedulerError::AlreadyInState(job_name.to_string()))
        }
        _ => Err(SchedulerError::Rejected {
            status: status.as_u16(),
            message: body.to_string(),
        }),
    }
}

/// Wire representation of a job; the target body travels base64-encoded.
fn job_to_wire(job: &SchedulerJobSpec) -> JsonValue {
    json!({
        "name": job.name,
        "description": job.description,
        "schedule": job.schedule,
        "timeZone": job.time_zone,
        "httpTarget": {
            "uri": job.http_target.uri,
            "httpMethod": job.http_target.http_method,
            "headers": job.http_target.headers,
            "body": BASE64.encode(job.http_target.body.as_bytes()),
            "oidcToken": {
                "serviceAccountEmail": job.http_target.service_account_email,
            },
        },
    })
}

#[async_trait]
impl SchedulerService for HttpSchedulerService {
    async fn create_job(&self, job: &SchedulerJobSpec) -> Result<(), SchedulerError> {
        let path = format!("{}/jobs", self.settings.parent());
        self.send(Method::POST, &path, &job.name, Some(job_to_wire(job)))
            .await
    }

    async fn update_job(&self, job: &SchedulerJobSpec) -> Result<(), SchedulerError> {
        self.send(Method::PATCH, &job.name, &job.name, Some(job_to_wire(job)))
            .await
    }

    async fn delete_job(&self, name: &str) -> Result<(), SchedulerError> {
        self.send(Method::DELETE, name, name, None).await
    }

    async fn pause_job(&self, name: &str) -> Result<(), SchedulerError> {
        self.send(Method::POST, &format!("{}:pause", name), name, Some(json!({})))
            .await
    }

    async fn resume_job(&self, name: &str) -> Result<(), SchedulerError> {
        self.send(Method::POST, &format!("{}:resume", name), name, Some(json!({})))
            .await
    }
}
