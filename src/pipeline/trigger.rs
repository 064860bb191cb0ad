//! Starts pipeline runs on behalf of the recurring triggers.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use thiserror::Error;
use tracing::info;

use super::dates::{self, Cadence, DateFormat, OffsetPolicy};
use super::workflow_engine::{WorkflowEngine, WorkflowEngineError};
use crate::audit::AuditLogger;
use crate::jobs::properties_object;

/// Desired state of a scheduled workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WorkflowStatus {
    Enabled,
    Disabled,
}

impl WorkflowStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "ENABLED" => Some(WorkflowStatus::Enabled),
            "DISABLED" => Some(WorkflowStatus::Disabled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Enabled => "ENABLED",
            WorkflowStatus::Disabled => "DISABLED",
        }
    }
}

/// Body posted by the scheduler (or by hand) to start a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerRequest {
    #[serde(alias = "workflows_name")]
    pub workflow_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cadence: Option<Cadence>,
    #[serde(
        default,
        alias = "same_day_execution",
        skip_serializing_if = "Option::is_none"
    )]
    pub offset_policy: Option<OffsetPolicy>,
    #[serde(
        default,
        alias = "validation_date_pattern",
        skip_serializing_if = "Option::is_none"
    )]
    pub date_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
    #[serde(default)]
    pub workflow_status: Option<WorkflowStatus>,
    #[serde(default)]
    pub workflow_properties: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

impl TriggerRequest {
    pub fn is_enabled(&self) -> bool {
        self.workflow_status == Some(WorkflowStatus::Enabled)
    }

    /// The calendar date at `now` in the request's time zone (UTC if unset).
    pub fn reference_date(&self, now: DateTime<Utc>) -> Result<NaiveDate, TriggerError> {
        match self.time_zone.as_deref().map(str::trim) {
            None | Some("") => Ok(now.date_naive()),
            Some(name) => {
                let tz: Tz = name.parse().map_err(|_| {
                    TriggerError::InvalidRequest(format!("unknown time zone: {}", name))
                })?;
                Ok(now.with_timezone(&tz).date_naive())
            }
        }
    }

    fn cadence_and_format(&self) -> Result<(Cadence, DateFormat), TriggerError> {
        let format = match self.date_format.as_deref() {
            Some(pattern) => {
                DateFormat::parse(pattern).map_err(|e| TriggerError::InvalidRequest(e.to_string()))?
            }
            None => DateFormat::daily(),
        };
        let cadence = self
            .cadence
            .unwrap_or_else(|| Cadence::infer_from_format(format.as_str()));
        Ok((cadence, format))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    Started {
        execution_id: String,
        start_date: String,
        end_date: String,
    },
    /// The workflow is disabled; nothing was called.
    Skipped,
}

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("invalid trigger request: {0}")]
    InvalidRequest(String),
    #[error("failed to start workflow: {0}")]
    Engine(#[from] WorkflowEngineError),
    #[error("failed to write audit row: {0}")]
    AuditWrite(String),
}

impl TriggerError {
    pub fn kind(&self) -> &'static str {
        match self {
            TriggerError::InvalidRequest(_) => "InvalidRequestError",
            TriggerError::Engine(_) => "WorkflowEngineError",
            TriggerError::AuditWrite(_) => "AuditWriteError",
        }
    }
}

pub struct PipelineTrigger {
    engine: Arc<dyn WorkflowEngine>,
    audit: Arc<AuditLogger>,
}

impl PipelineTrigger {
    pub fn new(engine: Arc<dyn WorkflowEngine>, audit: Arc<AuditLogger>) -> Self {
        Self { engine, audit }
    }

    /// Starts one run of `request.workflow_name`.
    ///
    /// Dates missing from the request are resolved against `reference`.
    pub async fn trigger(
        &self,
        request: &TriggerRequest,
        reference: NaiveDate,
    ) -> Result<TriggerOutcome, TriggerError> {
        let workflow_name = request.workflow_name.trim();
        if workflow_name.is_empty() {
            return Err(TriggerError::InvalidRequest(
                "workflow_name is required".to_string(),
            ));
        }
        if !request.is_enabled() {
            info!("Workflow {} is disabled, not starting it", workflow_name);
            return Ok(TriggerOutcome::Skipped);
        }

        let (start_date, end_date) = resolve_request_dates(request, reference)?;
        let workflow_properties = properties_object(request.workflow_properties.as_ref())
            .map_err(TriggerError::InvalidRequest)?;
        let argument = json!({
            "workflow_name": workflow_name,
            "query_variables": {
                "start_date": start_date,
                "end_date": end_date,
            },
            "workflow_properties": workflow_properties,
        });

        let execution_id = self
            .engine
            .start_execution(workflow_name, &argument)
            .await?;
        info!(
            "Started {} execution {} for {}..{}",
            workflow_name, execution_id, start_date, end_date
        );

        let job_params = serde_json::to_string(request).unwrap_or_default();
        self.audit
            .log_pipeline_start(&execution_id, workflow_name, &job_params)
            .map_err(|e| TriggerError::AuditWrite(format!("{:#}", e)))?;

        Ok(TriggerOutcome::Started {
            execution_id,
            start_date,
            end_date,
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Explicit dates win; a lone start date also ends the range.
fn resolve_request_dates(
    request: &TriggerRequest,
    reference: NaiveDate,
) -> Result<(String, String), TriggerError> {
    if let Some(start) = non_empty(&request.start_date) {
        let end = non_empty(&request.end_date).unwrap_or(start);
        return Ok((start.to_string(), end.to_string()));
    }
    let (cadence, format) = request.cadence_and_format()?;
    let policy = request.offset_policy.unwrap_or_default();
    let range = dates::resolve(cadence, policy, reference);
    Ok((format.format(range.start), format.format(range.end)))
}
