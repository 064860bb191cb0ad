//! Audit logging for orchestration and pipeline events.
//!
//! Builds control table rows from request context and hands them to the
//! store. The log-query URL is recomputed for every row from the backend
//! name and a trailing window ending now.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use tracing::debug;

use super::models::{AuditRow, PIPELINE_START_JOB_NAME};
use super::store::AuditStore;
use crate::config::LogQuerySettings;
use crate::jobs::NormalizedStatus;
use crate::server::metrics::record_audit_row;

/// Context of one job transition to record.
#[derive(Debug, Clone)]
pub struct JobTransition<'a> {
    pub execution_id: &'a str,
    pub workflow_name: &'a str,
    pub job_name: &'a str,
    pub backend: &'a str,
    pub status: NormalizedStatus,
    pub job_params: &'a str,
    pub message: &'a str,
}

/// Helper for appending rows to the control table.
pub struct AuditLogger {
    store: Arc<dyn AuditStore>,
    log_query: LogQuerySettings,
}

impl AuditLogger {
    pub fn new(store: Arc<dyn AuditStore>, log_query: LogQuerySettings) -> Self {
        Self { store, log_query }
    }

    pub fn store(&self) -> &Arc<dyn AuditStore> {
        &self.store
    }

    /// Log a job reaching a submission or terminal status.
    pub fn log_job_transition(&self, transition: &JobTransition<'_>) -> Result<()> {
        let now = Utc::now();
        let row = self.build_row(
            transition.execution_id,
            transition.workflow_name,
            transition.job_name,
            transition.status,
            transition.job_params,
            self.log_query_url(transition.backend, now),
            transition.message,
            now,
        );
        self.append(row)
    }

    /// Log a pipeline execution being started by the trigger.
    pub fn log_pipeline_start(
        &self,
        execution_id: &str,
        workflow_name: &str,
        job_params: &str,
    ) -> Result<()> {
        let now = Utc::now();
        let row = self.build_row(
            execution_id,
            workflow_name,
            PIPELINE_START_JOB_NAME,
            NormalizedStatus::Success,
            job_params,
            String::new(),
            "",
            now,
        );
        self.append(row)
    }

    #[allow(clippy::too_many_arguments)]
    fn build_row(
        &self,
        execution_id: &str,
        workflow_name: &str,
        job_name: &str,
        status: NormalizedStatus,
        job_params: &str,
        log_path: String,
        message: &str,
        now: DateTime<Utc>,
    ) -> AuditRow {
        let timestamp = now.to_rfc3339_opts(SecondsFormat::Millis, true);
        AuditRow {
            workflow_execution_id: execution_id.to_string(),
            workflow_name: workflow_name.to_string(),
            job_name: job_name.to_string(),
            job_status: status,
            start_date: timestamp.clone(),
            end_date: timestamp,
            error_code: status.error_code(),
            job_params: job_params.to_string(),
            log_path,
            retry_count: 0,
            execution_time_seconds: 0,
            message: message.to_string(),
        }
    }

    fn append(&self, row: AuditRow) -> Result<()> {
        let id = self.store.append(&row)?;
        debug!(
            "Control row {} written: {} {} -> {}",
            id, row.workflow_name, row.job_name, row.job_status
        );
        record_audit_row(row.job_status);
        Ok(())
    }

    /// Link to the logs of `backend` over the configured window ending at `now`.
    pub fn log_query_url(&self, backend: &str, now: DateTime<Utc>) -> String {
        build_log_query_url(&self.log_query, backend, now)
    }
}

pub fn build_log_query_url(settings: &LogQuerySettings, backend: &str, now: DateTime<Utc>) -> String {
    let start = now - Duration::minutes(settings.window_minutes as i64);
    let filter = format!(
        "resource.labels.function_name=\"{0}\" OR resource.labels.service_name=\"{0}\"",
        backend
    );
    let mut url = format!(
        "{}/logs/query;query={};timeRange={}%2F{}",
        settings.console_base_url.trim_end_matches('/'),
        urlencoding::encode(&filter),
        urlencoding::encode(&start.to_rfc3339_opts(SecondsFormat::Secs, true)),
        urlencoding::encode(&now.to_rfc3339_opts(SecondsFormat::Secs, true)),
    );
    if let Some(project) = &settings.project_id {
        url.push_str(&format!("?project={}", urlencoding::encode(project)));
    }
    url
}
