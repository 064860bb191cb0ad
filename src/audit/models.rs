use serde::{Deserialize, Serialize};

use crate::jobs::NormalizedStatus;

/// Job name recorded for the row that marks a pipeline start.
pub const PIPELINE_START_JOB_NAME: &str = "START_PIPELINE";

/// One row of the control table.
///
/// Field names and order are consumed by downstream reporting; new fields
/// may only be appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRow {
    pub workflow_execution_id: String,
    pub workflow_name: String,
    pub job_name: String,
    pub job_status: NormalizedStatus,
    /// RFC 3339 timestamp of the observed transition.
    pub start_date: String,
    pub end_date: String,
    pub error_code: i64,
    pub job_params: String,
    pub log_path: String,
    pub retry_count: i64,
    pub execution_time_seconds: i64,
    pub message: String,
}

/// A persisted row together with its insertion id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredAuditRow {
    pub id: i64,
    #[serde(flatten)]
    pub row: AuditRow,
}

/// Filter for reading the control table.
#[derive(Debug, Clone)]
pub struct AuditFilter {
    pub workflow_name: Option<String>,
    pub execution_id: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

impl AuditFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workflow(mut self, workflow_name: impl Into<String>) -> Self {
        self.workflow_name = Some(workflow_name.into());
        self
    }

    pub fn with_execution(mut self, execution_id: impl Into<String>) -> Self {
        self.execution_id = Some(execution_id.into());
        self
    }
}

impl Default for AuditFilter {
    fn default() -> Self {
        Self {
            workflow_name: None,
            execution_id: None,
            limit: 100,
            offset: 0,
        }
    }
}
