use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value as JsonValue;

use super::models::ScheduleDocument;
use crate::config::SchedulingSettings;
use crate::pipeline::{OffsetPolicy, TriggerRequest};

pub const JOB_DESCRIPTION: &str = "workflows scheduler job";

/// Full resource name of the scheduler job for `workflow_name`.
pub fn job_name(settings: &SchedulingSettings, workflow_name: &str) -> String {
    format!("{}/jobs/{}", settings.parent(), workflow_name)
}

/// Desired state of one recurring trigger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulerJobSpec {
    pub name: String,
    pub description: String,
    pub schedule: String,
    pub time_zone: String,
    pub http_target: HttpTarget,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpTarget {
    pub http_method: String,
    pub uri: String,
    pub headers: BTreeMap<String, String>,
    pub service_account_email: String,
    /// JSON body posted to the pipeline trigger on every tick.
    pub body: String,
}

impl SchedulerJobSpec {
    pub fn for_document(document: &ScheduleDocument, settings: &SchedulingSettings) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        Self {
            name: job_name(settings, &document.workflow_name),
            description: JOB_DESCRIPTION.to_string(),
            schedule: document.cron_expression.clone(),
            time_zone: document.time_zone.clone(),
            http_target: HttpTarget {
                http_method: "POST".to_string(),
                uri: settings.pipeline_trigger_url.clone(),
                headers,
                service_account_email: settings.service_account_email.clone(),
                body: trigger_body(document),
            },
        }
    }
}

/// The request the trigger receives: always the day before the tick.
pub fn trigger_request(document: &ScheduleDocument) -> TriggerRequest {
    TriggerRequest {
        workflow_name: document.workflow_name.clone(),
        cadence: Some(document.cadence),
        offset_policy: Some(OffsetPolicy::Yesterday),
        date_format: Some(document.date_format.as_str().to_string()),
        time_zone: Some(document.time_zone.clone()),
        workflow_status: Some(document.status),
        workflow_properties: document.properties.clone().map(JsonValue::String),
        start_date: None,
        end_date: None,
    }
}

fn trigger_body(document: &ScheduleDocument) -> String {
    serde_json::to_string(&trigger_request(document)).unwrap_or_default()
}
