//! Data types shared by the orchestration protocol.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Prefixes that mark a backend response as a job handle rather than a status.
pub const JOB_HANDLE_PREFIXES: [&str; 2] = ["aef_", "aef-"];

/// The closed status vocabulary returned to every caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizedStatus {
    Started,
    Running,
    Success,
    Failed,
    FailedStart,
}

impl NormalizedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NormalizedStatus::Started => "started",
            NormalizedStatus::Running => "running",
            NormalizedStatus::Success => "success",
            NormalizedStatus::Failed => "failed",
            NormalizedStatus::FailedStart => "failed_start",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "started" => Some(NormalizedStatus::Started),
            "running" => Some(NormalizedStatus::Running),
            "success" => Some(NormalizedStatus::Success),
            "failed" => Some(NormalizedStatus::Failed),
            "failed_start" => Some(NormalizedStatus::FailedStart),
            _ => None,
        }
    }

    /// Numeric code persisted in the control table. One code per status.
    pub fn error_code(&self) -> i64 {
        match self {
            NormalizedStatus::Success => 0,
            NormalizedStatus::Started => 1,
            NormalizedStatus::Running => 2,
            NormalizedStatus::Failed => 3,
            NormalizedStatus::FailedStart => 4,
        }
    }

    /// Whether a transition into this status gets an audit row.
    pub fn is_logged(&self) -> bool {
        !matches!(self, NormalizedStatus::Running)
    }
}

impl std::fmt::Display for NormalizedStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque token returned by a submission and used to poll the job later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobHandle(String);

impl JobHandle {
    /// Returns a handle if `raw` carries one of the reserved prefixes.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        JOB_HANDLE_PREFIXES
            .iter()
            .any(|prefix| raw.starts_with(prefix))
            .then(|| JobHandle(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Successful result of one orchestration call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The backend accepted the job; poll it later with this handle.
    Submitted(JobHandle),
    Status(NormalizedStatus),
}

impl JobOutcome {
    /// Status recorded for this outcome.
    pub fn status(&self) -> NormalizedStatus {
        match self {
            JobOutcome::Submitted(_) => NormalizedStatus::Started,
            JobOutcome::Status(status) => *status,
        }
    }

    /// Plain-text body returned to the workflow engine.
    pub fn to_response_text(&self) -> String {
        match self {
            JobOutcome::Submitted(handle) => handle.to_string(),
            JobOutcome::Status(status) => status.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallType {
    #[serde(rename = "get_id")]
    Submit,
    #[serde(rename = "get_status")]
    Poll,
}

impl CallType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "get_id" => Some(CallType::Submit),
            "get_status" => Some(CallType::Poll),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CallType::Submit => "get_id",
            CallType::Poll => "get_status",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryVariables {
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
}

/// Inbound orchestration request, as sent by the workflow engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobRequest {
    pub call_type: Option<String>,
    pub workflow_name: String,
    pub job_name: String,
    #[serde(default)]
    pub execution_id: String,
    pub async_job_id: Option<String>,
    #[serde(default)]
    pub query_variables: QueryVariables,
    #[serde(default)]
    pub workflow_properties: Option<JsonValue>,
    #[serde(default)]
    pub step_properties: Option<JsonValue>,
    pub function_url_to_call: String,
}

impl JobRequest {
    /// Name of the executor behind `function_url_to_call`.
    pub fn backend_name(&self) -> &str {
        backend_name_from_url(&self.function_url_to_call)
    }
}

/// Returns the last non-empty path segment of a backend URL.
pub fn backend_name_from_url(url: &str) -> &str {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    without_query
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(without_query)
}

/// Spec handed to a backend adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub workflow_name: String,
    pub job_name: String,
    pub workflow_properties: Map<String, JsonValue>,
    pub query_variables: QueryVariables,
}

impl JobSpec {
    /// Builds the backend spec from a request.
    ///
    /// Step properties override workflow properties, and query variables are
    /// single-quoted so executors can substitute them verbatim into SQL.
    pub fn from_request(request: &JobRequest) -> Result<Self, String> {
        let workflow_properties = merge_properties(
            request.workflow_properties.as_ref(),
            request.step_properties.as_ref(),
        )?;
        Ok(Self {
            workflow_name: request.workflow_name.clone(),
            job_name: request.job_name.clone(),
            workflow_properties,
            query_variables: QueryVariables {
                start_date: format!("'{}'", request.query_variables.start_date),
                end_date: format!("'{}'", request.query_variables.end_date),
            },
        })
    }
}

/// Accepts a JSON object, a JSON-encoded object string, null or an empty string.
pub fn properties_object(value: Option<&JsonValue>) -> Result<Map<String, JsonValue>, String> {
    match value {
        None | Some(JsonValue::Null) => Ok(Map::new()),
        Some(JsonValue::Object(map)) => Ok(map.clone()),
        Some(JsonValue::String(s)) if s.trim().is_empty() => Ok(Map::new()),
        Some(JsonValue::String(s)) => match serde_json::from_str::<JsonValue>(s) {
            Ok(JsonValue::Object(map)) => Ok(map),
            Ok(_) => Err(format!("properties must be a JSON object, got: {}", s)),
            Err(e) => Err(format!("properties are not valid JSON: {}", e)),
        },
        Some(other) => Err(format!("properties must be a JSON object, got: {}", other)),
    }
}

pub fn merge_properties(
    workflow_properties: Option<&JsonValue>,
    step_properties: Option<&JsonValue>,
) -> Result<Map<String, JsonValue>, String> {
    let mut merged = properties_object(workflow_properties)?;
    merged.extend(properties_object(step_properties)?);
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn handle_prefix_is_the_only_discriminator() {
        assert!(JobHandle::parse("aef_job_123").is_some());
        assert!(JobHandle::parse("aef-2024-01-01_42").is_some());
        assert!(JobHandle::parse("DONE").is_none());
        assert!(JobHandle::parse("job_aef_123").is_none());
        assert!(JobHandle::parse("AEF_upper").is_none());
    }

    #[test]
    fn error_codes_are_distinct() {
        let all = [
            NormalizedStatus::Started,
            NormalizedStatus::Running,
            NormalizedStatus::Success,
            NormalizedStatus::Failed,
            NormalizedStatus::FailedStart,
        ];
        let mut codes: Vec<i64> = all.iter().map(|s| s.error_code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
        for status in all {
            assert_eq!(NormalizedStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(NormalizedStatus::parse("SUCCESS"), None);
        assert_eq!(NormalizedStatus::parse(""), None);
    }

    #[test]
    fn step_properties_override_workflow_properties() {
        let merged = merge_properties(
            Some(&json!(r#"{"location": "eu", "project": "a"}"#)),
            Some(&json!({"project": "b", "bucket": "defs"})),
        )
        .unwrap();
        assert_eq!(merged["location"], "eu");
        assert_eq!(merged["project"], "b");
        assert_eq!(merged["bucket"], "defs");
    }

    #[test]
    fn empty_properties_are_accepted() {
        assert!(merge_properties(None, Some(&json!(""))).unwrap().is_empty());
        assert!(merge_properties(Some(&JsonValue::Null), None)
            .unwrap()
            .is_empty());
        assert!(merge_properties(Some(&json!("[1, 2]")), None).is_err());
    }

    #[test]
    fn spec_quotes_query_variables() {
        let request = JobRequest {
            workflow_name: "sales".to_string(),
            job_name: "load_orders".to_string(),
            query_variables: QueryVariables {
                start_date: "2024-03-14".to_string(),
                end_date: "2024-03-15".to_string(),
            },
            function_url_to_call: "https://fn.example/bq-saved-query-executor".to_string(),
            ..Default::default()
        };
        let spec = JobSpec::from_request(&request).unwrap();
        assert_eq!(spec.query_variables.start_date, "'2024-03-14'");
        assert_eq!(spec.query_variables.end_date, "'2024-03-15'");
    }

    #[test]
    fn backend_name_is_last_url_segment() {
        assert_eq!(
            backend_name_from_url("https://europe-west1-p.cloudfunctions.net/dataflow-executor"),
            "dataflow-executor"
        );
        assert_eq!(
            backend_name_from_url("https://run.example/dataform-executor/?x=1"),
            "dataform-executor"
        );
    }

    #[test]
    fn outcome_response_text() {
        let handle = JobHandle::parse("aef_abc").unwrap();
        assert_eq!(JobOutcome::Submitted(handle).to_response_text(), "aef_abc");
        assert_eq!(
            JobOutcome::Status(NormalizedStatus::Running).to_response_text(),
            "running"
        );
    }
}
