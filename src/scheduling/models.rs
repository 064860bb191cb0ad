//! Schedule documents and the change-feed events that carry them.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::reconciler::ReconcileError;
use crate::pipeline::{Cadence, DateFormat, WorkflowStatus};

/// A document field as delivered by the change feed.
///
/// Fields arrive either as plain strings or as typed document values.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Plain(String),
    Typed {
        #[serde(rename = "stringValue")]
        string_value: String,
    },
    Other(JsonValue),
}

impl FieldValue {
    pub fn as_string(&self) -> Option<&str> {
        match self {
            FieldValue::Plain(s) => Some(s),
            FieldValue::Typed { string_value } => Some(string_value),
            FieldValue::Other(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawDocument {
    /// Full resource path, `.../documents/<collection>/<workflow path>`.
    pub name: String,
    #[serde(default)]
    pub fields: HashMap<String, FieldValue>,
}

impl RawDocument {
    fn field(&self, key: &str) -> Result<Option<&str>, ReconcileError> {
        match self.fields.get(key) {
            None => Ok(None),
            Some(value) => value.as_string().map(Some).ok_or_else(|| {
                ReconcileError::InvalidDocument(format!("field {} must be a string", key))
            }),
        }
    }

    fn required_field(&self, key: &str) -> Result<&str, ReconcileError> {
        self.field(key)?
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ReconcileError::InvalidDocument(format!("missing field {}", key)))
    }
}

/// Change-feed payload before classification.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawChangeEvent {
    #[serde(default)]
    pub old_value: Option<RawDocument>,
    #[serde(default, alias = "new_value")]
    pub value: Option<RawDocument>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Create => "CREATE",
            ChangeKind::Update => "UPDATE",
            ChangeKind::Delete => "DELETE",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    Created(ScheduleDocument),
    Updated(ScheduleDocument),
    Deleted { workflow_name: String },
}

impl ChangeEvent {
    /// Tags a raw event by which of its values are present.
    ///
    /// Only the new value is validated: a delete needs nothing but the name.
    pub fn classify(raw: &RawChangeEvent) -> Result<Self, ReconcileError> {
        match (&raw.old_value, &raw.value) {
            (None, None) => Err(ReconcileError::InvalidEvent(
                "event carries neither an old nor a new value".to_string(),
            )),
            (None, Some(new)) => Ok(ChangeEvent::Created(ScheduleDocument::from_raw(new)?)),
            (Some(_), Some(new)) => Ok(ChangeEvent::Updated(ScheduleDocument::from_raw(new)?)),
            (Some(old), None) => Ok(ChangeEvent::Deleted {
                workflow_name: workflow_name_from_path(&old.name)?,
            }),
        }
    }

    pub fn kind(&self) -> ChangeKind {
        match self {
            ChangeEvent::Created(_) => ChangeKind::Create,
            ChangeEvent::Updated(_) => ChangeKind::Update,
            ChangeEvent::Deleted { .. } => ChangeKind::Delete,
        }
    }

    pub fn workflow_name(&self) -> &str {
        match self {
            ChangeEvent::Created(doc) | ChangeEvent::Updated(doc) => &doc.workflow_name,
            ChangeEvent::Deleted { workflow_name } => workflow_name,
        }
    }
}

/// Validated desired state of one scheduled workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleDocument {
    pub workflow_name: String,
    pub cron_expression: String,
    pub time_zone: String,
    pub date_format: DateFormat,
    pub cadence: Cadence,
    pub status: WorkflowStatus,
    /// Free-form properties, passed through untouched.
    pub properties: Option<String>,
}

impl ScheduleDocument {
    pub fn from_raw(raw: &RawDocument) -> Result<Self, ReconcileError> {
        let workflow_name = workflow_name_from_path(&raw.name)?;

        let cron_expression = raw.required_field("crond_expression")?.trim().to_string();
        validate_cron(&cron_expression)?;

        let time_zone = raw.required_field("time_zone")?.trim().to_string();
        Tz::from_str(&time_zone).map_err(|_| {
            ReconcileError::InvalidDocument(format!("unknown time zone {}", time_zone))
        })?;

        let status_field = raw.required_field("workflow_status")?;
        let status = WorkflowStatus::parse(status_field).ok_or_else(|| {
            ReconcileError::InvalidDocument(format!(
                "workflow_status must be ENABLED or DISABLED, got {}",
                status_field
            ))
        })?;

        let date_format = DateFormat::parse(raw.required_field("date_format")?)
            .map_err(|e| ReconcileError::InvalidDocument(e.to_string()))?;

        let cadence = match raw.field("cadence")?.filter(|v| !v.trim().is_empty()) {
            Some(value) => Cadence::parse(value).ok_or_else(|| {
                ReconcileError::InvalidDocument(format!("unknown cadence {}", value))
            })?,
            None => Cadence::infer_from_format(date_format.as_str()),
        };

        let properties = raw
            .field("workflow_properties")?
            .filter(|v| !v.trim().is_empty())
            .map(str::to_string);

        Ok(Self {
            workflow_name,
            cron_expression,
            time_zone,
            date_format,
            cadence,
            status,
            properties,
        })
    }
}

/// Everything after the collection segment of a document path.
pub fn workflow_name_from_path(path: &str) -> Result<String, ReconcileError> {
    let parts: Vec<&str> = path.split('/').collect();
    let separator = parts
        .iter()
        .position(|part| *part == "documents")
        .ok_or_else(|| ReconcileError::InvalidEvent(format!("not a document path: {}", path)))?;
    let name = parts
        .get(separator + 2..)
        .map(|rest| rest.join("/"))
        .unwrap_or_default();
    if name.is_empty() {
        return Err(ReconcileError::InvalidEvent(format!(
            "document path has no workflow name: {}",
            path
        )));
    }
    Ok(name)
}

/// Accepts 5-field unix cron, the form the scheduling service takes.
fn validate_cron(expression: &str) -> Result<(), ReconcileError> {
    if expression.split_whitespace().count() != 5 {
        return Err(ReconcileError::InvalidDocument(format!(
            "cron expression must have 5 fields: {}",
            expression
        )));
    }
    cron::Schedule::from_str(&format!("0 {}", expression)).map_err(|e| {
        ReconcileError::InvalidDocument(format!("invalid cron expression {}: {}", expression, e))
    })?;
    Ok(())
}
