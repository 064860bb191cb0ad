//! Maps raw backend status strings onto [`NormalizedStatus`].
//!
//! Every executor reports progress in its own vocabulary (query engine job
//! states, Dataflow `JOB_STATE_*` values, batch runtime states). The table
//! below is the single place where those words are interpreted.

use super::models::NormalizedStatus;

const SUCCESS_STATES: &[&str] = &["DONE", "SUCCESS", "SUCCEEDED", "JOB_STATE_DONE"];

const RUNNING_STATES: &[&str] = &[
    "PENDING",
    "RUNNING",
    "QUEUED",
    "JOB_STATE_QUEUED",
    "JOB_STATE_RUNNING",
    "JOB_STATE_PENDING",
    "JOB_STATE_STARTING",
];

const FAILED_STATES: &[&str] = &[
    "FAILED",
    "FAILURE",
    "ERROR",
    "CANCELLED",
    "JOB_STATE_FAILED",
    "JOB_STATE_CANCELLED",
];

/// Looks up a raw status in the normalization table.
///
/// Returns `None` for values the table doesn't know.
pub fn lookup(raw: &str) -> Option<NormalizedStatus> {
    let key = raw.trim().to_ascii_uppercase();
    if SUCCESS_STATES.contains(&key.as_str()) {
        Some(NormalizedStatus::Success)
    } else if RUNNING_STATES.contains(&key.as_str()) {
        Some(NormalizedStatus::Running)
    } else if FAILED_STATES.contains(&key.as_str()) {
        Some(NormalizedStatus::Failed)
    } else {
        None
    }
}

/// Total normalization: unknown values are failures.
pub fn normalize(raw: &str) -> NormalizedStatus {
    lookup(raw).unwrap_or(NormalizedStatus::Failed)
}
