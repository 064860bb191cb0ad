//! Database schema for control.db.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema};

/// Append-only execution history, one row per observed transition.
const WORKFLOW_CONTROL_TABLE_V0: Table = Table {
    name: "workflow_control",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("workflow_execution_id", &SqlType::Text, non_null = true),
        sqlite_column!("workflow_name", &SqlType::Text, non_null = true),
        sqlite_column!("job_name", &SqlType::Text, non_null = true),
        sqlite_column!("job_status", &SqlType::Text, non_null = true),
        sqlite_column!("start_date", &SqlType::Text, non_null = true),
        sqlite_column!("end_date", &SqlType::Text, non_null = true),
        sqlite_column!("error_code", &SqlType::Integer, non_null = true),
        sqlite_column!("job_params", &SqlType::Text),
        sqlite_column!("log_path", &SqlType::Text),
        sqlite_column!("retry_count", &SqlType::Integer, default_value = Some("0")),
        sqlite_column!(
            "execution_time_seconds",
            &SqlType::Integer,
            default_value = Some("0")
        ),
        sqlite_column!("message", &SqlType::Text),
    ],
    indices: &[
        ("idx_control_workflow", "workflow_name"),
        ("idx_control_execution", "workflow_execution_id"),
    ],
};

pub const CONTROL_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[WORKFLOW_CONTROL_TABLE_V0],
    migration: None,
}];
