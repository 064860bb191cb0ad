//! Control table storage.
//!
//! Provides SQLite-backed, append-only storage for audit rows.

use super::models::{AuditFilter, AuditRow, StoredAuditRow};
use super::schema::CONTROL_VERSIONED_SCHEMAS;
use crate::jobs::NormalizedStatus;
use crate::sqlite_persistence::read_schema_version;
use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

/// Append-only storage for the control table.
///
/// There is deliberately no update or delete operation.
pub trait AuditStore: Send + Sync {
    /// Append one row. Returns the id assigned to it.
    fn append(&self, row: &AuditRow) -> Result<i64>;

    /// Read rows, newest first.
    fn list(&self, filter: &AuditFilter) -> Result<Vec<StoredAuditRow>>;
}

/// SQLite-backed control table.
pub struct SqliteAuditStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteAuditStore {
    /// Opens an existing database or creates a new one with the current schema.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = if db_path.as_ref().exists() {
            let conn = Connection::open(&db_path)?;
            let version = read_schema_version(&conn)
                .with_context(|| format!("Unrecognized control database {:?}", db_path.as_ref()))?;
            let schema_count = CONTROL_VERSIONED_SCHEMAS.len();
            if version >= schema_count {
                bail!(
                    "Control database version {} is too new (max supported: {})",
                    version,
                    schema_count - 1
                );
            }
            CONTROL_VERSIONED_SCHEMAS[version].validate(&conn)?;
            Self::migrate_if_needed(&conn, version)?;
            conn
        } else {
            let conn = Connection::open(&db_path)?;
            CONTROL_VERSIONED_SCHEMAS
                .last()
                .context("No schemas defined")?
                .create(&conn)?;
            info!("Created new control database at {:?}", db_path.as_ref());
            conn
        };

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Creates a store backed by a private in-memory database.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        CONTROL_VERSIONED_SCHEMAS
            .last()
            .context("No schemas defined")?
            .create(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn migrate_if_needed(conn: &Connection, version: usize) -> Result<()> {
        for schema in CONTROL_VERSIONED_SCHEMAS.iter().skip(version + 1) {
            if let Some(migration) = schema.migration {
                info!("Migrating control database to version {}", schema.version);
                migration(conn)?;
            }
            conn.execute(
                &format!(
                    "PRAGMA user_version = {}",
                    crate::sqlite_persistence::BASE_DB_VERSION + schema.version
                ),
                [],
            )?;
        }
        Ok(())
    }

    fn row_from_sql(row: &Row) -> rusqlite::Result<StoredAuditRow> {
        let status: String = row.get(4)?;
        let job_status = NormalizedStatus::parse(&status).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                rusqlite::types::Type::Text,
                format!("unknown job_status {}", status).into(),
            )
        })?;
        Ok(StoredAuditRow {
            id: row.get(0)?,
            row: AuditRow {
                workflow_execution_id: row.get(1)?,
                workflow_name: row.get(2)?,
                job_name: row.get(3)?,
                job_status,
                start_date: row.get(5)?,
                end_date: row.get(6)?,
                error_code: row.get(7)?,
                job_params: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
                log_path: row.get::<_, Option<String>>(9)?.unwrap_or_default(),
                retry_count: row.get(10)?,
                execution_time_seconds: row.get(11)?,
                message: row.get::<_, Option<String>>(12)?.unwrap_or_default(),
            },
        })
    }
}

impl AuditStore for SqliteAuditStore {
    fn append(&self, row: &AuditRow) -> Result<i64> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("control database lock poisoned"))?;
        conn.execute(
            r#"INSERT INTO workflow_control (
                workflow_execution_id, workflow_name, job_name, job_status,
                start_date, end_date, error_code, job_params, log_path,
                retry_count, execution_time_seconds, message
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"#,
            params![
                row.workflow_execution_id,
                row.workflow_name,
                row.job_name,
                row.job_status.as_str(),
                row.start_date,
                row.end_date,
                row.error_code,
                row.job_params,
                row.log_path,
                row.retry_count,
                row.execution_time_seconds,
                row.message,
            ],
        )
        .context("Failed to insert control row")?;
        Ok(conn.last_insert_rowid())
    }

    fn list(&self, filter: &AuditFilter) -> Result<Vec<StoredAuditRow>> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("control database lock poisoned"))?;
        let mut stmt = conn.prepare(
            r#"SELECT id, workflow_execution_id, workflow_name, job_name, job_status,
                      start_date, end_date, error_code, job_params, log_path,
                      retry_count, execution_time_seconds, message
               FROM workflow_control
               WHERE (?1 IS NULL OR workflow_name = ?1)
                 AND (?2 IS NULL OR workflow_execution_id = ?2)
               ORDER BY id DESC
               LIMIT ?3 OFFSET ?4"#,
        )?;
        let rows = stmt
            .query_map(
                params![
                    filter.workflow_name,
                    filter.execution_id,
                    filter.limit as i64,
                    filter.offset as i64
                ],
                Self::row_from_sql,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}
