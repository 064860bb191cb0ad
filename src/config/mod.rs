mod file_config;

pub use file_config::{FileConfig, LogQueryConfig, SchedulingConfig, WorkflowsConfig};

use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use std::path::PathBuf;

pub const DEFAULT_CONSOLE_BASE_URL: &str = "https://console.cloud.google.com";
pub const DEFAULT_SCHEDULER_API_BASE_URL: &str = "https://cloudscheduler.googleapis.com/v1";
pub const DEFAULT_WORKFLOWS_API_BASE_URL: &str = "https://workflowexecutions.googleapis.com/v1";

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub backend_timeout_sec: u64,
    pub backend_auth_token: Option<String>,
    pub api_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub db_dir: PathBuf,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub backend_timeout_sec: u64,
    pub backend_auth_token: Option<String>,
    pub api_token: Option<String>,

    // Feature configs
    pub log_query: LogQuerySettings,
    /// None disables the change-feed entry point.
    pub scheduling: Option<SchedulingSettings>,
    /// None disables the pipeline trigger entry point.
    pub workflows: Option<WorkflowsSettings>,
}

/// Where the per-row log links point to.
#[derive(Debug, Clone, PartialEq)]
pub struct LogQuerySettings {
    pub console_base_url: String,
    pub project_id: Option<String>,
    pub window_minutes: u64,
}

impl Default for LogQuerySettings {
    fn default() -> Self {
        Self {
            console_base_url: DEFAULT_CONSOLE_BASE_URL.to_string(),
            project_id: None,
            window_minutes: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchedulingSettings {
    pub project_id: String,
    pub region: String,
    pub service_account_email: String,
    pub pipeline_trigger_url: String,
    pub api_base_url: String,
}

impl SchedulingSettings {
    /// Parent of every scheduler job this service manages.
    pub fn parent(&self) -> String {
        format!("projects/{}/locations/{}", self.project_id, self.region)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowsSettings {
    pub project_id: String,
    pub location: String,
    pub api_base_url: String,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let backend_timeout_sec = file
            .backend_timeout_sec
            .unwrap_or(cli.backend_timeout_sec);
        let backend_auth_token = file
            .backend_auth_token
            .or_else(|| cli.backend_auth_token.clone());
        let api_token = file.api_token.or_else(|| cli.api_token.clone());

        let lq_file = file.log_query.unwrap_or_default();
        let log_query = LogQuerySettings {
            console_base_url: lq_file
                .console_base_url
                .unwrap_or_else(|| DEFAULT_CONSOLE_BASE_URL.to_string()),
            project_id: lq_file.project_id,
            window_minutes: lq_file.window_minutes.unwrap_or(60),
        };

        let scheduling = file
            .scheduling
            .map(resolve_scheduling)
            .transpose()
            .context("Invalid [scheduling] section")?;
        let workflows = file
            .workflows
            .map(resolve_workflows)
            .transpose()
            .context("Invalid [workflows] section")?;

        Ok(Self {
            db_dir,
            port,
            metrics_port,
            logging_level,
            backend_timeout_sec,
            backend_auth_token,
            api_token,
            log_query,
            scheduling,
            workflows,
        })
    }

    pub fn control_db_path(&self) -> PathBuf {
        self.db_dir.join("control.db")
    }
}

fn required(value: Option<String>, key: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => bail!("{} is required", key),
    }
}

fn resolve_scheduling(file: SchedulingConfig) -> Result<SchedulingSettings> {
    Ok(SchedulingSettings {
        project_id: required(file.project_id, "project_id")?,
        region: required(file.region, "region")?,
        service_account_email: required(file.service_account_email, "service_account_email")?,
        pipeline_trigger_url: required(file.pipeline_trigger_url, "pipeline_trigger_url")?,
        api_base_url: file
            .api_base_url
            .unwrap_or_else(|| DEFAULT_SCHEDULER_API_BASE_URL.to_string()),
    })
}

fn resolve_workflows(file: WorkflowsConfig) -> Result<WorkflowsSettings> {
    Ok(WorkflowsSettings {
        project_id: required(file.project_id, "project_id")?,
        location: required(file.location, "location")?,
        api_base_url: file
            .api_base_url
            .unwrap_or_else(|| DEFAULT_WORKFLOWS_API_BASE_URL.to_string()),
    })
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
