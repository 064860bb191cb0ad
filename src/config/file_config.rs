use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_dir: Option<String>,
    pub port: Option<u16>,
    pub metrics_port: Option<u16>,
    pub logging_level: Option<String>,
    pub backend_timeout_sec: Option<u64>,
    pub backend_auth_token: Option<String>,
    pub api_token: Option<String>,

    // Feature configs
    pub log_query: Option<LogQueryConfig>,
    pub scheduling: Option<SchedulingConfig>,
    pub workflows: Option<WorkflowsConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct LogQueryConfig {
    pub console_base_url: Option<String>,
    pub project_id: Option<String>,
    pub window_minutes: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SchedulingConfig {
    pub project_id: Option<String>,
    pub region: Option<String>,
    pub service_account_email: Option<String>,
    /// Endpoint of the pipeline trigger that scheduler jobs call.
    pub pipeline_trigger_url: Option<String>,
    pub api_base_url: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct WorkflowsConfig {
    pub project_id: Option<String>,
    pub location: Option<String>,
    pub api_base_url: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
