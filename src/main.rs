use anyhow::{Context, Result};
use clap::Parser;
use std::{path::PathBuf, sync::Arc, time::Instant};
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use aef_orchestrator::audit::{AuditLogger, AuditStore, SqliteAuditStore};
use aef_orchestrator::config::{AppConfig, CliConfig, FileConfig};
use aef_orchestrator::jobs::{HttpBackendAdapter, Orchestrator};
use aef_orchestrator::pipeline::{HttpWorkflowEngine, PipelineTrigger};
use aef_orchestrator::scheduling::{HttpSchedulerService, SchedulerReconciler};
use aef_orchestrator::server::{metrics, state::ServerState, ServerConfig};
use aef_orchestrator::{run_server, RequestsLoggingLevel};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Directory holding the control table database.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// Path to a TOML config file. Its values override the flags below.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9091)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Timeout in seconds for calls to execution backends.
    #[clap(long, default_value_t = 300)]
    pub backend_timeout_sec: u64,

    /// Bearer token sent to execution backends.
    #[clap(long)]
    pub backend_auth_token: Option<String>,

    /// Bearer token sent to the workflow and scheduling APIs.
    #[clap(long)]
    pub api_token: Option<String>,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            db_dir: self.db_dir.clone(),
            port: self.port,
            metrics_port: self.metrics_port,
            logging_level: self.logging_level.clone(),
            backend_timeout_sec: self.backend_timeout_sec,
            backend_auth_token: self.backend_auth_token.clone(),
            api_token: self.api_token.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}...", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    info!("Opening control table at {:?}...", config.control_db_path());
    let audit_store: Arc<dyn AuditStore> =
        Arc::new(SqliteAuditStore::new(config.control_db_path())?);
    let audit_logger = Arc::new(AuditLogger::new(
        audit_store.clone(),
        config.log_query.clone(),
    ));

    info!("Initializing metrics...");
    metrics::init_metrics();

    let adapter = Arc::new(HttpBackendAdapter::new(
        config.backend_timeout_sec,
        config.backend_auth_token.clone(),
    )?);
    let orchestrator = Arc::new(Orchestrator::new(adapter, audit_logger.clone()));

    let pipeline_trigger = match &config.workflows {
        Some(settings) => {
            info!(
                "Workflow engine configured for {}/{}",
                settings.project_id, settings.location
            );
            let engine = Arc::new(HttpWorkflowEngine::new(
                settings.clone(),
                config.api_token.clone(),
                config.backend_timeout_sec,
            )?);
            Some(Arc::new(PipelineTrigger::new(engine, audit_logger.clone())))
        }
        None => {
            info!("No [workflows] section, pipeline trigger disabled");
            None
        }
    };

    let reconciler = match &config.scheduling {
        Some(settings) => {
            info!("Scheduling configured under {}", settings.parent());
            let service = Arc::new(HttpSchedulerService::new(
                settings.clone(),
                config.api_token.clone(),
                config.backend_timeout_sec,
            )?);
            Some(Arc::new(SchedulerReconciler::new(service, settings.clone())))
        }
        None => {
            info!("No [scheduling] section, change-feed reconciliation disabled");
            None
        }
    };

    let state = ServerState {
        config: ServerConfig {
            requests_logging_level: config.logging_level.clone(),
            port: config.port,
            metrics_port: config.metrics_port,
        },
        start_time: Instant::now(),
        hash: env!("GIT_HASH").to_string(),
        orchestrator,
        pipeline_trigger,
        reconciler,
        audit_store,
    };

    info!("Ready to serve at port {}!", config.port);
    info!("Metrics available at port {}!", config.metrics_port);
    run_server(state).await
}
