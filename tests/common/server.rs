//! Test server lifecycle management
//!
//! This module manages spawning and shutting down test HTTP servers.
//! Each test gets an isolated server with its own control table and fakes.

use super::constants::*;
use super::fakes::{InMemoryScheduler, RecordingEngine, ScriptedBackend};
use aef_orchestrator::audit::{AuditFilter, AuditLogger, AuditStore, SqliteAuditStore, StoredAuditRow};
use aef_orchestrator::config::{LogQuerySettings, SchedulingSettings};
use aef_orchestrator::jobs::Orchestrator;
use aef_orchestrator::pipeline::PipelineTrigger;
use aef_orchestrator::scheduling::SchedulerReconciler;
use aef_orchestrator::server::state::ServerState;
use aef_orchestrator::server::{make_app, RequestsLoggingLevel, ServerConfig};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Test server instance with an isolated control table
///
/// When dropped, the server gracefully shuts down and temp resources are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Control table, for direct inspection in tests
    pub audit_store: Arc<dyn AuditStore>,

    pub backend: Arc<ScriptedBackend>,
    pub engine: Arc<RecordingEngine>,
    pub scheduler: Arc<InMemoryScheduler>,

    // Private fields - keep resources alive until drop
    _temp_db_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

#[allow(dead_code)]
impl TestServer {
    /// Spawns a server with every entry point configured
    pub async fn spawn() -> Self {
        Self::spawn_with(true).await
    }

    /// Spawns a server with only the orchestration entry point
    ///
    /// The trigger and change-feed routes answer 503.
    pub async fn spawn_orchestration_only() -> Self {
        Self::spawn_with(false).await
    }

    /// Binds to a random port (127.0.0.1:0), spawns the app in a background
    /// task and waits for it to answer.
    ///
    /// # Panics
    ///
    /// Panics if the control table can't be created, the port can't be bound
    /// or the server doesn't become ready within timeout.
    async fn spawn_with(all_features: bool) -> Self {
        let temp_db_dir = TempDir::new().expect("Failed to create temp dir");
        let audit_store: Arc<dyn AuditStore> = Arc::new(
            SqliteAuditStore::new(temp_db_dir.path().join("control.db"))
                .expect("Failed to open control table"),
        );
        let audit_logger = Arc::new(AuditLogger::new(
            audit_store.clone(),
            LogQuerySettings {
                project_id: Some(TEST_PROJECT.to_string()),
                ..Default::default()
            },
        ));

        let backend = Arc::new(ScriptedBackend::default());
        let engine = Arc::new(RecordingEngine::default());
        let scheduler = Arc::new(InMemoryScheduler::default());

        let orchestrator = Arc::new(Orchestrator::new(backend.clone(), audit_logger.clone()));
        let (pipeline_trigger, reconciler) = if all_features {
            (
                Some(Arc::new(PipelineTrigger::new(
                    engine.clone(),
                    audit_logger.clone(),
                ))),
                Some(Arc::new(SchedulerReconciler::new(
                    scheduler.clone(),
                    scheduling_settings(),
                ))),
            )
        } else {
            (None, None)
        };

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");

        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let base_url = format!("http://127.0.0.1:{}", port);

        // Create shutdown channel
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let state = ServerState {
            config: ServerConfig {
                requests_logging_level: RequestsLoggingLevel::None,
                port,
                metrics_port: 0,
            },
            start_time: Instant::now(),
            hash: "test".to_string(),
            orchestrator,
            pipeline_trigger,
            reconciler,
            audit_store: audit_store.clone(),
        };
        let app = make_app(state);

        // Spawn server in background task with graceful shutdown
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            audit_store,
            backend,
            engine,
            scheduler,
            _temp_db_dir: temp_db_dir,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Rows currently in the control table, newest first
    pub fn audit_rows(&self) -> Vec<StoredAuditRow> {
        self.audit_store
            .list(&AuditFilter::new())
            .expect("Failed to read control table")
    }

    /// Full name of the scheduler job managed for `workflow_name`
    pub fn scheduler_job_name(&self, workflow_name: &str) -> String {
        aef_orchestrator::scheduling::job_name(&scheduling_settings(), workflow_name)
    }

    /// Waits for the server to become ready by polling the home route
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

fn scheduling_settings() -> SchedulingSettings {
    SchedulingSettings {
        project_id: TEST_PROJECT.to_string(),
        region: TEST_REGION.to_string(),
        service_account_email: SCHEDULER_SERVICE_ACCOUNT.to_string(),
        pipeline_trigger_url: PIPELINE_TRIGGER_URL.to_string(),
        api_base_url: "http://127.0.0.1:1".to_string(),
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
