use axum::extract::FromRef;

use crate::audit::AuditStore;
use crate::jobs::Orchestrator;
use crate::pipeline::PipelineTrigger;
use crate::scheduling::SchedulerReconciler;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedOrchestrator = Arc<Orchestrator>;
pub type OptionalPipelineTrigger = Option<Arc<PipelineTrigger>>;
pub type OptionalReconciler = Option<Arc<SchedulerReconciler>>;
pub type GuardedAuditStore = Arc<dyn AuditStore>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub hash: String,
    pub orchestrator: GuardedOrchestrator,
    /// None when no workflow engine is configured.
    pub pipeline_trigger: OptionalPipelineTrigger,
    /// None when no scheduling service is configured.
    pub reconciler: OptionalReconciler,
    pub audit_store: GuardedAuditStore,
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for GuardedOrchestrator {
    fn from_ref(input: &ServerState) -> Self {
        input.orchestrator.clone()
    }
}

impl FromRef<ServerState> for OptionalPipelineTrigger {
    fn from_ref(input: &ServerState) -> Self {
        input.pipeline_trigger.clone()
    }
}

impl FromRef<ServerState> for OptionalReconciler {
    fn from_ref(input: &ServerState) -> Self {
        input.reconciler.clone()
    }
}

impl FromRef<ServerState> for GuardedAuditStore {
    fn from_ref(input: &ServerState) -> Self {
        input.audit_store.clone()
    }
}
