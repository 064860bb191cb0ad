//! Keeps scheduler jobs in line with their schedule documents.
//!
//! Events are delivered at least once and possibly out of order, so every
//! step tolerates finding the job already in the state it is asked for.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::models::{ChangeEvent, ChangeKind, RawChangeEvent, ScheduleDocument};
use super::resource::{job_name, SchedulerJobSpec};
use super::service::{SchedulerError, SchedulerService};
use crate::config::SchedulingSettings;
use crate::pipeline::WorkflowStatus;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("invalid change event: {0}")]
    InvalidEvent(String),
    #[error("invalid schedule document: {0}")]
    InvalidDocument(String),
    #[error("failed to {action} scheduler job {job}: {source}")]
    Scheduler {
        action: &'static str,
        job: String,
        #[source]
        source: SchedulerError,
    },
}

impl ReconcileError {
    pub fn kind(&self) -> &'static str {
        match self {
            ReconcileError::InvalidEvent(_) => "InvalidEventError",
            ReconcileError::InvalidDocument(_) => "InvalidDocumentError",
            ReconcileError::Scheduler { .. } => "SchedulingServiceError",
        }
    }
}

/// What a reconciliation pass did to the scheduler job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileAction {
    Created,
    Updated,
    Deleted,
    AlreadyDeleted,
    Paused,
    AlreadyPaused,
    Resumed,
    AlreadyResumed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconcileOutcome {
    pub change: ChangeKind,
    pub workflow_name: String,
    pub actions: Vec<ReconcileAction>,
}

pub struct SchedulerReconciler {
    service: Arc<dyn SchedulerService>,
    settings: SchedulingSettings,
}

impl SchedulerReconciler {
    pub fn new(service: Arc<dyn SchedulerService>, settings: SchedulingSettings) -> Self {
        Self { service, settings }
    }

    /// Classifies a raw event and applies it.
    pub async fn reconcile(&self, raw: &RawChangeEvent) -> Result<ReconcileOutcome, ReconcileError> {
        let event = ChangeEvent::classify(raw)?;
        self.apply(&event).await
    }

    pub async fn apply(&self, event: &ChangeEvent) -> Result<ReconcileOutcome, ReconcileError> {
        let mut actions = Vec::new();
        match event {
            ChangeEvent::Created(document) => {
                let job = SchedulerJobSpec::for_document(document, &self.settings);
                actions.push(self.upsert(&job, ChangeKind::Create).await?);
                actions.push(self.sync_status(document).await?);
            }
            ChangeEvent::Updated(document) => {
                let job = SchedulerJobSpec::for_document(document, &self.settings);
                actions.push(self.upsert(&job, ChangeKind::Update).await?);
                actions.push(self.sync_status(document).await?);
            }
            ChangeEvent::Deleted { workflow_name } => {
                actions.push(self.delete(workflow_name).await?);
            }
        }
        info!(
            "Reconciled {} of {}: {:?}",
            event.kind(),
            event.workflow_name(),
            actions
        );
        Ok(ReconcileOutcome {
            change: event.kind(),
            workflow_name: event.workflow_name().to_string(),
            actions,
        })
    }

    /// Creates or updates `job`, whichever the service's state calls for.
    ///
    /// A create that finds the job switches to update, and an update that
    /// doesn't find it switches to create.
    async fn upsert(
        &self,
        job: &SchedulerJobSpec,
        change: ChangeKind,
    ) -> Result<ReconcileAction, ReconcileError> {
        let first_try = match change {
            ChangeKind::Update => self.update(job).await,
            _ => self.create(job).await,
        };
        match first_try {
            Ok(action) => Ok(action),
            Err(SchedulerError::AlreadyExists(_)) => {
                debug!("Scheduler job {} already exists, updating it", job.name);
                self.update(job).await.map_err(|e| scheduler_error("update", job, e))
            }
            Err(SchedulerError::NotFound(_)) if change == ChangeKind::Update => {
                debug!("Scheduler job {} not found, creating it", job.name);
                self.create(job).await.map_err(|e| scheduler_error("create", job, e))
            }
            Err(e) => Err(scheduler_error(
                if change == ChangeKind::Update {
                    "update"
                } else {
                    "create"
                },
                job,
                e,
            )),
        }
    }

    async fn create(&self, job: &SchedulerJobSpec) -> Result<ReconcileAction, SchedulerError> {
        self.service.create_job(job).await?;
        Ok(ReconcileAction::Created)
    }

    async fn update(&self, job: &SchedulerJobSpec) -> Result<ReconcileAction, SchedulerError> {
        self.service.update_job(job).await?;
        Ok(ReconcileAction::Updated)
    }

    /// Pauses or resumes the job so it matches the document's status.
    async fn sync_status(
        &self,
        document: &ScheduleDocument,
    ) -> Result<ReconcileAction, ReconcileError> {
        let name = job_name(&self.settings, &document.workflow_name);
        let (result, applied, already, action) = match document.status {
            WorkflowStatus::Disabled => (
                self.service.pause_job(&name).await,
                ReconcileAction::Paused,
                ReconcileAction::AlreadyPaused,
                "pause",
            ),
            WorkflowStatus::Enabled => (
                self.service.resume_job(&name).await,
                ReconcileAction::Resumed,
                ReconcileAction::AlreadyResumed,
                "resume",
            ),
        };
        match result {
            Ok(()) => Ok(applied),
            Err(SchedulerError::AlreadyInState(_)) => {
                debug!("Scheduler job {} needed no {}", name, action);
                Ok(already)
            }
            Err(source) => Err(ReconcileError::Scheduler {
                action,
                job: name,
                source,
            }),
        }
    }

    async fn delete(&self, workflow_name: &str) -> Result<ReconcileAction, ReconcileError> {
        let name = job_name(&self.settings, workflow_name);
        match self.service.delete_job(&name).await {
            Ok(()) => Ok(ReconcileAction::Deleted),
            Err(SchedulerError::NotFound(_)) => {
                warn!("Scheduler job {} was already deleted", name);
                Ok(ReconcileAction::AlreadyDeleted)
            }
            Err(source) => Err(ReconcileError::Scheduler {
                action: "delete",
                job: name,
                source,
            }),
        }
    }
}

fn scheduler_error(
    action: &'static str,
    job: &SchedulerJobSpec,
    source: SchedulerError,
) -> ReconcileError {
    ReconcileError::Scheduler {
        action,
        job: job.name.clone(),
        source,
    }
}
