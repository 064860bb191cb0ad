mod models;
mod reconciler;
mod resource;
mod service;

pub use models::{
    workflow_name_from_path, ChangeEvent, ChangeKind, FieldValue, RawChangeEvent, RawDocument,
    ScheduleDocument,
};
pub use reconciler::{ReconcileAction, ReconcileError, ReconcileOutcome, SchedulerReconciler};
pub use resource::{job_name, trigger_request, HttpTarget, SchedulerJobSpec};
#[cfg(feature = "mock")]
pub use service::MockSchedulerService;
pub use service::{HttpSchedulerService, SchedulerError, SchedulerService};
