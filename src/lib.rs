//! AEF Orchestrator Library
//!
//! Async job orchestration for data pipelines: status normalization, the
//! per-job control table, pipeline triggering and schedule reconciliation.

pub mod audit;
pub mod config;
pub mod jobs;
pub mod pipeline;
pub mod scheduling;
pub mod server;
pub mod sqlite_persistence;

// Re-export commonly used types for convenience
pub use audit::{AuditLogger, AuditStore, SqliteAuditStore};
pub use jobs::{BackendAdapter, NormalizedStatus, Orchestrator};
pub use pipeline::{PipelineTrigger, WorkflowEngine};
pub use scheduling::{SchedulerReconciler, SchedulerService};
pub use server::{make_app, run_server, RequestsLoggingLevel};
