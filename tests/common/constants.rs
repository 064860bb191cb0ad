//! Shared constants for end-to-end tests
//!
//! When test data changes (project names, executor URLs, document paths),
//! update only this file.

// ============================================================================
// Server Lifecycle
// ============================================================================

/// How long to wait for a spawned server to answer its home route
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Interval between readiness probes
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 20;

/// Timeout for every request made by the test client
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// Orchestration
// ============================================================================

/// Workflow used by the orchestration tests
pub const WORKFLOW_NAME: &str = "sales_daily";

/// Job (workflow step) used by the orchestration tests
pub const JOB_NAME: &str = "load_orders";

/// Executor the fake backend pretends to be
pub const EXECUTOR_URL: &str = "https://europe-west1-test-project.cloudfunctions.net/bq-saved-query-executor";

/// Backend name derived from `EXECUTOR_URL`
pub const EXECUTOR_NAME: &str = "bq-saved-query-executor";

/// Handle the fake backend hands out when nothing else is scripted
pub const DEFAULT_JOB_HANDLE: &str = "aef_job_0001";

// ============================================================================
// Scheduling
// ============================================================================

pub const TEST_PROJECT: &str = "test-project";

pub const TEST_REGION: &str = "europe-west1";

pub const SCHEDULER_SERVICE_ACCOUNT: &str = "scheduler@test-project.iam.gserviceaccount.com";

pub const PIPELINE_TRIGGER_URL: &str = "https://aef.example.com/v1/pipelines/trigger";

/// Prefix of every schedule document path
pub const DOCUMENTS_ROOT: &str = "projects/test-project/databases/(default)/documents/schedules";
