pub mod dates;
mod trigger;
mod workflow_engine;

pub use dates::{resolve, Cadence, DateFormat, DateRange, OffsetPolicy, DAILY_DATE_FORMAT};
pub use trigger::{PipelineTrigger, TriggerError, TriggerOutcome, TriggerRequest, WorkflowStatus};
#[cfg(feature = "mock")]
pub use workflow_engine::MockWorkflowEngine;
pub use workflow_engine::{HttpWorkflowEngine, WorkflowEngine, WorkflowEngineError};
