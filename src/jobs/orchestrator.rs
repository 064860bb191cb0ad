//! The intermediate layer between the workflow engine and the executors.
//!
//! One call either submits a job (`get_id`) or polls it (`get_status`). The
//! backend's raw answer is discriminated (handle vs status), normalized, and
//! recorded in the control table when it is a submission outcome or a
//! terminal status. Intermediate `running` polls are never recorded.

use std::sync::Arc;

use tracing::{info, warn};

use super::adapter::{AdapterError, BackendAdapter};
use super::error::OrchestrationError;
use super::models::{CallType, JobHandle, JobOutcome, JobRequest, JobSpec, NormalizedStatus};
use super::normalizer;
use crate::audit::{AuditLogger, JobTransition};

pub struct Orchestrator {
    adapter: Arc<dyn BackendAdapter>,
    audit: Arc<AuditLogger>,
}

/// Per-call context shared by the submit and poll paths.
struct CallContext<'a> {
    request: &'a JobRequest,
    spec: JobSpec,
    job_params: String,
}

impl CallContext<'_> {
    fn backend(&self) -> &str {
        self.request.backend_name()
    }
}

impl Orchestrator {
    pub fn new(adapter: Arc<dyn BackendAdapter>, audit: Arc<AuditLogger>) -> Self {
        Self { adapter, audit }
    }

    /// Handles one `get_id` / `get_status` call.
    pub async fn handle_call(&self, request: &JobRequest) -> Result<JobOutcome, OrchestrationError> {
        let call_type = request
            .call_type
            .as_deref()
            .ok_or_else(|| OrchestrationError::InvalidRequest("no call type".to_string()))?;
        let call_type = CallType::parse(call_type).ok_or_else(|| {
            OrchestrationError::InvalidRequest(format!("invalid call type: {}", call_type))
        })?;
        if request.function_url_to_call.trim().is_empty() {
            return Err(OrchestrationError::InvalidRequest(
                "function_url_to_call is required".to_string(),
            ));
        }

        let spec = JobSpec::from_request(request).map_err(OrchestrationError::InvalidRequest)?;
        let job_params = serde_json::to_string(&spec).unwrap_or_default();
        let ctx = CallContext {
            request,
            spec,
            job_params,
        };

        match call_type {
            CallType::Submit => self.submit(&ctx).await,
            CallType::Poll => {
                let raw_handle = request
                    .async_job_id
                    .as_deref()
                    .filter(|id| !id.trim().is_empty())
                    .ok_or_else(|| {
                        OrchestrationError::InvalidRequest("job id not received".to_string())
                    })?;
                let handle = JobHandle::parse(raw_handle).ok_or_else(|| {
                    OrchestrationError::InvalidRequest(format!(
                        "{} is not a job handle",
                        raw_handle
                    ))
                })?;
                self.poll(&ctx, &handle).await
            }
        }
    }

    async fn submit(&self, ctx: &CallContext<'_>) -> Result<JobOutcome, OrchestrationError> {
        let backend = ctx.backend();
        let raw = match self
            .adapter
            .submit(&ctx.request.function_url_to_call, &ctx.spec)
            .await
        {
            Ok(raw) => raw,
            Err(AdapterError::RejectedSpec(message)) => {
                warn!(
                    "Backend {} rejected job {}/{}: {}",
                    backend, ctx.request.workflow_name, ctx.request.job_name, message
                );
                self.record(ctx, NormalizedStatus::FailedStart, &message)?;
                return Err(OrchestrationError::RejectedSubmission {
                    backend: backend.to_string(),
                    message,
                });
            }
            Err(AdapterError::Transport(message)) | Err(AdapterError::NotFound(message)) => {
                return Err(OrchestrationError::TransientBackend {
                    backend: backend.to_string(),
                    message,
                });
            }
        };

        if let Some(handle) = JobHandle::parse(&raw) {
            info!(
                "Job {}/{} submitted to {}, track it with {}",
                ctx.request.workflow_name, ctx.request.job_name, backend, handle
            );
            self.record(ctx, NormalizedStatus::Started, "")?;
            return Ok(JobOutcome::Submitted(handle));
        }

        // Synchronous executors may answer the submission with a status.
        match normalizer::lookup(&raw) {
            Some(NormalizedStatus::Success) => {
                self.record(ctx, NormalizedStatus::Success, "")?;
                Ok(JobOutcome::Status(NormalizedStatus::Success))
            }
            Some(NormalizedStatus::Running) => Ok(JobOutcome::Status(NormalizedStatus::Running)),
            Some(_) => {
                self.record(ctx, NormalizedStatus::FailedStart, &raw)?;
                Err(OrchestrationError::RejectedSubmission {
                    backend: backend.to_string(),
                    message: raw,
                })
            }
            None => {
                self.record(ctx, NormalizedStatus::FailedStart, &raw)?;
                Err(OrchestrationError::UnmappedStatus {
                    backend: backend.to_string(),
                    raw,
                })
            }
        }
    }

    async fn poll(
        &self,
        ctx: &CallContext<'_>,
        handle: &JobHandle,
    ) -> Result<JobOutcome, OrchestrationError> {
        let backend = ctx.backend();
        let raw = match self
            .adapter
            .poll(&ctx.request.function_url_to_call, &ctx.spec, handle)
            .await
        {
            Ok(raw) => raw,
            Err(AdapterError::NotFound(message)) => {
                self.record(ctx, NormalizedStatus::Failed, &message)?;
                return Err(OrchestrationError::UnknownJob {
                    backend: backend.to_string(),
                    handle: handle.to_string(),
                });
            }
            Err(AdapterError::Transport(message)) | Err(AdapterError::RejectedSpec(message)) => {
                return Err(OrchestrationError::TransientBackend {
                    backend: backend.to_string(),
                    message,
                });
            }
        };

        match normalizer::lookup(&raw) {
            Some(NormalizedStatus::Running) => Ok(JobOutcome::Status(NormalizedStatus::Running)),
            Some(status) => {
                info!("Job {} on {} finished: {}", handle, backend, status);
                let message = if status == NormalizedStatus::Failed {
                    raw.as_str()
                } else {
                    ""
                };
                self.record(ctx, status, message)?;
                Ok(JobOutcome::Status(status))
            }
            None => {
                warn!("Job {} on {} returned unmapped status: {}", handle, backend, raw);
                self.record(ctx, NormalizedStatus::Failed, &raw)?;
                Err(OrchestrationError::UnmappedStatus {
                    backend: backend.to_string(),
                    raw,
                })
            }
        }
    }

    fn record(
        &self,
        ctx: &CallContext<'_>,
        status: NormalizedStatus,
        message: &str,
    ) -> Result<(), OrchestrationError> {
        self.audit
            .log_job_transition(&JobTransition {
                execution_id: &ctx.request.execution_id,
                workflow_name: &ctx.request.workflow_name,
                job_name: &ctx.request.job_name,
                backend: ctx.backend(),
                status,
                job_params: &ctx.job_params,
                message,
            })
            .map_err(|e| OrchestrationError::AuditWrite(format!("{:#}", e)))
    }
}
