use thiserror::Error;

/// Failures of a single orchestration call.
///
/// None of these are retried here; the workflow engine re-invokes the call.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// Transport failure talking to the backend. The whole call can be retried.
    #[error("transient failure calling backend {backend}: {message}")]
    TransientBackend { backend: String, message: String },

    /// The backend refused the job spec.
    #[error("backend {backend} rejected the submission: {message}")]
    RejectedSubmission { backend: String, message: String },

    /// The backend answered with a status the normalization table doesn't know.
    #[error("backend {backend} returned unmapped status: {raw}")]
    UnmappedStatus { backend: String, raw: String },

    /// The backend has no job for the given handle.
    #[error("backend {backend} has no job {handle}")]
    UnknownJob { backend: String, handle: String },

    /// The control table rejected a row. Fatal for the current call.
    #[error("failed to write audit row: {0}")]
    AuditWrite(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl OrchestrationError {
    /// Stable kind name exposed in error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            OrchestrationError::TransientBackend { .. } => "TransientBackendError",
            OrchestrationError::RejectedSubmission { .. } => "RejectedSubmissionError",
            OrchestrationError::UnmappedStatus { .. } => "UnmappedStatusError",
            OrchestrationError::UnknownJob { .. } => "UnknownJobError",
            OrchestrationError::AuditWrite(_) => "AuditWriteError",
            OrchestrationError::InvalidRequest(_) => "InvalidRequestError",
        }
    }
}
